use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One lifetime of a node at a given (ip, port). `session_end` is `None`
/// while the session is active; at most one active session may exist per
/// (ip, port) at a time (enforced at the repository layer, not by a SQL
/// constraint, since libsql has no partial-unique-index support).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "session_id")]
    pub id: i64,
    pub session_start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_end: Option<String>,
    #[serde(rename = "ip")]
    pub env_ip: String,
    #[serde(rename = "port")]
    pub env_port: u16,
    pub platform_info: Value,
}

/// One invocation of tests on a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: i64,
    pub fk_session: i64,
    pub timestamp_registered: String,
}

/// One test outcome belonging to an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub fk_execution: i64,
    pub test_name: String,
    pub test_description: String,
    pub timestamp_start: String,
    pub timestamp_end: String,
    pub result_code: i64,
    pub additional_info: Option<Value>,
}

/// An execution together with its reports, as returned by the search
/// endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionWithReports {
    #[serde(flatten)]
    pub execution: Execution,
    pub reports: Vec<Report>,
}

/// A single report as supplied by a node's `GET /reports` response, before
/// it is assigned a database id and an owning execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReport {
    pub test_name: String,
    pub test_description: String,
    pub timestamp_start: String,
    pub timestamp_end: String,
    pub result_code: i64,
    pub additional_info: Option<Value>,
}
