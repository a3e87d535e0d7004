pub mod client;
pub mod errors;
pub mod models;
pub mod repositories;
pub mod schema;
pub mod search;

pub use client::StoreClient;
pub use errors::StoreError;
pub use models::{Execution, ExecutionWithReports, NewReport, Report, Session};
pub use repositories::{ExecutionRepository, ReportRepository, SessionRepository};
