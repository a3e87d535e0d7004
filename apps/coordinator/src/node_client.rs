//! Outbound HTTP client to nodes (§4.5, "HTTP API (coordinator → node)").
//! Every call is signed with the node key; the coordinator never calls a
//! node unauthenticated.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use thiserror::Error;

use crate::signature::{self, Keyring, Role};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DIGEST_HEADER: &str = "Digest";

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("connection error: {0}")]
    Unreachable(String),
}

impl From<reqwest::Error> for NodeError {
    fn from(err: reqwest::Error) -> Self {
        NodeError::Unreachable(err.to_string())
    }
}

#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    keyring: Keyring,
    timeout: Duration,
}

impl NodeClient {
    pub fn new(keyring: Keyring) -> Self {
        let http = reqwest::Client::builder()
            .build()
            .expect("reqwest client configuration is static and always valid");
        Self {
            http,
            keyring,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    fn base_url(ip: &str, port: u16) -> String {
        format!("http://{ip}:{port}")
    }

    fn authorization(&self, method: &str, path: &str, signed: &[(String, String)], header_names: &[&str]) -> String {
        let canonical = signature::canonical_string(method, path, None, signed);
        let sig = signature::sign(self.keyring.secret_for(Role::Node), &canonical);
        if header_names.is_empty() {
            format!("SECCHIWARE-HMAC-256 keyId=node,signature={sig}")
        } else {
            format!(
                "SECCHIWARE-HMAC-256 keyId=node,headers={},signature={sig}",
                header_names.join(";")
            )
        }
    }

    pub async fn get_test_sets(&self, ip: &str, port: u16) -> Result<reqwest::Response, NodeError> {
        let path = "/test_sets";
        let auth = self.authorization("GET", path, &[], &[]);
        self.http
            .get(format!("{}{}", Self::base_url(ip, port), path))
            .header(AUTHORIZATION, auth)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(NodeError::from)
    }

    /// Installs `archive` (a gzipped tar of packages) on the node. The
    /// `Digest` binds the archive bytes themselves; the multipart envelope
    /// around them is not itself covered (an implementer's choice — see
    /// DESIGN.md).
    pub async fn install(&self, ip: &str, port: u16, archive: Vec<u8>) -> Result<reqwest::Response, NodeError> {
        let path = "/test_sets";
        let digest = signature::digest_header(&archive);
        let signed = vec![("digest".to_string(), digest.clone())];
        let auth = self.authorization("PATCH", path, &signed, &["digest"]);

        let form = reqwest::multipart::Form::new().part(
            "packages",
            reqwest::multipart::Part::bytes(archive).file_name("packages.tar.gz"),
        );

        self.http
            .patch(format!("{}{}", Self::base_url(ip, port), path))
            .header(AUTHORIZATION, auth)
            .header(DIGEST_HEADER, digest)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(NodeError::from)
    }

    pub async fn uninstall(&self, ip: &str, port: u16, package: &str) -> Result<reqwest::Response, NodeError> {
        let path = format!("/test_sets/{package}");
        let auth = self.authorization("DELETE", &path, &[], &[]);
        self.http
            .delete(format!("{}{}", Self::base_url(ip, port), path))
            .header(AUTHORIZATION, auth)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(NodeError::from)
    }

    pub async fn get_reports(&self, ip: &str, port: u16, query: Option<&str>) -> Result<reqwest::Response, NodeError> {
        let path = "/reports";
        let auth = self.authorization("GET", path, &[], &[]);
        let url = match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", Self::base_url(ip, port), path, q),
            _ => format!("{}{}", Self::base_url(ip, port), path),
        };
        self.http
            .get(url)
            .header(AUTHORIZATION, auth)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(NodeError::from)
    }

    /// Best-effort shutdown notification; callers should log and continue
    /// on failure rather than aborting the shutdown sequence.
    pub async fn notify_shutdown(&self, ip: &str, port: u16) -> Result<reqwest::Response, NodeError> {
        let path = "/";
        let auth = self.authorization("DELETE", path, &[], &[]);
        self.http
            .delete(format!("{}{}", Self::base_url(ip, port), path))
            .header(AUTHORIZATION, auth)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(NodeError::from)
    }
}
