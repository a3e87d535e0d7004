//! The `SECCHIWARE-HMAC-256` message-signing scheme (§4.1).
//!
//! A signature is the base64 encoding of an HMAC-SHA256 digest computed
//! over a canonical string built from the request method, path, query and
//! a caller-chosen, ordered subset of headers. Two symmetric keys exist,
//! one per [`Role`]; `keyId` is matched against that fixed set rather than
//! an open registry.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest as ShaDigest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Node,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed authorization header")]
    Malformed,
    #[error("unknown keyId")]
    UnknownKey,
    #[error("mandatory header {0} not included in headers=")]
    MissingMandatory(String),
    #[error("signature does not verify")]
    InvalidSignature,
    #[error("digest header missing or malformed")]
    MalformedDigest,
    #[error("digest does not match body")]
    DigestMismatch,
}

/// Holds the two configured secrets and resolves a `keyId` to a role.
#[derive(Clone)]
pub struct Keyring {
    client_secret: Vec<u8>,
    node_secret: Vec<u8>,
}

impl Keyring {
    pub fn new(client_secret: impl Into<Vec<u8>>, node_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            client_secret: client_secret.into(),
            node_secret: node_secret.into(),
        }
    }

    fn resolve(&self, key_id: &str) -> Option<(Role, &[u8])> {
        match key_id {
            "client" => Some((Role::Client, &self.client_secret)),
            "node" => Some((Role::Node, &self.node_secret)),
            _ => None,
        }
    }

    pub fn secret_for(&self, role: Role) -> &[u8] {
        match role {
            Role::Client => &self.client_secret,
            Role::Node => &self.node_secret,
        }
    }
}

struct ParsedAuthorization {
    key_id: String,
    headers: Vec<String>,
    signature: String,
}

const SCHEME_PREFIX: &str = "SECCHIWARE-HMAC-256 ";

fn parse_authorization(value: &str) -> Result<ParsedAuthorization, SignatureError> {
    let rest = value.strip_prefix(SCHEME_PREFIX).ok_or(SignatureError::Malformed)?;

    let mut key_id = None;
    let mut headers = Vec::new();
    let mut signature = None;

    for param in rest.split(',') {
        let param = param.trim();
        let (name, val) = param.split_once('=').ok_or(SignatureError::Malformed)?;
        match name {
            "keyId" => key_id = Some(val.to_string()),
            "headers" => {
                headers = val
                    .split(';')
                    .filter(|h| !h.is_empty())
                    .map(|h| h.to_ascii_lowercase())
                    .collect();
            }
            "signature" => signature = Some(val.to_string()),
            _ => return Err(SignatureError::Malformed),
        }
    }

    Ok(ParsedAuthorization {
        key_id: key_id.ok_or(SignatureError::Malformed)?,
        headers,
        signature: signature.ok_or(SignatureError::Malformed)?,
    })
}

/// Builds the canonical string for a request: method, path, optional query,
/// then each named header in caller order, trailing whitespace stripped.
pub fn canonical_string(
    method: &str,
    path: &str,
    query: Option<&str>,
    signed_headers: &[(String, String)],
) -> String {
    let mut out = String::new();
    out.push_str(&method.to_ascii_lowercase());
    out.push('\n');
    out.push_str(path);
    out.push('\n');
    if let Some(q) = query {
        out.push_str(&urlencode_query(q));
        out.push('\n');
    }
    for (name, value) in signed_headers {
        out.push_str(&name.to_ascii_lowercase());
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn urlencode_query(query: &str) -> String {
    query.replace(' ', "%20")
}

fn hmac_sign(secret: &[u8], canonical: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(canonical.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Computes the base64 `signature=` value for a canonical string.
pub fn sign(secret: &[u8], canonical: &str) -> String {
    BASE64.encode(hmac_sign(secret, canonical))
}

/// Computes the `Digest: sha-256=<b64>` header value for a body.
pub fn digest_header(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("sha-256={}", BASE64.encode(hasher.finalize()))
}

/// Verifies a `Digest` header against the actual request body.
pub fn verify_digest(body: &[u8], digest_header_value: &str) -> Result<(), SignatureError> {
    let encoded = digest_header_value
        .strip_prefix("sha-256=")
        .ok_or(SignatureError::MalformedDigest)?;
    let claimed = BASE64.decode(encoded).map_err(|_| SignatureError::MalformedDigest)?;

    let mut hasher = Sha256::new();
    hasher.update(body);
    let actual = hasher.finalize();

    if actual.as_slice().ct_eq(&claimed).into() {
        Ok(())
    } else {
        Err(SignatureError::DigestMismatch)
    }
}

/// Verifies an `Authorization: SECCHIWARE-HMAC-256 ...` header.
///
/// `header_lookup` resolves a (lowercased) header name listed in `headers=`
/// to its value, in the same order the caller specified; the canonical
/// string is built from exactly those pairs. `mandatory_headers` is the
/// set of header names the endpoint requires to be present in `headers=`.
pub fn verify_authorization(
    keyring: &Keyring,
    authorization: &str,
    method: &str,
    path: &str,
    query: Option<&str>,
    mandatory_headers: &[&str],
    header_lookup: impl Fn(&str) -> Option<String>,
) -> Result<Role, SignatureError> {
    let parsed = parse_authorization(authorization)?;

    let (role, secret) = keyring.resolve(&parsed.key_id).ok_or(SignatureError::UnknownKey)?;

    for mandatory in mandatory_headers {
        let mandatory = mandatory.to_ascii_lowercase();
        if !parsed.headers.iter().any(|h| h == &mandatory) {
            return Err(SignatureError::MissingMandatory(mandatory));
        }
    }

    let mut signed_headers = Vec::with_capacity(parsed.headers.len());
    for name in &parsed.headers {
        let value = header_lookup(name).ok_or(SignatureError::Malformed)?;
        signed_headers.push((name.clone(), value));
    }

    let canonical = canonical_string(method, path, query, &signed_headers);
    let expected = hmac_sign(secret, &canonical);
    let provided = BASE64
        .decode(&parsed.signature)
        .map_err(|_| SignatureError::InvalidSignature)?;

    if expected.ct_eq(&provided).into() {
        Ok(role)
    } else {
        Err(SignatureError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyring() -> Keyring {
        Keyring::new("client-secret", "node-secret")
    }

    #[test]
    fn round_trip_signs_and_verifies() {
        let kr = keyring();
        let headers = vec![("digest".to_string(), "sha-256=abc".to_string())];
        let canonical = canonical_string("post", "/environments", None, &headers);
        let sig = sign(kr.secret_for(Role::Node), &canonical);

        let auth = format!("SECCHIWARE-HMAC-256 keyId=node,headers=digest,signature={sig}");
        let role = verify_authorization(&kr, &auth, "POST", "/environments", None, &["digest"], |name| {
            if name == "digest" {
                Some("sha-256=abc".to_string())
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(role, Role::Node);
    }

    #[test]
    fn rejects_unknown_key_id() {
        let kr = keyring();
        let auth = "SECCHIWARE-HMAC-256 keyId=bogus,signature=AAAA";
        let err = verify_authorization(&kr, auth, "GET", "/", None, &[], |_| None).unwrap_err();
        assert_eq!(err, SignatureError::UnknownKey);
    }

    #[test]
    fn rejects_missing_mandatory_header() {
        let kr = keyring();
        let sig = sign(kr.secret_for(Role::Client), "get\n/\n");
        let auth = format!("SECCHIWARE-HMAC-256 keyId=client,signature={sig}");
        let err = verify_authorization(&kr, &auth, "GET", "/", None, &["digest"], |_| None).unwrap_err();
        assert!(matches!(err, SignatureError::MissingMandatory(_)));
    }

    #[test]
    fn rejects_tampered_signature() {
        let kr = keyring();
        let auth = "SECCHIWARE-HMAC-256 keyId=client,signature=AAAAAAAA";
        let err = verify_authorization(&kr, auth, "GET", "/", None, &[], |_| None).unwrap_err();
        assert_eq!(err, SignatureError::InvalidSignature);
    }

    #[test]
    fn digest_round_trips() {
        let body = b"hello world";
        let header = digest_header(body);
        verify_digest(body, &header).unwrap();
        assert_eq!(
            verify_digest(b"tampered", &header).unwrap_err(),
            SignatureError::DigestMismatch
        );
    }
}
