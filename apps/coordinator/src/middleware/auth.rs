use axum::http::{HeaderMap, Method, Uri};

use crate::error::AppError;
use crate::signature::{self, Keyring, Role};

/// Verifies the `Authorization` header against `expected_role`, using
/// `mandatory_headers` as the set that endpoint must have bound into its
/// signature.
pub fn authenticate(
    keyring: &Keyring,
    expected_role: Role,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    mandatory_headers: &[&str],
) -> Result<(), AppError> {
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".into()))?;

    let role = signature::verify_authorization(
        keyring,
        authorization,
        method.as_str(),
        uri.path(),
        uri.query(),
        mandatory_headers,
        |name| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        },
    )?;

    if role != expected_role {
        return Err(AppError::Unauthorized("keyId does not match the role this endpoint requires".into()));
    }
    Ok(())
}

/// Verifies a body-bound request's `Digest` header against the actual body
/// bytes, before signature verification (§4.5).
pub fn verify_body_digest(headers: &HeaderMap, body: &[u8]) -> Result<(), AppError> {
    let digest = headers
        .get("digest")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Malformed("missing Digest header".into()))?;
    signature::verify_digest(body, digest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn keyring() -> Keyring {
        Keyring::new("client-secret", "node-secret")
    }

    fn signed_headers(role: Role, method: &str, path: &str) -> HeaderMap {
        let kr = keyring();
        let canonical = signature::canonical_string(method, path, None, &[]);
        let key_id = match role {
            Role::Client => "client",
            Role::Node => "node",
        };
        let sig = signature::sign(kr.secret_for(role), &canonical);
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("SECCHIWARE-HMAC-256 keyId={key_id},signature={sig}")).unwrap(),
        );
        headers
    }

    #[test]
    fn accepts_a_correctly_signed_client_request() {
        let headers = signed_headers(Role::Client, "DELETE", "/sessions/1");
        let uri: Uri = "/sessions/1".parse().unwrap();
        authenticate(&keyring(), Role::Client, &Method::DELETE, &uri, &headers, &[]).unwrap();
    }

    #[test]
    fn rejects_a_node_signature_on_a_client_endpoint() {
        let headers = signed_headers(Role::Node, "DELETE", "/sessions/1");
        let uri: Uri = "/sessions/1".parse().unwrap();
        let err = authenticate(&keyring(), Role::Client, &Method::DELETE, &uri, &headers, &[]).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn rejects_a_missing_authorization_header() {
        let uri: Uri = "/sessions/1".parse().unwrap();
        let err =
            authenticate(&keyring(), Role::Client, &Method::DELETE, &uri, &HeaderMap::new(), &[]).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn verify_body_digest_rejects_a_tampered_body() {
        let mut headers = HeaderMap::new();
        headers.insert("digest", HeaderValue::from_str(&signature::digest_header(b"original")).unwrap());
        let err = verify_body_digest(&headers, b"tampered").unwrap_err();
        assert!(matches!(err, AppError::Malformed(_)));
    }
}
