//! Principal extraction for model method calls.
//!
//! The dispatcher does NOT know about cookie sessions or login. It only
//! receives the principal resolved by this trait. The concrete
//! implementation is injected at startup time.

use axum::http::HeaderMap;

use crate::RpcError;

/// Header carrying the authenticated user id, set by the session layer.
pub const UID_HEADER: &str = "x-hexya-uid";

/// The authenticated user a call runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub uid: i64,
}

impl Principal {
    pub fn new(uid: i64) -> Self {
        Self { uid }
    }
}

/// Pluggable authenticator. The RPC routes call this for every request.
pub trait Authenticator: Send + Sync + 'static {
    /// Resolve the principal of a request.
    ///
    /// Returns `Ok(None)` when no user is logged in; the dispatcher turns
    /// that into `AuthenticationRequired`.
    fn principal(&self, headers: &HeaderMap) -> Result<Option<Principal>, RpcError>;
}

/// Reads the user id from the `X-Hexya-Uid` header.
pub struct HeaderAuthenticator;

impl Authenticator for HeaderAuthenticator {
    fn principal(&self, headers: &HeaderMap) -> Result<Option<Principal>, RpcError> {
        let Some(raw) = headers.get(UID_HEADER) else {
            return Ok(None);
        };
        let uid = raw
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| RpcError::AuthenticationRequired("invalid session uid".into()))?;
        if uid == 0 {
            return Ok(None);
        }
        Ok(Some(Principal::new(uid)))
    }
}

/// Every request runs as the same user. Used for testing and
/// single-user deployments.
pub struct FixedPrincipal(pub i64);

impl Authenticator for FixedPrincipal {
    fn principal(&self, _headers: &HeaderMap) -> Result<Option<Principal>, RpcError> {
        Ok(Some(Principal::new(self.0)))
    }
}

/// No request is ever authenticated. Used for testing.
pub struct DenyAll;

impl Authenticator for DenyAll {
    fn principal(&self, _headers: &HeaderMap) -> Result<Option<Principal>, RpcError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_authenticator_reads_uid() {
        let mut headers = HeaderMap::new();
        headers.insert(UID_HEADER, "7".parse().unwrap());
        let p = HeaderAuthenticator.principal(&headers).unwrap();
        assert_eq!(p, Some(Principal::new(7)));
    }

    #[test]
    fn header_authenticator_missing_header() {
        let headers = HeaderMap::new();
        assert_eq!(HeaderAuthenticator.principal(&headers).unwrap(), None);
    }

    #[test]
    fn header_authenticator_zero_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(UID_HEADER, "0".parse().unwrap());
        assert_eq!(HeaderAuthenticator.principal(&headers).unwrap(), None);
    }

    #[test]
    fn header_authenticator_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert(UID_HEADER, "abc".parse().unwrap());
        let err = HeaderAuthenticator.principal(&headers).unwrap_err();
        assert_eq!(err.error_code(), "AUTHENTICATION_REQUIRED");
    }

    #[test]
    fn fixed_and_deny() {
        let headers = HeaderMap::new();
        assert_eq!(FixedPrincipal(1).principal(&headers).unwrap(), Some(Principal::new(1)));
        assert_eq!(DenyAll.principal(&headers).unwrap(), None);
    }
}
