use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. The web client matches on the
// `data.name` member of the JSON-RPC error object, never on the message.

/// Stable error code constants.
pub mod error_code {
    pub const AUTHENTICATION_REQUIRED: &str = "AUTHENTICATION_REQUIRED";
    pub const UNKNOWN_MODEL_OR_METHOD: &str = "UNKNOWN_MODEL_OR_METHOD";
    pub const MALFORMED_DOMAIN: &str = "MALFORMED_DOMAIN";
    pub const ARITY: &str = "ARITY";
    pub const TYPE_MISMATCH: &str = "TYPE_MISMATCH";
    pub const CONSTRAINT_VIOLATION: &str = "CONSTRAINT_VIOLATION";
    pub const ACTION_TRIPLET: &str = "ACTION_TRIPLET";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ACCESS_DENIED: &str = "ACCESS_DENIED";
    pub const INTERNAL: &str = "INTERNAL";
}

/// JSON-RPC error code used by the web client for every server-side error.
pub const RPC_SERVER_ERROR: i64 = 200;

// ── RpcError ────────────────────────────────────────────────────────

/// Errors surfaced to the caller of a model method call.
///
/// Structural problems abort the call before the ORM is invoked. Errors
/// raised by the ORM during the call are passed through with their
/// message untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    /// No principal attached to the call.
    #[error("{0}")]
    AuthenticationRequired(String),

    /// The model or the method does not exist.
    #[error("{0}")]
    UnknownModelOrMethod(String),

    /// A domain could not be parsed.
    #[error("{0}")]
    MalformedDomain(String),

    /// Fewer positional arguments than the method requires.
    #[error("{0}")]
    Arity(String),

    /// A value could not be decoded into the expected type.
    #[error("{0}")]
    TypeMismatch(String),

    /// A model constraint failed.
    #[error("{0}")]
    ConstraintViolation(String),

    /// Unknown action code in a to-many triplet.
    #[error("{0}")]
    ActionTriplet(String),

    /// A referenced record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The principal may not perform this operation.
    #[error("{0}")]
    AccessDenied(String),

    /// Unexpected internal error.
    #[error("{0}")]
    Internal(String),
}

impl RpcError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            RpcError::AuthenticationRequired(_) => error_code::AUTHENTICATION_REQUIRED,
            RpcError::UnknownModelOrMethod(_) => error_code::UNKNOWN_MODEL_OR_METHOD,
            RpcError::MalformedDomain(_) => error_code::MALFORMED_DOMAIN,
            RpcError::Arity(_) => error_code::ARITY,
            RpcError::TypeMismatch(_) => error_code::TYPE_MISMATCH,
            RpcError::ConstraintViolation(_) => error_code::CONSTRAINT_VIOLATION,
            RpcError::ActionTriplet(_) => error_code::ACTION_TRIPLET,
            RpcError::NotFound(_) => error_code::NOT_FOUND,
            RpcError::AccessDenied(_) => error_code::ACCESS_DENIED,
            RpcError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// The `error` member of a JSON-RPC response.
    ///
    /// ```json
    /// {"code": 200, "message": "Hexya Server Error",
    ///  "data": {"name": "ARITY", "message": "...", "debug": ""}}
    /// ```
    pub fn to_rpc_error(&self) -> serde_json::Value {
        serde_json::json!({
            "code": RPC_SERVER_ERROR,
            "message": "Hexya Server Error",
            "data": {
                "name": self.error_code(),
                "message": self.to_string(),
                "debug": "",
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_mapping() {
        assert_eq!(
            RpcError::AuthenticationRequired("x".into()).error_code(),
            "AUTHENTICATION_REQUIRED"
        );
        assert_eq!(
            RpcError::UnknownModelOrMethod("x".into()).error_code(),
            "UNKNOWN_MODEL_OR_METHOD"
        );
        assert_eq!(RpcError::MalformedDomain("x".into()).error_code(), "MALFORMED_DOMAIN");
        assert_eq!(RpcError::Arity("x".into()).error_code(), "ARITY");
        assert_eq!(RpcError::TypeMismatch("x".into()).error_code(), "TYPE_MISMATCH");
        assert_eq!(RpcError::ConstraintViolation("x".into()).error_code(), "CONSTRAINT_VIOLATION");
        assert_eq!(RpcError::ActionTriplet("x".into()).error_code(), "ACTION_TRIPLET");
    }

    #[test]
    fn rpc_error_body() {
        let body = RpcError::Arity("need 2 args".into()).to_rpc_error();
        assert_eq!(body["code"], 200);
        assert_eq!(body["data"]["name"], "ARITY");
        assert_eq!(body["data"]["message"], "need 2 args");
    }

    #[test]
    fn error_display_is_just_message() {
        assert_eq!(RpcError::NotFound("partner 12".into()).to_string(), "partner 12");
        assert_eq!(RpcError::MalformedDomain("bad leaf".into()).to_string(), "bad leaf");
    }
}
