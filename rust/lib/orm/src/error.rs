use hexya_core::RpcError;
use hexya_domain::DomainError;
use hexya_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrmError {
    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("unknown method '{method}' on model {model}")]
    UnknownMethod { model: String, method: String },

    #[error("unknown field '{field}' on model {model}")]
    UnknownField { model: String, field: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ConstraintViolation(String),

    #[error("{0}")]
    AccessDenied(String),

    /// A value does not fit the field it is assigned to.
    #[error("{0}")]
    InvalidValue(String),

    #[error("{0}")]
    Arity(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl OrmError {
    pub fn unknown_field(model: &str, field: &str) -> Self {
        OrmError::UnknownField {
            model: model.to_string(),
            field: field.to_string(),
        }
    }
}

/// Errors raised while running a model method reach the caller with
/// their message unchanged.
impl From<OrmError> for RpcError {
    fn from(err: OrmError) -> Self {
        let message = err.to_string();
        match err {
            OrmError::UnknownModel(_)
            | OrmError::UnknownMethod { .. }
            | OrmError::UnknownField { .. } => RpcError::UnknownModelOrMethod(message),
            OrmError::NotFound(_) => RpcError::NotFound(message),
            OrmError::ConstraintViolation(_) => RpcError::ConstraintViolation(message),
            OrmError::AccessDenied(_) => RpcError::AccessDenied(message),
            OrmError::InvalidValue(_) => RpcError::TypeMismatch(message),
            OrmError::Arity(_) => RpcError::Arity(message),
            OrmError::Storage(_) => RpcError::Internal(message),
            OrmError::Domain(_) => RpcError::MalformedDomain(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_keeps_message() {
        let err: RpcError =
            OrmError::ConstraintViolation("Partner: field 'Name' is required".into()).into();
        assert_eq!(err, RpcError::ConstraintViolation("Partner: field 'Name' is required".into()));

        let err: RpcError = OrmError::unknown_field("Partner", "nope").into();
        assert_eq!(err.error_code(), "UNKNOWN_MODEL_OR_METHOD");
        assert_eq!(err.to_string(), "unknown field 'nope' on model Partner");

        let err: RpcError = OrmError::Domain(DomainError::MissingOperand("&".into())).into();
        assert_eq!(err.error_code(), "MALFORMED_DOMAIN");
    }
}
