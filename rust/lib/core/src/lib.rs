pub mod auth;
pub mod config;
pub mod error;
pub mod module;
pub mod types;

pub use auth::{Authenticator, DenyAll, FixedPrincipal, HeaderAuthenticator, Principal};
pub use config::ServiceConfig;
pub use error::RpcError;
pub use module::Module;
pub use types::{cast_to_integer, now_rfc3339, title_case, RecordRef};
