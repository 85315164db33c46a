use std::path::PathBuf;

/// Common configuration shared by the server and embedded deployments.
///
/// The binary builds this from its TOML file and command-line flags, then
/// passes it to storage initialization and to the dispatcher.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory holding the database and the `seed/` data files.
    pub data_dir: Option<PathBuf>,

    /// Path to the redb database file.
    /// Defaults to `{data_dir}/hexya.redb` if not specified.
    pub db_path: Option<PathBuf>,

    /// Keep records in memory only (nothing is written to disk).
    pub in_memory: bool,

    /// Reject argument fragments that cannot be decoded into the declared
    /// parameter type instead of leaving the parameter at its zero value.
    pub strict_args: bool,

    /// Take the calling user from the `X-Hexya-Uid` header. Only safe
    /// behind a proxy that sets the header itself and strips it from
    /// client requests. When off, every call is rejected as
    /// unauthenticated.
    pub trust_uid_header: bool,

    /// Listen address for the HTTP server.
    pub listen: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            db_path: None,
            in_memory: false,
            strict_args: false,
            trust_uid_header: false,
            listen: "127.0.0.1:8069".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Resolve the redb database path, falling back to `{data_dir}/hexya.redb`.
    pub fn resolve_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("hexya.redb"))
    }

    /// Resolve the seed data directory.
    pub fn resolve_seed_dir(&self) -> PathBuf {
        self.resolve_data_subpath("seed")
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
