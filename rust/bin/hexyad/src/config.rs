//! Server configuration file.
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:8069"
//!
//! # Trust the X-Hexya-Uid header set by a fronting proxy. Off by
//! # default: without it every call is rejected as unauthenticated.
//! [auth]
//! trust_uid_header = false
//!
//! [storage]
//! data_dir = "/var/lib/hexya"
//! in_memory = false
//!
//! [rpc]
//! strict_args = false
//! ```

use std::path::{Path, PathBuf};

use hexya_core::ServiceConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub rpc: RpcSection,
    pub auth: AuthSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: ServiceConfig::default().listen,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Holds `hexya.redb` and the optional `seed/` directory.
    pub data_dir: String,
    /// Path of the database file when it lives outside `data_dir`.
    pub db_path: String,
    pub in_memory: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RpcSection {
    pub strict_args: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub trust_uid_header: bool,
}

impl ServerConfig {
    /// A context name resolves to `/etc/hexya/<name>.toml`. Anything that
    /// looks like a path is used as is.
    pub fn resolve_path(name: &str) -> PathBuf {
        if name.contains('/') || name.contains('.') {
            PathBuf::from(name)
        } else {
            PathBuf::from(format!("/etc/hexya/{}.toml", name))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_service_config(&self) -> ServiceConfig {
        let non_empty = |s: &str| (!s.is_empty()).then(|| PathBuf::from(s));
        ServiceConfig {
            data_dir: non_empty(&self.storage.data_dir),
            db_path: non_empty(&self.storage.db_path),
            in_memory: self.storage.in_memory,
            strict_args: self.rpc.strict_args,
            trust_uid_header: self.auth.trust_uid_header,
            listen: self.server.listen.clone(),
        }
    }
}
