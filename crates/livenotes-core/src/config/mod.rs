//! Client configuration.
//!
//! `ClientConfig` is resolved once at startup and handed to the components
//! that need it; nothing reads configuration from ambient globals afterwards.
//! Sources are layered: an optional JSON file, then environment variables,
//! then whatever the caller overrides explicitly (CLI flags).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::{normalize_text_option, parse_bool_flag};

pub const ENV_WEB_CLIENT_ID: &str = "LIVENOTES_WEB_CLIENT_ID";
pub const ENV_OFFLINE_ACCESS: &str = "LIVENOTES_OFFLINE_ACCESS";
pub const ENV_DB_PATH: &str = "LIVENOTES_DB_PATH";

/// Options passed to the identity provider before the first sign-in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct IdentityProviderConfig {
    /// OAuth web client id used to request an id token for the backend
    #[serde(default)]
    pub web_client_id: Option<String>,
    /// Request a refreshable (offline) grant
    #[serde(default)]
    pub offline_access: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub identity: IdentityProviderConfig,
    /// Local database file for the SQLite backend
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Parse a JSON config payload.
    pub fn from_json(payload: &str) -> Result<Self, String> {
        let config: Self = serde_json::from_str(payload)
            .map_err(|error| format!("invalid config JSON: {error}"))?;
        Ok(config.normalized())
    }

    /// Load a JSON config file. A missing file yields the default config.
    pub fn load_file(path: &Path) -> Result<Self, String> {
        match std::fs::read_to_string(path) {
            Ok(payload) => Self::from_json(&payload),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(format!(
                "failed to read config file {}: {error}",
                path.display()
            )),
        }
    }

    /// Apply `LIVENOTES_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (the environment in production).
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(client_id) = normalize_text_option(lookup(ENV_WEB_CLIENT_ID)) {
            self.identity.web_client_id = Some(client_id);
        }
        if let Some(flag) = lookup(ENV_OFFLINE_ACCESS) {
            match parse_bool_flag(&flag) {
                Some(offline_access) => self.identity.offline_access = offline_access,
                None => tracing::warn!(
                    "Ignoring {}={:?}: expected true/false",
                    ENV_OFFLINE_ACCESS,
                    flag
                ),
            }
        }
        if let Some(db_path) = normalize_text_option(lookup(ENV_DB_PATH)) {
            self.db_path = Some(PathBuf::from(db_path));
        }
        self
    }

    fn normalized(mut self) -> Self {
        self.identity.web_client_id = normalize_text_option(self.identity.web_client_id);
        self
    }
}
