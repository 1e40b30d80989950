use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5432;
pub const ENV_PROFILE_NAME: &str = "env";
pub const DEMO_PROFILE_NAME: &str = "demo";
const APP_DIR_NAME: &str = "pgview";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    Disabled,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PasswordSource {
    #[default]
    EnvVar,
    Keyring,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: Option<String>,
    /// Inline password from the environment or the demo profile; never read from files.
    #[serde(skip)]
    pub password: Option<String>,
    #[serde(default)]
    pub tls_mode: TlsMode,
    #[serde(default)]
    pub password_source: PasswordSource,
    #[serde(default)]
    pub keyring_service: Option<String>,
    #[serde(default)]
    pub keyring_account: Option<String>,
    #[serde(default)]
    pub tls_ca_cert_path: Option<String>,
    #[serde(default)]
    pub read_only: bool,
}

impl ConnectionProfile {
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            database: None,
            password: None,
            tls_mode: TlsMode::Prefer,
            password_source: PasswordSource::EnvVar,
            keyring_service: None,
            keyring_account: None,
            tls_ca_cert_path: None,
            read_only: false,
        }
    }

    /// Public read-only RNAcentral database hosted by EMBL-EBI.
    #[must_use]
    pub fn demo() -> Self {
        let mut profile = Self::new(DEMO_PROFILE_NAME, "hh-pgsql-public.ebi.ac.uk", "reader");
        profile.database = Some("pfmegrnargs".to_string());
        profile.password = Some("NWDMCE5xdipIjRrp".to_string());
        profile.read_only = true;
        profile
    }

    pub fn from_env() -> Result<Self, ProfilesError> {
        Self::from_env_with(|key| env::var(key).ok())
    }

    /// Builds a profile from `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER` and `DB_PASS`.
    pub fn from_env_with(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ProfilesError> {
        let host = lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string());
        let user = lookup("DB_USER").unwrap_or_default();
        let mut profile = Self::new(ENV_PROFILE_NAME, host, user);

        if let Some(raw_port) = lookup("DB_PORT").filter(|raw| !raw.trim().is_empty()) {
            profile.port = raw_port
                .trim()
                .parse()
                .map_err(|_| ProfilesError::InvalidPort { value: raw_port })?;
        }
        profile.database = lookup("DB_NAME").filter(|name| !name.is_empty());
        profile.password = lookup("DB_PASS").filter(|password| !password.is_empty());
        Ok(profile)
    }

    /// Host and database are the minimum needed to attempt a connection.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.host.trim().is_empty()
            && self
                .database
                .as_deref()
                .is_some_and(|database| !database.trim().is_empty())
    }
}

#[derive(Debug, Error)]
pub enum ProfilesError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("invalid DB_PORT value `{value}`")]
    InvalidPort { value: String },
    #[error("failed to read profiles file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse profiles file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct ProfilesDocument {
    #[serde(default)]
    profiles: Vec<ConnectionProfile>,
}

/// Read-only view of `profiles.toml`. Later entries with a repeated name replace earlier
/// ones; profiles are kept sorted by name.
#[derive(Debug, Clone)]
pub struct FileProfilesStore {
    path: PathBuf,
    profiles: Vec<ConnectionProfile>,
}

impl FileProfilesStore {
    pub fn load_default() -> Result<Self, ProfilesError> {
        Self::load_from_path(default_profiles_path()?)
    }

    /// A missing or blank file is an empty store.
    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, ProfilesError> {
        let path = path.into();
        let raw = if path.exists() {
            fs::read_to_string(&path).map_err(|source| ProfilesError::Read {
                path: path.clone(),
                source,
            })?
        } else {
            String::new()
        };

        let document = if raw.trim().is_empty() {
            ProfilesDocument::default()
        } else {
            toml::from_str::<ProfilesDocument>(&raw).map_err(|source| ProfilesError::Parse {
                path: path.clone(),
                source,
            })?
        };

        let profiles = document
            .profiles
            .into_iter()
            .map(|profile| (profile.name.clone(), profile))
            .collect::<BTreeMap<_, _>>()
            .into_values()
            .collect();
        Ok(Self { path, profiles })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn profiles(&self) -> &[ConnectionProfile] {
        &self.profiles
    }

    #[must_use]
    pub fn profile(&self, name: &str) -> Option<&ConnectionProfile> {
        self.profiles.iter().find(|profile| profile.name == name)
    }
}

/// Per-user application directory, `PGVIEW_CONFIG_DIR` taking precedence.
pub fn default_config_dir() -> Result<PathBuf, ProfilesError> {
    if let Some(custom) = env::var_os("PGVIEW_CONFIG_DIR") {
        return Ok(PathBuf::from(custom));
    }

    let base_dir = if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .ok_or(ProfilesError::ConfigDirUnavailable)?
    } else if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home)
    } else {
        let home = env::var_os("HOME").ok_or(ProfilesError::ConfigDirUnavailable)?;
        PathBuf::from(home).join(".config")
    };

    Ok(base_dir.join(APP_DIR_NAME))
}

pub fn default_profiles_path() -> Result<PathBuf, ProfilesError> {
    Ok(default_config_dir()?.join("profiles.toml"))
}
