//! Configuration file management for planhub.
//!
//! Provides a TOML-based config file at `~/.config/planhub/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use planhub_core::plan::{CreationPolicy, DEFAULT_TRIAL_MAX_PLANS};
use planhub_core::token::TokenConfig;
use planhub_db::config::DbConfig;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8099;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub auth: AuthSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthSection {
    /// Hex-encoded token secret (64 hex chars = 32 bytes).
    pub token_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerSection {
    /// Enables the trial plan quota.
    pub cloud: bool,
    pub trial_max_plans: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plans_dir: Option<PathBuf>,
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            cloud: false,
            trial_max_plans: DEFAULT_TRIAL_MAX_PLANS,
            plans_dir: None,
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the planhub config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/planhub` or `~/.config/planhub`,
/// including on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("planhub");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("planhub")
}

/// Return the path to the planhub config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default root for plan directories: `$XDG_DATA_HOME/planhub/plans` or
/// `~/.local/share/planhub/plans`.
pub fn default_plans_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("planhub").join("plans");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("planhub")
        .join("plans")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`. A missing file is `None`; any
/// other read or parse failure is an error.
pub fn load_optional_config_from(path: &Path) -> Result<Option<ConfigFile>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read config file at {}", path.display()));
        }
    };
    let parsed = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(parsed))
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(config, &config_path())
}

/// Write `config` to `path` with 0600 permissions on Unix.
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Token secret generation
// -----------------------------------------------------------------------

/// Generate a random token secret: 32 random bytes, hex-encoded (64 chars).
pub fn generate_token_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Settings for `planhub serve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub policy: CreationPolicy,
    pub plans_dir: PathBuf,
    pub bind: String,
    pub port: u16,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct PlanhubConfig {
    pub db_config: DbConfig,
    pub token_config: TokenConfig,
    pub server: ServerSettings,
}

impl PlanhubConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `PLANHUB_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Token secret: `PLANHUB_TOKEN_SECRET` > `auth.token_secret` (hex-decoded) > error
    /// - Server: `PLANHUB_CLOUD`, `PLANHUB_TRIAL_MAX_PLANS`, `PLANHUB_PLANS_DIR` > `[server]` > default
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        Self::resolve_from(cli_db_url, &config_path())
    }

    /// Resolve against the config file at `path`. A missing file falls through
    /// to env vars and defaults; an unreadable or malformed one is an error.
    fn resolve_from(cli_db_url: Option<&str>, path: &Path) -> Result<Self> {
        let file_config = load_optional_config_from(path)?;
        Self::resolve_with(cli_db_url, file_config.as_ref())
    }

    fn resolve_with(cli_db_url: Option<&str>, file_config: Option<&ConfigFile>) -> Result<Self> {
        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var("PLANHUB_DATABASE_URL") {
            url
        } else if let Some(cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };
        let db_config = DbConfig::new(db_url);

        let token_config = if let Ok(secret_hex) = std::env::var("PLANHUB_TOKEN_SECRET") {
            let bytes = hex::decode(&secret_hex)
                .context("PLANHUB_TOKEN_SECRET env var is not valid hex")?;
            TokenConfig::new(bytes)
        } else if let Some(cfg) = file_config {
            let bytes = hex::decode(&cfg.auth.token_secret)
                .context("invalid hex in config file token_secret")?;
            TokenConfig::new(bytes)
        } else {
            bail!(
                "token secret not found; set PLANHUB_TOKEN_SECRET or run `planhub init` to create a config file"
            );
        };

        let section = file_config.map(|c| c.server.clone()).unwrap_or_default();
        let server = resolve_server(section)?;

        Ok(Self {
            db_config,
            token_config,
            server,
        })
    }
}

fn resolve_server(section: ServerSection) -> Result<ServerSettings> {
    let cloud_mode = match std::env::var("PLANHUB_CLOUD") {
        Ok(v) => parse_bool(&v).with_context(|| format!("invalid PLANHUB_CLOUD value {v:?}"))?,
        Err(_) => section.cloud,
    };

    let trial_max_plans = match std::env::var("PLANHUB_TRIAL_MAX_PLANS") {
        Ok(v) => v
            .trim()
            .parse()
            .with_context(|| format!("invalid PLANHUB_TRIAL_MAX_PLANS value {v:?}"))?,
        Err(_) => section.trial_max_plans,
    };

    let plans_dir = match std::env::var_os("PLANHUB_PLANS_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => section.plans_dir.unwrap_or_else(default_plans_dir),
    };

    Ok(ServerSettings {
        policy: CreationPolicy {
            cloud_mode,
            trial_max_plans,
        },
        plans_dir,
        bind: section.bind,
        port: section.port,
    })
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
