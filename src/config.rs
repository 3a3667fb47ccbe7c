use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub uploads: UploadConfig,

    pub mail: MailConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_url: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/trackr.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,

    pub port: u16,

    /// Public URL used when building links in outgoing mail.
    pub base_url: String,

    /// Whether to set the Secure flag on session cookies.
    /// Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    pub session_inactivity_minutes: i64,

    /// Session lifetime when "remember me" is ticked at login.
    pub remember_me_days: i64,

    /// Request body cap, which bounds artifact uploads.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            secure_cookies: false,
            session_inactivity_minutes: 60,
            remember_me_days: 365,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Signing key for password reset tokens. Generated per process when empty.
    pub secret_key: String,

    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,

    pub reset_token_ttl_seconds: i64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            reset_token_ttl_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub upload_folder: String,

    /// Lowercase extensions without the leading dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_folder: "uploads".to_string(),
            allowed_extensions: [
                "txt", "pdf", "png", "jpg", "jpeg", "gif", "doc", "docx", "xls", "xlsx", "zip",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// SMTP relay host. Outgoing mail is only logged when unset.
    pub server: Option<String>,

    pub port: u16,

    pub use_tls: bool,

    pub username: Option<String>,

    pub password: Option<String>,

    pub sender: String,

    pub admins: Vec<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            server: None,
            port: 25,
            use_tls: false,
            username: None,
            password: None,
            sender: "trackr <no-reply@trackr.local>".to_string(),
            admins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            uploads: UploadConfig::default(),
            mail: MailConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Loads the first config file found, then `.env`, then environment overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.ensure_secret_key();
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(&path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    /// Applies `SECRET_KEY`, `DATABASE_URL`, `MAIL_*` and friends on top of file values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SECRET_KEY") {
            self.security.secret_key = v;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.general.database_url = v;
        }
        if let Some(v) = lookup("UPLOAD_FOLDER") {
            self.uploads.upload_folder = v;
        }
        if let Some(v) = lookup("MAIL_SERVER") {
            self.mail.server = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("MAIL_PORT") {
            self.mail.port = v
                .parse()
                .with_context(|| format!("Invalid MAIL_PORT: {v}"))?;
        }
        if let Some(v) = lookup("MAIL_USE_TLS") {
            self.mail.use_tls = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("MAIL_USERNAME") {
            self.mail.username = Some(v);
        }
        if let Some(v) = lookup("MAIL_PASSWORD") {
            self.mail.password = Some(v);
        }
        if let Some(v) = lookup("TRACKR_PORT") {
            self.server.port = v
                .parse()
                .with_context(|| format!("Invalid TRACKR_PORT: {v}"))?;
        }
        Ok(())
    }

    pub fn ensure_secret_key(&mut self) {
        if self.security.secret_key.is_empty() {
            warn!("SECRET_KEY is not set; generating a per-process key (reset links die on restart)");
            self.security.secret_key = generate_secret_key();
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("trackr").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".trackr").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port must be > 0");
        }

        if self.uploads.allowed_extensions.is_empty() {
            anyhow::bail!("At least one upload extension must be allowed");
        }

        if self.security.reset_token_ttl_seconds <= 0 {
            anyhow::bail!("Reset token TTL must be > 0");
        }

        Ok(())
    }
}

fn generate_secret_key() -> String {
    use rand::Rng;

    let bytes: [u8; 32] = rand::rng().random();
    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.security.reset_token_ttl_seconds, 600);
        assert!(config.uploads.allowed_extensions.contains(&"pdf".to_string()));
        assert!(config.mail.server.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[uploads]"));
        assert!(toml_str.contains("[mail]"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SECRET_KEY", "s3cret"),
            ("DATABASE_URL", "sqlite:/tmp/other.db"),
            ("MAIL_SERVER", "smtp.example.com"),
            ("MAIL_PORT", "587"),
            ("MAIL_USE_TLS", "True"),
            ("MAIL_USERNAME", "mailer"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.security.secret_key, "s3cret");
        assert_eq!(config.general.database_url, "sqlite:/tmp/other.db");
        assert_eq!(config.mail.server.as_deref(), Some("smtp.example.com"));
        assert_eq!(config.mail.port, 587);
        assert!(config.mail.use_tls);
        assert_eq!(config.mail.username.as_deref(), Some("mailer"));
        assert!(config.mail.password.is_none());
    }

    #[test]
    fn test_invalid_mail_port_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_env(|k| (k == "MAIL_PORT").then(|| "smtp".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_secret_key_is_generated() {
        let mut config = Config::default();
        config.ensure_secret_key();
        assert_eq!(config.security.secret_key.len(), 64);

        let existing = config.security.secret_key.clone();
        config.ensure_secret_key();
        assert_eq!(config.security.secret_key, existing);
    }

    #[test]
    fn test_validate_rejects_empty_allow_list() {
        let mut config = Config::default();
        config.uploads.allowed_extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 8080\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.general.log_level, "info");
    }
}
