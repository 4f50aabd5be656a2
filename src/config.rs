use std::net::SocketAddr;
use std::path::PathBuf;

use crate::auth::password::DEFAULT_ITERATIONS;

/// Application-level constants
pub const APP_NAME: &str = "CareHome";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
const DEFAULT_VIEWER_URL: &str = "https://docs.google.com/viewer";

/// Get the application data directory
/// ~/CareHome/ on all platforms, falling back to the working directory
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default database location
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("carehome.db")
}

/// Default directory for locally stored uploads
pub fn default_media_dir() -> PathBuf {
    app_data_dir().join("media")
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "carehome=info,carehome_lib=info,tower_http=info"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),
}

/// Where uploaded objects go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Http { url: String, bucket: String, key: String },
    Local { dir: PathBuf, public_base: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    /// `None` means a random per-process secret: tokens die with the process.
    pub token_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub password_iterations: u32,
    pub storage: StorageConfig,
    /// Prefix for the embedded viewer non-image documents are opened in.
    pub viewer_url: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

fn parse<T: std::str::FromStr>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

impl Config {
    /// Read `CAREHOME_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind_addr: SocketAddr = parse(
            "CAREHOME_BIND_ADDR",
            get("CAREHOME_BIND_ADDR"),
            SocketAddr::from(([127, 0, 0, 1], 8080)),
        )?;
        let token_ttl_hours = parse("CAREHOME_TOKEN_TTL_HOURS", get("CAREHOME_TOKEN_TTL_HOURS"), DEFAULT_TOKEN_TTL_HOURS)?;
        if token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                var: "CAREHOME_TOKEN_TTL_HOURS",
                value: token_ttl_hours.to_string(),
            });
        }
        let password_iterations = parse(
            "CAREHOME_PASSWORD_ITERATIONS",
            get("CAREHOME_PASSWORD_ITERATIONS"),
            DEFAULT_ITERATIONS,
        )?;

        let storage = match (
            get("CAREHOME_STORAGE_URL"),
            get("CAREHOME_STORAGE_BUCKET"),
            get("CAREHOME_STORAGE_KEY"),
        ) {
            (Some(url), Some(bucket), Some(key)) => StorageConfig::Http { url, bucket, key },
            (Some(_), _, _) => return Err(ConfigError::Incomplete("CAREHOME_STORAGE_URL", "CAREHOME_STORAGE_BUCKET and CAREHOME_STORAGE_KEY")),
            (None, _, _) => StorageConfig::Local {
                dir: get("CAREHOME_STORAGE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_media_dir),
                public_base: get("CAREHOME_PUBLIC_BASE_URL")
                    .unwrap_or_else(|| format!("http://{bind_addr}/media")),
            },
        };

        let admin_email = get("CAREHOME_ADMIN_EMAIL");
        let admin_password = get("CAREHOME_ADMIN_PASSWORD");
        if admin_email.is_some() != admin_password.is_some() {
            return Err(ConfigError::Incomplete("CAREHOME_ADMIN_EMAIL", "CAREHOME_ADMIN_PASSWORD"));
        }

        Ok(Self {
            db_path: get("CAREHOME_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
            bind_addr,
            token_secret: get("CAREHOME_TOKEN_SECRET"),
            token_ttl_hours,
            password_iterations,
            storage,
            viewer_url: get("CAREHOME_VIEWER_URL").unwrap_or_else(|| DEFAULT_VIEWER_URL.into()),
            admin_email,
            admin_password,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8080))),
            token_secret: None,
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            password_iterations: DEFAULT_ITERATIONS,
            storage: StorageConfig::Local {
                dir: default_media_dir(),
                public_base: format!("http://{DEFAULT_BIND_ADDR}/media"),
            },
            viewer_url: DEFAULT_VIEWER_URL.into(),
            admin_email: None,
            admin_password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn app_data_dir_named_after_app() {
        assert!(app_data_dir().ends_with("CareHome"));
        assert!(default_db_path().starts_with(app_data_dir()));
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(cfg.token_ttl_hours, 24);
        assert_eq!(cfg.password_iterations, DEFAULT_ITERATIONS);
        assert!(cfg.token_secret.is_none());
        assert_eq!(cfg.viewer_url, "https://docs.google.com/viewer");
        assert_eq!(
            cfg.storage,
            StorageConfig::Local {
                dir: default_media_dir(),
                public_base: "http://127.0.0.1:8080/media".into()
            }
        );
    }

    #[test]
    fn viewer_url_can_be_overridden() {
        let cfg = config(&[("CAREHOME_VIEWER_URL", "https://viewer.example.com/view")]).unwrap();
        assert_eq!(cfg.viewer_url, "https://viewer.example.com/view");
    }

    #[test]
    fn http_storage_needs_all_three_settings() {
        let cfg = config(&[
            ("CAREHOME_STORAGE_URL", "https://store.example.com"),
            ("CAREHOME_STORAGE_BUCKET", "care"),
            ("CAREHOME_STORAGE_KEY", "k"),
        ])
        .unwrap();
        assert!(matches!(cfg.storage, StorageConfig::Http { .. }));
        assert!(matches!(
            config(&[("CAREHOME_STORAGE_URL", "https://store.example.com")]),
            Err(ConfigError::Incomplete(..))
        ));
    }

    #[test]
    fn rejects_bad_numbers_and_half_admin() {
        assert!(matches!(
            config(&[("CAREHOME_TOKEN_TTL_HOURS", "soon")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(config(&[("CAREHOME_TOKEN_TTL_HOURS", "0")]).is_err());
        assert!(config(&[("CAREHOME_ADMIN_EMAIL", "a@example.com")]).is_err());
        assert!(config(&[("CAREHOME_BIND_ADDR", "nowhere")]).is_err());
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
