use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

/// The owner account that always exists. Supplied by configuration only.
#[derive(Debug, Clone)]
pub struct SeedAccount {
    pub username: String,
    pub password: String,
    pub email: String,
    pub library_name: String,
}

/// Application configuration loaded from environment variables.
///
/// | Env Var                      | Default                 |
/// |------------------------------|-------------------------|
/// | `ROSTER_SHEET_URL`           | unset (import disabled) |
/// | `ROSTER_STORE_PATH`          | `roster.db`             |
/// | `ROSTER_OWNER_USERNAME`      | unset                   |
/// | `ROSTER_OWNER_PASSWORD`      | unset                   |
/// | `ROSTER_OWNER_EMAIL`         | empty                   |
/// | `ROSTER_LIBRARY_NAME`        | `Library`               |
/// | `ROSTER_HTTP_TIMEOUT_SECS`   | `30`                    |
/// | `ROSTER_EXPIRY_WARNING_DAYS` | `7`                     |
/// | `HOST`                       | `0.0.0.0`               |
/// | `PORT`                       | `3000`                  |
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Published CSV export of the roster sheet.
    pub sheet_url: Option<String>,
    pub store_path: PathBuf,
    seed: Option<SeedAccount>,
    pub http_timeout: Duration,
    /// Fee periods ending within this many days count as "expiring soon".
    pub expiry_warning_days: u32,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    /// Load from the process environment (after `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let sheet_url = var("ROSTER_SHEET_URL");
        let store_path = var("ROSTER_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("roster.db"));

        let seed = match (var("ROSTER_OWNER_USERNAME"), var("ROSTER_OWNER_PASSWORD")) {
            (Some(username), Some(password)) => Some(SeedAccount {
                username,
                password,
                email: var("ROSTER_OWNER_EMAIL").unwrap_or_default(),
                library_name: var("ROSTER_LIBRARY_NAME").unwrap_or_else(|| "Library".into()),
            }),
            (Some(_), None) => return Err(ConfigError::Missing("ROSTER_OWNER_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("ROSTER_OWNER_USERNAME")),
            (None, None) => None,
        };

        let http_timeout = Duration::from_secs(parse_or(
            "ROSTER_HTTP_TIMEOUT_SECS",
            var("ROSTER_HTTP_TIMEOUT_SECS"),
            30u64,
        )?);
        let expiry_warning_days = parse_or(
            "ROSTER_EXPIRY_WARNING_DAYS",
            var("ROSTER_EXPIRY_WARNING_DAYS"),
            7u32,
        )?;

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or("PORT", var("PORT"), 3000u16)?;

        Ok(AppConfig {
            sheet_url,
            store_path,
            seed,
            http_timeout,
            expiry_warning_days,
            host,
            port,
        })
    }

    pub fn seed_account(&self) -> Result<&SeedAccount, ConfigError> {
        self.seed
            .as_ref()
            .ok_or(ConfigError::Missing("ROSTER_OWNER_USERNAME"))
    }

    pub fn sheet_url(&self) -> Result<&str, ConfigError> {
        self.sheet_url
            .as_deref()
            .ok_or(ConfigError::Missing("ROSTER_SHEET_URL"))
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();

        assert_eq!(cfg.store_path, PathBuf::from("roster.db"));
        assert_eq!(cfg.http_timeout, Duration::from_secs(30));
        assert_eq!(cfg.expiry_warning_days, 7);
        assert_eq!(cfg.port, 3000);
        assert!(cfg.sheet_url().is_err());
        assert!(matches!(
            cfg.seed_account(),
            Err(ConfigError::Missing("ROSTER_OWNER_USERNAME"))
        ));
    }

    #[test]
    fn test_seed_account_from_env() {
        let cfg = config(&[
            ("ROSTER_OWNER_USERNAME", "OWNER"),
            ("ROSTER_OWNER_PASSWORD", "pw"),
            ("ROSTER_LIBRARY_NAME", "Cosmic Library"),
        ])
        .unwrap();

        let seed = cfg.seed_account().unwrap();
        assert_eq!(seed.username, "OWNER");
        assert_eq!(seed.library_name, "Cosmic Library");
        assert_eq!(seed.email, "");
    }

    #[test]
    fn test_half_seed_is_an_error() {
        let err = config(&[("ROSTER_OWNER_USERNAME", "OWNER")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("ROSTER_OWNER_PASSWORD")));
    }

    #[test]
    fn test_invalid_number() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.to_string(), "PORT has an invalid value 'eighty'");
    }

    #[test]
    fn test_blank_values_are_unset() {
        let cfg = config(&[("ROSTER_SHEET_URL", "  "), ("ROSTER_STORE_PATH", "")]).unwrap();

        assert_eq!(cfg.sheet_url, None);
        assert_eq!(cfg.store_path, PathBuf::from("roster.db"));
    }
}
