use std::env;
use thiserror::Error;

/// Things that can go wrong while reading the environment at startup.
///
/// None of these are recoverable. `main` bails out and the process never binds a port.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a non-empty value")]
    MissingSigningKey,

    #[error("{name} has an invalid value: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Process-wide configuration.
///
/// Loaded exactly once in `main` and then shared read-only through `AppState`.
/// Nothing in the request path ever touches the environment again.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// `None` means "run against the in-memory store". Handy for local hacking.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Production deployments get `Secure` + `SameSite=None` cookies.
    pub production: bool,
    /// Allowed CORS origins. Empty means "any origin, no credentials".
    pub cors_origins: Vec<String>,
    pub sentry_dsn: Option<String>,
}

impl Config {
    /// Reads the config from the real process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    ///
    /// Split out from `from_env` so tests don't have to mutate the global environment
    /// (which is `unsafe` on edition 2024 anyway).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset. A `.env` with `DATABASE_URL=` shouldn't try to
        // connect to an empty string.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::MissingSigningKey)?;

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: raw,
            })?,
            None => 3000,
        };

        let production = get("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let cors_origins = get("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            jwt_secret,
            production,
            cors_origins,
            sentry_dsn: get("SENTRY_DSN"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_secret_is_a_configuration_error() {
        let err = Config::from_lookup(lookup(&[("PORT", "8080")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingSigningKey);
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "   ")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingSigningKey);
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert!(!config.production);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn parses_all_fields() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/threads"),
            ("APP_ENV", "Production"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/threads"));
        assert!(config.production);
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn rejects_garbage_port() {
        let err =
            Config::from_lookup(lookup(&[("JWT_SECRET", "s3cret"), ("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "PORT", .. }));
    }
}
