use crate::config::{Config, ConfigError};
use crate::db::DB;
use crate::utils::token::TokenCodec;
use std::sync::Arc;

/// Shared by every handler. Built once in `main`, cloned per request (all `Arc`s),
/// never mutated.
#[derive(Clone)]
pub struct AppState {
    pub db: DB,
    pub tokens: Arc<TokenCodec>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Fails only if the signing key is unusable.
    pub fn new(config: Config, db: DB) -> Result<Self, ConfigError> {
        let tokens = TokenCodec::new(&config.jwt_secret)?;
        Ok(Self {
            db,
            tokens: Arc::new(tokens),
            config: Arc::new(config),
        })
    }
}
