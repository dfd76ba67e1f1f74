pub mod auth;
pub mod ownership;
pub mod rate_limit;
pub mod validated;
