pub mod auth;
pub mod pagination;
pub mod token;
pub mod validation;
