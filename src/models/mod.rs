pub mod comment;
pub mod thread;
pub mod user;
