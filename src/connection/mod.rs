pub mod auth;
pub mod config;

pub use auth::{Credentials, KeyFile, TokenSource};
pub use config::StoreConfig;
