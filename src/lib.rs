pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod google_oauth;
pub mod logging;
pub mod service;
pub mod types;

pub use error::CompyleError;
pub use google_oauth::service::GoogleOauthService;
