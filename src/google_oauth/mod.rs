pub mod callback;
pub mod credentials;
pub mod endpoints;
pub mod service;

pub use credentials::YoutubeToken;
pub use endpoints::GoogleOauthEndpoints;
pub use service::GoogleOauthService;
