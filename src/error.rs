use axum::{Json, http::StatusCode as AxumStatus, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use reqwest::StatusCode;
use serde::Serialize;
use sqlx::Error as SqlxError;
use std::path::PathBuf;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CompyleError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    ConfigValidation(String),

    #[error("missing configuration value `{0}`")]
    MissingConfig(&'static str),

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("Missing access token; authenticate first")]
    MissingAccessToken,

    #[error("OAuth flow error: {0}")]
    OauthFlow(String),

    #[error("The route `{0}` is not registered")]
    UnknownRoute(String),

    #[error("The specified namespace is malformed")]
    MalformedNamespace,

    #[error("Required and optional parameters must be disjoint: {0:?}")]
    OverlappingParams(Vec<String>),

    #[error("Missing required non-null parameters in {0:?}")]
    MissingParams(Vec<String>),

    #[error("Upstream error with status {status} on `{endpoint}`: {body}")]
    UpstreamStatus {
        status: StatusCode,
        endpoint: String,
        body: String,
    },

    #[error("Unexpected upstream response: {0}")]
    UnexpectedResponse(String),

    #[error("No game found on Twitch named `{0}`")]
    GameNotFound(String),

    #[error("No clip available to edit")]
    EmptySelection,

    #[error("No file found in {}", .0.display())]
    NothingToLoad(PathBuf),

    #[error("ffmpeg failed ({status}): {stderr}")]
    Ffmpeg { status: String, stderr: String },
}

pub type Result<T, E = CompyleError> = std::result::Result<T, E>;

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for CompyleError {
    fn is_retryable(&self) -> bool {
        match self {
            CompyleError::Reqwest(e) => e.is_timeout() || e.is_connect(),
            CompyleError::UpstreamStatus { status, .. } => {
                matches!(status.as_u16(), 500 | 502 | 503 | 504)
            }
            CompyleError::Oauth2Token(_) => true,
            _ => false,
        }
    }
}

/// Only the OAuth callback listener answers HTTP, so the mapping stays small.
impl IntoResponse for CompyleError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            CompyleError::OauthFlow(_) => (AxumStatus::BAD_REQUEST, "OAUTH_FLOW"),
            CompyleError::Oauth2Token(_)
            | CompyleError::Oauth2Server { .. }
            | CompyleError::MissingAccessToken => {
                (AxumStatus::UNAUTHORIZED, "UNAUTHORIZED")
            }
            _ => (AxumStatus::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let body = ApiErrorResponse {
            error: ApiErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

impl From<figment::Error> for CompyleError {
    fn from(e: figment::Error) -> Self {
        CompyleError::ConfigLoad(Box::new(e))
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for CompyleError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => CompyleError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                CompyleError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => {
                CompyleError::Json(parse_err.into_inner())
            }
            RequestTokenError::Other(s) => CompyleError::Oauth2Token(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let err = CompyleError::UpstreamStatus {
            status: StatusCode::BAD_GATEWAY,
            endpoint: "clips".to_string(),
            body: String::new(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let err = CompyleError::UpstreamStatus {
            status: StatusCode::UNAUTHORIZED,
            endpoint: "clips".to_string(),
            body: String::new(),
        };
        assert!(!err.is_retryable());
        assert!(!CompyleError::EmptySelection.is_retryable());

        let not_implemented = CompyleError::UpstreamStatus {
            status: StatusCode::NOT_IMPLEMENTED,
            endpoint: "upload".to_string(),
            body: String::new(),
        };
        assert!(!not_implemented.is_retryable());
    }

    #[test]
    fn oauth_flow_errors_answer_bad_request() {
        let response = CompyleError::OauthFlow("CSRF token mismatch".to_string()).into_response();
        assert_eq!(response.status(), AxumStatus::BAD_REQUEST);
    }

    #[test]
    fn oauth_server_errors_are_permanent() {
        let err = CompyleError::Oauth2Server {
            error: "invalid_grant".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "OAuth2 server error: invalid_grant");
    }
}
