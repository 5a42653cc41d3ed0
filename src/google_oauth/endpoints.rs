use crate::error::CompyleError;

use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenUrl,
    basic::{BasicClient, BasicTokenResponse},
};
use tracing::info;
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com";
pub const YOUTUBE_UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

pub type GoogleOauth2Client =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Google OAuth endpoints for an installed application.
pub struct GoogleOauthEndpoints {
    client: GoogleOauth2Client,
}

/// Consent URL with the secrets needed to finish the flow.
pub struct AuthorizeRequest {
    pub url: Url,
    pub csrf: CsrfToken,
    pub pkce_verifier: PkceCodeVerifier,
}

impl GoogleOauthEndpoints {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        auth_url: Url,
        token_url: Url,
        redirect_url: Url,
    ) -> Self {
        let client = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_client_secret(ClientSecret::new(client_secret.to_string()))
            .set_auth_uri(AuthUrl::from_url(auth_url))
            .set_token_uri(TokenUrl::from_url(token_url))
            .set_redirect_uri(RedirectUrl::from_url(redirect_url));
        Self { client }
    }

    /// Build the consent URL requesting offline upload access.
    pub fn authorize_url(&self, login_hint: Option<&str>) -> AuthorizeRequest {
        let (challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(YOUTUBE_UPLOAD_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("include_granted_scopes", "true")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(challenge);
        if let Some(hint) = login_hint.filter(|h| !h.is_empty()) {
            request = request.add_extra_param("login_hint", hint.to_string());
        }
        let (url, csrf) = request.url();
        AuthorizeRequest {
            url,
            csrf,
            pkce_verifier,
        }
    }

    pub async fn exchange_authorization_code(
        &self,
        code: AuthorizationCode,
        pkce_verifier: PkceCodeVerifier,
        http_client: &reqwest::Client,
    ) -> Result<BasicTokenResponse, CompyleError> {
        let token = self
            .client
            .exchange_code(code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(http_client)
            .await?;
        info!("Google authorization code exchanged");
        Ok(token)
    }

    /// Refresh the access token using the stored refresh token.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        http_client: &reqwest::Client,
    ) -> Result<BasicTokenResponse, CompyleError> {
        let token = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(http_client)
            .await?;
        info!("Google access token refreshed");
        Ok(token)
    }
}
