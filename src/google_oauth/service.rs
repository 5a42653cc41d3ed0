use super::callback;
use super::credentials::YoutubeToken;
use super::endpoints::GoogleOauthEndpoints;
use crate::error::{CompyleError, IsRetryable};
use backon::{ExponentialBuilder, Retryable};
use chrono::Utc;
use oauth2::{AuthorizationCode, basic::BasicTokenResponse};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Obtains a usable YouTube token: cached, refreshed, or through consent.
pub struct GoogleOauthService {
    endpoints: GoogleOauthEndpoints,
    http_client: reqwest::Client,
    redirect_url: Url,
    token_path: PathBuf,
    login_hint: Option<String>,
}

impl GoogleOauthService {
    pub fn new(
        endpoints: GoogleOauthEndpoints,
        http_client: reqwest::Client,
        redirect_url: Url,
        token_path: PathBuf,
        login_hint: Option<String>,
    ) -> Self {
        Self {
            endpoints,
            http_client,
            redirect_url,
            token_path,
            login_hint,
        }
    }

    pub async fn access_token(&self) -> Result<YoutubeToken, CompyleError> {
        if let Some(cached) = YoutubeToken::load(&self.token_path)? {
            if cached.is_fresh(Utc::now()) {
                info!("Using cached YouTube token");
                return Ok(cached);
            }
            if let Some(refresh_token) = cached.refresh_token.clone() {
                match self.refresh_with_retry(&refresh_token).await {
                    Ok(response) => {
                        let token = YoutubeToken::from_response(&response, Some(refresh_token));
                        token.save(&self.token_path)?;
                        return Ok(token);
                    }
                    Err(e) => warn!(error = %e, "YouTube token refresh failed, asking for consent"),
                }
            }
        }

        let token = self.authenticate().await?;
        token.save(&self.token_path)?;
        Ok(token)
    }

    /// Run the consent flow through the local redirect listener.
    pub async fn authenticate(&self) -> Result<YoutubeToken, CompyleError> {
        let request = self.endpoints.authorize_url(self.login_hint.as_deref());
        println!("Please visit this URL to authorize compyle:\n{}", request.url);

        let code =
            callback::wait_for_code(&self.redirect_url, request.csrf.secret().to_string()).await?;
        let response = self
            .endpoints
            .exchange_authorization_code(
                AuthorizationCode::new(code),
                request.pkce_verifier,
                &self.http_client,
            )
            .await?;

        let token = YoutubeToken::from_response(&response, None);
        if token.refresh_token.is_none() {
            warn!(
                "OAuth response missing refresh_token; the consent flow will run again once the token expires"
            );
        }
        Ok(token)
    }

    async fn refresh_with_retry(
        &self,
        refresh_token: &str,
    ) -> Result<BasicTokenResponse, CompyleError> {
        (|| async {
            self.endpoints
                .refresh_access_token(refresh_token, &self.http_client)
                .await
        })
        .retry(default_retry_policy())
        .when(|e: &CompyleError| e.is_retryable())
        .notify(|err, dur: Duration| {
            error!(
                "Google Oauth2 Retrying Error {} with sleeping {:?}",
                err.to_string(),
                dur
            );
        })
        .await
    }
}
