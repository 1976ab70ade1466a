//! OAuth userinfo endpoint client.
//!
//! Exchanges a provider access token for the user's `{name, email}` by
//! calling the configured userinfo URL with a bearer token.

use std::time::Duration;

use parley_core::identity::provider::IdentityProvider;
use parley_types::error::SessionError;
use parley_types::identity::UserInfo;
use tracing::warn;

/// [`IdentityProvider`] backed by an HTTP userinfo endpoint.
pub struct HttpUserInfoProvider {
    client: reqwest::Client,
    userinfo_url: String,
}

impl HttpUserInfoProvider {
    const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(userinfo_url: String) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(Self::HTTP_TIMEOUT)
            .build()
            .map_err(|e| SessionError::Provider(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            userinfo_url,
        })
    }
}

impl IdentityProvider for HttpUserInfoProvider {
    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, SessionError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SessionError::Provider(format!("userinfo request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "identity provider rejected access token");
            return Err(SessionError::Provider(format!(
                "identity provider returned HTTP {status}"
            )));
        }

        response
            .json::<UserInfo>()
            .await
            .map_err(|e| SessionError::InvalidUserInfo(format!("malformed userinfo: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_server::serve_canned;

    #[tokio::test]
    async fn test_fetch_user_info() {
        let (base, sent) = serve_canned(
            200,
            r#"{"id":"1","email":"ada@example.com","name":"Ada Lovelace","picture":"p"}"#,
            Some("good-token"),
        )
        .await;
        let provider = HttpUserInfoProvider::new(format!("{base}/userinfo")).unwrap();
        let info = provider.fetch_user_info("good-token").await.unwrap();
        assert_eq!(sent.await.unwrap().path, "/userinfo");
        assert_eq!(info.email.as_deref(), Some("ada@example.com"));
        assert_eq!(info.name.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let (base, _sent) = serve_canned(200, r#"{"email":"x@y.z"}"#, Some("good-token")).await;
        let provider = HttpUserInfoProvider::new(format!("{base}/userinfo")).unwrap();
        let err = provider.fetch_user_info("bad-token").await.unwrap_err();
        assert!(matches!(err, SessionError::Provider(_)));
    }

    #[tokio::test]
    async fn test_malformed_user_info() {
        let (base, _sent) = serve_canned(200, "not json", None).await;
        let provider = HttpUserInfoProvider::new(format!("{base}/userinfo")).unwrap();
        let err = provider.fetch_user_info("any").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidUserInfo(_)));
    }
}
