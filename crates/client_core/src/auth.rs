use anyhow::Result;
use async_trait::async_trait;

/// Supplies the bearer token attached to every admin API request.
///
/// Token acquisition is delegated to an external identity provider. The
/// client asks for a token on each request so short-lived tokens are renewed
/// transparently by the provider.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Fixed token, for tests and non-interactive tooling.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
