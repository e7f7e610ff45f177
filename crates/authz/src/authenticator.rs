use async_trait::async_trait;

use crate::{Credentials, Principal};

/// Resolves presented credentials to a principal.
///
/// Implemented by the accounts module, which owns users and tokens.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Look up the owner of an API token
    async fn authenticate_token(&self, key: &str) -> anyhow::Result<Option<Principal>>;

    /// Verify a username/password pair
    async fn authenticate_password(
        &self,
        username: &str,
        password: &str,
    ) -> anyhow::Result<Option<Principal>>;

    async fn authenticate(&self, credentials: &Credentials) -> anyhow::Result<Option<Principal>> {
        match credentials {
            Credentials::Token(key) => self.authenticate_token(key).await,
            Credentials::Basic { username, password } => {
                self.authenticate_password(username, password).await
            }
        }
    }
}
