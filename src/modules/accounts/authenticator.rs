use async_trait::async_trait;
use folio_authz::{Authenticator, Principal};
use folio_db::Database;

use super::{password, repo};

/// Resolves API tokens and username/password pairs against the accounts tables
#[derive(Clone)]
pub struct TokenAuthenticator {
    db: Database,
}

impl TokenAuthenticator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate_token(&self, key: &str) -> anyhow::Result<Option<Principal>> {
        Ok(repo::principal_for_token(self.db.pool(), key).await?)
    }

    async fn authenticate_password(
        &self,
        username: &str,
        password: &str,
    ) -> anyhow::Result<Option<Principal>> {
        let Some((user_id, hash)) = repo::password_hash(self.db.pool(), username).await? else {
            return Ok(None);
        };

        if !password::verify_password_blocking(password.to_string(), hash).await? {
            tracing::debug!(%username, "password mismatch");
            return Ok(None);
        }

        let user = repo::get_user(self.db.pool(), user_id).await?;
        Ok(Some(user.principal()))
    }
}
