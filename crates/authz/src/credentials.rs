//! Parsing of the `Authorization` request header.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Credentials presented by a caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Basic { username: String, password: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsError {
    #[error("Invalid token header. No credentials provided.")]
    Missing,
    #[error("Invalid token header. Token string should not contain spaces.")]
    Spaces,
    #[error("Invalid basic header. Credentials not correctly base64 encoded.")]
    BadEncoding,
}

impl Credentials {
    /// Parse an `Authorization` header value.
    ///
    /// `keyword` is the scheme used for token auth (usually `Token`). Unknown
    /// schemes yield `Ok(None)` so the request proceeds anonymously.
    pub fn parse(
        header: &str,
        keyword: &str,
        allow_basic: bool,
    ) -> Result<Option<Self>, CredentialsError> {
        let mut parts = header.split_whitespace();
        let Some(scheme) = parts.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = parts.collect();

        if scheme.eq_ignore_ascii_case(keyword) {
            return match rest.as_slice() {
                [] => Err(CredentialsError::Missing),
                [token] => Ok(Some(Credentials::Token((*token).to_string()))),
                _ => Err(CredentialsError::Spaces),
            };
        }

        if allow_basic && scheme.eq_ignore_ascii_case("basic") {
            let [encoded] = rest.as_slice() else {
                return Err(CredentialsError::Missing);
            };
            let decoded = STANDARD
                .decode(encoded)
                .map_err(|_| CredentialsError::BadEncoding)?;
            let decoded = String::from_utf8(decoded).map_err(|_| CredentialsError::BadEncoding)?;
            let (username, password) = decoded
                .split_once(':')
                .ok_or(CredentialsError::BadEncoding)?;
            return Ok(Some(Credentials::Basic {
                username: username.to_string(),
                password: password.to_string(),
            }));
        }

        Ok(None)
    }
}
