use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::{AuthError, Authenticator, Identity};

/// JWT claims carried by access tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: u64,
    pub email: String,
    pub permissions: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed token and the moment it stops being accepted.
#[derive(Clone, Debug, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies HS256 access tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Signs a token for `identity`, valid from now for the configured TTL.
    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken, AuthError> {
        self.issue_at(identity, Utc::now())
    }

    fn issue_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let claims = Claims {
            sub: identity.user_id,
            email: identity.email.clone(),
            permissions: identity.permissions().map(str::to_owned).collect(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::Signing)?;
        Ok(IssuedToken { token, token_type: "Bearer", expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e),
            })
    }
}

#[async_trait]
impl Authenticator for TokenService {
    async fn authenticate(&self, credentials: &str) -> Result<Identity, AuthError> {
        let claims = self.verify(credentials)?;
        Ok(Identity::new(claims.sub, claims.email, claims.permissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SELECT_USER;
    use pretty_assertions::assert_eq;

    fn service() -> TokenService {
        TokenService::new(b"0123456789abcdef0123456789abcdef", Duration::from_secs(60))
    }

    #[tokio::test]
    async fn issued_tokens_authenticate() {
        let tokens = service();
        let identity = Identity::new(7, "reader@example.com", [SELECT_USER]);
        let issued = tokens.issue(&identity).unwrap();

        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(tokens.authenticate(&issued.token).await.unwrap(), identity);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let tokens = service();
        let identity = Identity::new(7, "reader@example.com", Vec::<String>::new());
        let long_ago = Utc::now() - chrono::Duration::hours(2);
        let issued = tokens.issue_at(&identity, long_ago).unwrap();

        assert!(matches!(tokens.verify(&issued.token), Err(AuthError::Expired)));
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let other = TokenService::new(b"another-secret-another-secret!!", Duration::from_secs(60));
        let issued = other.issue(&Identity::new(1, "x@y.z", Vec::<String>::new())).unwrap();

        assert!(matches!(service().verify(&issued.token), Err(AuthError::InvalidToken(_))));
        assert!(matches!(service().verify("not-a-jwt"), Err(AuthError::InvalidToken(_))));
    }
}
