use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TTL_MINUTES: i64 = 15;
pub const LOGIN_TTL_MINUTES: i64 = 30;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    iat: i64,
}

/// Issues and checks HS256 bearer tokens whose subject is the username.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// `ttl` defaults to [`DEFAULT_TTL_MINUTES`].
    pub fn issue_token(
        &self,
        subject: &str,
        ttl: Option<Duration>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let ttl = ttl.unwrap_or_else(|| Duration::minutes(DEFAULT_TTL_MINUTES));
        let claims = Claims {
            sub: subject.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// The token's subject, or `None` on any decode, signature or expiry failure.
    pub fn verify_token(&self, token: &str) -> Option<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) if !data.claims.sub.is_empty() => Some(data.claims.sub),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected bearer token");
                None
            }
        }
    }
}
