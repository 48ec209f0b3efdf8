use anyhow::Context;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use hostel_types::api::Claims;
use hostel_types::models::{Principal, Role};

use crate::error::ApiError;

pub const INVALID_TOKEN: &str = "Invalid or expired token";

/// HS256 session tokens.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
        category_id: Option<Uuid>,
    ) -> anyhow::Result<String> {
        let exp = chrono::Utc::now()
            .checked_add_signed(self.ttl)
            .context("token lifetime overflows the calendar")?;
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            category_id: if role == Role::Department { category_id } else { None },
            exp: exp.timestamp() as usize,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    /// Any failure (bad signature, expiry, garbage) gives the same error.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| ApiError::auth(INVALID_TOKEN))
    }

    pub fn principal(&self, token: &str) -> Result<Principal, ApiError> {
        let claims = self.verify(token)?;
        Ok(Principal::new(claims.sub, claims.role, claims.category_id))
    }
}
