use axum::{RequestPartsExt, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, Result},
    models::Identity,
};

/// Token payload minted by the identity provider. The board only reads it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Signs a token for `identity`. Used by tests and local tooling; the
    /// board itself never issues tokens.
    pub fn issue(identity: &Identity, jwt_secret: &str, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Self {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            username: identity.username.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(jwt_secret.as_ref()),
        )?)
    }

    pub fn verify(token: &str, jwt_secret: &str) -> Result<Self> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(jwt_secret.as_ref()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    pub fn identity(self) -> Result<Identity> {
        let id = Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))?;

        if self.username.trim().is_empty() {
            return Err(AppError::Unauthorized("Token has no username".to_string()));
        }

        Ok(Identity {
            id,
            email: self.email,
            username: self.username,
        })
    }
}

/// The authenticated caller of a mutating or per-user request.
#[derive(Debug)]
pub struct AuthUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Unauthorized("Missing authorization header".to_string()))?;

        let identity = Claims::verify(bearer.token(), &state.config.jwt_secret)?.identity()?;
        Ok(AuthUser(identity))
    }
}
