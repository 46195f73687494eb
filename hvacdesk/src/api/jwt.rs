use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::entity::app_user::{self, UserRole};

use super::{ApiErr, AppState};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User id
    pub sub: i32,
    pub username: String,
    pub role: UserRole,
    /// Tenant the user belongs to, for contractor-role users.
    pub contractor_id: Option<i32>,
    /// Unix timestamp expiry
    pub exp: u64,
}

impl Claims {
    pub fn for_user(user: &app_user::Model, expiry_hours: u64) -> Self {
        Self {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            contractor_id: user.contractor_id,
            exp: (Utc::now().timestamp() as u64) + expiry_hours * 3600,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

pub fn encode_jwt(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

fn extract_bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn claims_from_parts(parts: &Parts, state: &AppState) -> Result<Claims, ApiErr> {
    let token = extract_bearer(parts).ok_or_else(|| {
        ApiErr::new(
            StatusCode::UNAUTHORIZED,
            "Missing or invalid Authorization header",
        )
    })?;

    decode_jwt(token, &state.jwt_secret)
        .map_err(|_| ApiErr::new(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
}

/// Extractor: validates Bearer token, requires the admin role.
pub struct AdminClaims(pub Claims);

impl<S> FromRequestParts<S> for AdminClaims
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let claims = claims_from_parts(parts, &state)?;

        if !claims.is_admin() {
            return Err(ApiErr::forbidden("Admin access required"));
        }

        Ok(AdminClaims(claims))
    }
}

/// Extractor: validates Bearer token (any authenticated user).
pub struct AuthClaims(pub Claims);

impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(AuthClaims(claims_from_parts(parts, &state)?))
    }
}
