use axum::{extract::State, http::StatusCode, response::Json};

use crate::auth::AuthError;
use crate::entity::app_user;
use crate::store::StoreError;

use super::{
    ApiErr, AppState,
    dto::{LoginRequest, LoginResponse, RegisterRequest, UserResponse},
    jwt::{AuthClaims, Claims, encode_jwt},
};

fn issue_token(state: &AppState, user: &app_user::Model) -> Result<String, ApiErr> {
    let claims = Claims::for_user(user, state.jwt_expiry_hours);
    encode_jwt(&claims, &state.jwt_secret).map_err(ApiErr::internal)
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiErr> {
    let user = state
        .auth
        .authenticate(&body.username, &body.password)
        .await?;

    let token = issue_token(&state, &user)?;
    tracing::info!(user_id = user.id, role = ?user.role, "login");

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// One-time bootstrap: the first account registered becomes the admin.
/// Once any user exists, accounts are created by an admin instead.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiErr> {
    if state.auth.count_users().await? > 0 {
        return Err(ApiErr::forbidden("Registration is closed"));
    }

    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ApiErr::unprocessable("Username and password are required"));
    }

    let user = state
        .auth
        .create_first_admin(body.username.trim().to_string(), &body.password, body.email)
        .await
        .map_err(|e| match e {
            // Another registrant won the race for the empty table.
            AuthError::Store(StoreError::Conflict(_)) => {
                ApiErr::forbidden("Registration is closed")
            }
            e => e.into(),
        })?;

    tracing::warn!(user_id = user.id, username = %user.username, "bootstrap admin registered");

    let token = issue_token(&state, &user)?;
    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            token,
            user: UserResponse::from(user),
        }),
    ))
}

pub async fn me(
    AuthClaims(claims): AuthClaims,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiErr> {
    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| ApiErr::not_found("User not found"))?;

    Ok(Json(UserResponse::from(user)))
}
