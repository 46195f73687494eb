use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};

use crate::auth::UserParams;

use super::{
    ApiErr, AppState,
    dto::{CreateUserRequest, PageQuery, PaginatedResponse, UserResponse, page_params},
    jwt::AdminClaims,
};

pub async fn list_users(
    AdminClaims(_): AdminClaims,
    State(state): State<AppState>,
    Query(params): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ApiErr> {
    let (page, limit) = page_params(params.page, params.limit);
    let result = state.store.list_users(page, limit).await?;

    Ok(Json(PaginatedResponse::new(
        result.items.into_iter().map(UserResponse::from).collect(),
        result.total,
        page,
        limit,
    )))
}

pub async fn create_user(
    AdminClaims(claims): AdminClaims,
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiErr> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ApiErr::unprocessable("Username and password are required"));
    }

    let user = state
        .auth
        .create_user(UserParams {
            username: body.username.trim().to_string(),
            password: body.password,
            role: body.role,
            contractor_id: body.contractor_id,
            email: body.email,
        })
        .await?;

    tracing::info!(
        admin_id = claims.sub,
        user_id = user.id,
        role = ?user.role,
        "user created"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}
