use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::entity::app_user::UserRole;
use crate::entity::contractor::PipelineStatus;
use crate::slug::{is_valid_slug, slugify};
use crate::store::{ContractorQuery, NewContractor, SortDir, SortField};

use super::{
    ApiErr, AppState,
    dto::{
        ContractorResponse, CreateContractorRequest, PageQuery, PaginatedResponse,
        PreviewResponse, page_params,
    },
    jwt::{AdminClaims, AuthClaims},
};

// ---------- GET /contractors ----------

pub async fn list_contractors(
    AdminClaims(_): AdminClaims,
    State(state): State<AppState>,
    Query(params): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<ContractorResponse>>, ApiErr> {
    let (page, limit) = page_params(params.page, params.limit);
    let result = state
        .store
        .list_contractors(&ContractorQuery {
            sort_by: SortField::Name,
            sort_dir: SortDir::Asc,
            page,
            limit,
            ..Default::default()
        })
        .await?;

    Ok(Json(PaginatedResponse::new(
        result.items.into_iter().map(ContractorResponse::from).collect(),
        result.total,
        page,
        limit,
    )))
}

// ---------- POST /contractors ----------

pub async fn create_contractor(
    AdminClaims(claims): AdminClaims,
    State(state): State<AppState>,
    Json(body): Json<CreateContractorRequest>,
) -> Result<(StatusCode, Json<ContractorResponse>), ApiErr> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiErr::unprocessable("Name is required"));
    }

    let slug = match body.slug {
        Some(slug) if !is_valid_slug(&slug) => {
            return Err(ApiErr::unprocessable(format!("Invalid slug '{slug}'")));
        }
        Some(slug) => slug,
        None => {
            let derived = slugify(&name);
            if derived.is_empty() {
                return Err(ApiErr::unprocessable(
                    "Cannot derive a slug from this name; supply one",
                ));
            }
            derived
        }
    };

    let status = match body.status {
        Some(s) => s
            .parse::<PipelineStatus>()
            .map_err(|e| ApiErr::unprocessable(e.to_string()))?,
        None => PipelineStatus::Prospect,
    };

    let model = state
        .store
        .insert_contractor(NewContractor {
            name,
            slug,
            email: body.email,
            phone: body.phone,
            website: body.website,
            address: body.address,
            city: body.city,
            state: body.state,
            rating: body.rating,
            review_count: body.review_count,
            place_id: body.place_id,
            status,
            notes: body.notes,
        })
        .await?;

    tracing::info!(
        admin_id = claims.sub,
        contractor_id = model.id,
        slug = %model.slug,
        "contractor created"
    );

    Ok((StatusCode::CREATED, Json(ContractorResponse::from(model))))
}

// ---------- GET /contractors/{id} ----------

/// Admins see any contractor; a contractor-role user only its own tenant.
pub async fn get_contractor(
    AuthClaims(claims): AuthClaims,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ContractorResponse>, ApiErr> {
    let allowed = match claims.role {
        UserRole::Admin => true,
        UserRole::Contractor => claims.contractor_id == Some(id),
        UserRole::Employee => false,
    };
    if !allowed {
        return Err(ApiErr::forbidden("Access denied"));
    }

    let model = state
        .store
        .find_contractor(id)
        .await?
        .ok_or_else(|| ApiErr::not_found("Contractor not found"))?;

    Ok(Json(ContractorResponse::from(model)))
}

// ---------- GET /admin/preview/{slug} ----------

/// Read-only dashboard preview of a tenant for admins. Unlike the public slug
/// lookup this never provisions a login.
pub async fn preview_contractor(
    AdminClaims(claims): AdminClaims,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PreviewResponse>, ApiErr> {
    let slug = slug.to_ascii_lowercase();
    let model = state
        .store
        .find_contractor_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiErr::not_found("Contractor not found"))?;

    tracing::debug!(admin_id = claims.sub, slug = %model.slug, "preview mode");

    Ok(Json(PreviewResponse {
        preview_mode: true,
        contractor: ContractorResponse::from(model),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::jwt, store::MemStore};
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request},
        routing::{get, post},
    };
    use chrono::Utc;
    use std::sync::Arc;
    use tower::ServiceExt;

    const JWT_SECRET: &str = "test-jwt-secret-key-32-chars-pad";

    fn make_state() -> AppState {
        AppState::new(Arc::new(MemStore::new()), JWT_SECRET.to_string(), 1)
    }

    fn token(role: UserRole, contractor_id: Option<i32>) -> String {
        let claims = jwt::Claims {
            sub: 1,
            username: "someone".to_string(),
            role,
            contractor_id,
            exp: (Utc::now().timestamp() as u64) + 3600,
        };
        jwt::encode_jwt(&claims, JWT_SECRET).unwrap()
    }

    fn make_router(state: AppState) -> Router {
        Router::new()
            .route("/contractors", post(create_contractor).get(list_contractors))
            .route("/contractors/{id}", get(get_contractor))
            .route("/admin/preview/{slug}", get(preview_contractor))
            .with_state(state)
    }

    fn get_as(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn create_as(token: &str, value: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/contractors")
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&value).unwrap()))
            .unwrap()
    }

    async fn body_json(res: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_derives_slug_and_defaults_to_prospect() {
        let res = make_router(make_state())
            .oneshot(create_as(
                &token(UserRole::Admin, None),
                serde_json::json!({"name": "Bob's Heating & Air", "city": "Tulsa"}),
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::CREATED);
        let body = body_json(res).await;
        assert_eq!(body["slug"], "bobs-heating-and-air");
        assert_eq!(body["status"], "prospect");
        assert_eq!(body["city"], "Tulsa");
        assert!(body["lastContactedDate"].is_null());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_slug_and_status() {
        let app = make_router(make_state());
        let admin = token(UserRole::Admin, None);

        let res = app
            .clone()
            .oneshot(create_as(
                &admin,
                serde_json::json!({"name": "Acme", "slug": "Acme Inc"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let res = app
            .oneshot(create_as(
                &admin,
                serde_json::json!({"name": "Acme", "status": "won"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_create_duplicate_slug_conflict() {
        let app = make_router(make_state());
        let admin = token(UserRole::Admin, None);

        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let res = app
                .clone()
                .oneshot(create_as(&admin, serde_json::json!({"name": "Acme"})))
                .await
                .unwrap();
            assert_eq!(res.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_contractor_user_sees_only_own_tenant() {
        let state = make_state();
        let own = state
            .store
            .insert_contractor(NewContractor::prospect("Own", "own"))
            .await
            .unwrap();
        let other = state
            .store
            .insert_contractor(NewContractor::prospect("Other", "other"))
            .await
            .unwrap();
        let app = make_router(state);
        let t = token(UserRole::Contractor, Some(own.id));

        let res = app
            .clone()
            .oneshot(get_as(&format!("/contractors/{}", own.id), &t))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app
            .clone()
            .oneshot(get_as(&format!("/contractors/{}", other.id), &t))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = app
            .oneshot(get_as(
                &format!("/contractors/{}", other.id),
                &token(UserRole::Employee, None),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_preview_requires_admin_and_does_not_provision() {
        let state = make_state();
        state
            .store
            .insert_contractor(NewContractor::prospect("Acme", "acme"))
            .await
            .unwrap();
        let app = make_router(state.clone());

        let res = app
            .clone()
            .oneshot(get_as("/admin/preview/acme", &token(UserRole::Contractor, Some(1))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = app
            .oneshot(get_as("/admin/preview/acme", &token(UserRole::Admin, None)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["previewMode"], true);
        assert_eq!(body["contractor"]["slug"], "acme");

        assert_eq!(state.store.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_preview_slug_is_case_insensitive() {
        let state = make_state();
        state
            .store
            .insert_contractor(NewContractor::prospect("Acme", "acme"))
            .await
            .unwrap();
        let app = make_router(state);

        let res = app
            .oneshot(get_as("/admin/preview/ACME", &token(UserRole::Admin, None)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["contractor"]["slug"], "acme");
    }

    #[tokio::test]
    async fn test_list_sorted_by_name() {
        let state = make_state();
        for (name, slug) in [("Zephyr", "zephyr"), ("Arctic", "arctic")] {
            state
                .store
                .insert_contractor(NewContractor::prospect(name, slug))
                .await
                .unwrap();
        }

        let res = make_router(state)
            .oneshot(get_as("/contractors", &token(UserRole::Admin, None)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["data"][0]["slug"], "arctic");
    }
}
