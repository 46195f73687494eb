use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePath;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::response::SetResponseHeaderLayer;

use crate::auth::{Auth, AuthError};
use crate::pipeline::PipelineError;
use crate::store::{Store, StoreError};

pub mod atlas_handlers;
pub mod auth_handlers;
pub mod contractor_handlers;
pub mod dto;
pub mod jwt;
pub mod public_handlers;
pub mod user_handlers;

// ---------- shared state ----------

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth: Arc<Auth>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, jwt_secret: String, jwt_expiry_hours: u64) -> Self {
        Self {
            auth: Arc::new(Auth::new(store.clone())),
            store,
            jwt_secret,
            jwt_expiry_hours,
        }
    }
}

// ---------- error type ----------

/// A JSON error response: `{"error": "..."}` with an HTTP status.
#[derive(Debug)]
pub struct ApiErr(StatusCode, String);

impl ApiErr {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self(status, msg.into())
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(StatusCode::CONFLICT, msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self(StatusCode::UNAUTHORIZED, msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self(StatusCode::FORBIDDEN, msg.into())
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self(StatusCode::UNPROCESSABLE_ENTITY, msg.into())
    }

    pub fn status(&self) -> StatusCode {
        self.0
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        if self.0.is_server_error() {
            tracing::error!(status = %self.0, error = %self.1, "request failed");
        }
        let body = serde_json::json!({ "error": self.1 });
        (self.0, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiErr {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiErr::not_found("Not found"),
            StoreError::Conflict(what) => ApiErr::conflict(format!("{what} already exists")),
            StoreError::Db(e) => ApiErr::internal(e),
        }
    }
}

impl From<PipelineError> for ApiErr {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::NotFound => ApiErr::not_found("Contractor not found"),
            PipelineError::IllegalTransition { .. } => ApiErr::unprocessable(e.to_string()),
            PipelineError::Store(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiErr {
    fn from(e: AuthError) -> Self {
        match e {
            // Do not reveal which part of the credentials was wrong.
            AuthError::NotFound | AuthError::InvalidPassword | AuthError::Inactive => {
                ApiErr::unauthorized("Invalid credentials")
            }
            AuthError::ContractorRequired | AuthError::UnknownContractor(_) => {
                ApiErr::unprocessable(e.to_string())
            }
            AuthError::Hash(msg) => ApiErr::internal(msg),
            AuthError::Store(e) => e.into(),
        }
    }
}

// ---------- router ----------

#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    pub cors_allowed_origins: Vec<String>,
    /// Built dashboard to serve for every non-API path.
    pub static_dir: Option<PathBuf>,
}

/// The served application. Path normalization wraps the whole router so it
/// runs before route matching.
pub type App = NormalizePath<Router>;

pub fn app_router(state: AppState, opts: &RouterOptions) -> App {
    let allowed_origins: Vec<HeaderValue> = opts
        .cors_allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if allowed_origins.is_empty() {
        CorsLayer::new() // no origins allowed = same-origin only
    } else {
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::POST, Method::PATCH])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    };

    let mut router = Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/api", api());

    // Tenant slugs are client-side routes, so unknown paths get index.html.
    if let Some(ref dir) = opts.static_dir {
        router = router.fallback_service(
            ServeDir::new(dir).not_found_service(ServeFile::new(dir.join("index.html"))),
        );
    }

    let router = router
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .with_state(state);

    NormalizePath::trim_trailing_slash(router)
}

fn api() -> Router<AppState> {
    Router::new()
        // auth
        .route("/login", post(auth_handlers::login))
        .route("/register", post(auth_handlers::register))
        .route("/user", get(auth_handlers::me))
        // public tenant entry points
        .route(
            "/contractor-by-slug/{slug}",
            get(public_handlers::contractor_by_slug),
        )
        .route("/login-gate", get(public_handlers::login_gate))
        // admin
        .route(
            "/admin/users",
            get(user_handlers::list_users).post(user_handlers::create_user),
        )
        .route(
            "/admin/preview/{slug}",
            get(contractor_handlers::preview_contractor),
        )
        // contractors
        .route(
            "/contractors",
            get(contractor_handlers::list_contractors)
                .post(contractor_handlers::create_contractor),
        )
        .route(
            "/contractors/{id}",
            get(contractor_handlers::get_contractor).patch(atlas_handlers::update_pipeline),
        )
        // atlas pipeline
        .route("/atlas/contractors", get(atlas_handlers::list_pipeline))
        .route(
            "/atlas/contractors/{id}/status",
            patch(atlas_handlers::update_pipeline),
        )
        .route(
            "/atlas/pipeline-summary",
            get(atlas_handlers::pipeline_summary),
        )
}
