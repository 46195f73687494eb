//! Unauthenticated tenant entry points hit by the login page.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};

use crate::gate::{self, LoginGate};
use crate::provisioning::{SlugLookup, lookup_slug};
use crate::slug::is_valid_slug;

use super::{ApiErr, AppState, dto::GateQuery};

// ---------- GET /contractor-by-slug/{slug} ----------

/// Public tenant lookup. Provisions the prospect demo login on first visit;
/// the response is the same whether or not that succeeded.
pub async fn contractor_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<SlugLookup>, ApiErr> {
    let slug = slug.to_ascii_lowercase();
    if !is_valid_slug(&slug) {
        return Err(ApiErr::not_found("Contractor not found"));
    }

    match lookup_slug(state.store.as_ref(), &slug).await? {
        Some((lookup, outcome)) => {
            tracing::debug!(slug = %lookup.slug, ?outcome, "slug lookup");
            Ok(Json(lookup))
        }
        None => Err(ApiErr::not_found("Contractor not found")),
    }
}

// ---------- GET /login-gate?path= ----------

pub async fn login_gate(
    State(state): State<AppState>,
    Query(q): Query<GateQuery>,
) -> Result<Json<LoginGate>, ApiErr> {
    let path = q.path.unwrap_or_default();
    let gate = gate::resolve(state.store.as_ref(), &path).await?;
    Ok(Json(gate))
}
