//! Login gate: decide from a raw URL path whether the login page should be
//! pre-filled with a prospect's slug credentials.

use serde::Serialize;

use crate::provisioning::lookup_slug;
use crate::slug::is_valid_slug;
use crate::store::{Store, StoreError};

/// First path segments owned by the application itself.
const RESERVED_SEGMENTS: &[&str] = &[
    "api",
    "auth",
    "login",
    "register",
    "view-as",
    "admin",
    "atlas",
    "dashboard",
    "health",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum LoginGate {
    /// Pre-fill the form and show a single "Access Your Dashboard" button.
    Auto {
        username: String,
        password: String,
        #[serde(rename = "contractorName")]
        contractor_name: String,
    },
    /// Regular login and registration tabs.
    Standard,
}

/// Extract a candidate tenant slug from a URL path such as `/acme-heating/`
/// or `acme-heating?ref=mail`.
pub fn slug_from_path(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segment = path.trim_matches('/').split('/').next()?.to_ascii_lowercase();

    if segment.is_empty() || RESERVED_SEGMENTS.contains(&segment.as_str()) {
        return None;
    }
    is_valid_slug(&segment).then_some(segment)
}

pub async fn resolve(store: &dyn Store, path: &str) -> Result<LoginGate, StoreError> {
    let Some(slug) = slug_from_path(path) else {
        return Ok(LoginGate::Standard);
    };

    match lookup_slug(store, &slug).await? {
        Some((lookup, _)) if lookup.is_prospect => Ok(LoginGate::Auto {
            username: lookup.slug.clone(),
            password: lookup.slug,
            contractor_name: lookup.name,
        }),
        _ => Ok(LoginGate::Standard),
    }
}
