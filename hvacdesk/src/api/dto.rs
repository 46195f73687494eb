use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::app_user::{self, UserRole};
use crate::entity::contractor::{self, PipelineStatus};
use crate::pipeline::PipelineSummary;

pub const DEFAULT_PAGE_SIZE: u64 = 25;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Normalize 1-based `page` and `limit` query parameters.
pub fn page_params(page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

// ---------- auth requests ----------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

// ---------- user requests ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: UserRole,
    pub contractor_id: Option<i32>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

// ---------- user responses ----------

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub role: UserRole,
    pub is_active: bool,
    pub contractor_id: Option<i32>,
    pub email: Option<String>,
    pub last_login_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<app_user::Model> for UserResponse {
    fn from(m: app_user::Model) -> Self {
        Self {
            id: m.id,
            username: m.username,
            role: m.role,
            is_active: m.is_active,
            contractor_id: m.contractor_id,
            email: m.email,
            last_login_at: m.last_login_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        Self {
            data,
            total,
            page,
            limit,
            pages: total.div_ceil(limit.max(1)),
        }
    }
}

// ---------- contractor requests ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContractorRequest {
    pub name: String,
    /// Derived from `name` when absent.
    pub slug: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    pub place_id: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// Body of the pipeline PATCH endpoints. Status stays a string here so an
/// unknown value yields a readable 422 instead of a generic JSON error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineUpdateRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
    pub last_contacted_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GateQuery {
    pub path: Option<String>,
}

// ---------- contractor responses ----------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractorResponse {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    pub place_id: Option<String>,
    pub status: PipelineStatus,
    pub notes: Option<String>,
    pub last_contacted_date: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<contractor::Model> for ContractorResponse {
    fn from(m: contractor::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            slug: m.slug,
            email: m.email,
            phone: m.phone,
            website: m.website,
            address: m.address,
            city: m.city,
            state: m.state,
            rating: m.rating,
            review_count: m.review_count,
            place_id: m.place_id,
            status: m.status,
            notes: m.notes,
            last_contacted_date: m.last_contacted_date,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub preview_mode: bool,
    pub contractor: ContractorResponse,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PipelineSummaryResponse {
    pub prospect: u64,
    pub contacted: u64,
    pub qualified: u64,
    pub demo: u64,
    pub client: u64,
    pub total: u64,
}

impl From<PipelineSummary> for PipelineSummaryResponse {
    fn from(s: PipelineSummary) -> Self {
        Self {
            prospect: s.count(PipelineStatus::Prospect),
            contacted: s.count(PipelineStatus::Contacted),
            qualified: s.count(PipelineStatus::Qualified),
            demo: s.count(PipelineStatus::Demo),
            client: s.count(PipelineStatus::Client),
            total: s.total,
        }
    }
}
