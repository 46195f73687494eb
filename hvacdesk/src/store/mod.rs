//! Storage interface for contractors and users.
//!
//! [`SeaOrmStore`] is the production backend (SQLite or Postgres through
//! SeaORM). [`MemStore`] keeps everything in process-local maps and is only
//! suitable for tests and single-process demos.
//!
//! Both backends enforce unique usernames, slugs and place ids and report a
//! violation as [`StoreError::Conflict`]; callers rely on that instead of a
//! separate existence read when they need insert-if-absent semantics.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::entity::app_user::{self, UserRole};
use crate::entity::contractor::{self, PipelineStatus};

mod memory;
mod sea;

pub use memory::MemStore;
pub use sea::SeaOrmStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

#[derive(Debug, Clone)]
pub struct NewContractor {
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
}

impl NewContractor {
    /// A bare prospect with only identity fields set.
    pub fn prospect(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            email: None,
            phone: None,
            website: None,
            address: None,
            city: None,
            state: None,
            rating: None,
            review_count: None,
            place_id: None,
            status: PipelineStatus::Prospect,
            notes: None,
        }
    }
}

/// Column changes applied by a pipeline update. `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct ContractorChanges {
    pub status: Option<PipelineStatus>,
    pub notes: Option<String>,
    pub last_contacted_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub contractor_id: Option<i32>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Name,
    Rating,
    ReviewCount,
    Status,
    LastContactedDate,
    #[default]
    CreatedAt,
}

impl SortField {
    /// Parse the camelCase name used by the dashboard's `sortBy` parameter.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(SortField::Name),
            "rating" => Some(SortField::Rating),
            "reviewCount" => Some(SortField::ReviewCount),
            "status" => Some(SortField::Status),
            "lastContactedDate" => Some(SortField::LastContactedDate),
            "createdAt" => Some(SortField::CreatedAt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone)]
pub struct ContractorQuery {
    pub status: Option<PipelineStatus>,
    /// Substring match against name, slug or city.
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_dir: SortDir,
    /// 1-based.
    pub page: u64,
    pub limit: u64,
}

impl Default for ContractorQuery {
    fn default() -> Self {
        Self {
            status: None,
            search: None,
            sort_by: SortField::default(),
            sort_dir: SortDir::default(),
            page: 1,
            limit: 25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[async_trait]
pub trait Store: Send + Sync {
    // ---------- contractors ----------

    async fn insert_contractor(
        &self,
        new: NewContractor,
    ) -> Result<contractor::Model, StoreError>;

    async fn find_contractor(&self, id: i32) -> Result<Option<contractor::Model>, StoreError>;

    async fn find_contractor_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<contractor::Model>, StoreError>;

    async fn find_contractor_by_place_id(
        &self,
        place_id: &str,
    ) -> Result<Option<contractor::Model>, StoreError>;

    /// Apply `changes` and bump `updated_at`. `NotFound` if the id is unknown.
    async fn update_contractor(
        &self,
        id: i32,
        changes: ContractorChanges,
    ) -> Result<contractor::Model, StoreError>;

    async fn list_contractors(
        &self,
        query: &ContractorQuery,
    ) -> Result<Page<contractor::Model>, StoreError>;

    /// Row count per status. Statuses with no rows are omitted.
    async fn count_contractors_by_status(&self) -> Result<Vec<(PipelineStatus, u64)>, StoreError>;

    // ---------- users ----------

    /// Insert a user. A taken username yields `Conflict`.
    async fn insert_user(&self, new: NewUser) -> Result<app_user::Model, StoreError>;

    /// Insert a user only while the user table is empty. The emptiness check
    /// and the insert are atomic; a non-empty table yields `Conflict("user")`.
    async fn insert_first_user(&self, new: NewUser) -> Result<app_user::Model, StoreError>;

    async fn find_user(&self, id: i32) -> Result<Option<app_user::Model>, StoreError>;

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<app_user::Model>, StoreError>;

    async fn list_users(&self, page: u64, limit: u64) -> Result<Page<app_user::Model>, StoreError>;

    async fn count_users(&self) -> Result<u64, StoreError>;

    async fn record_login(&self, id: i32) -> Result<(), StoreError>;
}
