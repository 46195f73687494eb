use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::entity::app_user;
use crate::entity::contractor::{self, PipelineStatus};

use super::{
    ContractorChanges, ContractorQuery, NewContractor, NewUser, Page, SortDir, SortField, Store,
    StoreError,
};

#[derive(Default)]
struct Tables {
    contractors: BTreeMap<i32, contractor::Model>,
    users: BTreeMap<i32, app_user::Model>,
    last_contractor_id: i32,
    last_user_id: i32,
}

impl Tables {
    fn insert_user(&mut self, new: NewUser) -> Result<app_user::Model, StoreError> {
        if self.users.values().any(|u| u.username == new.username) {
            return Err(StoreError::Conflict("username"));
        }

        self.last_user_id += 1;
        let now = Utc::now().naive_utc();
        let model = app_user::Model {
            id: self.last_user_id,
            username: new.username,
            password_hash: new.password_hash,
            role: new.role,
            is_active: new.is_active,
            contractor_id: new.contractor_id,
            email: new.email,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(model.id, model.clone());
        Ok(model)
    }
}

/// Process-local store. Every operation holds the table lock for its whole
/// duration, so uniqueness checks and inserts are atomic with respect to
/// each other.
#[derive(Default)]
pub struct MemStore {
    tables: Mutex<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_search(c: &contractor::Model, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    c.name.to_lowercase().contains(&needle)
        || c.slug.to_lowercase().contains(&needle)
        || c.city
            .as_deref()
            .is_some_and(|city| city.to_lowercase().contains(&needle))
}

fn compare(a: &contractor::Model, b: &contractor::Model, field: SortField) -> Ordering {
    match field {
        SortField::Name => a.name.cmp(&b.name),
        SortField::Rating => a.rating.partial_cmp(&b.rating).unwrap_or(Ordering::Equal),
        SortField::ReviewCount => a.review_count.cmp(&b.review_count),
        // Variant order is funnel order.
        SortField::Status => a.status.cmp(&b.status),
        SortField::LastContactedDate => a.last_contacted_date.cmp(&b.last_contacted_date),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

fn paginate<T: Clone>(rows: Vec<T>, page: u64, limit: u64) -> Page<T> {
    let total = rows.len() as u64;
    let limit = limit.max(1);
    let skip = (page.max(1) - 1).saturating_mul(limit);
    let items = rows
        .into_iter()
        .skip(skip as usize)
        .take(limit as usize)
        .collect();
    Page { items, total }
}

#[async_trait]
impl Store for MemStore {
    async fn insert_contractor(
        &self,
        new: NewContractor,
    ) -> Result<contractor::Model, StoreError> {
        let mut tables = self.tables.lock().await;

        let taken = tables.contractors.values().any(|c| {
            c.slug == new.slug
                || (new.place_id.is_some() && c.place_id.as_deref() == new.place_id.as_deref())
        });
        if taken {
            return Err(StoreError::Conflict("contractor"));
        }

        tables.last_contractor_id += 1;
        let now = Utc::now().naive_utc();
        let model = contractor::Model {
            id: tables.last_contractor_id,
            name: new.name,
            slug: new.slug,
            email: new.email,
            phone: new.phone,
            website: new.website,
            address: new.address,
            city: new.city,
            state: new.state,
            rating: new.rating,
            review_count: new.review_count,
            place_id: new.place_id,
            status: new.status,
            notes: new.notes,
            last_contacted_date: None,
            created_at: now,
            updated_at: now,
        };
        tables.contractors.insert(model.id, model.clone());
        Ok(model)
    }

    async fn find_contractor(&self, id: i32) -> Result<Option<contractor::Model>, StoreError> {
        Ok(self.tables.lock().await.contractors.get(&id).cloned())
    }

    async fn find_contractor_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<contractor::Model>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.contractors.values().find(|c| c.slug == slug).cloned())
    }

    async fn find_contractor_by_place_id(
        &self,
        place_id: &str,
    ) -> Result<Option<contractor::Model>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .contractors
            .values()
            .find(|c| c.place_id.as_deref() == Some(place_id))
            .cloned())
    }

    async fn update_contractor(
        &self,
        id: i32,
        changes: ContractorChanges,
    ) -> Result<contractor::Model, StoreError> {
        let mut tables = self.tables.lock().await;
        let row = tables
            .contractors
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;

        if let Some(status) = changes.status {
            row.status = status;
        }
        if let Some(notes) = changes.notes {
            row.notes = Some(notes);
        }
        if let Some(at) = changes.last_contacted_date {
            row.last_contacted_date = Some(at);
        }
        row.updated_at = Utc::now().naive_utc();

        Ok(row.clone())
    }

    async fn list_contractors(
        &self,
        query: &ContractorQuery,
    ) -> Result<Page<contractor::Model>, StoreError> {
        let tables = self.tables.lock().await;

        let mut rows: Vec<contractor::Model> = tables
            .contractors
            .values()
            .filter(|c| query.status.is_none_or(|s| c.status == s))
            .filter(|c| match query.search.as_deref() {
                Some(needle) if !needle.is_empty() => matches_search(c, needle),
                _ => true,
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ord = compare(a, b, query.sort_by);
            let ord = match query.sort_dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            };
            ord.then(a.id.cmp(&b.id))
        });

        Ok(paginate(rows, query.page, query.limit))
    }

    async fn count_contractors_by_status(&self) -> Result<Vec<(PipelineStatus, u64)>, StoreError> {
        let tables = self.tables.lock().await;
        let mut counts: BTreeMap<PipelineStatus, u64> = BTreeMap::new();
        for c in tables.contractors.values() {
            *counts.entry(c.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn insert_user(&self, new: NewUser) -> Result<app_user::Model, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.insert_user(new)
    }

    async fn insert_first_user(&self, new: NewUser) -> Result<app_user::Model, StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.is_empty() {
            return Err(StoreError::Conflict("user"));
        }
        tables.insert_user(new)
    }

    async fn find_user(&self, id: i32) -> Result<Option<app_user::Model>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<app_user::Model>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self, page: u64, limit: u64) -> Result<Page<app_user::Model>, StoreError> {
        let tables = self.tables.lock().await;
        // BTreeMap iteration is already id order, which is creation order here.
        let rows = tables.users.values().cloned().collect();
        Ok(paginate(rows, page, limit))
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().await.users.len() as u64)
    }

    async fn record_login(&self, id: i32) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.last_login_at = Some(Utc::now().naive_utc());
        Ok(())
    }
}
