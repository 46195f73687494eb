//! Self-serve demo accounts for prospects.
//!
//! The first lookup of a prospect's public slug creates a contractor-role
//! user whose username and password are both the slug. The username unique
//! constraint is what guarantees at most one such user; the existence read
//! beforehand only spares a password hash on repeat visits.

use serde::Serialize;

use crate::auth::hash_password;
use crate::entity::app_user::UserRole;
use crate::entity::contractor::{self, PipelineStatus};
use crate::store::{NewUser, Store, StoreError};

/// Domain used for synthesized addresses when a prospect has no email.
pub const PLACEHOLDER_EMAIL_DOMAIN: &str = "prospect.invalid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// A new user with this id was created.
    Created(i32),
    /// A user with the slug as username already existed (or won a race).
    AlreadyProvisioned,
    /// The contractor is not a prospect.
    NotEligible,
    /// Provisioning failed; the error was logged.
    Failed,
}

/// Public view of a tenant slug. Never says whether provisioning happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlugLookup {
    pub name: String,
    pub slug: String,
    pub is_prospect: bool,
}

/// Create the demo login for a prospect if it does not exist yet.
/// Errors are logged and reported as [`ProvisionOutcome::Failed`].
pub async fn provision_prospect(
    store: &dyn Store,
    contractor: &contractor::Model,
) -> ProvisionOutcome {
    if contractor.status != PipelineStatus::Prospect {
        return ProvisionOutcome::NotEligible;
    }

    let slug = contractor.slug.as_str();

    match store.find_user_by_username(slug).await {
        Ok(Some(_)) => return ProvisionOutcome::AlreadyProvisioned,
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(slug, error = %e, "prospect user lookup failed");
            return ProvisionOutcome::Failed;
        }
    }

    let password_hash = match hash_password(slug) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!(slug, error = %e, "hashing prospect password failed");
            return ProvisionOutcome::Failed;
        }
    };

    let email = contractor
        .email
        .clone()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| format!("{slug}@{PLACEHOLDER_EMAIL_DOMAIN}"));

    let result = store
        .insert_user(NewUser {
            username: slug.to_string(),
            password_hash,
            role: UserRole::Contractor,
            is_active: true,
            contractor_id: Some(contractor.id),
            email: Some(email),
        })
        .await;

    match result {
        Ok(user) => {
            tracing::info!(
                slug,
                user_id = user.id,
                contractor_id = contractor.id,
                "provisioned prospect login"
            );
            ProvisionOutcome::Created(user.id)
        }
        Err(e) if e.is_conflict() => {
            tracing::debug!(slug, "prospect login created concurrently");
            ProvisionOutcome::AlreadyProvisioned
        }
        Err(e) => {
            tracing::warn!(slug, error = %e, "provisioning prospect login failed");
            ProvisionOutcome::Failed
        }
    }
}

/// Resolve a public slug, provisioning the prospect login as a side effect.
/// `Ok(None)` when no contractor has this slug.
pub async fn lookup_slug(
    store: &dyn Store,
    slug: &str,
) -> Result<Option<(SlugLookup, ProvisionOutcome)>, StoreError> {
    let Some(contractor) = store.find_contractor_by_slug(slug).await? else {
        return Ok(None);
    };

    let outcome = provision_prospect(store, &contractor).await;

    let lookup = SlugLookup {
        is_prospect: contractor.status == PipelineStatus::Prospect,
        name: contractor.name,
        slug: contractor.slug,
    };
    Ok(Some((lookup, outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::entity::app_user;
    use crate::store::{
        ContractorChanges, ContractorQuery, MemStore, NewContractor, Page, SeaOrmStore,
    };
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;
    use std::sync::Arc;

    async fn sqlite_store() -> SeaOrmStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        SeaOrmStore::new(db)
    }

    #[tokio::test]
    async fn test_first_lookup_creates_slug_credentials() {
        let store = sqlite_store().await;
        let c = store
            .insert_contractor(NewContractor::prospect("Acme Heating", "acme-heating"))
            .await
            .unwrap();

        let (lookup, outcome) = lookup_slug(&store, "acme-heating").await.unwrap().unwrap();
        assert_eq!(
            lookup,
            SlugLookup {
                name: "Acme Heating".to_string(),
                slug: "acme-heating".to_string(),
                is_prospect: true,
            }
        );
        assert!(matches!(outcome, ProvisionOutcome::Created(_)));

        let user = store
            .find_user_by_username("acme-heating")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.role, UserRole::Contractor);
        assert_eq!(user.contractor_id, Some(c.id));
        assert!(user.is_active);
        assert_eq!(user.email.as_deref(), Some("acme-heating@prospect.invalid"));
        assert!(verify_password("acme-heating", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_second_lookup_does_not_create_again() {
        let store = sqlite_store().await;
        store
            .insert_contractor(NewContractor::prospect("Acme", "acme"))
            .await
            .unwrap();

        let (_, first) = lookup_slug(&store, "acme").await.unwrap().unwrap();
        let (_, second) = lookup_slug(&store, "acme").await.unwrap().unwrap();

        assert!(matches!(first, ProvisionOutcome::Created(_)));
        assert_eq!(second, ProvisionOutcome::AlreadyProvisioned);
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_client_never_provisioned() {
        let store = MemStore::new();
        let mut new = NewContractor::prospect("Paying Co", "paying-co");
        new.status = PipelineStatus::Client;
        store.insert_contractor(new).await.unwrap();

        for _ in 0..2 {
            let (lookup, outcome) = lookup_slug(&store, "paying-co").await.unwrap().unwrap();
            assert!(!lookup.is_prospect);
            assert_eq!(outcome, ProvisionOutcome::NotEligible);
        }
        assert_eq!(store.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_contractor_email_used_when_present() {
        let store = MemStore::new();
        let mut new = NewContractor::prospect("Acme", "acme");
        new.email = Some("office@acme.example".to_string());
        store.insert_contractor(new).await.unwrap();

        lookup_slug(&store, "acme").await.unwrap();
        let user = store.find_user_by_username("acme").await.unwrap().unwrap();
        assert_eq!(user.email.as_deref(), Some("office@acme.example"));
    }

    #[tokio::test]
    async fn test_unknown_slug() {
        let store = MemStore::new();
        assert!(lookup_slug(&store, "nobody").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_visits_create_one_user() {
        let store = Arc::new(MemStore::new());
        store
            .insert_contractor(NewContractor::prospect("Acme", "acme"))
            .await
            .unwrap();

        let visits: Vec<_> = (0..6)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { lookup_slug(store.as_ref(), "acme").await })
            })
            .collect();

        let mut created = 0;
        for v in visits {
            let (lookup, outcome) = v.await.unwrap().unwrap().unwrap();
            assert!(lookup.is_prospect);
            match outcome {
                ProvisionOutcome::Created(_) => created += 1,
                ProvisionOutcome::AlreadyProvisioned => {}
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_username_taken_by_unrelated_user_counts_as_provisioned() {
        let store = MemStore::new();
        store
            .insert_user(NewUser {
                username: "acme".to_string(),
                password_hash: "x".to_string(),
                role: UserRole::Employee,
                is_active: true,
                contractor_id: None,
                email: None,
            })
            .await
            .unwrap();
        store
            .insert_contractor(NewContractor::prospect("Acme", "acme"))
            .await
            .unwrap();

        let (_, outcome) = lookup_slug(&store, "acme").await.unwrap().unwrap();
        assert_eq!(outcome, ProvisionOutcome::AlreadyProvisioned);
    }

    /// Delegates to a [`MemStore`] but never sees existing users by name, as
    /// when a concurrent visit commits between the existence read and the
    /// insert.
    struct StaleUserReads(MemStore);

    #[async_trait::async_trait]
    impl Store for StaleUserReads {
        async fn insert_contractor(
            &self,
            new: NewContractor,
        ) -> Result<contractor::Model, StoreError> {
            self.0.insert_contractor(new).await
        }

        async fn find_contractor(&self, id: i32) -> Result<Option<contractor::Model>, StoreError> {
            self.0.find_contractor(id).await
        }

        async fn find_contractor_by_slug(
            &self,
            slug: &str,
        ) -> Result<Option<contractor::Model>, StoreError> {
            self.0.find_contractor_by_slug(slug).await
        }

        async fn find_contractor_by_place_id(
            &self,
            place_id: &str,
        ) -> Result<Option<contractor::Model>, StoreError> {
            self.0.find_contractor_by_place_id(place_id).await
        }

        async fn update_contractor(
            &self,
            id: i32,
            changes: ContractorChanges,
        ) -> Result<contractor::Model, StoreError> {
            self.0.update_contractor(id, changes).await
        }

        async fn list_contractors(
            &self,
            query: &ContractorQuery,
        ) -> Result<Page<contractor::Model>, StoreError> {
            self.0.list_contractors(query).await
        }

        async fn count_contractors_by_status(
            &self,
        ) -> Result<Vec<(PipelineStatus, u64)>, StoreError> {
            self.0.count_contractors_by_status().await
        }

        async fn insert_user(&self, new: NewUser) -> Result<app_user::Model, StoreError> {
            self.0.insert_user(new).await
        }

        async fn insert_first_user(&self, new: NewUser) -> Result<app_user::Model, StoreError> {
            self.0.insert_first_user(new).await
        }

        async fn find_user(&self, id: i32) -> Result<Option<app_user::Model>, StoreError> {
            self.0.find_user(id).await
        }

        async fn find_user_by_username(
            &self,
            _username: &str,
        ) -> Result<Option<app_user::Model>, StoreError> {
            Ok(None)
        }

        async fn list_users(
            &self,
            page: u64,
            limit: u64,
        ) -> Result<Page<app_user::Model>, StoreError> {
            self.0.list_users(page, limit).await
        }

        async fn count_users(&self) -> Result<u64, StoreError> {
            self.0.count_users().await
        }

        async fn record_login(&self, id: i32) -> Result<(), StoreError> {
            self.0.record_login(id).await
        }
    }

    #[tokio::test]
    async fn test_insert_conflict_is_already_provisioned() {
        let store = StaleUserReads(MemStore::new());
        store
            .insert_contractor(NewContractor::prospect("Acme", "acme"))
            .await
            .unwrap();

        let (_, first) = lookup_slug(&store, "acme").await.unwrap().unwrap();
        assert!(matches!(first, ProvisionOutcome::Created(_)));

        // The existence read misses, so only the username constraint stops a second user.
        let (lookup, second) = lookup_slug(&store, "acme").await.unwrap().unwrap();
        assert_eq!(second, ProvisionOutcome::AlreadyProvisioned);
        assert!(lookup.is_prospect);
        assert_eq!(store.count_users().await.unwrap(), 1);
    }
}
