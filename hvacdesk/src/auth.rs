use std::str::FromStr;
use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use password_hash::SaltString;
use rand_core::OsRng;

use crate::entity::app_user::{self, UserRole};
use crate::store::{NewUser, Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("user not found")]
    NotFound,
    #[error("invalid password")]
    InvalidPassword,
    #[error("user is inactive")]
    Inactive,
    #[error("contractor users must reference a contractor")]
    ContractorRequired,
    #[error("contractor {0} does not exist")]
    UnknownContractor(i32),
    #[error("hash error: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::Admin, UserRole::Contractor, UserRole::Employee];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Contractor => "contractor",
            UserRole::Employee => "employee",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}' (expected admin, contractor or employee)")]
pub struct UnknownRole(pub String);

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Fields for a user created through the admin API or the CLI.
#[derive(Debug, Clone)]
pub struct UserParams {
    pub username: String,
    pub password: String,
    pub role: UserRole,
    pub contractor_id: Option<i32>,
    pub email: Option<String>,
}

pub struct Auth {
    store: Arc<dyn Store>,
}

impl Auth {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Verify username/password and stamp `last_login_at`.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<app_user::Model, AuthError> {
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !user.is_active {
            return Err(AuthError::Inactive);
        }

        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidPassword);
        }

        self.store.record_login(user.id).await?;

        Ok(user)
    }

    /// Create a user with an Argon2-hashed password. Contractor-role users
    /// must point at an existing contractor.
    pub async fn create_user(&self, params: UserParams) -> Result<app_user::Model, AuthError> {
        if params.role == UserRole::Contractor {
            let id = params.contractor_id.ok_or(AuthError::ContractorRequired)?;
            if self.store.find_contractor(id).await?.is_none() {
                return Err(AuthError::UnknownContractor(id));
            }
        } else if let Some(id) = params.contractor_id
            && self.store.find_contractor(id).await?.is_none()
        {
            return Err(AuthError::UnknownContractor(id));
        }

        let password_hash = hash_password(&params.password)?;
        let user = self
            .store
            .insert_user(NewUser {
                username: params.username,
                password_hash,
                role: params.role,
                is_active: true,
                contractor_id: params.contractor_id,
                email: params.email,
            })
            .await?;
        Ok(user)
    }

    /// Create the bootstrap admin. Fails with a `Conflict` store error once
    /// any user exists, even when two callers race on an empty table.
    pub async fn create_first_admin(
        &self,
        username: String,
        password: &str,
        email: Option<String>,
    ) -> Result<app_user::Model, AuthError> {
        let password_hash = hash_password(password)?;
        let user = self
            .store
            .insert_first_user(NewUser {
                username,
                password_hash,
                role: UserRole::Admin,
                is_active: true,
                contractor_id: None,
                email,
            })
            .await?;
        Ok(user)
    }

    pub async fn count_users(&self) -> Result<u64, AuthError> {
        Ok(self.store.count_users().await?)
    }
}

/// Hash a plaintext password with Argon2id + a random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unparseable.
pub fn verify_password(password: &str, phc: &str) -> Result<bool, AuthError> {
    let hash = PasswordHash::new(phc).map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemStore, NewContractor, SeaOrmStore};
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn setup() -> Auth {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        Auth::new(Arc::new(SeaOrmStore::new(db)))
    }

    fn params(username: &str, password: &str, role: UserRole) -> UserParams {
        UserParams {
            username: username.to_string(),
            password: password.to_string(),
            role,
            contractor_id: None,
            email: None,
        }
    }

    // --- hash_password ---

    #[test]
    fn test_hash_produces_argon2_format() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"), "Expected Argon2 PHC string, got: {}", hash);
    }

    #[test]
    fn test_hash_unique_per_call() {
        let h1 = hash_password("same").unwrap();
        let h2 = hash_password("same").unwrap();
        assert_ne!(h1, h2, "Same password hashed twice should produce different hashes");
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    // --- create_user ---

    #[test]
    fn test_role_from_str() {
        for role in UserRole::ALL {
            assert_eq!(role.as_str().parse::<UserRole>(), Ok(role));
        }
        assert_eq!(
            "Admin".parse::<UserRole>(),
            Err(UnknownRole("Admin".to_string()))
        );
        assert!("owner".parse::<UserRole>().is_err());
    }

    #[tokio::test]
    async fn test_create_user_stores_hash_not_plaintext() {
        let auth = setup().await;
        let user = auth
            .create_user(params("alice", "supersecret", UserRole::Employee))
            .await
            .unwrap();

        assert_ne!(user.password_hash, "supersecret", "Plaintext must never be stored");
        assert!(user.password_hash.starts_with("$argon2"));
        assert!(user.is_active);
        assert!(user.last_login_at.is_none());
        assert_eq!(auth.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_user_duplicate_username_errors() {
        let auth = setup().await;
        auth.create_user(params("alice", "pw", UserRole::Employee))
            .await
            .unwrap();
        let err = auth
            .create_user(params("alice", "other", UserRole::Admin))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Store(ref e) if e.is_conflict()));
    }

    #[tokio::test]
    async fn test_contractor_role_requires_contractor() {
        let auth = Auth::new(Arc::new(MemStore::new()));

        let err = auth
            .create_user(params("acme", "pw", UserRole::Contractor))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ContractorRequired));

        let mut with_missing = params("acme", "pw", UserRole::Contractor);
        with_missing.contractor_id = Some(7);
        let err = auth.create_user(with_missing).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownContractor(7)));

        let c = auth
            .store()
            .insert_contractor(NewContractor::prospect("Acme", "acme"))
            .await
            .unwrap();
        let mut ok = params("acme", "pw", UserRole::Contractor);
        ok.contractor_id = Some(c.id);
        let user = auth.create_user(ok).await.unwrap();
        assert_eq!(user.contractor_id, Some(c.id));
    }

    // --- authenticate ---

    #[tokio::test]
    async fn test_authenticate_success_updates_last_login() {
        let auth = setup().await;
        auth.create_user(params("alice", "correct", UserRole::Employee))
            .await
            .unwrap();

        let user = auth.authenticate("alice", "correct").await.unwrap();
        assert_eq!(user.username, "alice");

        let after = auth
            .store()
            .find_user_by_username("alice")
            .await
            .unwrap()
            .unwrap();
        assert!(after.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password_rejected() {
        let auth = setup().await;
        auth.create_user(params("alice", "correct", UserRole::Employee))
            .await
            .unwrap();
        let err = auth.authenticate("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidPassword));
    }

    #[tokio::test]
    async fn test_authenticate_unknown_user_rejected() {
        let auth = setup().await;
        let err = auth.authenticate("nobody", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn test_authenticate_inactive_user_rejected() {
        let auth = Auth::new(Arc::new(MemStore::new()));
        auth.store()
            .insert_user(NewUser {
                username: "ghost".to_string(),
                password_hash: hash_password("pw").unwrap(),
                role: UserRole::Employee,
                is_active: false,
                contractor_id: None,
                email: None,
            })
            .await
            .unwrap();

        let err = auth.authenticate("ghost", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::Inactive));
    }
}
