use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DbBackend, DbErr, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    SqlErr, TransactionTrait,
    sea_query::{CaseStatement, Expr, LikeExpr, SimpleExpr},
};

use crate::entity::app_user;
use crate::entity::contractor::{self, PipelineStatus};

use super::{
    ContractorChanges, ContractorQuery, NewContractor, NewUser, Page, SortDir, SortField, Store,
    StoreError,
};

pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Db`.
fn write_err(e: DbErr, what: &'static str) -> StoreError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::Conflict(what),
        _ => StoreError::Db(e),
    }
}

/// Rank statuses in funnel order so sorting by status matches the pipeline,
/// not the alphabet.
fn status_rank() -> SimpleExpr {
    PipelineStatus::ALL
        .iter()
        .enumerate()
        .fold(CaseStatement::new(), |case, (rank, status)| {
            case.case(
                contractor::Column::Status.eq(status.as_str()),
                Expr::val(rank as i32),
            )
        })
        .into()
}

fn sort_expr(field: SortField) -> SimpleExpr {
    let column = match field {
        SortField::Status => return status_rank(),
        SortField::Name => contractor::Column::Name,
        SortField::Rating => contractor::Column::Rating,
        SortField::ReviewCount => contractor::Column::ReviewCount,
        SortField::LastContactedDate => contractor::Column::LastContactedDate,
        SortField::CreatedAt => contractor::Column::CreatedAt,
    };
    Expr::col((contractor::Entity, column)).into()
}

/// Substring pattern with `%`, `_` and `\` in the needle matched literally.
fn contains_pattern(needle: &str) -> LikeExpr {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    LikeExpr::new(format!("%{escaped}%")).escape('\\')
}

fn user_active_model(new: NewUser) -> app_user::ActiveModel {
    let now = Utc::now().naive_utc();
    app_user::ActiveModel {
        username: Set(new.username),
        password_hash: Set(new.password_hash),
        role: Set(new.role),
        is_active: Set(new.is_active),
        contractor_id: Set(new.contractor_id),
        email: Set(new.email),
        last_login_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

#[async_trait]
impl Store for SeaOrmStore {
    async fn insert_contractor(
        &self,
        new: NewContractor,
    ) -> Result<contractor::Model, StoreError> {
        let now = Utc::now().naive_utc();
        contractor::ActiveModel {
            name: Set(new.name),
            slug: Set(new.slug),
            email: Set(new.email),
            phone: Set(new.phone),
            website: Set(new.website),
            address: Set(new.address),
            city: Set(new.city),
            state: Set(new.state),
            rating: Set(new.rating),
            review_count: Set(new.review_count),
            place_id: Set(new.place_id),
            status: Set(new.status),
            notes: Set(new.notes),
            last_contacted_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| write_err(e, "contractor"))
    }

    async fn find_contractor(&self, id: i32) -> Result<Option<contractor::Model>, StoreError> {
        Ok(contractor::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_contractor_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<contractor::Model>, StoreError> {
        Ok(contractor::Entity::find()
            .filter(contractor::Column::Slug.eq(slug))
            .one(&self.db)
            .await?)
    }

    async fn find_contractor_by_place_id(
        &self,
        place_id: &str,
    ) -> Result<Option<contractor::Model>, StoreError> {
        Ok(contractor::Entity::find()
            .filter(contractor::Column::PlaceId.eq(place_id))
            .one(&self.db)
            .await?)
    }

    async fn update_contractor(
        &self,
        id: i32,
        changes: ContractorChanges,
    ) -> Result<contractor::Model, StoreError> {
        let model = contractor::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(StoreError::NotFound)?;

        let mut active: contractor::ActiveModel = model.into();
        if let Some(status) = changes.status {
            active.status = Set(status);
        }
        if let Some(notes) = changes.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(at) = changes.last_contacted_date {
            active.last_contacted_date = Set(Some(at));
        }
        active.updated_at = Set(Utc::now().naive_utc());

        Ok(active.update(&self.db).await?)
    }

    async fn list_contractors(
        &self,
        query: &ContractorQuery,
    ) -> Result<Page<contractor::Model>, StoreError> {
        let mut select = contractor::Entity::find();

        if let Some(status) = query.status {
            select = select.filter(contractor::Column::Status.eq(status));
        }
        if let Some(ref search) = query.search
            && !search.is_empty()
        {
            select = select.filter(
                Condition::any()
                    .add(contractor::Column::Name.like(contains_pattern(search)))
                    .add(contractor::Column::Slug.like(contains_pattern(search)))
                    .add(contractor::Column::City.like(contains_pattern(search))),
            );
        }

        let order = match query.sort_dir {
            SortDir::Asc => Order::Asc,
            SortDir::Desc => Order::Desc,
        };

        let paginator = select
            .order_by(sort_expr(query.sort_by), order)
            .order_by(contractor::Column::Id, Order::Asc)
            .paginate(&self.db, query.limit.max(1));

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(query.page.max(1) - 1).await?;

        Ok(Page { items, total })
    }

    async fn count_contractors_by_status(&self) -> Result<Vec<(PipelineStatus, u64)>, StoreError> {
        let rows: Vec<(String, i64)> = contractor::Entity::find()
            .select_only()
            .column(contractor::Column::Status)
            .column_as(contractor::Column::Id.count(), "count")
            .group_by(contractor::Column::Status)
            .into_tuple()
            .all(&self.db)
            .await?;

        rows.into_iter()
            .map(|(status, count)| -> Result<_, StoreError> {
                let status = PipelineStatus::try_from_value(&status)?;
                Ok((status, count.max(0) as u64))
            })
            .collect()
    }

    async fn insert_user(&self, new: NewUser) -> Result<app_user::Model, StoreError> {
        user_active_model(new)
            .insert(&self.db)
            .await
            .map_err(|e| write_err(e, "username"))
    }

    async fn insert_first_user(&self, new: NewUser) -> Result<app_user::Model, StoreError> {
        let txn = self.db.begin().await?;

        // Take the write lock before reading so concurrent bootstraps serialize.
        match txn.get_database_backend() {
            DbBackend::Postgres => {
                txn.execute_unprepared("LOCK TABLE app_user IN SHARE ROW EXCLUSIVE MODE")
                    .await?;
            }
            DbBackend::Sqlite => {
                txn.execute_unprepared("UPDATE app_user SET id = id WHERE 1 = 0")
                    .await?;
            }
            _ => {}
        }

        if app_user::Entity::find().count(&txn).await? > 0 {
            // Dropping the transaction rolls it back.
            return Err(StoreError::Conflict("user"));
        }

        let user = user_active_model(new)
            .insert(&txn)
            .await
            .map_err(|e| write_err(e, "username"))?;
        txn.commit().await?;
        Ok(user)
    }

    async fn find_user(&self, id: i32) -> Result<Option<app_user::Model>, StoreError> {
        Ok(app_user::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<app_user::Model>, StoreError> {
        Ok(app_user::Entity::find()
            .filter(app_user::Column::Username.eq(username))
            .one(&self.db)
            .await?)
    }

    async fn list_users(&self, page: u64, limit: u64) -> Result<Page<app_user::Model>, StoreError> {
        let paginator = app_user::Entity::find()
            .order_by_asc(app_user::Column::CreatedAt)
            .order_by_asc(app_user::Column::Id)
            .paginate(&self.db, limit.max(1));

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.max(1) - 1).await?;

        Ok(Page { items, total })
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(app_user::Entity::find().count(&self.db).await?)
    }

    async fn record_login(&self, id: i32) -> Result<(), StoreError> {
        let user = app_user::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(StoreError::NotFound)?;

        let mut active: app_user::ActiveModel = user.into();
        active.last_login_at = Set(Some(Utc::now().naive_utc()));
        active.update(&self.db).await?;
        Ok(())
    }
}
