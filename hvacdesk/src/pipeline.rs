//! Atlas sales pipeline: status parsing, transition policy and updates.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, Utc};

use crate::entity::contractor::{self, PipelineStatus};
use crate::store::{ContractorChanges, Store, StoreError};

impl PipelineStatus {
    /// Funnel order.
    pub const ALL: [PipelineStatus; 5] = [
        PipelineStatus::Prospect,
        PipelineStatus::Contacted,
        PipelineStatus::Qualified,
        PipelineStatus::Demo,
        PipelineStatus::Client,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Prospect => "prospect",
            PipelineStatus::Contacted => "contacted",
            PipelineStatus::Qualified => "qualified",
            PipelineStatus::Demo => "demo",
            PipelineStatus::Client => "client",
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pipeline status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for PipelineStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Statuses reachable from `from`.
///
/// The sales team moves leads backwards as often as forwards, so every
/// status is reachable from every other one. Tighten this table to restrict
/// the funnel; [`check_transition`] is the only caller.
pub fn allowed_transitions(from: PipelineStatus) -> &'static [PipelineStatus] {
    match from {
        PipelineStatus::Prospect
        | PipelineStatus::Contacted
        | PipelineStatus::Qualified
        | PipelineStatus::Demo
        | PipelineStatus::Client => &PipelineStatus::ALL,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("contractor not found")]
    NotFound,
    #[error("cannot move contractor from {from} to {to}")]
    IllegalTransition {
        from: PipelineStatus,
        to: PipelineStatus,
    },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => PipelineError::NotFound,
            other => PipelineError::Store(other),
        }
    }
}

pub fn check_transition(from: PipelineStatus, to: PipelineStatus) -> Result<(), PipelineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(PipelineError::IllegalTransition { from, to })
    }
}

/// A pipeline edit from the sales dashboard.
#[derive(Debug, Clone, Default)]
pub struct PipelineUpdate {
    pub status: Option<PipelineStatus>,
    pub notes: Option<String>,
    pub last_contacted_date: Option<NaiveDateTime>,
}

/// Apply a pipeline edit. A status change stamps `last_contacted_date` with
/// the current time unless the caller supplied one explicitly.
pub async fn apply_update(
    store: &dyn Store,
    contractor_id: i32,
    update: PipelineUpdate,
) -> Result<contractor::Model, PipelineError> {
    let current = store
        .find_contractor(contractor_id)
        .await?
        .ok_or(PipelineError::NotFound)?;

    if let Some(to) = update.status {
        check_transition(current.status, to)?;
    }

    let last_contacted_date = match (update.status, update.last_contacted_date) {
        (_, Some(at)) => Some(at),
        (Some(_), None) => Some(Utc::now().naive_utc()),
        (None, None) => None,
    };

    let updated = store
        .update_contractor(
            contractor_id,
            ContractorChanges {
                status: update.status,
                notes: update.notes,
                last_contacted_date,
            },
        )
        .await?;

    if let Some(to) = update.status {
        tracing::info!(
            contractor_id,
            slug = %updated.slug,
            from = %current.status,
            to = %to,
            "pipeline status changed"
        );
    }

    Ok(updated)
}

/// Move a contractor to `status` and mark it as contacted now.
pub async fn set_status(
    store: &dyn Store,
    contractor_id: i32,
    status: PipelineStatus,
) -> Result<contractor::Model, PipelineError> {
    apply_update(
        store,
        contractor_id,
        PipelineUpdate {
            status: Some(status),
            ..Default::default()
        },
    )
    .await
}

/// Per-status contractor counts. Every status is present; `total` is the sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub counts: [(PipelineStatus, u64); 5],
    pub total: u64,
}

impl PipelineSummary {
    pub fn count(&self, status: PipelineStatus) -> u64 {
        self.counts
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

pub async fn summary(store: &dyn Store) -> Result<PipelineSummary, StoreError> {
    let grouped = store.count_contractors_by_status().await?;

    let counts = PipelineStatus::ALL.map(|status| {
        let n = grouped
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        (status, n)
    });
    let total = counts.iter().map(|(_, n)| n).sum();

    Ok(PipelineSummary { counts, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemStore, NewContractor, SeaOrmStore};
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn sqlite_store() -> SeaOrmStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        SeaOrmStore::new(db)
    }

    #[test]
    fn test_parse_round_trips_canonical_names() {
        for status in PipelineStatus::ALL {
            assert_eq!(status.as_str().parse::<PipelineStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "won".parse::<PipelineStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("won".to_string()));
        assert!("Prospect".parse::<PipelineStatus>().is_err());
    }

    #[test]
    fn test_default_policy_allows_every_move() {
        for from in PipelineStatus::ALL {
            for to in PipelineStatus::ALL {
                assert!(check_transition(from, to).is_ok(), "{from} -> {to}");
            }
        }
    }

    #[tokio::test]
    async fn test_set_status_stamps_last_contacted() {
        let store = sqlite_store().await;
        let c = store
            .insert_contractor(NewContractor::prospect("Acme", "acme"))
            .await
            .unwrap();

        for status in PipelineStatus::ALL {
            let before = Utc::now().naive_utc();
            let updated = set_status(&store, c.id, status).await.unwrap();
            assert_eq!(updated.status, status);
            let stamped = updated.last_contacted_date.expect("stamped");
            assert!(stamped >= before);

            let reread = store.find_contractor(c.id).await.unwrap().unwrap();
            assert_eq!(reread.status, status);
            assert_eq!(reread.last_contacted_date, Some(stamped));
        }
    }

    #[tokio::test]
    async fn test_notes_only_update_keeps_last_contacted() {
        let store = MemStore::new();
        let c = store
            .insert_contractor(NewContractor::prospect("Acme", "acme"))
            .await
            .unwrap();

        let updated = apply_update(
            &store,
            c.id,
            PipelineUpdate {
                notes: Some("left voicemail".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.notes.as_deref(), Some("left voicemail"));
        assert!(updated.last_contacted_date.is_none());
        assert_eq!(updated.status, PipelineStatus::Prospect);
    }

    #[tokio::test]
    async fn test_explicit_last_contacted_wins() {
        let store = MemStore::new();
        let c = store
            .insert_contractor(NewContractor::prospect("Acme", "acme"))
            .await
            .unwrap();
        let at = chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();

        let updated = apply_update(
            &store,
            c.id,
            PipelineUpdate {
                status: Some(PipelineStatus::Demo),
                last_contacted_date: Some(at),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.last_contacted_date, Some(at));
    }

    #[tokio::test]
    async fn test_unknown_contractor() {
        let store = MemStore::new();
        let err = set_status(&store, 99, PipelineStatus::Client)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound));
    }

    #[tokio::test]
    async fn test_summary_sums_to_total() {
        let store = sqlite_store().await;
        let statuses = [
            PipelineStatus::Prospect,
            PipelineStatus::Prospect,
            PipelineStatus::Contacted,
            PipelineStatus::Client,
        ];
        for (i, status) in statuses.into_iter().enumerate() {
            let mut new = NewContractor::prospect(format!("C{i}"), format!("c{i}"));
            new.status = status;
            store.insert_contractor(new).await.unwrap();
        }

        let s = summary(&store).await.unwrap();
        assert_eq!(s.total, 4);
        assert_eq!(s.count(PipelineStatus::Prospect), 2);
        assert_eq!(s.count(PipelineStatus::Qualified), 0);
        assert_eq!(s.counts.iter().map(|(_, n)| n).sum::<u64>(), s.total);
    }
}
