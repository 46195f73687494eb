//! One-shot import of scraped contractor listings.
//!
//! Records are processed once, in file order. A record is a duplicate when
//! its place id is already stored, or when its slug is taken by a row that
//! is not known to be a different place. Different places that slugify the
//! same get `-2`, `-3`, ... suffixes.

use std::path::Path;

use serde::Deserialize;

use crate::entity::contractor::PipelineStatus;
use crate::slug::{slugify, with_suffix};
use crate::store::{NewContractor, Store, StoreError};

/// Upper bound on suffix attempts for one base slug.
const MAX_SLUG_ATTEMPTS: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid import file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One scraped listing, as produced by the places scraper.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedContractor {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    pub place_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Number of leading records to skip, for resuming a partial run.
    pub skip: usize,
    pub status: PipelineStatus,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            skip: 0,
            status: PipelineStatus::Prospect,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: u64,
    pub duplicates: u64,
    pub invalid: u64,
}

enum Placement {
    Slug(String),
    Duplicate,
    Invalid,
}

pub async fn import_file(
    store: &dyn Store,
    path: &Path,
    opts: &ImportOptions,
) -> Result<ImportReport, ImportError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ImportError::Read {
            path: path.display().to_string(),
            source,
        })?;
    let records: Vec<ScrapedContractor> = serde_json::from_str(&raw)?;

    tracing::info!(
        path = %path.display(),
        records = records.len(),
        skip = opts.skip,
        "starting contractor import"
    );

    import_records(store, records, opts).await
}

pub async fn import_records(
    store: &dyn Store,
    records: Vec<ScrapedContractor>,
    opts: &ImportOptions,
) -> Result<ImportReport, ImportError> {
    let mut report = ImportReport::default();

    for (offset, record) in records.into_iter().enumerate().skip(opts.skip) {
        let place_id = record
            .place_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let slug = match place(store, &record.name, place_id.as_deref()).await? {
            Placement::Slug(slug) => slug,
            Placement::Duplicate => {
                report.duplicates += 1;
                continue;
            }
            Placement::Invalid => {
                tracing::debug!(
                    offset,
                    name = %record.name,
                    "skipping record without a usable name"
                );
                report.invalid += 1;
                continue;
            }
        };

        let new = NewContractor {
            name: record.name.trim().to_string(),
            slug,
            email: record.email,
            phone: record.phone,
            website: record.website,
            address: record.address,
            city: record.city,
            state: record.state,
            rating: record.rating,
            review_count: record.review_count,
            place_id,
            status: opts.status,
            notes: None,
        };

        match store.insert_contractor(new).await {
            Ok(c) => {
                tracing::debug!(offset, id = c.id, slug = %c.slug, "imported contractor");
                report.inserted += 1;
            }
            // Another writer got there first.
            Err(e) if e.is_conflict() => report.duplicates += 1,
            Err(e) => {
                tracing::error!(offset, error = %e, "import aborted");
                return Err(e.into());
            }
        }
    }

    tracing::info!(
        inserted = report.inserted,
        duplicates = report.duplicates,
        invalid = report.invalid,
        "contractor import finished"
    );

    Ok(report)
}

async fn place(
    store: &dyn Store,
    name: &str,
    place_id: Option<&str>,
) -> Result<Placement, StoreError> {
    if let Some(pid) = place_id
        && store.find_contractor_by_place_id(pid).await?.is_some()
    {
        return Ok(Placement::Duplicate);
    }

    let base = slugify(name);
    if base.is_empty() {
        return Ok(Placement::Invalid);
    }

    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let candidate = with_suffix(&base, attempt);
        let Some(existing) = store.find_contractor_by_slug(&candidate).await? else {
            return Ok(Placement::Slug(candidate));
        };
        let different_place = matches!(
            (place_id, existing.place_id.as_deref()),
            (Some(ours), Some(theirs)) if ours != theirs
        );
        if !different_place {
            return Ok(Placement::Duplicate);
        }
    }

    tracing::warn!(slug = %base, "no free slug suffix left");
    Ok(Placement::Invalid)
}
