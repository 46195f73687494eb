use axum::{
    extract::{Path, Query, State},
    response::Json,
};

use crate::entity::contractor::PipelineStatus;
use crate::pipeline::{self, PipelineUpdate};
use crate::store::{ContractorQuery, SortDir, SortField};

use super::{
    ApiErr, AppState,
    dto::{
        ContractorResponse, PaginatedResponse, PipelineListQuery, PipelineSummaryResponse,
        PipelineUpdateRequest, page_params,
    },
    jwt::AdminClaims,
};

fn parse_status(s: &str) -> Result<PipelineStatus, ApiErr> {
    s.parse::<PipelineStatus>()
        .map_err(|e| ApiErr::unprocessable(e.to_string()))
}

fn parse_sort_dir(s: &str) -> Result<SortDir, ApiErr> {
    match s.to_ascii_lowercase().as_str() {
        "asc" => Ok(SortDir::Asc),
        "desc" => Ok(SortDir::Desc),
        _ => Err(ApiErr::unprocessable(format!("Invalid sortDir '{s}'"))),
    }
}

// ---------- GET /atlas/contractors ----------

pub async fn list_pipeline(
    AdminClaims(_): AdminClaims,
    State(state): State<AppState>,
    Query(params): Query<PipelineListQuery>,
) -> Result<Json<PaginatedResponse<ContractorResponse>>, ApiErr> {
    let (page, limit) = page_params(params.page, params.limit);

    // An empty or "all" status filter from the dashboard's dropdown means no filter.
    let status = match params.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(s) => Some(parse_status(s)?),
    };
    let sort_by = match params.sort_by.as_deref() {
        None | Some("") => SortField::default(),
        Some(s) => SortField::parse(s)
            .ok_or_else(|| ApiErr::unprocessable(format!("Invalid sortBy '{s}'")))?,
    };
    let sort_dir = match params.sort_dir.as_deref() {
        None | Some("") => SortDir::default(),
        Some(s) => parse_sort_dir(s)?,
    };
    let search = params
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let result = state
        .store
        .list_contractors(&ContractorQuery {
            status,
            search,
            sort_by,
            sort_dir,
            page,
            limit,
        })
        .await?;

    Ok(Json(PaginatedResponse::new(
        result.items.into_iter().map(ContractorResponse::from).collect(),
        result.total,
        page,
        limit,
    )))
}

// ---------- GET /atlas/pipeline-summary ----------

pub async fn pipeline_summary(
    AdminClaims(_): AdminClaims,
    State(state): State<AppState>,
) -> Result<Json<PipelineSummaryResponse>, ApiErr> {
    let summary = pipeline::summary(state.store.as_ref()).await?;
    Ok(Json(summary.into()))
}

// ---------- PATCH /atlas/contractors/{id}/status, PATCH /contractors/{id} ----------

pub async fn update_pipeline(
    AdminClaims(claims): AdminClaims,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<PipelineUpdateRequest>,
) -> Result<Json<ContractorResponse>, ApiErr> {
    let status = body.status.as_deref().map(parse_status).transpose()?;

    let update = PipelineUpdate {
        status,
        notes: body.notes,
        last_contacted_date: body.last_contacted_date.map(|at| at.naive_utc()),
    };

    let model = pipeline::apply_update(state.store.as_ref(), id, update).await?;

    tracing::debug!(admin_id = claims.sub, contractor_id = id, "pipeline updated");

    Ok(Json(ContractorResponse::from(model)))
}
