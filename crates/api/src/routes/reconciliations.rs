//! Bank statement and three-way reconciliation routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use frith_core::reconciliation::{
    Approver, NewStatementImport, ParsedStatementLine, RoleOverridePolicy, StatementFormat,
    StatementPeriod, parse_csv,
};
use frith_db::{ReconciliationRepository, TrustRepository};
use frith_shared::types::{
    OrganizationId, ReconciliationId, StatementImportId, TrustAccountId, TrustTransactionId,
};
use frith_shared::{AppError, Currency, Money};

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the reconciliation routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/organizations/{org_id}/trust-accounts/{account_id}/statements",
            post(import_statement),
        )
        .route(
            "/organizations/{org_id}/trust-accounts/{account_id}/statements/csv",
            post(import_csv_statement),
        )
        .route(
            "/organizations/{org_id}/statements/{statement_id}",
            get(get_statement),
        )
        .route(
            "/organizations/{org_id}/statements/{statement_id}/clear",
            post(mark_cleared),
        )
        .route(
            "/organizations/{org_id}/trust-accounts/{account_id}/reconciliations",
            get(list_reconciliations).post(reconcile),
        )
        .route(
            "/organizations/{org_id}/reconciliations/{reconciliation_id}",
            get(get_reconciliation),
        )
        .route(
            "/organizations/{org_id}/reconciliations/{reconciliation_id}/submit",
            post(submit),
        )
        .route(
            "/organizations/{org_id}/reconciliations/{reconciliation_id}/approve",
            post(approve),
        )
        .route(
            "/organizations/{org_id}/reconciliations/{reconciliation_id}/override",
            post(approve_with_override),
        )
}

/// One statement line in a JSON import.
#[derive(Debug, Deserialize)]
pub struct StatementLineRequest {
    /// Posting date.
    pub date: NaiveDate,
    /// Signed amount in major units; credits positive.
    pub amount: Decimal,
    /// Bank description.
    pub description: String,
    /// Check number or bank reference.
    pub reference: Option<String>,
}

/// Request body for a JSON statement import.
#[derive(Debug, Deserialize)]
pub struct ImportStatementRequest {
    /// First day covered.
    pub period_start: NaiveDate,
    /// Last day covered.
    pub period_end: NaiveDate,
    /// Balance at the start of the period.
    pub opening_balance: Decimal,
    /// Balance at the end of the period.
    pub closing_balance: Decimal,
    /// Source format; defaults to manual entry.
    pub format: Option<StatementFormat>,
    /// Statement lines.
    #[serde(default)]
    pub lines: Vec<StatementLineRequest>,
}

/// Query parameters accompanying a CSV statement body.
#[derive(Debug, Deserialize)]
pub struct CsvImportParams {
    /// First day covered.
    pub period_start: NaiveDate,
    /// Last day covered.
    pub period_end: NaiveDate,
    /// Balance at the start of the period.
    pub opening_balance: Decimal,
    /// Balance at the end of the period.
    pub closing_balance: Decimal,
}

/// Request body for clearing transactions against a statement.
#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    /// Transactions that appear on the statement.
    pub transaction_ids: Vec<Uuid>,
}

/// Request body for running a reconciliation.
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    /// First day of the period.
    pub period_start: NaiveDate,
    /// Last day of the period.
    pub period_end: NaiveDate,
    /// Closing balance from the bank statement.
    pub statement_closing_balance: Decimal,
    /// Imported statement to check cleared activity against.
    pub statement_import_id: Option<Uuid>,
}

/// Request body for an override approval.
#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    /// Why the discrepancies are acceptable.
    pub justification: String,
}

fn repo(state: &AppState) -> ReconciliationRepository {
    ReconciliationRepository::new((*state.db).clone())
}

fn money(amount: Decimal, currency: Currency) -> Result<Money, ApiError> {
    Ok(Money::from_decimal(amount, currency).map_err(AppError::from)?)
}

async fn account_currency(
    state: &AppState,
    org: OrganizationId,
    account_id: TrustAccountId,
) -> Result<Currency, ApiError> {
    let account = TrustRepository::new((*state.db).clone())
        .get_account(org, account_id)
        .await?;
    Ok(account.currency)
}

fn approver(auth: &AuthUser) -> Approver {
    Approver {
        user_id: auth.user_id(),
        role: auth.role().to_string(),
    }
}

async fn import_statement(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, account_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ImportStatementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let account_id = TrustAccountId::from_uuid(account_id);
    let currency = account_currency(&state, org, account_id).await?;

    let lines = body
        .lines
        .into_iter()
        .map(|line| {
            Ok(ParsedStatementLine {
                date: line.date,
                amount: money(line.amount, currency)?,
                description: line.description,
                reference: line.reference,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let statement = repo(&state)
        .import_statement(
            org,
            account_id,
            NewStatementImport {
                period: StatementPeriod::new(body.period_start, body.period_end)?,
                opening_balance: money(body.opening_balance, currency)?,
                closing_balance: money(body.closing_balance, currency)?,
                format: body.format.unwrap_or(StatementFormat::Manual),
                lines,
                imported_by: auth.user_id(),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(statement)))
}

async fn import_csv_statement(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, account_id)): Path<(Uuid, Uuid)>,
    Query(params): Query<CsvImportParams>,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let account_id = TrustAccountId::from_uuid(account_id);
    let currency = account_currency(&state, org, account_id).await?;

    let lines = parse_csv(body.as_bytes(), currency)?;
    info!(trust_account_id = %account_id, lines = lines.len(), "Parsed CSV statement");
    let statement = repo(&state)
        .import_statement(
            org,
            account_id,
            NewStatementImport {
                period: StatementPeriod::new(params.period_start, params.period_end)?,
                opening_balance: money(params.opening_balance, currency)?,
                closing_balance: money(params.closing_balance, currency)?,
                format: StatementFormat::Csv,
                lines,
                imported_by: auth.user_id(),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(statement)))
}

async fn get_statement(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, statement_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let statement = repo(&state)
        .get_statement(org, StatementImportId::from_uuid(statement_id))
        .await?;
    Ok(Json(statement))
}

async fn mark_cleared(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, statement_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ClearRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    if body.transaction_ids.is_empty() {
        return Err(ApiError::validation("transaction_ids must not be empty"));
    }
    let ids: Vec<TrustTransactionId> = body
        .transaction_ids
        .into_iter()
        .map(TrustTransactionId::from_uuid)
        .collect();
    let cleared = repo(&state)
        .mark_cleared(
            org,
            StatementImportId::from_uuid(statement_id),
            &ids,
            auth.user_id(),
        )
        .await?;
    Ok(Json(json!({ "cleared": cleared })))
}

async fn reconcile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, account_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ReconcileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let account_id = TrustAccountId::from_uuid(account_id);
    let currency = account_currency(&state, org, account_id).await?;

    let reconciliation = repo(&state)
        .reconcile(
            org,
            account_id,
            StatementPeriod::new(body.period_start, body.period_end)?,
            money(body.statement_closing_balance, currency)?,
            body.statement_import_id.map(StatementImportId::from_uuid),
            auth.user_id(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(reconciliation)))
}

async fn list_reconciliations(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, account_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let reconciliations = repo(&state)
        .list(org, TrustAccountId::from_uuid(account_id))
        .await?;
    Ok(Json(json!({ "reconciliations": reconciliations })))
}

async fn get_reconciliation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, reconciliation_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let reconciliation = repo(&state)
        .get(org, ReconciliationId::from_uuid(reconciliation_id))
        .await?;
    Ok(Json(reconciliation))
}

async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, reconciliation_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let reconciliation = repo(&state)
        .submit(
            org,
            ReconciliationId::from_uuid(reconciliation_id),
            auth.user_id(),
        )
        .await?;
    Ok(Json(reconciliation))
}

async fn approve(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, reconciliation_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let reconciliation = repo(&state)
        .approve(
            org,
            ReconciliationId::from_uuid(reconciliation_id),
            &approver(&auth),
        )
        .await?;
    Ok(Json(reconciliation))
}

async fn approve_with_override(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, reconciliation_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<OverrideRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let policy = RoleOverridePolicy::from(&*state.trust);
    let reconciliation = repo(&state)
        .approve_with_override(
            org,
            ReconciliationId::from_uuid(reconciliation_id),
            &approver(&auth),
            &body.justification,
            &policy,
        )
        .await?;
    Ok(Json(reconciliation))
}
