//! Trust account, client ledger and trust transaction routes.

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
use uuid::Uuid;

use frith_core::trust::{
    ComplianceThresholds, CreateTrustAccountInput, OpenLedgerInput, RecordTransactionInput,
    TrustAccountType, TrustTransactionType,
};
use frith_db::TrustRepository;
use frith_shared::types::{
    ClientId, ClientLedgerId, MatterId, PageRequest, TrustAccountId, TrustTransactionId,
};
use frith_shared::{AppError, Currency, Money};

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the trust routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/organizations/{org_id}/trust-accounts",
            get(list_accounts).post(create_account),
        )
        .route(
            "/organizations/{org_id}/trust-accounts/{account_id}",
            get(get_account),
        )
        .route(
            "/organizations/{org_id}/trust-accounts/{account_id}/close",
            post(close_account),
        )
        .route(
            "/organizations/{org_id}/trust-accounts/{account_id}/integrity",
            get(verify_integrity),
        )
        .route(
            "/organizations/{org_id}/trust-accounts/{account_id}/ledgers",
            get(list_ledgers).post(open_ledger),
        )
        .route(
            "/organizations/{org_id}/trust-compliance/alerts",
            get(compliance_alerts),
        )
        .route("/organizations/{org_id}/ledgers/{ledger_id}", get(get_ledger))
        .route(
            "/organizations/{org_id}/ledgers/{ledger_id}/close",
            post(close_ledger),
        )
        .route(
            "/organizations/{org_id}/ledgers/{ledger_id}/transactions",
            get(list_transactions).post(record_transaction),
        )
        .route(
            "/organizations/{org_id}/trust-transactions/{transaction_id}/reverse",
            post(reverse_transaction),
        )
}

/// Request body for opening a trust account.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Display name.
    pub name: String,
    /// Holding bank.
    pub bank_name: String,
    /// Last four digits of the bank account number.
    pub account_number_last4: Option<String>,
    /// Account type.
    pub account_type: TrustAccountType,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

/// Request body for opening a client ledger.
#[derive(Debug, Deserialize)]
pub struct OpenLedgerRequest {
    /// Client the funds belong to.
    pub client_id: Uuid,
    /// Matter, if the ledger is matter-specific.
    pub matter_id: Option<Uuid>,
    /// Display name.
    pub name: String,
}

/// Request body for recording a trust transaction.
#[derive(Debug, Deserialize)]
pub struct RecordTransactionRequest {
    /// Transaction type.
    pub transaction_type: TrustTransactionType,
    /// Positive amount in major units, e.g. `"500.00"`.
    pub amount: Decimal,
    /// Description.
    pub description: String,
    /// Transaction date.
    pub transaction_date: NaiveDate,
    /// Check number or wire reference.
    pub reference: Option<String>,
}

/// Request body for reversing a trust transaction.
#[derive(Debug, Deserialize)]
pub struct ReverseRequest {
    /// Why the transaction is reversed.
    pub reason: String,
}

fn repo(state: &AppState) -> TrustRepository {
    TrustRepository::new((*state.db).clone())
}

async fn create_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
    Json(body): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let account = repo(&state)
        .create_account(CreateTrustAccountInput {
            organization_id: org,
            name: body.name,
            bank_name: body.bank_name,
            account_number_last4: body.account_number_last4,
            account_type: body.account_type,
            currency: body.currency,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn list_accounts(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let accounts = repo(&state).list_accounts(org).await?;
    Ok(Json(json!({ "trust_accounts": accounts })))
}

async fn get_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, account_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let account = repo(&state)
        .get_account(org, TrustAccountId::from_uuid(account_id))
        .await?;
    Ok(Json(account))
}

async fn close_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, account_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let account = repo(&state)
        .close_account(org, TrustAccountId::from_uuid(account_id))
        .await?;
    Ok(Json(account))
}

async fn verify_integrity(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, account_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let report = repo(&state)
        .verify_integrity(org, TrustAccountId::from_uuid(account_id))
        .await?;
    Ok(Json(report))
}

async fn list_ledgers(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, account_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let ledgers = repo(&state)
        .list_ledgers(org, TrustAccountId::from_uuid(account_id))
        .await?;
    Ok(Json(json!({ "ledgers": ledgers })))
}

async fn open_ledger(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, account_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<OpenLedgerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let ledger = repo(&state)
        .open_ledger(
            org,
            TrustAccountId::from_uuid(account_id),
            OpenLedgerInput {
                client_id: ClientId::from_uuid(body.client_id),
                matter_id: body.matter_id.map(MatterId::from_uuid),
                name: body.name,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ledger)))
}

async fn compliance_alerts(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let alerts = repo(&state)
        .compliance_alerts(org, ComplianceThresholds::from(&*state.trust))
        .await?;
    Ok(Json(json!({ "alerts": alerts })))
}

async fn get_ledger(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, ledger_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let ledger = repo(&state)
        .get_ledger(org, ClientLedgerId::from_uuid(ledger_id))
        .await?;
    Ok(Json(ledger))
}

async fn close_ledger(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, ledger_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let ledger = repo(&state)
        .close_ledger(org, ClientLedgerId::from_uuid(ledger_id))
        .await?;
    Ok(Json(ledger))
}

async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, ledger_id)): Path<(Uuid, Uuid)>,
    Query(page): Query<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let transactions = repo(&state)
        .list_transactions(org, ClientLedgerId::from_uuid(ledger_id), &page)
        .await?;
    Ok(Json(transactions))
}

async fn record_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, ledger_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<RecordTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let ledger_id = ClientLedgerId::from_uuid(ledger_id);
    let repo = repo(&state);

    let currency = repo.get_ledger(org, ledger_id).await?.balance.currency;
    let amount = Money::from_decimal(body.amount, currency).map_err(AppError::from)?;
    let posting = repo
        .record_transaction(
            org,
            ledger_id,
            RecordTransactionInput {
                transaction_type: body.transaction_type,
                amount,
                description: body.description,
                transaction_date: body.transaction_date,
                reference: body.reference,
                created_by: auth.user_id(),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(posting)))
}

async fn reverse_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, transaction_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ReverseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let posting = repo(&state)
        .reverse_transaction(
            org,
            TrustTransactionId::from_uuid(transaction_id),
            &body.reason,
            auth.user_id(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(posting)))
}
