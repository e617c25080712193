//! Invoice, payment and rendering routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use frith_core::billing::{
    FlatRateTax, Invoice, InvoiceStatus, LineItemKind, NewInvoice, NewLineItem, NoTax,
    OverpaymentPolicy, PaymentInput, PaymentMethod, TaxCalculator,
};
use frith_core::render::{InvoiceRenderer, TemplateConfig};
use frith_db::InvoiceRepository;
use frith_shared::types::{ClientId, InvoiceId, MatterId, OrganizationId, PageRequest};
use frith_shared::{AppError, Currency, Money};

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the invoice routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/organizations/{org_id}/invoices",
            get(list_invoices).post(create_invoice),
        )
        .route(
            "/organizations/{org_id}/invoices/{invoice_id}",
            get(get_invoice),
        )
        .route(
            "/organizations/{org_id}/invoices/{invoice_id}/line-items",
            post(add_line_item),
        )
        .route(
            "/organizations/{org_id}/invoices/{invoice_id}/finalize",
            post(finalize_totals),
        )
        .route(
            "/organizations/{org_id}/invoices/{invoice_id}/submit",
            post(submit),
        )
        .route(
            "/organizations/{org_id}/invoices/{invoice_id}/approve",
            post(approve),
        )
        .route(
            "/organizations/{org_id}/invoices/{invoice_id}/reject",
            post(reject),
        )
        .route("/organizations/{org_id}/invoices/{invoice_id}/send", post(send))
        .route(
            "/organizations/{org_id}/invoices/{invoice_id}/view",
            post(mark_viewed),
        )
        .route(
            "/organizations/{org_id}/invoices/{invoice_id}/cancel",
            post(cancel),
        )
        .route(
            "/organizations/{org_id}/invoices/{invoice_id}/payments",
            get(list_payments).post(apply_payment),
        )
        .route(
            "/organizations/{org_id}/invoices/{invoice_id}/write-off",
            post(write_off),
        )
        .route(
            "/organizations/{org_id}/invoices/{invoice_id}/render",
            post(render),
        )
}

/// Invoice as returned to clients, with the status as of today.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    /// Stored invoice.
    #[serde(flatten)]
    pub invoice: Invoice,
    /// `overdue` for sent or viewed invoices past due with a balance.
    pub effective_status: InvoiceStatus,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        let effective_status = invoice.effective_status(Utc::now().date_naive());
        Self {
            invoice,
            effective_status,
        }
    }
}

/// Request body for creating a draft invoice.
#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    /// Billed client.
    pub client_id: Uuid,
    /// Optional matter.
    pub matter_id: Option<Uuid>,
    /// ISO 4217 currency code.
    pub currency: Currency,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Due date; defaults from billing config.
    pub due_date: Option<NaiveDate>,
    /// Notes.
    pub notes: Option<String>,
    /// Payment terms.
    pub terms: Option<String>,
}

/// Request body for adding a line item.
#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    /// Kind of line.
    pub kind: LineItemKind,
    /// Description.
    pub description: String,
    /// Hours or units.
    pub quantity: Decimal,
    /// Rate in major units.
    pub rate: Decimal,
    /// Tax category.
    pub tax_code: Option<String>,
    /// UTBMS code.
    pub billing_code: Option<String>,
    /// Service date.
    pub service_date: Option<NaiveDate>,
}

/// Request body for computing totals.
#[derive(Debug, Default, Deserialize)]
pub struct FinalizeRequest {
    /// Flat tax rate, e.g. `0.08`. No tax when absent.
    pub tax_rate: Option<Decimal>,
}

/// Request body carrying a reason.
#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    /// Free-form reason.
    pub reason: String,
}

/// Request body for applying a payment.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    /// Amount in major units.
    pub amount: Decimal,
    /// Payment method.
    pub method: PaymentMethod,
    /// Date received.
    pub payment_date: NaiveDate,
    /// Check number or wire reference.
    pub reference: Option<String>,
    /// Overpayment handling; rejects by default.
    #[serde(default)]
    pub overpayment_policy: OverpaymentPolicy,
}

/// Request body for a write-off.
#[derive(Debug, Deserialize)]
pub struct WriteOffRequest {
    /// Amount in major units.
    pub amount: Decimal,
    /// Why the balance is written off.
    pub reason: String,
}

fn repo(state: &AppState) -> InvoiceRepository {
    InvoiceRepository::new((*state.db).clone(), (*state.billing).clone())
}

fn money(amount: Decimal, currency: Currency) -> Result<Money, ApiError> {
    Ok(Money::from_decimal(amount, currency).map_err(AppError::from)?)
}

async fn invoice_currency(
    repo: &InvoiceRepository,
    org: OrganizationId,
    invoice_id: InvoiceId,
) -> Result<Currency, ApiError> {
    Ok(repo.get_invoice(org, invoice_id).await?.currency)
}

async fn create_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
    Json(body): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let invoice = repo(&state)
        .create_invoice(
            org,
            NewInvoice {
                client_id: ClientId::from_uuid(body.client_id),
                matter_id: body.matter_id.map(MatterId::from_uuid),
                currency: body.currency,
                issue_date: body.issue_date,
                due_date: body.due_date,
                notes: body.notes,
                terms: body.terms,
                created_by: auth.user_id(),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(InvoiceResponse::from(invoice))))
}

async fn list_invoices(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
    Query(page): Query<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let invoices = repo(&state).list_invoices(org, &page).await?;
    Ok(Json(invoices.map(InvoiceResponse::from)))
}

async fn get_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, invoice_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let invoice = repo(&state)
        .get_invoice(org, InvoiceId::from_uuid(invoice_id))
        .await?;
    Ok(Json(InvoiceResponse::from(invoice)))
}

async fn add_line_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, invoice_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<LineItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let invoice_id = InvoiceId::from_uuid(invoice_id);
    let repo = repo(&state);
    let currency = invoice_currency(&repo, org, invoice_id).await?;

    let line = repo
        .add_line_item(
            org,
            invoice_id,
            NewLineItem {
                kind: body.kind,
                description: body.description,
                quantity: body.quantity,
                rate: money(body.rate, currency)?,
                tax_code: body.tax_code,
                billing_code: body.billing_code,
                service_date: body.service_date,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(line)))
}

async fn finalize_totals(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, invoice_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<FinalizeRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let Json(body) = body.unwrap_or_default();
    let tax: Box<dyn TaxCalculator> = match body.tax_rate {
        Some(rate) => Box::new(FlatRateTax::new(rate)),
        None => Box::new(NoTax),
    };
    let invoice = repo(&state)
        .finalize_totals(org, InvoiceId::from_uuid(invoice_id), tax.as_ref())
        .await?;
    Ok(Json(InvoiceResponse::from(invoice)))
}

async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, invoice_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let invoice = repo(&state)
        .submit_for_approval(org, InvoiceId::from_uuid(invoice_id))
        .await?;
    Ok(Json(InvoiceResponse::from(invoice)))
}

async fn approve(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, invoice_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let invoice = repo(&state)
        .approve(org, InvoiceId::from_uuid(invoice_id), auth.user_id())
        .await?;
    Ok(Json(InvoiceResponse::from(invoice)))
}

async fn reject(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, invoice_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ReasonRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let invoice = repo(&state)
        .reject(org, InvoiceId::from_uuid(invoice_id), &body.reason)
        .await?;
    Ok(Json(InvoiceResponse::from(invoice)))
}

async fn send(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, invoice_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let invoice = repo(&state)
        .send(org, InvoiceId::from_uuid(invoice_id))
        .await?;
    Ok(Json(InvoiceResponse::from(invoice)))
}

async fn mark_viewed(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, invoice_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let invoice = repo(&state)
        .mark_viewed(org, InvoiceId::from_uuid(invoice_id))
        .await?;
    Ok(Json(InvoiceResponse::from(invoice)))
}

async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, invoice_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let invoice = repo(&state)
        .cancel(org, InvoiceId::from_uuid(invoice_id))
        .await?;
    Ok(Json(InvoiceResponse::from(invoice)))
}

async fn apply_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, invoice_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<PaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let invoice_id = InvoiceId::from_uuid(invoice_id);
    let repo = repo(&state);
    let currency = invoice_currency(&repo, org, invoice_id).await?;

    let (invoice, payment) = repo
        .apply_payment(
            org,
            invoice_id,
            PaymentInput {
                amount: money(body.amount, currency)?,
                method: body.method,
                payment_date: body.payment_date,
                reference: body.reference,
                recorded_by: auth.user_id(),
            },
            body.overpayment_policy,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "invoice": InvoiceResponse::from(invoice),
            "payment": payment,
        })),
    ))
}

async fn list_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, invoice_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let payments = repo(&state)
        .list_payments(org, InvoiceId::from_uuid(invoice_id))
        .await?;
    Ok(Json(serde_json::json!({ "payments": payments })))
}

async fn write_off(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, invoice_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<WriteOffRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let invoice_id = InvoiceId::from_uuid(invoice_id);
    let repo = repo(&state);
    let currency = invoice_currency(&repo, org, invoice_id).await?;

    let invoice = repo
        .write_off(org, invoice_id, money(body.amount, currency)?, &body.reason)
        .await?;
    Ok(Json(InvoiceResponse::from(invoice)))
}

async fn render(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((org_id, invoice_id)): Path<(Uuid, Uuid)>,
    template: Option<Json<TemplateConfig>>,
) -> Result<impl IntoResponse, ApiError> {
    let org = auth.scope(org_id)?;
    let Json(template) = template.unwrap_or_default();
    let invoice = repo(&state)
        .get_invoice(org, InvoiceId::from_uuid(invoice_id))
        .await?;
    let document = InvoiceRenderer::render(&invoice, &template)?;
    Ok(Json(document))
}
