//! Invoice and payment domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use frith_shared::types::{
    ClientId, InvoiceId, LineItemId, MatterId, OrganizationId, PaymentId, UserId,
};
use frith_shared::{Currency, Money};

/// Invoice status in the billing workflow.
///
/// The valid transitions are:
/// - Draft → PendingApproval (submit)
/// - PendingApproval → Approved (approve)
/// - PendingApproval → Draft (reject)
/// - Approved → Sent (send)
/// - Sent → Viewed (mark viewed)
/// - Approved/Sent/Viewed → Paid (balance reaches zero)
/// - Approved/Sent/Viewed → WrittenOff (write-off clears the balance)
/// - any non-terminal status without payments → Cancelled
///
/// `Overdue` is never stored; it is derived on read by
/// [`Invoice::effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Being drafted; line items can change.
    Draft,
    /// Submitted for internal review.
    PendingApproval,
    /// Approved, not yet sent.
    Approved,
    /// Delivered to the client.
    Sent,
    /// Opened by the client.
    Viewed,
    /// Balance due is zero.
    Paid,
    /// Past due with a balance outstanding.
    Overdue,
    /// Cancelled before any payment.
    Cancelled,
    /// Remaining balance written off.
    WrittenOff,
}

impl InvoiceStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Cancelled => "cancelled",
            Self::WrittenOff => "written_off",
        }
    }

    /// Parses a status from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending_approval" => Some(Self::PendingApproval),
            "approved" => Some(Self::Approved),
            "sent" => Some(Self::Sent),
            "viewed" => Some(Self::Viewed),
            "paid" => Some(Self::Paid),
            "overdue" => Some(Self::Overdue),
            "cancelled" => Some(Self::Cancelled),
            "written_off" => Some(Self::WrittenOff),
            _ => None,
        }
    }

    /// Returns true if line items may still change.
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Returns true if no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled | Self::WrittenOff)
    }

    /// Returns true if payments and write-offs may be applied.
    #[must_use]
    pub const fn is_payable(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Sent | Self::Viewed | Self::Overdue
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of billable line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    /// Hours at an hourly rate.
    Time,
    /// Disbursement or cost.
    Expense,
    /// Flat fee.
    FixedFee,
}

impl LineItemKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Expense => "expense",
            Self::FixedFee => "fixed_fee",
        }
    }

    /// Parses a kind from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "time" => Some(Self::Time),
            "expense" => Some(Self::Expense),
            "fixed_fee" => Some(Self::FixedFee),
            _ => None,
        }
    }
}

/// A single invoice line. `amount` is fixed when the line is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Line ID.
    pub id: LineItemId,
    /// 1-based position on the invoice.
    pub line_number: u32,
    /// Kind of line.
    pub kind: LineItemKind,
    /// Description printed on the invoice.
    pub description: String,
    /// Hours or units.
    pub quantity: Decimal,
    /// Price per unit.
    pub rate: Money,
    /// `rate × quantity`, rounded to the minor unit.
    pub amount: Money,
    /// Tax category, if taxable.
    pub tax_code: Option<String>,
    /// UTBMS task/activity code.
    pub billing_code: Option<String>,
    /// Date the work was performed.
    pub service_date: Option<NaiveDate>,
}

/// Input for adding a line item.
#[derive(Debug, Clone)]
pub struct NewLineItem {
    /// Kind of line.
    pub kind: LineItemKind,
    /// Description.
    pub description: String,
    /// Strictly positive quantity.
    pub quantity: Decimal,
    /// Non-negative rate in the invoice currency.
    pub rate: Money,
    /// Tax category.
    pub tax_code: Option<String>,
    /// UTBMS code.
    pub billing_code: Option<String>,
    /// Service date.
    pub service_date: Option<NaiveDate>,
}

/// Input for creating a draft invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    /// Billed client.
    pub client_id: ClientId,
    /// Optional matter.
    pub matter_id: Option<MatterId>,
    /// Invoice currency.
    pub currency: Currency,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Due date; defaults to the configured number of days after issue.
    pub due_date: Option<NaiveDate>,
    /// Free-form notes printed on the invoice.
    pub notes: Option<String>,
    /// Payment terms printed on the invoice.
    pub terms: Option<String>,
    /// Who created it.
    pub created_by: UserId,
}

/// An invoice with its line items and running totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice ID.
    pub id: InvoiceId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Billed client.
    pub client_id: ClientId,
    /// Optional matter.
    pub matter_id: Option<MatterId>,
    /// Organization-unique number, e.g. `FRITH-000042`.
    pub invoice_number: String,
    /// Currency of every amount on the invoice.
    pub currency: Currency,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Due date.
    pub due_date: NaiveDate,
    /// Stored status (never `Overdue`).
    pub status: InvoiceStatus,
    /// Lines in `line_number` order.
    pub line_items: Vec<LineItem>,
    /// Σ line amounts.
    pub subtotal: Money,
    /// Tax from the tax calculator.
    pub tax_amount: Money,
    /// `subtotal + tax_amount`.
    pub total_amount: Money,
    /// Σ payment amounts, including excess.
    pub paid_amount: Money,
    /// Portion of `paid_amount` beyond what was owed.
    pub overpayment_amount: Money,
    /// Amount written off.
    pub write_off_amount: Money,
    /// `max(0, total - paid - write_off)`.
    pub balance_due: Money,
    /// True once tax and totals have been computed for the current lines.
    pub totals_finalized: bool,
    /// Notes.
    pub notes: Option<String>,
    /// Terms.
    pub terms: Option<String>,
    /// Reason recorded with the write-off.
    pub write_off_reason: Option<String>,
    /// Who created it.
    pub created_by: UserId,
    /// Who approved it.
    pub approved_by: Option<UserId>,
    /// When it was sent.
    pub sent_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Status as seen on `today`: sent or viewed invoices with a balance past
    /// their due date read as `Overdue`.
    #[must_use]
    pub fn effective_status(&self, today: NaiveDate) -> InvoiceStatus {
        match self.status {
            InvoiceStatus::Sent | InvoiceStatus::Viewed
                if self.balance_due.is_positive() && today > self.due_date =>
            {
                InvoiceStatus::Overdue
            }
            status => status,
        }
    }
}

/// How the client paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paper check.
    Check,
    /// Wire transfer.
    Wire,
    /// ACH transfer.
    Ach,
    /// Card payment.
    CreditCard,
    /// Cash.
    Cash,
    /// Funds moved from the client's trust ledger.
    TrustTransfer,
    /// Anything else.
    Other,
}

impl PaymentMethod {
    /// Returns the string representation of the method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Wire => "wire",
            Self::Ach => "ach",
            Self::CreditCard => "credit_card",
            Self::Cash => "cash",
            Self::TrustTransfer => "trust_transfer",
            Self::Other => "other",
        }
    }

    /// Parses a method from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "check" => Some(Self::Check),
            "wire" => Some(Self::Wire),
            "ach" => Some(Self::Ach),
            "credit_card" => Some(Self::CreditCard),
            "cash" => Some(Self::Cash),
            "trust_transfer" => Some(Self::TrustTransfer),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// What to do with a payment larger than the balance due.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentPolicy {
    /// Refuse the payment.
    #[default]
    Reject,
    /// Accept it and record the excess as overpayment.
    RecordExcess,
}

/// Input for applying a payment.
#[derive(Debug, Clone)]
pub struct PaymentInput {
    /// Strictly positive amount in the invoice currency.
    pub amount: Money,
    /// Payment method.
    pub method: PaymentMethod,
    /// Date received.
    pub payment_date: NaiveDate,
    /// Check number, wire reference, etc.
    pub reference: Option<String>,
    /// Who recorded it.
    pub recorded_by: UserId,
}

/// A payment against exactly one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment ID.
    pub id: PaymentId,
    /// Invoice paid.
    pub invoice_id: InvoiceId,
    /// Full amount received.
    pub amount: Money,
    /// Portion that reduced the balance.
    pub applied_amount: Money,
    /// Portion beyond the balance due.
    pub excess_amount: Money,
    /// Payment method.
    pub method: PaymentMethod,
    /// Date received.
    pub payment_date: NaiveDate,
    /// Reference.
    pub reference: Option<String>,
    /// Who recorded it.
    pub recorded_by: UserId,
    /// When it was recorded.
    pub created_at: DateTime<Utc>,
}

/// Organization-scoped sequential invoice number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceNumber {
    /// Prefix, e.g. `FRITH`.
    pub prefix: String,
    /// Sequence value, starting at 1.
    pub sequence: u64,
    /// Minimum digits, zero-padded.
    pub width: usize,
}

impl InvoiceNumber {
    /// Number following `last_sequence`.
    #[must_use]
    pub fn next(prefix: &str, last_sequence: u64, width: usize) -> Self {
        Self {
            prefix: prefix.to_string(),
            sequence: last_sequence.saturating_add(1),
            width,
        }
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:0width$}", self.prefix, self.sequence, width = self.width)
    }
}
