//! Invoicing and payments.
//!
//! This module implements the invoice ledger:
//! - Draft invoices with typed line items (time, expense, fixed fee)
//! - Totals with pluggable tax calculation
//! - The draft → approval → sent → paid workflow, with derived overdue status
//! - Payments with an explicit overpayment policy, write-offs, cancellation

pub mod error;
pub mod service;
pub mod tax;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::BillingError;
pub use service::InvoiceLedger;
pub use tax::{FlatRateTax, NoTax, TaxCalculator};
pub use types::{
    Invoice, InvoiceNumber, InvoiceStatus, LineItem, LineItemKind, NewInvoice, NewLineItem,
    OverpaymentPolicy, Payment, PaymentInput, PaymentMethod,
};
