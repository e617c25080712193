//! Tax calculation seam.
//!
//! Tax rules live outside this crate. Invoices ask a [`TaxCalculator`] for the
//! tax on their current lines when totals are finalized.

use std::collections::HashMap;

use rust_decimal::Decimal;

use frith_shared::Money;

use super::error::BillingError;
use super::types::Invoice;

/// Computes tax for an invoice.
#[cfg_attr(test, mockall::automock)]
pub trait TaxCalculator: Send + Sync {
    /// Returns the total tax owed on `invoice`'s line items, in the invoice
    /// currency.
    fn calculate(&self, invoice: &Invoice) -> Result<Money, BillingError>;
}

/// No tax at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTax;

impl TaxCalculator for NoTax {
    fn calculate(&self, invoice: &Invoice) -> Result<Money, BillingError> {
        Ok(Money::zero(invoice.currency))
    }
}

/// Fixed percentage per tax code, applied line by line.
///
/// Lines without a tax code are not taxed. Codes missing from the table fall
/// back to `default_rate`.
#[derive(Debug, Clone, Default)]
pub struct FlatRateTax {
    rates: HashMap<String, Decimal>,
    default_rate: Decimal,
}

impl FlatRateTax {
    /// Creates a calculator with a fallback rate (e.g. `0.08` for 8%).
    #[must_use]
    pub fn new(default_rate: Decimal) -> Self {
        Self {
            rates: HashMap::new(),
            default_rate,
        }
    }

    /// Adds a rate for one tax code.
    #[must_use]
    pub fn with_rate(mut self, tax_code: impl Into<String>, rate: Decimal) -> Self {
        self.rates.insert(tax_code.into(), rate);
        self
    }
}

impl TaxCalculator for FlatRateTax {
    fn calculate(&self, invoice: &Invoice) -> Result<Money, BillingError> {
        let mut tax = Money::zero(invoice.currency);
        for line in &invoice.line_items {
            let Some(code) = line.tax_code.as_deref() else {
                continue;
            };
            let rate = self.rates.get(code).copied().unwrap_or(self.default_rate);
            tax = tax.add(&line.amount.multiply(rate)?)?;
        }
        Ok(tax)
    }
}
