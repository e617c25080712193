//! Currency display formatting.
//!
//! Arithmetic lives on `frith_shared::Money`; this module only turns amounts
//! into text.

pub mod format;

pub use format::{MoneyFormat, format_money};
