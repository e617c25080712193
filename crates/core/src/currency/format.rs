//! Money formatting in symbol, code, or combined style.

use frith_shared::Money;
use num_format::{Locale, ToFormattedString as _};
use serde::{Deserialize, Serialize};

/// How a currency is shown next to an amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoneyFormat {
    /// `$1,234.56`
    #[default]
    Symbol,
    /// `1,234.56 USD`
    Code,
    /// `$1,234.56 USD`
    Both,
}

impl MoneyFormat {
    /// Returns the string representation of the style.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Symbol => "symbol",
            Self::Code => "code",
            Self::Both => "both",
        }
    }

    /// Parses a style from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "symbol" => Some(Self::Symbol),
            "code" => Some(Self::Code),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

/// Formats an amount with thousands grouping and the currency's minor-unit
/// precision.
///
/// Currencies without a symbol in the fixed table use their ISO code as the
/// symbol, separated by a space (`XYZ 1,234.56`). Negative amounts carry a
/// leading minus sign (`-$5.00`).
#[must_use]
pub fn format_money(money: &Money, style: MoneyFormat) -> String {
    let currency = money.currency;
    let code = currency.code();
    let number = grouped_number(money);
    let sign = if money.is_negative() { "-" } else { "" };

    match (style, currency.symbol()) {
        (MoneyFormat::Symbol, Some(symbol)) => format!("{sign}{symbol}{number}"),
        (MoneyFormat::Symbol, None) => format!("{sign}{code} {number}"),
        (MoneyFormat::Both, Some(symbol)) => format!("{sign}{symbol}{number} {code}"),
        (MoneyFormat::Code | MoneyFormat::Both, _) => format!("{sign}{number} {code}"),
    }
}

/// Unsigned magnitude with grouping, e.g. `1,234.56`.
fn grouped_number(money: &Money) -> String {
    let exponent = money.currency.minor_unit_exponent();
    let magnitude = money.minor_units.unsigned_abs();
    let scale = 10_u64.pow(exponent);
    let whole = (magnitude / scale).to_formatted_string(&Locale::en);

    if exponent == 0 {
        whole
    } else {
        let width = exponent as usize;
        format!("{whole}.{:0width$}", magnitude % scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frith_shared::Currency;
    use rstest::rstest;

    fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::USD)
    }

    #[rstest]
    #[case(MoneyFormat::Symbol, "$1,234.56")]
    #[case(MoneyFormat::Code, "1,234.56 USD")]
    #[case(MoneyFormat::Both, "$1,234.56 USD")]
    fn test_styles(#[case] style: MoneyFormat, #[case] expected: &str) {
        assert_eq!(format_money(&usd(123_456), style), expected);
    }

    #[test]
    fn test_small_and_zero_amounts() {
        assert_eq!(format_money(&usd(0), MoneyFormat::Symbol), "$0.00");
        assert_eq!(format_money(&usd(7), MoneyFormat::Symbol), "$0.07");
        assert_eq!(format_money(&usd(100_000_000), MoneyFormat::Symbol), "$1,000,000.00");
    }

    #[test]
    fn test_negative_amounts() {
        assert_eq!(format_money(&usd(-500), MoneyFormat::Symbol), "-$5.00");
        assert_eq!(format_money(&usd(-500), MoneyFormat::Code), "-5.00 USD");
    }

    #[test]
    fn test_unknown_currency_uses_code_as_symbol() {
        let xyz = Money::from_minor(123_456, Currency::new("XYZ").unwrap());
        assert_eq!(format_money(&xyz, MoneyFormat::Symbol), "XYZ 1,234.56");
        assert_eq!(format_money(&xyz, MoneyFormat::Both), "1,234.56 XYZ");
        assert_eq!(format_money(&xyz, MoneyFormat::Code), "1,234.56 XYZ");
    }

    #[test]
    fn test_zero_and_three_decimal_currencies() {
        let yen = Money::from_minor(1_500_000, Currency::JPY);
        assert_eq!(format_money(&yen, MoneyFormat::Symbol), "¥1,500,000");

        let dinar = Money::from_minor(12_345, Currency::new("KWD").unwrap());
        assert_eq!(format_money(&dinar, MoneyFormat::Code), "12.345 KWD");
    }

    #[test]
    fn test_extreme_values_do_not_panic() {
        let min = Money::from_minor(i64::MIN, Currency::USD);
        assert_eq!(
            format_money(&min, MoneyFormat::Code),
            "-92,233,720,368,547,758.08 USD"
        );
    }

    #[test]
    fn test_style_parse() {
        assert_eq!(MoneyFormat::parse("BOTH"), Some(MoneyFormat::Both));
        assert_eq!(MoneyFormat::parse("fancy"), None);
        assert_eq!(MoneyFormat::Code.as_str(), "code");
    }
}
