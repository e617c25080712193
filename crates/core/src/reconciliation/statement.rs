//! Bank statement CSV parser.
//!
//! Header-driven: columns are located by name, so exports from different banks
//! work as long as they use one of the common header spellings. Amounts come
//! either from a single signed column or from separate debit/credit columns.

use std::io::Read;

use chrono::NaiveDate;
use frith_shared::{Currency, Money};

use super::error::ReconciliationError;
use super::types::ParsedStatementLine;

const DATE_HEADERS: &[&str] = &["date", "transaction date", "posted date", "posting date"];
const DESCRIPTION_HEADERS: &[&str] = &["description", "name", "memo", "details", "payee"];
const AMOUNT_HEADERS: &[&str] = &["amount", "transaction amount", "amt"];
const DEBIT_HEADERS: &[&str] = &["debit", "withdrawal", "withdrawals"];
const CREDIT_HEADERS: &[&str] = &["credit", "deposit", "deposits"];
const REFERENCE_HEADERS: &[&str] = &["reference", "check number", "check", "fitid", "ref"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y", "%m/%d/%y"];

/// Where the amount of each row comes from.
enum AmountColumns {
    Signed(usize),
    Split { debit: usize, credit: usize },
}

struct Columns {
    date: usize,
    description: usize,
    amount: AmountColumns,
    reference: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, ReconciliationError> {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
            .collect();
        let find = |aliases: &[&str]| {
            normalized
                .iter()
                .position(|h| aliases.contains(&h.as_str()))
        };

        let date = find(DATE_HEADERS).ok_or(ReconciliationError::MissingColumn("date"))?;
        let description =
            find(DESCRIPTION_HEADERS).ok_or(ReconciliationError::MissingColumn("description"))?;
        let amount = match (find(AMOUNT_HEADERS), find(DEBIT_HEADERS), find(CREDIT_HEADERS)) {
            (Some(idx), _, _) => AmountColumns::Signed(idx),
            (None, Some(debit), Some(credit)) => AmountColumns::Split { debit, credit },
            _ => return Err(ReconciliationError::MissingColumn("amount")),
        };

        Ok(Self {
            date,
            description,
            amount,
            reference: find(REFERENCE_HEADERS),
        })
    }
}

/// Parses a CSV bank statement into signed lines.
///
/// Credits are positive and debits negative. Blank rows are skipped.
///
/// # Errors
///
/// Returns `MissingColumn` when a required header is absent and
/// `StatementParse` for malformed rows, dates, or amounts.
pub fn parse_csv<R: Read>(
    input: R,
    currency: Currency,
) -> Result<Vec<ParsedStatementLine>, ReconciliationError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader.headers().map_err(|e| parse_error(1, &e))?.clone();
    let columns = Columns::locate(&headers)?;

    let mut lines = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index as u64 + 2;
        let record = record.map_err(|e| parse_error(line, &e))?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let field = |idx: usize| record.get(idx).unwrap_or("");

        let date = parse_date(field(columns.date)).ok_or_else(|| {
            ReconciliationError::StatementParse {
                line,
                message: format!("unrecognized date '{}'", field(columns.date)),
            }
        })?;

        let amount = match columns.amount {
            AmountColumns::Signed(idx) => parse_amount(field(idx), currency, line)?,
            AmountColumns::Split { debit, credit } => {
                let credit = parse_optional_amount(field(credit), currency, line)?;
                let debit = parse_optional_amount(field(debit), currency, line)?;
                credit.subtract(&debit.abs()?)?
            }
        };

        let reference = columns
            .reference
            .map(field)
            .filter(|r| !r.is_empty())
            .map(ToString::to_string);

        lines.push(ParsedStatementLine {
            date,
            amount,
            description: field(columns.description).to_string(),
            reference,
        });
    }

    Ok(lines)
}

fn parse_error(line: u64, err: &csv::Error) -> ReconciliationError {
    ReconciliationError::StatementParse {
        line,
        message: err.to_string(),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn parse_optional_amount(
    raw: &str,
    currency: Currency,
    line: u64,
) -> Result<Money, ReconciliationError> {
    if raw.is_empty() {
        Ok(Money::zero(currency))
    } else {
        parse_amount(raw, currency, line)
    }
}

/// Accepts `1234.56`, `-1,234.56`, `$1,234.56`, `(1,234.56)` and `+12`.
fn parse_amount(raw: &str, currency: Currency, line: u64) -> Result<Money, ReconciliationError> {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' ' | '+'))
        .collect();

    let negative = cleaned.starts_with('(') && cleaned.ends_with(')');
    if negative {
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }

    let amount = Money::parse(&cleaned, currency).map_err(|e| {
        ReconciliationError::StatementParse {
            line,
            message: format!("invalid amount '{raw}': {e}"),
        }
    })?;

    if negative {
        Ok(amount.negate()?)
    } else {
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::USD)
    }

    #[test]
    fn test_signed_amount_column() {
        let csv = "\
Date,Description,Amount,Check Number
2026-03-02,Deposit - Acme retainer,\"5,000.00\",
03/05/2026,Check 1042,-1200.50,1042
";
        let lines = parse_csv(csv.as_bytes(), Currency::USD).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].amount, usd(500_000));
        assert_eq!(lines[0].reference, None);
        assert_eq!(lines[1].date, NaiveDate::from_ymd_opt(2026, 3, 5).unwrap());
        assert_eq!(lines[1].amount, usd(-120_050));
        assert_eq!(lines[1].reference.as_deref(), Some("1042"));
    }

    #[test]
    fn test_debit_credit_columns() {
        let csv = "\
Posted Date,Payee,Debit,Credit
2026-03-02,Wire in,,2500.00
2026-03-03,Service charge,$15.00,
2026-03-04,Returned item,(40.00),
";
        let lines = parse_csv(csv.as_bytes(), Currency::USD).unwrap();
        let amounts: Vec<Money> = lines.iter().map(|l| l.amount).collect();
        assert_eq!(amounts, vec![usd(250_000), usd(-1_500), usd(-4_000)]);
    }

    #[test]
    fn test_missing_columns() {
        let err = parse_csv("Description,Amount\nx,1\n".as_bytes(), Currency::USD).unwrap_err();
        assert!(matches!(err, ReconciliationError::MissingColumn("date")));

        let err = parse_csv("Date,Memo\n2026-01-01,x\n".as_bytes(), Currency::USD).unwrap_err();
        assert!(matches!(err, ReconciliationError::MissingColumn("amount")));
    }

    #[test]
    fn test_bad_rows_report_line_number() {
        let csv = "Date,Description,Amount\n2026-03-01,ok,1.00\nnot-a-date,bad,1.00\n";
        match parse_csv(csv.as_bytes(), Currency::USD) {
            Err(ReconciliationError::StatementParse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected StatementParse, got {other:?}"),
        }

        let csv = "Date,Description,Amount\n2026-03-01,too precise,1.005\n";
        assert!(matches!(
            parse_csv(csv.as_bytes(), Currency::USD),
            Err(ReconciliationError::StatementParse { line: 2, .. })
        ));
    }
}
