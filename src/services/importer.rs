//! Coresignal company import
//!
//! Reads a newline-delimited JSON export and upserts each usable record into the
//! catalog by name. Records without a name, location or founding year are skipped.
use std::io::BufRead;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::{
    db::CompanyStore,
    error::AppResult,
    models::{CoresignalFundingRound, CoresignalRecord, NewCompany},
};

const DEFAULT_SECTOR: &str = "Other";
const UNKNOWN_ROUND: &str = "Unknown";

/// Outcome of an import run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Lines that were not valid JSON, with their 1-based line numbers
    pub parse_errors: Vec<(usize, String)>,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated
    }
}

/// Parses every non-blank line of an NDJSON export
///
/// Lines that fail to parse are reported in the summary and otherwise ignored.
pub fn parse_records<R: BufRead>(
    reader: R,
    summary: &mut ImportSummary,
) -> std::io::Result<Vec<CoresignalRecord>> {
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<CoresignalRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => summary.parse_errors.push((index + 1, e.to_string())),
        }
    }

    Ok(records)
}

/// Parses human-formatted amounts such as "US$ 45.0M", "$1.5B" or "300K"
///
/// Anything unparseable counts as zero.
pub fn parse_funding_amount(raw: &str) -> Decimal {
    let cleaned = raw.replace("US$", "").replace('$', "");
    let cleaned = cleaned.trim().to_uppercase();

    let (number, multiplier) = if cleaned.contains('M') {
        (cleaned.replace('M', ""), Decimal::from(1_000_000))
    } else if cleaned.contains('B') {
        (cleaned.replace('B', ""), Decimal::from(1_000_000_000))
    } else if cleaned.contains('K') {
        (cleaned.replace('K', ""), Decimal::from(1_000))
    } else {
        (cleaned, Decimal::ONE)
    };

    Decimal::from_str(number.trim())
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .unwrap_or(Decimal::ZERO)
}

fn trimmed(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or("")
}

/// Reads an integer that may arrive as a JSON number or a numeric string
fn as_integer(value: &Option<serde_json::Value>) -> Option<i64> {
    match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn latest_round(record: &CoresignalRecord) -> Option<CoresignalFundingRound> {
    record
        .company_funding_rounds_collection
        .as_ref()?
        .as_array()?
        .last()
        .and_then(|round| serde_json::from_value(round.clone()).ok())
}

/// Maps a Coresignal record onto a catalog entry, or `None` if it lacks a name,
/// a location or a nonzero founding year. Exports carry no growth figure, so
/// imports leave a company's stored growth untouched.
pub fn to_new_company(record: &CoresignalRecord) -> Option<NewCompany> {
    let name = trimmed(&record.name);
    if name.is_empty() {
        return None;
    }

    let city = trimmed(&record.headquarters_city);
    let state = trimmed(&record.headquarters_state);
    let joined = format!("{}, {}", city, state);
    let mut location = joined.trim_matches(|c| c == ',' || c == ' ').to_string();
    if location.is_empty() {
        location = trimmed(&record.headquarters_new_address).to_string();
    }

    let founding_year = as_integer(&record.founded)
        .filter(|year| *year != 0)
        .and_then(|y| i32::try_from(y).ok());

    let (Some(founding_year), false) = (founding_year, location.is_empty()) else {
        return None;
    };

    let sector = match trimmed(&record.industry) {
        "" => DEFAULT_SECTOR,
        industry => industry,
    };

    let (funding_round, funding) = match latest_round(record) {
        Some(round) => {
            let label = match trimmed(&round.last_round_type) {
                "" => UNKNOWN_ROUND,
                label => label,
            };
            let amount = round
                .last_round_money_raised
                .as_deref()
                .filter(|raw| !raw.is_empty())
                .map(parse_funding_amount)
                .unwrap_or(Decimal::ZERO);
            (label.to_string(), amount)
        }
        None => (UNKNOWN_ROUND.to_string(), Decimal::ZERO),
    };

    let num_employees = as_integer(&record.employees_count)
        .and_then(|n| i32::try_from(n).ok())
        .unwrap_or(0);

    Some(NewCompany {
        name: name.to_string(),
        sector: sector.to_string(),
        funding_round,
        funding,
        location,
        num_employees,
        founding_year,
        growth_percentage: None,
        description: trimmed(&record.description).to_string(),
    })
}

/// Upserts parsed records into the catalog, tallying the outcome
pub async fn import_records(
    store: &dyn CompanyStore,
    records: &[CoresignalRecord],
    summary: &mut ImportSummary,
) -> AppResult<()> {
    for record in records {
        let Some(company) = to_new_company(record) else {
            summary.skipped += 1;
            continue;
        };

        let name = company.name.clone();
        match store.upsert_by_name(company).await {
            Ok((_, true)) => summary.created += 1,
            Ok((_, false)) => summary.updated += 1,
            Err(e) => {
                tracing::error!(company = %name, error = %e, "Failed to import company");
                summary.skipped += 1;
            }
        }
    }

    Ok(())
}
