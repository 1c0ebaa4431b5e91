//! Header resolution and tolerant value parsing for imported files

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

/// Column description generated by `#[derive(CsvFields)]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvField {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
    pub aliases: &'static [&'static str],
}

impl CsvField {
    fn matches(&self, normalized: &str) -> bool {
        normalize_header(self.name) == normalized
            || self.aliases.iter().any(|a| normalize_header(a) == normalized)
    }
}

/// Lowercase and drop everything but letters and digits, so
/// "No. of Shares", "no_of_shares" and " NO OF SHARES " compare equal.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Maps logical field names to column positions in one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<&'static str, usize>,
}

impl ColumnMap {
    /// Resolve each header to the first field it names. A field claimed by
    /// two headers keeps the leftmost one. Returns the names of required
    /// fields no header resolved to.
    pub fn resolve(
        headers: &StringRecord,
        fields: &'static [CsvField],
    ) -> Result<ColumnMap, Vec<&'static str>> {
        let mut columns = HashMap::new();
        for (index, header) in headers.iter().enumerate() {
            let normalized = normalize_header(header);
            if normalized.is_empty() {
                continue;
            }
            // canonical names win over aliases
            let field = fields
                .iter()
                .find(|f| normalize_header(f.name) == normalized)
                .or_else(|| fields.iter().find(|f| f.matches(&normalized)));
            match field {
                Some(field) => {
                    columns.entry(field.name).or_insert(index);
                }
                None => log::debug!("ignoring unrecognised column '{}'", header),
            }
        }

        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|f| f.required && !columns.contains_key(f.name))
            .map(|f| f.name)
            .collect();
        if missing.is_empty() {
            Ok(ColumnMap { columns })
        } else {
            Err(missing)
        }
    }

    pub fn get(&self, field: &str) -> Option<usize> {
        self.columns.get(field).copied()
    }

    /// Reorder a data row into the canonical field order. Cells beyond the
    /// end of a short row read as empty.
    pub fn canonical(&self, record: &StringRecord, fields: &[CsvField]) -> StringRecord {
        fields
            .iter()
            .map(|f| {
                self.get(f.name)
                    .and_then(|i| record.get(i))
                    .unwrap_or("")
                    .trim()
            })
            .collect()
    }
}

/// Header record with the canonical field names
pub fn canonical_headers(fields: &[CsvField]) -> StringRecord {
    fields.iter().map(|f| f.name).collect()
}

/// Parse a human-formatted number.
///
/// Accepts thousands separators, currency symbols, surrounding whitespace,
/// accounting-style parentheses for negatives and scientific notation.
/// Empty input is `Ok(None)`.
pub fn parse_decimal(raw: &str) -> Result<Option<Decimal>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };
    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '€' | '£' | '¥' | '\'' | '_') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Err(format!("no digits in '{}'", raw));
    }
    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|e| format!("invalid number '{}': {}", raw, e))?;
    Ok(Some(if negative { -value } else { value }))
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%d-%b-%Y", "%b %d, %Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"];

/// Parse a date, trying `preferred` before the built-in formats. Timestamps
/// are truncated to their date.
pub fn parse_date(raw: &str, preferred: Option<&str>) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(format) = preferred {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                .map(|dt| dt.date())
        })
}
