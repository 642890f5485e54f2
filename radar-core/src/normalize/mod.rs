//! Total normalization of provider payloads into canonical shapes.
//!
//! Providers return loosely-typed JSON whose field names vary between vendors
//! and between the state agencies a single vendor fronts. Each provider gets an
//! exhaustive normalizer built from the lenient accessors below; none of them
//! can fail, every absent or malformed field maps to a sentinel.

pub mod direct;
pub mod gateway;

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::canonical::{FineItem, UNKNOWN};

/// Resolve a dot-notation path (`owner.name`, `items.0.value`).
pub fn resolve_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(data);
    }

    let mut current = data;
    for part in path.split('.') {
        current = match current {
            Value::Object(obj) => obj.get(part)?,
            Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// First path that resolves to a non-null value.
pub fn pick<'a>(data: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| resolve_path(data, path))
        .find(|v| !v.is_null())
}

/// String field, or [`UNKNOWN`].
pub fn text(data: &Value, paths: &[&str]) -> String {
    pick(data, paths)
        .and_then(value_to_text)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Money field rounded to two fraction digits, or zero.
///
/// Accepts JSON numbers, `"1234.56"` and Brazilian formatting (`"R$ 1.234,56"`).
pub fn money(data: &Value, paths: &[&str]) -> Decimal {
    pick(data, paths)
        .and_then(value_to_decimal)
        .unwrap_or(Decimal::ZERO)
        .round_dp(2)
}

fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Decimal::from(i)),
            None => n.as_f64().and_then(Decimal::from_f64),
        },
        Value::String(s) => parse_money_text(s),
        _ => None,
    }
}

fn parse_money_text(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let canonical = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };
    Decimal::from_str(&canonical).ok()
}

/// Non-negative integer field, or zero.
pub fn count(data: &Value, paths: &[&str]) -> u32 {
    let Some(value) = pick(data, paths) else {
        return 0;
    };
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s
            .trim()
            .split_whitespace()
            .next()
            .and_then(|first| first.parse::<i64>().ok()),
        _ => None,
    };
    parsed
        .map(|n| u32::try_from(n.max(0)).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Model year, or zero. Understands `"2019/2020"` (manufacture/model).
pub fn year(data: &Value, paths: &[&str]) -> u32 {
    match pick(data, paths) {
        Some(Value::String(s)) => s
            .rsplit('/')
            .next()
            .and_then(|part| part.trim().parse::<u32>().ok())
            .filter(|y| (1900..=2200).contains(y))
            .unwrap_or(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|y| u32::try_from(y).ok())
            .filter(|y| (1900..=2200).contains(y))
            .unwrap_or(0),
        _ => 0,
    }
}

/// ISO-8601 date (`YYYY-MM-DD`), or [`UNKNOWN`].
pub fn date(data: &Value, paths: &[&str]) -> String {
    pick(data, paths)
        .and_then(|v| v.as_str())
        .and_then(parse_date)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%d/%m/%Y %H:%M")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%d/%m/%Y %H:%M:%S"))
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
                .map(|dt| dt.date())
                .ok()
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()).ok())
}

/// List field. A single object where a list is expected counts as one item.
pub fn list<'a>(data: &'a Value, paths: &[&str]) -> Vec<&'a Value> {
    match pick(data, paths) {
        Some(Value::Array(items)) => items.iter().filter(|v| v.is_object()).collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    }
}

/// Field paths for one provider's fine representation.
pub struct FineFields {
    pub auto_number: &'static [&'static str],
    pub date: &'static [&'static str],
    pub description: &'static [&'static str],
    pub value: &'static [&'static str],
    pub points: &'static [&'static str],
    pub status: &'static [&'static str],
    pub location: &'static [&'static str],
}

impl FineFields {
    pub fn normalize(&self, item: &Value) -> FineItem {
        FineItem {
            auto_number: text(item, self.auto_number),
            date: date(item, self.date),
            description: text(item, self.description),
            value: money(item, self.value),
            points: count(item, self.points),
            status: text(item, self.status),
            location: text(item, self.location),
        }
    }

    pub fn normalize_all(&self, data: &Value, paths: &[&str]) -> Vec<FineItem> {
        list(data, paths)
            .into_iter()
            .map(|item| self.normalize(item))
            .collect()
    }
}

/// Sum of fine values, used when a provider omits the total. Saturates.
pub fn total_value(fines: &[FineItem]) -> Decimal {
    fines
        .iter()
        .try_fold(Decimal::ZERO, |acc, f| acc.checked_add(f.value))
        .unwrap_or(Decimal::MAX)
        .round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_nested_and_indexed_paths() {
        let data = json!({"owner": {"name": "Ana"}, "fines": [{"value": 10}]});
        assert_eq!(resolve_path(&data, "owner.name"), Some(&json!("Ana")));
        assert_eq!(resolve_path(&data, "fines.0.value"), Some(&json!(10)));
        assert_eq!(resolve_path(&data, "fines.x"), None);
        assert_eq!(resolve_path(&data, ""), Some(&data));
    }

    #[test]
    fn test_pick_skips_nulls() {
        let data = json!({"nome": null, "nome_condutor": "Joao"});
        assert_eq!(text(&data, &["nome", "nome_condutor"]), "Joao");
        assert_eq!(text(&data, &["missing"]), UNKNOWN);
        assert_eq!(text(&json!({"nome": "   "}), &["nome"]), UNKNOWN);
    }

    #[test]
    fn test_money_formats() {
        let data = json!({"a": "R$ 1.234,56", "b": 130.16, "c": "88.5", "d": 100, "e": "n/a"});
        assert_eq!(money(&data, &["a"]).to_string(), "1234.56");
        assert_eq!(money(&data, &["b"]).to_string(), "130.16");
        assert_eq!(money(&data, &["c"]).to_string(), "88.5");
        assert_eq!(money(&data, &["d"]).to_string(), "100");
        assert_eq!(money(&data, &["e"]), Decimal::ZERO);
        assert_eq!(money(&data, &["missing"]), Decimal::ZERO);
    }

    #[test]
    fn test_count_and_year() {
        let data = json!({"p": "7 pontos", "n": -3, "f": 4.9, "y": "2019/2020", "z": 1850});
        assert_eq!(count(&data, &["p"]), 7);
        assert_eq!(count(&data, &["n"]), 0);
        assert_eq!(count(&data, &["f"]), 4);
        assert_eq!(year(&data, &["y"]), 2020);
        assert_eq!(year(&data, &["z"]), 0);
    }

    #[test]
    fn test_dates_become_iso() {
        let data = json!({
            "br": "05/03/2024", "iso": "2024-03-05", "dt": "05/03/2024 14:30",
            "rfc": "2024-03-05T10:00:00-03:00", "bad": "yesterday"
        });
        for key in ["br", "iso", "dt", "rfc"] {
            assert_eq!(date(&data, &[key]), "2024-03-05", "format {key}");
        }
        assert_eq!(date(&data, &["bad"]), UNKNOWN);
    }

    #[test]
    fn test_list_accepts_single_object() {
        let data = json!({"multa": {"valor": 1}, "multas": [{"valor": 1}, 3, {"valor": 2}]});
        assert_eq!(list(&data, &["multa"]).len(), 1);
        assert_eq!(list(&data, &["multas"]).len(), 2);
        assert!(list(&data, &["none"]).is_empty());
    }
}
