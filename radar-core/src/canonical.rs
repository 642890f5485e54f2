//! Canonical result shapes, one per search type.
//!
//! Normalized payloads are total: strings are never null (absent values become
//! [`UNKNOWN`]), numbers default to zero, lists default to empty. Money is a
//! decimal with two fraction digits, dates are ISO-8601.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::SearchType;

/// Sentinel for absent string fields.
pub const UNKNOWN: &str = "unknown";

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// Serializes money as a string with exactly two fraction digits.
pub mod money {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:.2}", value.round_dp(2)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(f64),
        }

        let value = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Decimal::from_str(&s).map_err(serde::de::Error::custom)?,
            Raw::Number(n) => Decimal::try_from(n).map_err(serde::de::Error::custom)?,
        };
        Ok(value.round_dp(2))
    }
}

/// One traffic fine (auto de infração).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineItem {
    pub auto_number: String,
    pub date: String,
    pub description: String,
    #[serde(with = "money")]
    pub value: Decimal,
    pub points: u32,
    pub status: String,
    pub location: String,
}

impl Default for FineItem {
    fn default() -> Self {
        Self {
            auto_number: unknown(),
            date: unknown(),
            description: unknown(),
            value: Decimal::ZERO,
            points: 0,
            status: unknown(),
            location: unknown(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CnhRecord {
    pub holder_name: String,
    pub license_number: String,
    pub category: String,
    pub status: String,
    pub expiration_date: String,
    pub points: u32,
    pub infractions: Vec<FineItem>,
}

impl Default for CnhRecord {
    fn default() -> Self {
        Self {
            holder_name: unknown(),
            license_number: unknown(),
            category: unknown(),
            status: unknown(),
            expiration_date: unknown(),
            points: 0,
            infractions: Vec::new(),
        }
    }
}

/// Vehicle looked up by plate or RENAVAM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub plate: String,
    pub renavam: String,
    pub model: String,
    pub year: u32,
    pub owner: String,
    pub fines: Vec<FineItem>,
}

impl Default for VehicleRecord {
    fn default() -> Self {
        Self {
            plate: unknown(),
            renavam: unknown(),
            model: unknown(),
            year: 0,
            owner: unknown(),
            fines: Vec::new(),
        }
    }
}

/// Driver looked up by CPF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRecord {
    pub name: String,
    pub cpf: String,
    pub license_number: String,
    pub category: String,
    pub status: String,
    pub points: u32,
    pub infractions: Vec<FineItem>,
}

impl Default for DriverRecord {
    fn default() -> Self {
        Self {
            name: unknown(),
            cpf: unknown(),
            license_number: unknown(),
            category: unknown(),
            status: unknown(),
            points: 0,
            infractions: Vec::new(),
        }
    }
}

/// Outstanding fines for one vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinesRecord {
    pub plate: String,
    pub renavam: String,
    #[serde(with = "money")]
    pub total_value: Decimal,
    pub fines: Vec<FineItem>,
}

impl Default for FinesRecord {
    fn default() -> Self {
        Self {
            plate: unknown(),
            renavam: unknown(),
            total_value: Decimal::ZERO,
            fines: Vec::new(),
        }
    }
}

/// Provider-agnostic lookup result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalResult {
    Cnh(CnhRecord),
    Vehicle(VehicleRecord),
    Driver(DriverRecord),
    Fines(FinesRecord),
}

impl CanonicalResult {
    /// An all-sentinel result of the right shape for `search_type`.
    pub fn empty(search_type: SearchType) -> Self {
        match search_type {
            SearchType::Plate | SearchType::Renavam => Self::Vehicle(VehicleRecord::default()),
            SearchType::Cnh => Self::Cnh(CnhRecord::default()),
            SearchType::DriverCpf => Self::Driver(DriverRecord::default()),
            SearchType::VehicleFines => Self::Fines(FinesRecord::default()),
        }
    }

    /// Whether this shape is the one `search_type` produces.
    pub fn matches(&self, search_type: SearchType) -> bool {
        matches!(
            (self, search_type),
            (Self::Vehicle(_), SearchType::Plate | SearchType::Renavam)
                | (Self::Cnh(_), SearchType::Cnh)
                | (Self::Driver(_), SearchType::DriverCpf)
                | (Self::Fines(_), SearchType::VehicleFines)
        )
    }

    pub fn fines(&self) -> &[FineItem] {
        match self {
            Self::Cnh(r) => &r.infractions,
            Self::Vehicle(r) => &r.fines,
            Self::Driver(r) => &r.infractions,
            Self::Fines(r) => &r.fines,
        }
    }
}
