//! Demo provider producing deterministic synthetic records.
//!
//! WARNING: data is fabricated from a SHA3 digest of the query. It is only
//! registered when demo mode is enabled, and every result it produces is
//! stored with `synthetic = true`.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha3::{Digest, Sha3_256};
use uuid::Uuid;

use super::{LookupProvider, ProviderSource, RemoteJobState, Submission};
use crate::canonical::{
    CanonicalResult, CnhRecord, DriverRecord, FineItem, FinesRecord, VehicleRecord,
};
use crate::error::ProviderError;
use crate::model::{CanonicalRequest, SearchType};

const NAMES: &[&str] = &[
    "Ana Paula Ribeiro",
    "Bruno Carvalho",
    "Camila Fernandes",
    "Diego Martins",
    "Eduarda Gomes",
    "Felipe Araujo",
];

const MODELS: &[&str] = &[
    "VW/GOL 1.0",
    "FIAT/ARGO DRIVE",
    "CHEVROLET/ONIX LT",
    "HYUNDAI/HB20 SENSE",
    "TOYOTA/COROLLA XEI",
];

const INFRACTIONS: &[(&str, u32, i64)] = &[
    ("Transitar em velocidade superior a maxima permitida em ate 20%", 4, 13016),
    ("Estacionar em local proibido", 3, 8838),
    ("Avancar o sinal vermelho do semaforo", 7, 29347),
    ("Dirigir utilizando-se de telefone celular", 7, 29347),
];

const CITIES: &[&str] = &["Sao Paulo/SP", "Campinas/SP", "Curitiba/PR", "Belo Horizonte/MG"];

/// Queued demo job.
struct DemoJob {
    remaining_polls: u32,
    raw: Value,
}

pub struct DemoProvider {
    latency_polls: u32,
    jobs: DashMap<String, DemoJob>,
}

impl DemoProvider {
    /// `latency_polls == 0` answers synchronously; otherwise lookups are queued
    /// and report `processing` for that many status polls.
    pub fn new(latency_polls: u32) -> Self {
        Self {
            latency_polls,
            jobs: DashMap::new(),
        }
    }

    /// Raw demo payload for `request`. Same request, same payload.
    pub fn synthesize(request: &CanonicalRequest) -> Value {
        let record = synthetic_record(request);
        json!({ "demo": true, "record": record })
    }
}

fn seed(request: &CanonicalRequest) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(request.search_type().as_str().as_bytes());
    hasher.update(request.search_query().as_bytes());
    hasher.update(b"radar-demo-record");

    let digest = hasher.finalize();
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);
    seed
}

fn pick<'a>(items: &'a [&'a str], byte: u8) -> &'a str {
    items[byte as usize % items.len()]
}

fn synthetic_fines(seed: &[u8; 32], plate: &str) -> Vec<FineItem> {
    let count = seed[0] as usize % 3 + 1;
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();

    (0..count)
        .map(|i| {
            let byte = seed[4 + i];
            let (description, points, cents) = INFRACTIONS[byte as usize % INFRACTIONS.len()];
            let date = base + ChronoDuration::days(i64::from(seed[8 + i]) + (i as i64) * 90);
            FineItem {
                auto_number: format!("DEMO{}{:04}", &plate[..plate.len().min(3)], u16::from(byte) * 37),
                date: date.format("%Y-%m-%d").to_string(),
                description: description.to_string(),
                value: Decimal::new(cents, 2),
                points,
                status: if byte % 2 == 0 { "open" } else { "paid" }.to_string(),
                location: pick(CITIES, seed[12 + i]).to_string(),
            }
        })
        .collect()
}

fn synthetic_record(request: &CanonicalRequest) -> CanonicalResult {
    let seed = seed(request);
    let digits: String = hex::encode(&seed[16..22])
        .chars()
        .map(|c| char::from(b'0' + (c.to_digit(16).unwrap_or(0) % 10) as u8))
        .collect();
    let expiration = NaiveDate::from_ymd_opt(2026 + i32::from(seed[3] % 6), 1 + u32::from(seed[3] % 12), 15)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    match request {
        CanonicalRequest::Plate { plate } => CanonicalResult::Vehicle(VehicleRecord {
            plate: plate.clone(),
            renavam: format!("00{}", &digits[..9]),
            model: pick(MODELS, seed[1]).to_string(),
            year: 2008 + u32::from(seed[2] % 16),
            owner: pick(NAMES, seed[3]).to_string(),
            fines: synthetic_fines(&seed, plate),
        }),
        CanonicalRequest::Renavam { renavam } => CanonicalResult::Vehicle(VehicleRecord {
            plate: format!("DMO{}", &digits[..4]),
            renavam: renavam.clone(),
            model: pick(MODELS, seed[1]).to_string(),
            year: 2008 + u32::from(seed[2] % 16),
            owner: pick(NAMES, seed[3]).to_string(),
            fines: synthetic_fines(&seed, "DMO"),
        }),
        CanonicalRequest::Cnh { cnh_number, .. } => {
            let infractions = synthetic_fines(&seed, "CNH");
            CanonicalResult::Cnh(CnhRecord {
                holder_name: pick(NAMES, seed[1]).to_string(),
                license_number: cnh_number.clone(),
                category: pick(&["B", "AB", "C", "D"], seed[2]).to_string(),
                status: "regular".to_string(),
                expiration_date: expiration,
                points: infractions.iter().map(|f| f.points).sum(),
                infractions,
            })
        }
        CanonicalRequest::DriverCpf { cpf } => {
            let infractions = synthetic_fines(&seed, "CPF");
            CanonicalResult::Driver(DriverRecord {
                name: pick(NAMES, seed[1]).to_string(),
                cpf: cpf.clone(),
                license_number: format!("0{}", &digits[..10]),
                category: pick(&["B", "AB", "C", "D"], seed[2]).to_string(),
                status: "regular".to_string(),
                points: infractions.iter().map(|f| f.points).sum(),
                infractions,
            })
        }
        CanonicalRequest::VehicleFines { plate, renavam } => {
            let fines = synthetic_fines(&seed, plate);
            CanonicalResult::Fines(FinesRecord {
                plate: plate.clone(),
                renavam: renavam
                    .clone()
                    .unwrap_or_else(|| format!("00{}", &digits[..9])),
                total_value: fines.iter().map(|f| f.value).sum(),
                fines,
            })
        }
    }
}

#[async_trait]
impl LookupProvider for DemoProvider {
    fn source_id(&self) -> ProviderSource {
        ProviderSource::Demo
    }

    fn supports(&self, _search_type: SearchType) -> bool {
        true
    }

    async fn lookup(&self, request: &CanonicalRequest) -> Result<Submission, ProviderError> {
        let raw = Self::synthesize(request);
        if self.latency_polls == 0 {
            return Ok(Submission::Completed { raw });
        }

        let protocol = format!("DEMO-{}", Uuid::new_v4().simple());
        self.jobs.insert(
            protocol.clone(),
            DemoJob {
                remaining_polls: self.latency_polls,
                raw,
            },
        );
        Ok(Submission::Accepted { protocol })
    }

    async fn job_status(&self, protocol: &str) -> Result<RemoteJobState, ProviderError> {
        let mut job = self.jobs.get_mut(protocol).ok_or_else(|| {
            ProviderError::terminal("not_found", format!("Unknown demo protocol {protocol}"))
        })?;
        if job.remaining_polls > 0 {
            job.remaining_polls -= 1;
            return Ok(RemoteJobState::Processing);
        }
        Ok(RemoteJobState::Ready)
    }

    async fn fetch_result(&self, protocol: &str) -> Result<Option<Value>, ProviderError> {
        let job = self.jobs.get(protocol).ok_or_else(|| {
            ProviderError::terminal("not_found", format!("Unknown demo protocol {protocol}"))
        })?;
        Ok((job.remaining_polls == 0).then(|| job.raw.clone()))
    }

    fn normalize(&self, search_type: SearchType, raw: &Value) -> CanonicalResult {
        raw.get("record")
            .cloned()
            .and_then(|record| serde_json::from_value::<CanonicalResult>(record).ok())
            .filter(|record| record.matches(search_type))
            .unwrap_or_else(|| CanonicalResult::empty(search_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plate(p: &str) -> CanonicalRequest {
        CanonicalRequest::Plate { plate: p.into() }
    }

    #[test]
    fn test_synthetic_data_is_deterministic() {
        assert_eq!(
            DemoProvider::synthesize(&plate("ABC1234")),
            DemoProvider::synthesize(&plate("ABC1234"))
        );
        assert_ne!(
            DemoProvider::synthesize(&plate("ABC1234")),
            DemoProvider::synthesize(&plate("XYZ9876"))
        );
    }

    #[test]
    fn test_normalize_round_trips_record() {
        let provider = DemoProvider::new(0);
        let raw = DemoProvider::synthesize(&plate("ABC1234"));
        let CanonicalResult::Vehicle(vehicle) = provider.normalize(SearchType::Plate, &raw) else {
            panic!("expected vehicle");
        };
        assert_eq!(vehicle.plate, "ABC1234");
        assert!(!vehicle.fines.is_empty());
        assert!(vehicle.fines.iter().all(|f| f.value.scale() == 2));
    }

    #[test]
    fn test_normalize_mismatched_shape_is_empty() {
        let provider = DemoProvider::new(0);
        let raw = DemoProvider::synthesize(&plate("ABC1234"));
        assert_eq!(
            provider.normalize(SearchType::Cnh, &raw),
            CanonicalResult::empty(SearchType::Cnh)
        );
    }

    #[tokio::test]
    async fn test_queued_job_reports_processing_then_ready() {
        let provider = DemoProvider::new(2);
        let Submission::Accepted { protocol } = provider.lookup(&plate("ABC1234")).await.unwrap()
        else {
            panic!("expected queued job");
        };
        assert!(protocol.starts_with("DEMO-"));

        assert_eq!(provider.fetch_result(&protocol).await.unwrap(), None);
        assert_eq!(provider.job_status(&protocol).await.unwrap(), RemoteJobState::Processing);
        assert_eq!(provider.job_status(&protocol).await.unwrap(), RemoteJobState::Processing);
        assert_eq!(provider.job_status(&protocol).await.unwrap(), RemoteJobState::Ready);
        assert!(provider.fetch_result(&protocol).await.unwrap().is_some());

        assert!(provider.job_status("DEMO-unknown").await.is_err());
    }

    #[tokio::test]
    async fn test_sync_mode_answers_immediately() {
        let provider = DemoProvider::new(0);
        let submission = provider
            .lookup(&CanonicalRequest::DriverCpf {
                cpf: "52998224725".into(),
            })
            .await
            .unwrap();
        assert!(matches!(submission, Submission::Completed { .. }));
    }
}
