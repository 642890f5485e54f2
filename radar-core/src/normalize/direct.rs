//! Direct provider payloads: English camelCase, one layout for every state.

use serde_json::Value;

use super::{count, date, money, pick, text, total_value, year, FineFields};
use crate::canonical::{CanonicalResult, CnhRecord, DriverRecord, FinesRecord, VehicleRecord};
use crate::model::SearchType;

const FINE: FineFields = FineFields {
    auto_number: &["infractionId", "autoNumber", "id"],
    date: &["occurredAt", "date"],
    description: &["description", "infraction.description"],
    value: &["amount", "value", "amount.value"],
    points: &["points"],
    status: &["status"],
    location: &["place", "location", "city"],
};

pub fn normalize(search_type: SearchType, raw: &Value) -> CanonicalResult {
    match search_type {
        SearchType::Plate | SearchType::Renavam => CanonicalResult::Vehicle(VehicleRecord {
            plate: text(raw, &["licensePlate", "plate"]),
            renavam: text(raw, &["renavam"]),
            model: text(raw, &["model", "vehicle.model"]),
            year: year(raw, &["modelYear", "year"]),
            owner: text(raw, &["owner.name", "ownerName"]),
            fines: FINE.normalize_all(raw, &["fines"]),
        }),
        SearchType::Cnh => CanonicalResult::Cnh(CnhRecord {
            holder_name: text(raw, &["driverName", "name"]),
            license_number: text(raw, &["registration", "licenseNumber"]),
            category: text(raw, &["category"]),
            status: text(raw, &["licenseStatus", "status"]),
            expiration_date: date(raw, &["expiresAt", "expirationDate"]),
            points: count(raw, &["points", "totalPoints"]),
            infractions: FINE.normalize_all(raw, &["infractions", "fines"]),
        }),
        SearchType::DriverCpf => CanonicalResult::Driver(DriverRecord {
            name: text(raw, &["driverName", "name"]),
            cpf: text(raw, &["cpf", "document"]),
            license_number: text(raw, &["registration", "licenseNumber"]),
            category: text(raw, &["category"]),
            status: text(raw, &["licenseStatus", "status"]),
            points: count(raw, &["points", "totalPoints"]),
            infractions: FINE.normalize_all(raw, &["infractions", "fines"]),
        }),
        SearchType::VehicleFines => {
            let fines = FINE.normalize_all(raw, &["fines"]);
            let total_paths = &["totalAmount", "total"];
            let total_value = match pick(raw, total_paths) {
                Some(_) => money(raw, total_paths),
                None => total_value(&fines),
            };
            CanonicalResult::Fines(FinesRecord {
                plate: text(raw, &["licensePlate", "plate"]),
                renavam: text(raw, &["renavam"]),
                total_value,
                fines,
            })
        }
    }
}
