//! Gateway payloads: Portuguese field names, varying per state agency.

use serde_json::Value;

use super::{count, date, money, pick, text, total_value, year, FineFields};
use crate::canonical::{CanonicalResult, CnhRecord, DriverRecord, FinesRecord, VehicleRecord};
use crate::model::SearchType;

const FINE: FineFields = FineFields {
    auto_number: &["auto_infracao", "numero_auto", "ait", "auto"],
    date: &["data_infracao", "data", "data_hora"],
    description: &["descricao", "infracao", "enquadramento.descricao", "enquadramento"],
    value: &["valor", "valor_multa", "valor_atualizado"],
    points: &["pontos", "pontuacao"],
    status: &["situacao", "status"],
    location: &["local", "local_infracao", "municipio"],
};

const FINE_LISTS: &[&str] = &["multas", "debitos.multas", "infracoes", "veiculo.multas"];

pub fn normalize(search_type: SearchType, raw: &Value) -> CanonicalResult {
    match search_type {
        SearchType::Plate | SearchType::Renavam => CanonicalResult::Vehicle(vehicle(raw)),
        SearchType::Cnh => CanonicalResult::Cnh(cnh(raw)),
        SearchType::DriverCpf => CanonicalResult::Driver(driver(raw)),
        SearchType::VehicleFines => CanonicalResult::Fines(fines(raw)),
    }
}

fn vehicle(raw: &Value) -> VehicleRecord {
    VehicleRecord {
        plate: text(raw, &["placa", "veiculo.placa"]),
        renavam: text(raw, &["renavam", "veiculo.renavam"]),
        model: text(
            raw,
            &["marca_modelo", "modelo", "veiculo.marca_modelo", "veiculo.modelo"],
        ),
        year: year(raw, &["ano_modelo", "ano", "veiculo.ano_modelo", "veiculo.ano"]),
        owner: text(
            raw,
            &["proprietario.nome", "nome_proprietario", "proprietario"],
        ),
        fines: FINE.normalize_all(raw, FINE_LISTS),
    }
}

fn cnh(raw: &Value) -> CnhRecord {
    CnhRecord {
        holder_name: text(raw, &["nome", "condutor.nome", "nome_condutor"]),
        license_number: text(
            raw,
            &["numero_registro", "registro", "cnh", "condutor.registro"],
        ),
        category: text(raw, &["categoria", "condutor.categoria"]),
        status: text(raw, &["situacao", "situacao_cnh", "status"]),
        expiration_date: date(raw, &["data_validade", "validade"]),
        points: count(raw, &["pontos", "pontuacao", "total_pontos"]),
        infractions: FINE.normalize_all(raw, &["infracoes", "multas"]),
    }
}

fn driver(raw: &Value) -> DriverRecord {
    DriverRecord {
        name: text(raw, &["nome", "condutor.nome"]),
        cpf: text(raw, &["cpf", "condutor.cpf"]),
        license_number: text(raw, &["numero_registro", "registro", "cnh"]),
        category: text(raw, &["categoria", "condutor.categoria"]),
        status: text(raw, &["situacao", "situacao_cnh", "status"]),
        points: count(raw, &["pontos", "pontuacao", "total_pontos"]),
        infractions: FINE.normalize_all(raw, &["infracoes", "multas"]),
    }
}

fn fines(raw: &Value) -> FinesRecord {
    let fines = FINE.normalize_all(raw, FINE_LISTS);
    let total_paths = &["valor_total", "total", "debitos.total"];
    let total_value = match pick(raw, total_paths) {
        Some(_) => money(raw, total_paths),
        None => total_value(&fines),
    };
    FinesRecord {
        plate: text(raw, &["placa", "veiculo.placa"]),
        renavam: text(raw, &["renavam", "veiculo.renavam"]),
        total_value,
        fines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::UNKNOWN;
    use serde_json::json;

    #[test]
    fn test_vehicle_from_sp_layout() {
        let raw = json!({
            "placa": "ABC1234",
            "renavam": "00123456789",
            "marca_modelo": "VW/GOL 1.0",
            "ano_modelo": "2019/2020",
            "proprietario": {"nome": "Maria Souza"},
            "multas": [{
                "auto_infracao": "1A2345678",
                "data_infracao": "12/03/2024 08:15",
                "descricao": "Transitar em velocidade superior a maxima permitida",
                "valor": "R$ 130,16",
                "pontos": 4,
                "situacao": "Em aberto",
                "local": "Av. Paulista, Sao Paulo"
            }]
        });

        let CanonicalResult::Vehicle(vehicle) = normalize(SearchType::Plate, &raw) else {
            panic!("expected vehicle");
        };
        assert_eq!(vehicle.plate, "ABC1234");
        assert_eq!(vehicle.model, "VW/GOL 1.0");
        assert_eq!(vehicle.year, 2020);
        assert_eq!(vehicle.owner, "Maria Souza");
        assert_eq!(vehicle.fines.len(), 1);
        assert_eq!(vehicle.fines[0].date, "2024-03-12");
        assert_eq!(vehicle.fines[0].value.to_string(), "130.16");
        assert_eq!(vehicle.fines[0].points, 4);
    }

    #[test]
    fn test_vehicle_from_nested_layout() {
        let raw = json!({
            "veiculo": {"placa": "XYZ9A87", "modelo": "FIAT/UNO", "ano": 2015},
            "nome_proprietario": "Joao Lima",
            "debitos": {"multas": {"ait": "R000111", "valor_multa": 88.38}}
        });

        let CanonicalResult::Vehicle(vehicle) = normalize(SearchType::Renavam, &raw) else {
            panic!("expected vehicle");
        };
        assert_eq!(vehicle.plate, "XYZ9A87");
        assert_eq!(vehicle.renavam, UNKNOWN);
        assert_eq!(vehicle.year, 2015);
        assert_eq!(vehicle.owner, "Joao Lima");
        assert_eq!(vehicle.fines.len(), 1);
        assert_eq!(vehicle.fines[0].auto_number, "R000111");
        assert_eq!(vehicle.fines[0].location, UNKNOWN);
    }

    #[test]
    fn test_cnh() {
        let raw = json!({
            "condutor": {"nome": "Ana Prado", "registro": "12345678900", "categoria": "AB"},
            "situacao": "Regular",
            "validade": "2031-07-20",
            "pontuacao": "7",
            "infracoes": []
        });
        let CanonicalResult::Cnh(cnh) = normalize(SearchType::Cnh, &raw) else {
            panic!("expected cnh");
        };
        assert_eq!(cnh.holder_name, "Ana Prado");
        assert_eq!(cnh.license_number, "12345678900");
        assert_eq!(cnh.category, "AB");
        assert_eq!(cnh.expiration_date, "2031-07-20");
        assert_eq!(cnh.points, 7);
        assert!(cnh.infractions.is_empty());
    }

    #[test]
    fn test_fines_total_falls_back_to_sum() {
        let raw = json!({
            "placa": "ABC1234",
            "multas": [{"valor": "100,50"}, {"valor": 30}]
        });
        let CanonicalResult::Fines(fines) = normalize(SearchType::VehicleFines, &raw) else {
            panic!("expected fines");
        };
        assert_eq!(fines.total_value.to_string(), "130.50");
        assert_eq!(fines.fines.len(), 2);

        let with_total = json!({"valor_total": "R$ 1.000,00", "multas": []});
        let CanonicalResult::Fines(fines) = normalize(SearchType::VehicleFines, &with_total) else {
            panic!("expected fines");
        };
        assert_eq!(fines.total_value.to_string(), "1000.00");
    }

    #[test]
    fn test_garbage_payload_yields_sentinels() {
        for raw in [json!(null), json!("oops"), json!([1, 2]), json!({"multas": "none"})] {
            let CanonicalResult::Driver(driver) = normalize(SearchType::DriverCpf, &raw) else {
                panic!("expected driver");
            };
            assert_eq!(driver.name, UNKNOWN);
            assert_eq!(driver.points, 0);
            assert!(driver.infractions.is_empty());
        }
    }
}
