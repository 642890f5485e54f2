//! Input validation for canonical lookup requests.
//!
//! Runs before any outbound call. Inputs are canonicalized (upper-case,
//! punctuation stripped) so providers and the ledger see one spelling.

use chrono::NaiveDate;

use crate::error::{LookupError, Result};
use crate::model::CanonicalRequest;

/// Validate and canonicalize a lookup request.
pub fn validate_request(request: CanonicalRequest) -> Result<CanonicalRequest> {
    let validated = match request {
        CanonicalRequest::Plate { plate } => CanonicalRequest::Plate {
            plate: normalize_plate(&plate)?,
        },
        CanonicalRequest::Renavam { renavam } => CanonicalRequest::Renavam {
            renavam: normalize_renavam(&renavam)?,
        },
        CanonicalRequest::Cnh {
            cnh_number,
            birth_date,
        } => CanonicalRequest::Cnh {
            cnh_number: normalize_cnh(&cnh_number)?,
            birth_date: normalize_birth_date(&birth_date)?,
        },
        CanonicalRequest::DriverCpf { cpf } => CanonicalRequest::DriverCpf {
            cpf: normalize_cpf(&cpf)?,
        },
        CanonicalRequest::VehicleFines { plate, renavam } => CanonicalRequest::VehicleFines {
            plate: normalize_plate(&plate)?,
            renavam: renavam
                .filter(|r| !r.trim().is_empty())
                .map(|r| normalize_renavam(&r))
                .transpose()?,
        },
    };
    Ok(validated)
}

/// Accepts legacy (`ABC1234`) and Mercosul (`ABC1D23`) plates.
pub fn normalize_plate(input: &str) -> Result<String> {
    let plate: String = input
        .chars()
        .filter(|c| !matches!(c, '-' | ' ' | '.'))
        .collect::<String>()
        .to_uppercase();

    if plate.is_empty() {
        return Err(LookupError::invalid_input("Plate is required"));
    }

    let chars: Vec<char> = plate.chars().collect();
    let valid = chars.len() == 7
        && chars[..3].iter().all(|c| c.is_ascii_uppercase())
        && chars[3].is_ascii_digit()
        && (chars[4].is_ascii_digit() || chars[4].is_ascii_uppercase())
        && chars[5..].iter().all(|c| c.is_ascii_digit());

    if valid {
        Ok(plate)
    } else {
        Err(LookupError::invalid_input(format!(
            "Invalid plate '{input}': expected ABC1234 or ABC1D23"
        )))
    }
}

pub fn normalize_renavam(input: &str) -> Result<String> {
    let digits = digits_only(input, "RENAVAM")?;
    if (9..=11).contains(&digits.len()) {
        Ok(digits)
    } else {
        Err(LookupError::invalid_input(format!(
            "Invalid RENAVAM '{input}': expected 9 to 11 digits"
        )))
    }
}

pub fn normalize_cnh(input: &str) -> Result<String> {
    let digits = digits_only(input, "CNH number")?;
    if digits.len() == 11 {
        Ok(digits)
    } else {
        Err(LookupError::invalid_input(format!(
            "Invalid CNH number '{input}': expected 11 digits"
        )))
    }
}

pub fn normalize_cpf(input: &str) -> Result<String> {
    let digits = digits_only(input, "CPF")?;
    if digits.len() != 11 {
        return Err(LookupError::invalid_input(format!(
            "Invalid CPF '{input}': expected 11 digits"
        )));
    }
    if !cpf_check_digits_valid(&digits) {
        return Err(LookupError::invalid_input(format!(
            "Invalid CPF '{input}': check digits do not match"
        )));
    }
    Ok(digits)
}

/// Accepts `YYYY-MM-DD` or `DD/MM/YYYY`; returns ISO-8601.
pub fn normalize_birth_date(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(LookupError::invalid_input("Birth date is required"));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .map_err(|_| {
            LookupError::invalid_input(format!(
                "Invalid birth date '{input}': expected YYYY-MM-DD or DD/MM/YYYY"
            ))
        })
}

fn digits_only(input: &str, field: &str) -> Result<String> {
    let stripped: String = input
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | '/' | ' '))
        .collect();
    if stripped.is_empty() {
        return Err(LookupError::invalid_input(format!("{field} is required")));
    }
    if !stripped.chars().all(|c| c.is_ascii_digit()) {
        return Err(LookupError::invalid_input(format!(
            "{field} must contain only digits"
        )));
    }
    Ok(stripped)
}

fn cpf_check_digits_valid(cpf: &str) -> bool {
    let digits: Vec<u32> = cpf.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        let rest = (sum * 10) % 11;
        if rest == 10 {
            0
        } else {
            rest
        }
    };

    check(9) == digits[9] && check(10) == digits[10]
}
