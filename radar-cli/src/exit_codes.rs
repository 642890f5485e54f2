//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use radar_core::{DeliveryFailure, LookupError};

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error or invalid lookup input.
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// The provider answered with a definitive failure (record not found, rejected).
/// Maps to EX_DATAERR from sysexits.h.
pub const LOOKUP_FAILED: i32 = 65;

/// Provider, server or webhook endpoint unavailable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const UNAVAILABLE: i32 = 69;

/// The lookup is still processing; retry later with the same request id.
/// Maps to EX_TEMPFAIL from sysexits.h.
pub const STILL_PROCESSING: i32 = 75;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify by the first typed error found in the chain
        let code = err
            .chain()
            .find_map(|cause| {
                if let Some(lookup) = cause.downcast_ref::<LookupError>() {
                    Some(classify_lookup(lookup))
                } else if cause.downcast_ref::<DeliveryFailure>().is_some()
                    || cause.downcast_ref::<reqwest::Error>().is_some()
                {
                    Some(UNAVAILABLE)
                } else {
                    None
                }
            })
            .unwrap_or(GENERAL_ERROR);

        Self {
            code,
            message: Some(message),
        }
    }
}

fn classify_lookup(err: &LookupError) -> i32 {
    match err {
        LookupError::InvalidInput(_) => USAGE_ERROR,
        LookupError::Timeout { .. } | LookupError::NotReady(_) => STILL_PROCESSING,
        LookupError::Provider(p) if p.transient => UNAVAILABLE,
        LookupError::Provider(_) => LOOKUP_FAILED,
        LookupError::NoProvider(_) => UNAVAILABLE,
        LookupError::Unauthorized(_)
        | LookupError::NotFound(_)
        | LookupError::InvalidTransition { .. }
        | LookupError::Storage(_) => GENERAL_ERROR,
    }
}
