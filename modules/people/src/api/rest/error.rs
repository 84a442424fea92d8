use modkit::{internal_error, ProblemResponse};
use tracing::error;

use crate::domain::error::DomainError;

/// Map a domain error to an RFC 9457 problem response.
pub fn domain_error_to_problem(e: DomainError) -> ProblemResponse {
    match e {
        DomainError::Serialization { .. } | DomainError::NotAnObject { .. } => {
            error!(error = %e, "people domain failure");
            internal_error(e.to_string())
        }
    }
}

impl From<DomainError> for ProblemResponse {
    fn from(e: DomainError) -> Self {
        domain_error_to_problem(e)
    }
}
