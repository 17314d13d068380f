use ulid::Ulid;

use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    InvalidState(String),
    Validation(Vec<String>),
    CapacityExceeded {
        requested: u32,
        available: u32,
        current: u32,
        max: u32,
    },
    DuplicateBooking {
        invitation_id: Ulid,
        existing: Ulid,
    },
    Store(StoreError),
    Cancelled,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            EngineError::Validation(errors) => {
                write!(f, "validation failed: {}", errors.join("; "))
            }
            EngineError::CapacityExceeded {
                requested,
                available,
                current,
                max,
            } => write!(
                f,
                "capacity exceeded: requested {requested}, available {available} ({current}/{max} taken)"
            ),
            EngineError::DuplicateBooking {
                invitation_id,
                existing,
            } => write!(
                f,
                "invitation {invitation_id} already has active booking {existing}"
            ),
            EngineError::Store(e) => write!(f, "{e}"),
            EngineError::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}
