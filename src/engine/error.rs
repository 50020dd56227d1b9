use ulid::Ulid;

use crate::model::{Amount, Ms, ReservationState};
use crate::repo::StorageError;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    /// The item is occupied or out of service over the requested interval.
    Conflict(Ulid),
    /// The client-side quote no longer matches the recomputed price.
    PriceChanged { quoted: Amount, computed: Amount },
    /// Item set does not match the category composition.
    InvalidCategory(Ulid),
    InvalidTransition(ReservationState),
    /// Broken/withdrawn return without a usable reparation window.
    MissingReparationWindow(Ulid),
    /// Terminate input does not cover the reserved items.
    ReturnedItemsMismatch(Ulid),
    InvalidInterval { start: Ms, end: Ms },
    NoStaffAvailable,
    /// Deletion target is still referenced.
    Referenced(Ulid),
    Storage(StorageError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::Conflict(id) => write!(f, "item not available: {id}"),
            EngineError::PriceChanged { quoted, computed } => {
                write!(f, "price changed: quoted {quoted}, computed {computed}")
            }
            EngineError::InvalidCategory(id) => {
                write!(f, "item set does not match category composition: {id}")
            }
            EngineError::InvalidTransition(state) => {
                write!(f, "transition not permitted from state: {state}")
            }
            EngineError::MissingReparationWindow(id) => {
                write!(f, "broken item {id} returned without a reparation window")
            }
            EngineError::ReturnedItemsMismatch(id) => {
                write!(f, "returned items do not match the reservation: missing {id}")
            }
            EngineError::InvalidInterval { start, end } => {
                write!(f, "interval start {start} is after end {end}")
            }
            EngineError::NoStaffAvailable => write!(f, "no staff available for assignment"),
            EngineError::Referenced(id) => write!(f, "cannot delete {id}: still referenced"),
            EngineError::Storage(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        EngineError::Storage(e)
    }
}
