//! Error taxonomy of the allocator.
//!
//! Every expected business failure is a variant here and is returned as a
//! value. Only [`AllocatorError::CompensationFailure`] indicates that recorded
//! occupancy may have diverged from the shelves.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Kind of entity referenced by a [`AllocatorError::NotFound`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Item,
    Cell,
    Rack,
    Warehouse,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Item => "item",
            EntityKind::Cell => "cell",
            EntityKind::Rack => "rack",
            EntityKind::Warehouse => "warehouse",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocatorError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Placement not possible: {0}")]
    Infeasible(String),

    #[error("{kind} {id} does not exist")]
    NotFound { kind: EntityKind, id: u64 },

    #[error("Item {item_id} requires {required} storage, warehouse {warehouse_id} is {actual}")]
    IncompatibleStorageClass {
        item_id: u64,
        warehouse_id: u64,
        required: String,
        actual: String,
    },

    #[error("Cell {cell_id} holds {available} units of item {item_id}, {requested} requested")]
    InsufficientOccupancy {
        item_id: u64,
        cell_id: u64,
        requested: u32,
        available: u32,
    },

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("{kind} {id} still holds stock and cannot be deleted")]
    NotEmpty { kind: EntityKind, id: u64 },

    #[error("Rollback failed, occupancy of cell {cell_id} diverged: {details}")]
    CompensationFailure { cell_id: u64, details: String },
}

impl AllocatorError {
    /// Stable, machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            AllocatorError::InvalidRequest(_) => "invalid_request",
            AllocatorError::Infeasible(_) => "infeasible",
            AllocatorError::NotFound { .. } => "not_found",
            AllocatorError::IncompatibleStorageClass { .. } => "incompatible_storage_class",
            AllocatorError::InsufficientOccupancy { .. } => "insufficient_occupancy",
            AllocatorError::ConcurrentModification(_) => "concurrent_modification",
            AllocatorError::NotEmpty { .. } => "not_empty",
            AllocatorError::CompensationFailure { .. } => "compensation_failure",
        }
    }

    /// Whether retrying the same call later can succeed without caller changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AllocatorError::ConcurrentModification(_))
    }

    pub(crate) fn not_found(kind: EntityKind, id: u64) -> Self {
        AllocatorError::NotFound { kind, id }
    }
}

pub type AllocResult<T> = Result<T, AllocatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AllocatorError::Infeasible("x".into()).code(), "infeasible");
        assert_eq!(
            AllocatorError::not_found(EntityKind::Cell, 3).code(),
            "not_found"
        );
        assert_eq!(
            AllocatorError::CompensationFailure {
                cell_id: 1,
                details: "x".into()
            }
            .code(),
            "compensation_failure"
        );
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = AllocatorError::not_found(EntityKind::Warehouse, 42);
        assert_eq!(err.to_string(), "warehouse 42 does not exist");
    }

    #[test]
    fn only_concurrent_modification_is_retryable() {
        assert!(AllocatorError::ConcurrentModification("busy".into()).is_retryable());
        assert!(!AllocatorError::Infeasible("full".into()).is_retryable());
    }
}
