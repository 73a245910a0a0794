use thiserror::Error;

use crate::backend::BackendId;

pub use crate::backend::CapabilityError;
pub use crate::host::GraphMaterializationError;
pub use crate::select::SelectError;
pub use crate::sequence::ConflictError;

/// Everything that can abort the construction of one material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaterialError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error("selected backend '{0}' has no descriptor")]
    MissingDescriptor(BackendId),
    #[error(transparent)]
    Materialize(#[from] GraphMaterializationError),
}
