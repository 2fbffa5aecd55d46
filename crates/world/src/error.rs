use thiserror::Error;

use crate::chunk::BlockPos;
use crate::kinds::CropKindId;
use crate::world::WorldId;

/// Errors returned by farm operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FarmError {
    /// The handle refers to a world that has since been unloaded.
    #[error("world handle {0} is stale")]
    StaleWorld(WorldId),
    #[error("height {y} is outside the world")]
    OutOfBounds { y: i32 },
    #[error("no world named `{0}` is loaded")]
    UnknownWorld(String),
    #[error("a world named `{0}` is already loaded")]
    DuplicateWorld(String),
    #[error("unknown crop kind {0:?}")]
    UnknownKind(CropKindId),
    /// No scheduled crop at the position.
    #[error("no growing crop at {0}")]
    NoCrop(BlockPos),
}
