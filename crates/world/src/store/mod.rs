//! Durable crop storage.
//!
//! [`CropStore`] is the port the growth core writes through. Writes are
//! batched: rows saved or deleted become durable at [`CropStore::commit`].
//! Deletes are soft until [`CropStore::close`] purges them.

mod memory;
mod region;

use std::path::PathBuf;

use farmstead_core::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunk::{BlockPos, ChunkPos};

pub use memory::MemoryCropStore;
pub use region::RegionCropStore;

/// One persisted crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRow {
    pub pos: BlockPos,
    pub planted_at: Timestamp,
}

/// Errors raised by storage adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrap IO errors from the backing files.
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
    /// Wrap bincode failures when encoding or decoding a region payload.
    #[error("failed to encode region payload: {0}")]
    Encode(#[from] bincode::Error),
    /// Wrap serde_json failures on the world index.
    #[error("failed to parse world index: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt region file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("world `{0}` was never saved")]
    UnknownWorld(String),
    /// Raised by the memory adapter when failures are switched on.
    #[error("injected {0} failure")]
    Injected(&'static str),
}

/// Storage port used by the farm.
pub trait CropStore {
    /// Register a world name. Saving a known world is a no-op.
    fn save_world(&mut self, name: &str) -> Result<(), StoreError>;

    /// Upsert a crop by position.
    fn save_crop(&mut self, world: &str, row: CropRow) -> Result<(), StoreError>;

    /// Soft-delete the crop at `pos`.
    fn delete_crop(&mut self, world: &str, pos: BlockPos) -> Result<(), StoreError>;

    /// Every live row inside the chunk's column.
    fn load_chunk(&mut self, world: &str, chunk: ChunkPos) -> Result<Vec<CropRow>, StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    /// Commit, then drop soft-deleted rows for good.
    fn close(&mut self) -> Result<(), StoreError>;
}
