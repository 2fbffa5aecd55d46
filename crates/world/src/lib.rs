pub mod blocks;
mod chunk;
mod crop;
mod crop_chunk;
mod error;
mod farm;
mod growth;
mod kinds;
mod scheduler;
pub mod store;
mod terrain;
mod timer;
mod trees;
mod world;

pub use chunk::*;
pub use crop::*;
pub use crop_chunk::*;
pub use error::*;
pub use farm::*;
pub use growth::*;
pub use kinds::*;
pub use scheduler::*;
pub use store::{CropRow, CropStore, MemoryCropStore, RegionCropStore, StoreError};
pub use terrain::*;
pub use timer::*;
pub use trees::*;
pub use world::*;
