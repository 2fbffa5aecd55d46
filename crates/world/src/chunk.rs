use std::fmt;

/// Chunk width (X axis) in voxels.
pub const CHUNK_SIZE_X: usize = 16;
/// Chunk height (Y axis) in voxels.
pub const CHUNK_SIZE_Y: usize = 256;
/// Chunk depth (Z axis) in voxels.
pub const CHUNK_SIZE_Z: usize = 16;
/// Total voxel count per chunk.
pub const CHUNK_VOLUME: usize = CHUNK_SIZE_X * CHUNK_SIZE_Y * CHUNK_SIZE_Z;

/// Block identifier referencing the block table in [`crate::blocks`].
pub type BlockId = u16;
/// Block state metadata bits.
pub type BlockState = u16;

/// Reserved ID for air.
pub const BLOCK_AIR: BlockId = 0;

/// Chunk-local position (X, Y, Z).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalPos {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl LocalPos {
    /// Convert to a linear index within the SoA arrays.
    pub fn index(self) -> usize {
        debug_assert!(self.x < CHUNK_SIZE_X);
        debug_assert!(self.y < CHUNK_SIZE_Y);
        debug_assert!(self.z < CHUNK_SIZE_Z);
        (self.y * CHUNK_SIZE_Z + self.z) * CHUNK_SIZE_X + self.x
    }
}

/// Packed chunk-local coordinate: `y << 8 | z << 4 | x`.
///
/// Keys sort by height first, then z, then x, which is the order the crop
/// index keeps its records in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct LocalKey(pub u16);

impl LocalKey {
    /// Pack a position. Only the low four bits of `x`/`z` and the low eight bits
    /// of `y` are kept, so world coordinates can be passed directly.
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self((((y & 0xFF) << 8) | ((z & 0xF) << 4) | (x & 0xF)) as u16)
    }

    #[inline]
    pub const fn x(self) -> i32 {
        (self.0 & 0xF) as i32
    }

    #[inline]
    pub const fn y(self) -> i32 {
        ((self.0 >> 8) & 0xFF) as i32
    }

    #[inline]
    pub const fn z(self) -> i32 {
        ((self.0 >> 4) & 0xF) as i32
    }

    pub fn local_pos(self) -> LocalPos {
        LocalPos {
            x: self.x() as usize,
            y: self.y() as usize,
            z: self.z() as usize,
        }
    }
}

/// Chunk coordinate (X,Z) in chunk space.
/// Implements Ord for deterministic iteration in BTreeMap/BTreeSet (sorts by x, then z).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Packed map key for this chunk.
    #[inline]
    pub const fn key(self) -> ChunkKey {
        ChunkKey::pack(self.x, self.z)
    }

    /// World position of a block inside this chunk.
    pub const fn block(self, key: LocalKey) -> BlockPos {
        BlockPos {
            x: (self.x << 4) | key.x(),
            y: key.y(),
            z: (self.z << 4) | key.z(),
        }
    }

    /// Whether the world column (x, z) lies inside this chunk.
    pub const fn contains_column(self, x: i32, z: i32) -> bool {
        (x >> 4) == self.x && (z >> 4) == self.z
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Two 32-bit chunk coordinates packed into one integer: x in the low half,
/// z in the high half.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ChunkKey(pub u64);

impl ChunkKey {
    #[inline]
    pub const fn pack(x: i32, z: i32) -> Self {
        Self((x as u32 as u64) | ((z as u32 as u64) << 32))
    }

    /// The low half (chunk x).
    #[inline]
    pub const fn least(self) -> i32 {
        (self.0 & 0xFFFF_FFFF) as u32 as i32
    }

    /// The high half (chunk z).
    #[inline]
    pub const fn most(self) -> i32 {
        (self.0 >> 32) as u32 as i32
    }

    #[inline]
    pub const fn pos(self) -> ChunkPos {
        ChunkPos::new(self.least(), self.most())
    }
}

/// Absolute block position in world space.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing this block.
    #[inline]
    pub const fn chunk(self) -> ChunkPos {
        ChunkPos::new(self.x >> 4, self.z >> 4)
    }

    /// Packed chunk-local key of this block.
    #[inline]
    pub const fn local_key(self) -> LocalKey {
        LocalKey::new(self.x, self.y, self.z)
    }

    /// True when the height fits inside a chunk column.
    #[inline]
    pub const fn in_height_bounds(self) -> bool {
        self.y >= 0 && self.y < CHUNK_SIZE_Y as i32
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.x, self.y, self.z)
    }
}

/// Per-voxel data stored in the SoA arrays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Voxel {
    pub id: BlockId,
    pub state: BlockState,
}

impl Voxel {
    pub const AIR: Voxel = Voxel::new(BLOCK_AIR);

    pub const fn new(id: BlockId) -> Self {
        Self { id, state: 0 }
    }

    pub const fn with_state(id: BlockId, state: BlockState) -> Self {
        Self { id, state }
    }

    #[inline]
    pub fn is_air(&self) -> bool {
        self.id == BLOCK_AIR
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Dirty flags set whenever chunk data changes.
    pub struct DirtyFlags: u8 {
        /// Block ids/states changed and must be resent to the host.
        const BLOCKS = 0b0000_0001;
        /// Chunk must be saved by the host.
        const SAVE = 0b0000_0010;
    }
}

impl Default for DirtyFlags {
    fn default() -> Self {
        DirtyFlags::empty()
    }
}

/// Chunk storing voxel data in SoA form plus dirty flags.
pub struct Chunk {
    position: ChunkPos,
    voxels: Vec<Voxel>,
    dirty: DirtyFlags,
}

impl Chunk {
    /// Allocate a fresh chunk filled with air.
    pub fn new(position: ChunkPos) -> Self {
        Self {
            position,
            voxels: vec![Voxel::default(); CHUNK_VOLUME],
            dirty: DirtyFlags::empty(),
        }
    }

    #[inline]
    pub fn position(&self) -> ChunkPos {
        self.position
    }

    fn index(x: usize, y: usize, z: usize) -> usize {
        LocalPos { x, y, z }.index()
    }

    /// Fetch a voxel copy.
    pub fn voxel(&self, x: usize, y: usize, z: usize) -> Voxel {
        let idx = Self::index(x, y, z);
        self.voxels[idx]
    }

    /// Set a voxel and mark the relevant dirty flags.
    pub fn set_voxel(&mut self, x: usize, y: usize, z: usize, voxel: Voxel) {
        let idx = Self::index(x, y, z);
        if self.voxels[idx] != voxel {
            self.voxels[idx] = voxel;
            self.dirty.insert(DirtyFlags::BLOCKS | DirtyFlags::SAVE);
        }
    }

    /// Consume and return the current dirty flags.
    pub fn take_dirty_flags(&mut self) -> DirtyFlags {
        let flags = self.dirty;
        self.dirty = DirtyFlags::empty();
        flags
    }
}
