//! Crop kind registry.
//!
//! Kinds are plain data: a block, a growth table and a rule deciding whether
//! a live block still belongs to the kind. The registry is closed once built;
//! only durations change afterwards.

use std::collections::BTreeMap;

use crate::blocks::{self, age_of};
use crate::chunk::{BlockId, Voxel};
use crate::growth::{GrowthResult, GrowthTable};
use crate::trees::TreeType;

/// Total growth time every standard kind starts with (five minutes).
pub const DEFAULT_DURATION_MS: u64 = 300_000;

/// Index of a kind inside its [`CropRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CropKindId(pub u16);

/// How a live block is checked against a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindRule {
    /// Same block and age strictly below the given maximum.
    AgeBelow(u8),
    /// Same block, state ignored.
    SameBlock,
}

#[derive(Debug, Clone)]
pub struct CropKind {
    /// Display name.
    pub name: &'static str,
    /// Stable lookup key, also used in config files.
    pub key: &'static str,
    /// Block planted for this kind.
    pub block: BlockId,
    pub table: GrowthTable,
    pub rule: KindRule,
    /// Facing bits of the live block survive stage changes.
    pub directional: bool,
}

impl CropKind {
    /// Whether `voxel` is still a growing instance of this kind.
    pub fn matches(&self, voxel: Voxel) -> bool {
        if voxel.id != self.block {
            return false;
        }
        match self.rule {
            KindRule::AgeBelow(max) => age_of(voxel) < max,
            KindRule::SameBlock => true,
        }
    }

    /// Plain ageable crop: stages at ages `0..max`, result at `max`.
    pub fn ageable(name: &'static str, key: &'static str, block: BlockId, max_age: u8) -> Self {
        Self {
            name,
            key,
            block,
            table: GrowthTable::new(
                (0..max_age).map(|age| blocks::aged(block, age)),
                GrowthResult::Block(blocks::aged(block, max_age)),
                DEFAULT_DURATION_MS,
            ),
            rule: KindRule::AgeBelow(max_age),
            directional: false,
        }
    }

    /// Stem crop: every age is a stage, the fruit block is the result.
    pub fn stem(
        name: &'static str,
        key: &'static str,
        stem: BlockId,
        max_age: u8,
        fruit: BlockId,
    ) -> Self {
        Self {
            name,
            key,
            block: stem,
            table: GrowthTable::new(
                (0..=max_age).map(|age| blocks::aged(stem, age)),
                GrowthResult::Block(Voxel::new(fruit)),
                DEFAULT_DURATION_MS,
            ),
            rule: KindRule::SameBlock,
            directional: false,
        }
    }

    /// Sapling or mushroom: one stage, then a tree.
    pub fn sapling(name: &'static str, key: &'static str, block: BlockId, tree: TreeType) -> Self {
        Self {
            name,
            key,
            block,
            table: GrowthTable::new(
                [Voxel::new(block)],
                GrowthResult::Tree(tree),
                DEFAULT_DURATION_MS,
            ),
            rule: KindRule::SameBlock,
            directional: false,
        }
    }

    pub fn directional(mut self) -> Self {
        self.directional = true;
        self
    }
}

/// Closed table of crop kinds.
#[derive(Debug, Clone, Default)]
pub struct CropRegistry {
    kinds: Vec<CropKind>,
    by_block: BTreeMap<BlockId, CropKindId>,
    by_key: BTreeMap<&'static str, CropKindId>,
}

impl CropRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every standard kind.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(CropKind::ageable("Beet", "beet", blocks::BEETROOTS, 3));
        registry.register(CropKind::ageable("Carrot", "carrot", blocks::CARROTS, 7));
        registry.register(CropKind::ageable("Cocoa", "cocoa", blocks::COCOA, 2).directional());
        registry.register(CropKind::ageable(
            "Nether Wart",
            "nether-wart",
            blocks::NETHER_WART,
            3,
        ));
        registry.register(CropKind::ageable("Potato", "potato", blocks::POTATOES, 7));
        registry.register(CropKind::ageable(
            "Sweet Berry",
            "sweet-berry",
            blocks::SWEET_BERRY_BUSH,
            3,
        ));
        registry.register(CropKind::ageable("Wheat", "wheat", blocks::WHEAT, 7));
        registry.register(CropKind::stem("Melon", "melon", blocks::MELON_STEM, 7, blocks::MELON));
        registry.register(CropKind::stem(
            "Pumpkin",
            "pumpkin",
            blocks::PUMPKIN_STEM,
            7,
            blocks::PUMPKIN,
        ));
        registry.register(CropKind::sapling(
            "Acacia Tree",
            "acacia-tree",
            blocks::ACACIA_SAPLING,
            TreeType::Acacia,
        ));
        registry.register(CropKind::sapling(
            "Birch Tree",
            "birch-tree",
            blocks::BIRCH_SAPLING,
            TreeType::Birch,
        ));
        registry.register(CropKind::sapling(
            "Dark Oak Tree",
            "dark-oak-tree",
            blocks::DARK_OAK_SAPLING,
            TreeType::DarkOak,
        ));
        registry.register(CropKind::sapling(
            "Jungle Tree",
            "jungle-tree",
            blocks::JUNGLE_SAPLING,
            TreeType::Jungle,
        ));
        registry.register(CropKind::sapling(
            "Oak Tree",
            "oak-tree",
            blocks::OAK_SAPLING,
            TreeType::Oak,
        ));
        registry.register(CropKind::sapling(
            "Brown Mushroom",
            "brown-mushroom",
            blocks::BROWN_MUSHROOM,
            TreeType::BrownMushroom,
        ));
        registry.register(CropKind::sapling(
            "Red Mushroom",
            "red-mushroom",
            blocks::RED_MUSHROOM,
            TreeType::RedMushroom,
        ));
        registry
    }

    /// Add a kind.
    ///
    /// # Panics
    /// Panics if another kind already uses the same block or key.
    pub fn register(&mut self, kind: CropKind) -> CropKindId {
        assert!(
            !self.by_block.contains_key(&kind.block),
            "block {} already belongs to a crop kind",
            kind.block
        );
        assert!(
            !self.by_key.contains_key(kind.key),
            "crop kind key `{}` registered twice",
            kind.key
        );
        let id = CropKindId(self.kinds.len() as u16);
        self.by_block.insert(kind.block, id);
        self.by_key.insert(kind.key, id);
        self.kinds.push(kind);
        id
    }

    pub fn get(&self, id: CropKindId) -> Option<&CropKind> {
        self.kinds.get(id.0 as usize)
    }

    pub fn by_key(&self, key: &str) -> Option<CropKindId> {
        self.by_key.get(key).copied()
    }

    /// Kind whose rule accepts the live block, if any.
    pub fn kind_for_block(&self, voxel: Voxel) -> Option<CropKindId> {
        let id = *self.by_block.get(&voxel.id)?;
        self.kinds[id.0 as usize].matches(voxel).then_some(id)
    }

    /// Change a kind's total growth time. Returns false for unknown ids.
    pub fn set_duration(&mut self, id: CropKindId, duration_ms: u64) -> bool {
        match self.kinds.get_mut(id.0 as usize) {
            Some(kind) => {
                kind.table.set_duration(duration_ms);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (CropKindId, &CropKind)> {
        self.kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| (CropKindId(i as u16), kind))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
