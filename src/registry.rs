//! Which categories exist, which records flow into each, and how each is sharded.

use crate::config::{NPCS_PER_SHARD, PLAYABLE_CHARACTERS_PER_SHARD, QUESTS_PER_SHARD};
use crate::models::{EntityKind, EntityRecord};
use crate::sink::{
    BucketShardWriter, CountShardWriter, KeySelector, OversizePolicy, RecordSink, ShardBudget,
};
use anyhow::{bail, Result};
use rustc_hash::FxHashSet;
use std::path::Path;

/// Record field a bucketed category groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyField {
    Title,
    Name,
}

impl KeyField {
    pub fn selector(self) -> KeySelector<EntityRecord> {
        match self {
            KeyField::Title => Box::new(|record: &EntityRecord| record.title.clone()),
            KeyField::Name => Box::new(|record: &EntityRecord| record.name.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardPolicy {
    /// One unbounded file.
    Single,
    /// Sequential shards within a budget.
    Count(ShardBudget),
    /// One file per first-character bucket of `key`.
    Bucketed { key: KeyField, budget: ShardBudget },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRegistration {
    pub key: String,
    pub kind: EntityKind,
    pub policy: ShardPolicy,
}

impl CategoryRegistration {
    pub fn new(key: &str, kind: EntityKind, policy: ShardPolicy) -> Self {
        Self {
            key: key.to_string(),
            kind,
            policy,
        }
    }

    /// Opens this category's writer in `output_dir/{key}/`.
    pub fn open(&self, output_dir: &Path) -> Result<Box<dyn RecordSink<EntityRecord>>> {
        let dir = output_dir.join(&self.key);
        let sink: Box<dyn RecordSink<EntityRecord>> = match self.policy {
            ShardPolicy::Single => Box::new(CountShardWriter::create(
                dir,
                &self.key,
                ShardBudget::unbounded(),
            )?),
            ShardPolicy::Count(budget) => {
                Box::new(CountShardWriter::create(dir, &self.key, budget)?)
            }
            ShardPolicy::Bucketed { key, budget } => Box::new(BucketShardWriter::create(
                dir,
                &self.key,
                budget,
                key.selector(),
            )?),
        };
        Ok(sink)
    }
}

/// The categories of a full wiki export.
pub fn default_registry() -> Vec<CategoryRegistration> {
    let bucketed = ShardPolicy::Bucketed {
        key: KeyField::Title,
        budget: ShardBudget::default(),
    };
    vec![
        CategoryRegistration::new(
            "playableCharacters",
            EntityKind::PlayableCharacter,
            ShardPolicy::Count(ShardBudget::items(PLAYABLE_CHARACTERS_PER_SHARD)),
        ),
        CategoryRegistration::new(
            "npcs",
            EntityKind::Npc,
            ShardPolicy::Count(ShardBudget::items(NPCS_PER_SHARD)),
        ),
        CategoryRegistration::new(
            "quest",
            EntityKind::Quest,
            ShardPolicy::Count(ShardBudget::items(QUESTS_PER_SHARD)),
        ),
        CategoryRegistration::new("weapons", EntityKind::Weapon, bucketed),
        CategoryRegistration::new("artifacts", EntityKind::Artifact, bucketed),
        CategoryRegistration::new("enemy", EntityKind::Enemy, bucketed),
        CategoryRegistration::new("factions", EntityKind::Faction, bucketed),
        CategoryRegistration::new("books", EntityKind::Book, bucketed),
        CategoryRegistration::new("location", EntityKind::Location, bucketed),
        CategoryRegistration::new("item", EntityKind::Item, bucketed),
        CategoryRegistration::new("furnishing", EntityKind::Furnishing, bucketed),
    ]
}

/// The first registration receiving records of `kind`.
pub fn registration_for(
    registry: &[CategoryRegistration],
    kind: EntityKind,
) -> Option<&CategoryRegistration> {
    registry.iter().find(|r| r.kind == kind)
}

/// Rejects empty, path-like, or duplicate category keys.
pub fn validate(registry: &[CategoryRegistration]) -> Result<()> {
    let mut seen = FxHashSet::default();
    for registration in registry {
        let key = registration.key.as_str();
        if key.trim().is_empty() {
            bail!("Category key must not be empty");
        }
        if key.contains(['/', '\\']) || key == "." || key == ".." {
            bail!("Category key '{}' is not a plain directory name", key);
        }
        if !seen.insert(key) {
            bail!("Category key '{}' is registered twice", key);
        }
    }
    Ok(())
}

/// Budget settings given on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BudgetOverrides {
    pub max_bytes: Option<u64>,
    pub max_items: Option<usize>,
    pub max_files: Option<usize>,
    pub fail_on_oversize: bool,
}

impl BudgetOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, budget: ShardBudget) -> ShardBudget {
        ShardBudget {
            max_bytes: self.max_bytes.unwrap_or(budget.max_bytes),
            max_items: self.max_items.unwrap_or(budget.max_items),
            max_files: self.max_files.unwrap_or(budget.max_files),
            oversize: if self.fail_on_oversize {
                OversizePolicy::Fail
            } else {
                budget.oversize
            },
        }
        .normalized()
    }
}

/// Folds command-line budgets into every registration. A `Single` category becomes
/// count-bounded once any override is given.
pub fn apply_overrides(registry: &mut [CategoryRegistration], overrides: &BudgetOverrides) {
    if overrides.is_empty() {
        return;
    }
    for registration in registry.iter_mut() {
        registration.policy = match registration.policy {
            ShardPolicy::Single => ShardPolicy::Count(overrides.apply(ShardBudget::unbounded())),
            ShardPolicy::Count(budget) => ShardPolicy::Count(overrides.apply(budget)),
            ShardPolicy::Bucketed { key, budget } => ShardPolicy::Bucketed {
                key,
                budget: overrides.apply(budget),
            },
        };
    }
}
