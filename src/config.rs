/// Progress update interval (tick every N pages)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Extension of every shard file
pub const SHARD_EXTENSION: &str = "json";

/// Default byte budget of one shard file (8 MiB)
pub const DEFAULT_MAX_SHARD_BYTES: u64 = 8 * 1024 * 1024;

/// Default cap on files per category
pub const DEFAULT_MAX_SHARD_FILES: usize = 9999;

/// Items per shard for the count-bounded categories
pub const PLAYABLE_CHARACTERS_PER_SHARD: usize = 50;
pub const NPCS_PER_SHARD: usize = 250;
pub const QUESTS_PER_SHARD: usize = 100;

/// Bucket label shared by keys starting with a digit
pub const DIGIT_BUCKET: &str = "0-9";

/// Bucket label for keys starting with anything else (and for an empty category)
pub const SYMBOL_BUCKET: &str = "_";

/// Title suffixes of the satellite sub-pages
pub const LORE_SUFFIX: &str = "/Lore";
pub const VOICE_OVERS_SUFFIX: &str = "/Voice-Overs";
pub const COMPANION_SUFFIX: &str = "/Companion";

/// Body marker of a namecard page
pub const NAMECARD_MARKER: &str = "is a [[Namecard]] obtained by";

/// Body marker present on every playable character page
pub const CHARACTER_TABS_MARKER: &str = "CharacterTabs";

/// Substituted for `{character}` / `{name}` placeholders in voice lines
pub const PLAYER_PLACEHOLDER: &str = "Player";
