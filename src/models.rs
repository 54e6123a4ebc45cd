use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One wiki page as yielded by the dump reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub title: String,
    pub text: String,
}

impl Page {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// Title with any namespace prefix (up to the first `:`) and any subpage suffix
/// (from the first `/`) removed.
pub fn canonical_key(title: &str) -> String {
    let mut key = title.trim();
    if let Some(colon) = key.find(':') {
        key = &key[colon + 1..];
    }
    if let Some(slash) = key.find('/') {
        key = &key[..slash];
    }
    key.trim().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    PlayableCharacter,
    Npc,
    Weapon,
    Artifact,
    Enemy,
    Faction,
    Book,
    Location,
    Item,
    Furnishing,
    Quest,
}

impl EntityKind {
    pub const ALL: [EntityKind; 11] = [
        EntityKind::PlayableCharacter,
        EntityKind::Npc,
        EntityKind::Weapon,
        EntityKind::Artifact,
        EntityKind::Enemy,
        EntityKind::Faction,
        EntityKind::Book,
        EntityKind::Location,
        EntityKind::Item,
        EntityKind::Furnishing,
        EntityKind::Quest,
    ];

    /// The tag written into every record of this kind.
    pub fn tag(self) -> &'static str {
        match self {
            EntityKind::PlayableCharacter => "playableCharacter",
            EntityKind::Npc => "npc",
            EntityKind::Weapon => "weapon",
            EntityKind::Artifact => "artifact",
            EntityKind::Enemy => "enemy",
            EntityKind::Faction => "faction",
            EntityKind::Book => "book",
            EntityKind::Location => "location",
            EntityKind::Item => "item",
            EntityKind::Furnishing => "furnishing",
            EntityKind::Quest => "quest",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag().eq_ignore_ascii_case(tag.trim()))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SatelliteKind {
    Lore,
    VoiceOvers,
    Companion,
    Namecard,
}

impl SatelliteKind {
    pub const ALL: [SatelliteKind; 4] = [
        SatelliteKind::Lore,
        SatelliteKind::VoiceOvers,
        SatelliteKind::Companion,
        SatelliteKind::Namecard,
    ];

    pub fn index(self) -> usize {
        match self {
            SatelliteKind::Lore => 0,
            SatelliteKind::VoiceOvers => 1,
            SatelliteKind::Companion => 2,
            SatelliteKind::Namecard => 3,
        }
    }
}

impl fmt::Display for SatelliteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SatelliteKind::Lore => "lore",
            SatelliteKind::VoiceOvers => "voiceOvers",
            SatelliteKind::Companion => "companion",
            SatelliteKind::Namecard => "namecard",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficialIntroduction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterStory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendship: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lore {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_quote: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quotes: Vec<Quote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appearance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub official_introduction: Option<OfficialIntroduction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub character_stories: Vec<CharacterStory>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceLine {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendship: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ascension: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceOvers {
    pub story: Vec<VoiceLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleQuote {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Speaker {
    Player,
    #[serde(rename = "NPC")]
    Npc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueEntry {
    pub role: Speaker,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audio_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choice_group: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueScenario {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
    pub entries: Vec<DialogueEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Companion {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub idle_quotes: Vec<IdleQuote>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dialogues: Vec<DialogueScenario>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Namecard {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

/// A parsed satellite page payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Satellite {
    Lore(Lore),
    VoiceOvers(VoiceOvers),
    Companion(Companion),
    Namecard(Namecard),
}

impl Satellite {
    pub fn kind(&self) -> SatelliteKind {
        match self {
            Satellite::Lore(_) => SatelliteKind::Lore,
            Satellite::VoiceOvers(_) => SatelliteKind::VoiceOvers,
            Satellite::Companion(_) => SatelliteKind::Companion,
            Satellite::Namecard(_) => SatelliteKind::Namecard,
        }
    }
}

/// A classified primary page, ready for a category writer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub title: String,
    pub name: String,
    pub kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub sections: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lore: Option<Lore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_overs: Option<VoiceOvers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub companion: Option<Companion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namecard: Option<Namecard>,
}

impl EntityRecord {
    pub fn new(title: impl Into<String>, name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            title: title.into(),
            name: name.into(),
            kind,
            description: None,
            fields: BTreeMap::new(),
            sections: BTreeMap::new(),
            sources: Vec::new(),
            lore: None,
            voice_overs: None,
            companion: None,
            namecard: None,
        }
    }

    /// Stores a satellite payload in its slot, replacing any earlier one.
    pub fn attach(&mut self, satellite: Satellite) {
        match satellite {
            Satellite::Lore(lore) => self.lore = Some(lore),
            Satellite::VoiceOvers(vo) => self.voice_overs = Some(vo),
            Satellite::Companion(companion) => self.companion = Some(companion),
            Satellite::Namecard(card) => self.namecard = Some(card),
        }
    }

    pub fn has_satellite(&self, kind: SatelliteKind) -> bool {
        match kind {
            SatelliteKind::Lore => self.lore.is_some(),
            SatelliteKind::VoiceOvers => self.voice_overs.is_some(),
            SatelliteKind::Companion => self.companion.is_some(),
            SatelliteKind::Namecard => self.namecard.is_some(),
        }
    }
}
