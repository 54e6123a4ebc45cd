//! Page classification and primary/satellite association.
//!
//! Pages arrive in dump order, so a `X/Lore` page may be seen before `X` itself. A
//! satellite whose primary is already known is attached on the spot; otherwise it is
//! parked in the [`PendingLedger`] under its canonical key and claimed when the
//! primary turns up. Whatever is still parked at the end is an orphan and is dropped.

use crate::entities::parse_entity;
use crate::models::{canonical_key, EntityKind, EntityRecord, Page, Satellite, SatelliteKind};
use crate::satellites::{is_candidate, parse_satellite};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

/// One step of the classification cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detector {
    Primary(EntityKind),
    Satellite(SatelliteKind),
}

/// First match wins. Playable characters come before their own sub-pages, satellites
/// before the generic kinds (a namecard page also carries an item infobox), and NPCs
/// after the kinds whose pages also embed a character infobox.
pub const CASCADE: [Detector; 15] = [
    Detector::Primary(EntityKind::PlayableCharacter),
    Detector::Satellite(SatelliteKind::Lore),
    Detector::Satellite(SatelliteKind::VoiceOvers),
    Detector::Satellite(SatelliteKind::Companion),
    Detector::Satellite(SatelliteKind::Namecard),
    Detector::Primary(EntityKind::Weapon),
    Detector::Primary(EntityKind::Artifact),
    Detector::Primary(EntityKind::Npc),
    Detector::Primary(EntityKind::Enemy),
    Detector::Primary(EntityKind::Faction),
    Detector::Primary(EntityKind::Book),
    Detector::Primary(EntityKind::Location),
    Detector::Primary(EntityKind::Item),
    Detector::Primary(EntityKind::Furnishing),
    Detector::Primary(EntityKind::Quest),
];

/// Whether records of `kind` take satellite payloads.
pub fn accepts_satellites(kind: EntityKind) -> bool {
    kind == EntityKind::PlayableCharacter
}

/// What happened to one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new primary record; `claimed` parked satellites were merged into it.
    Primary { kind: EntityKind, claimed: usize },
    /// A satellite merged into an already-known primary.
    Attached(SatelliteKind),
    /// A satellite parked until its primary shows up.
    Deferred(SatelliteKind),
    Unclassified,
}

/// Satellite payloads waiting for their primary, one map per satellite kind.
#[derive(Debug, Default)]
pub struct PendingLedger {
    ledgers: [FxHashMap<String, Satellite>; 4],
}

impl PendingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks `satellite` under `key`. A later payload of the same kind and key replaces
    /// the earlier one, which is returned.
    pub fn park(&mut self, key: &str, satellite: Satellite) -> Option<Satellite> {
        let index = satellite.kind().index();
        self.ledgers[index].insert(match_key(key), satellite)
    }

    /// Removes and returns every parked payload for `key`, across all kinds.
    pub fn claim(&mut self, key: &str) -> Vec<Satellite> {
        let key = match_key(key);
        self.ledgers
            .iter_mut()
            .filter_map(|ledger| ledger.remove(&key))
            .collect()
    }

    pub fn contains(&self, kind: SatelliteKind, key: &str) -> bool {
        self.ledgers[kind.index()].contains_key(&match_key(key))
    }

    pub fn pending(&self, kind: SatelliteKind) -> usize {
        self.ledgers[kind.index()].len()
    }

    pub fn len(&self) -> usize {
        self.ledgers.iter().map(FxHashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards everything still parked and returns how many entries that was.
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        for (kind, ledger) in SatelliteKind::ALL.iter().zip(self.ledgers.iter_mut()) {
            for key in ledger.keys() {
                debug!(kind = %kind, key = %key, "Dropping satellite without a primary page");
            }
            dropped += ledger.len();
            ledger.clear();
        }
        dropped
    }
}

/// Keys are compared case-insensitively.
fn match_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// The records of a finished pass.
#[derive(Debug)]
pub struct Resolution {
    /// Primary records in arrival order.
    pub records: Vec<EntityRecord>,
    /// Satellites that never met their primary.
    pub orphans: usize,
}

/// Single-pass classifier that owns the by-key primary map and the ledger.
#[derive(Debug, Default)]
pub struct AssociationResolver {
    records: Vec<EntityRecord>,
    primaries: FxHashMap<String, usize>,
    ledger: PendingLedger,
}

impl AssociationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `page` by the first matching detector and links it.
    pub fn resolve(&mut self, page: &Page) -> Outcome {
        match classify(page) {
            Some(Classified::Primary(record)) => self.add_primary(record),
            Some(Classified::Satellite(owner, satellite)) => self.add_satellite(&owner, satellite),
            None => Outcome::Unclassified,
        }
    }

    /// Adds a primary record, first merging any satellites parked under its key.
    pub fn add_primary(&mut self, mut record: EntityRecord) -> Outcome {
        let kind = record.kind;
        let mut claimed = 0;

        if accepts_satellites(kind) {
            let key = match_key(&canonical_key(&record.title));
            for satellite in self.ledger.claim(&key) {
                record.attach(satellite);
                claimed += 1;
            }
            let index = self.records.len();
            if let Some(previous) = self.primaries.insert(key, index) {
                debug!(
                    title = %record.title,
                    previous = %self.records[previous].title,
                    "Duplicate primary key, later page takes over satellite links"
                );
            }
        }

        self.records.push(record);
        Outcome::Primary { kind, claimed }
    }

    /// Attaches a satellite to its primary, or parks it until the primary arrives.
    pub fn add_satellite(&mut self, owner: &str, satellite: Satellite) -> Outcome {
        let kind = satellite.kind();
        let key = match_key(owner);

        if let Some(&index) = self.primaries.get(&key) {
            self.records[index].attach(satellite);
            return Outcome::Attached(kind);
        }

        if self.ledger.park(&key, satellite).is_some() {
            debug!(kind = %kind, key = %key, "Replacing parked satellite with a later page");
        }
        Outcome::Deferred(kind)
    }

    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    pub fn ledger(&self) -> &PendingLedger {
        &self.ledger
    }

    /// Ends the pass. Unclaimed satellites are discarded, not reported as errors.
    pub fn finish(mut self) -> Resolution {
        let orphans = self.ledger.drain();
        if orphans > 0 {
            info!(orphans, "Discarded satellites with no matching primary page");
        }
        Resolution {
            records: self.records,
            orphans,
        }
    }
}

/// A page's classification before it is linked.
#[derive(Debug)]
pub enum Classified {
    Primary(EntityRecord),
    Satellite(String, Satellite),
}

/// Runs the detector cascade on one page.
pub fn classify(page: &Page) -> Option<Classified> {
    CASCADE.iter().find_map(|detector| match *detector {
        Detector::Primary(kind) => parse_entity(kind, page).map(Classified::Primary),
        Detector::Satellite(kind) if is_candidate(kind, page) => parse_satellite(kind, page)
            .map(|(owner, satellite)| Classified::Satellite(owner, satellite)),
        Detector::Satellite(_) => None,
    })
}
