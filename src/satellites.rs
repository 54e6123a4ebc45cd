//! Parsers for the sub-pages that enrich a playable character record.
//!
//! Each parser first checks the page's title (or body marker) and returns `None` when
//! the page is not that satellite or carries nothing worth keeping.

use crate::clean::{clean_inline, clean_paragraphs, clean_value, non_empty, split_list};
use crate::config::{
    COMPANION_SUFFIX, LORE_SUFFIX, NAMECARD_MARKER, PLAYER_PLACEHOLDER, VOICE_OVERS_SUFFIX,
};
use crate::content::{contains_ignore_case, extract_section, extract_section_raw};
use crate::fields::parse_fields;
use crate::models::{
    canonical_key, CharacterStory, Companion, DialogueEntry, DialogueScenario, IdleQuote, Lore,
    Namecard, OfficialIntroduction, Page, Quote, Satellite, SatelliteKind, Speaker, VoiceLine,
    VoiceOvers,
};
use crate::template::{extract_template, extract_templates, split_at_depth_zero};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static STORY_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:title|text|friendship|mention)(\d+)$").unwrap());

static VO_KEY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^vo_(\d{2})_(\d{2})_(title|tx|friendship|mention|quest|ascension)$").unwrap()
});

static DICON_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{\{\s*DIcon(?:\|[^}]*)?\}\}\s*").unwrap());

static AUDIO_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{\{\s*A\s*\|\s*([^}|]+?)\s*\}\}").unwrap());

static SPEAKER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^'{2,5}[^']+:'{2,5}\s*").unwrap());

static NOWIKI_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?nowiki>").unwrap());

static DIALOGUE_START_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{\{\s*Dialogue Start\s*\}\}").unwrap());

static DIALOGUE_END_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{\{\s*Dialogue End\s*\}\}").unwrap());

static SUBHEADING_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^===\s*([^=].*?)\s*===[ \t]*\r?$").unwrap());

/// Whether the title or body makes the page a candidate for `kind`. Cheap; no parsing.
pub fn is_candidate(kind: SatelliteKind, page: &Page) -> bool {
    match kind {
        SatelliteKind::Lore => has_suffix(&page.title, LORE_SUFFIX),
        SatelliteKind::VoiceOvers => has_suffix(&page.title, VOICE_OVERS_SUFFIX),
        SatelliteKind::Companion => has_suffix(&page.title, COMPANION_SUFFIX),
        SatelliteKind::Namecard => {
            page.title.contains(':') && contains_ignore_case(&page.text, NAMECARD_MARKER)
        }
    }
}

/// Parses `page` as a satellite of `kind`, returning the owner's key with the payload.
pub fn parse_satellite(kind: SatelliteKind, page: &Page) -> Option<(String, Satellite)> {
    match kind {
        SatelliteKind::Lore => {
            parse_lore(page).map(|lore| (canonical_key(&page.title), Satellite::Lore(lore)))
        }
        SatelliteKind::VoiceOvers => parse_voice_overs(page)
            .map(|vo| (canonical_key(&page.title), Satellite::VoiceOvers(vo))),
        SatelliteKind::Companion => parse_companion(page)
            .map(|companion| (canonical_key(&page.title), Satellite::Companion(companion))),
        SatelliteKind::Namecard => {
            parse_namecard(page).map(|(owner, card)| (owner, Satellite::Namecard(card)))
        }
    }
}

pub fn parse_lore(page: &Page) -> Option<Lore> {
    if !has_suffix(&page.title, LORE_SUFFIX) {
        return None;
    }
    let text = page.text.as_str();
    let quotes = parse_quotes(text);

    let lore = Lore {
        summary_quote: quotes.first().map(|q| q.text.clone()),
        quotes,
        personality: extract_section(text, "Personality"),
        appearance: extract_section(text, "Appearance"),
        official_introduction: parse_official_introduction(text),
        character_stories: parse_character_stories(text),
    };

    (lore != Lore::default()).then_some(lore)
}

fn parse_quotes(text: &str) -> Vec<Quote> {
    extract_templates(text, "Quote")
        .into_iter()
        .filter_map(|span| {
            let parts = split_at_depth_zero(span);
            let text = non_empty(clean_paragraphs(parts.get(1)?))?;
            let source = parts.get(2).and_then(|s| non_empty(clean_inline(s)));
            Some(Quote { text, source })
        })
        .collect()
}

fn parse_official_introduction(text: &str) -> Option<OfficialIntroduction> {
    let span = extract_template(text, "Official Introduction")?;
    let fields = parse_fields(span, "Official Introduction");

    let intro = OfficialIntroduction {
        title: fields.inline("title"),
        link: fields.get("link").and_then(|v| non_empty(clean_value(v))),
        character: fields.inline("character"),
    };
    (intro != OfficialIntroduction::default()).then_some(intro)
}

fn parse_character_stories(text: &str) -> Vec<CharacterStory> {
    let Some(span) = extract_template(text, "Character Story") else {
        return Vec::new();
    };
    let fields = parse_fields(span, "Character Story");

    let count = fields
        .iter()
        .filter_map(|(key, _)| STORY_KEY_REGEX.captures(key)?[1].parse::<usize>().ok())
        .max()
        .unwrap_or(0);

    (1..=count)
        .filter_map(|n| {
            let text = non_empty(clean_paragraphs(fields.get(&format!("text{n}"))?))?;
            Some(CharacterStory {
                title: fields.inline(&format!("title{n}")),
                text,
                friendship: fields
                    .get(&format!("friendship{n}"))
                    .and_then(|v| v.parse().ok()),
                mentions: fields
                    .get(&format!("mention{n}"))
                    .map(split_list)
                    .unwrap_or_default(),
            })
        })
        .collect()
}

pub fn parse_voice_overs(page: &Page) -> Option<VoiceOvers> {
    if !has_suffix(&page.title, VOICE_OVERS_SUFFIX) {
        return None;
    }
    let span = extract_template(&page.text, "VO/Story")?;
    let fields = parse_fields(span, "VO/Story");

    let mut lines: BTreeMap<String, VoiceLine> = BTreeMap::new();
    for (key, value) in fields.iter() {
        let Some(caps) = VO_KEY_REGEX.captures(key) else {
            continue;
        };
        let base = format!("vo_{}_{}", &caps[1], &caps[2]);
        let line = lines.entry(base.clone()).or_insert_with(|| VoiceLine {
            key: base,
            ..VoiceLine::default()
        });

        match &caps[3] {
            "title" => line.title = non_empty(fill_placeholders(&clean_inline(value))),
            "tx" => line.text = non_empty(fill_placeholders(&clean_paragraphs(value))),
            "friendship" => line.friendship = value.trim().parse().ok(),
            "ascension" => line.ascension = value.trim().parse().ok(),
            "mention" => line.mentions = split_list(value),
            "quest" => line.quest = non_empty(clean_inline(value)),
            _ => {}
        }
    }

    let story: Vec<VoiceLine> = lines
        .into_values()
        .filter(|line| line.title.is_some() || line.text.is_some())
        .collect();

    (!story.is_empty()).then_some(VoiceOvers { story })
}

fn fill_placeholders(text: &str) -> String {
    text.replace("{character}", PLAYER_PLACEHOLDER)
        .replace("{name}", PLAYER_PLACEHOLDER)
}

pub fn parse_companion(page: &Page) -> Option<Companion> {
    if !has_suffix(&page.title, COMPANION_SUFFIX) {
        return None;
    }
    let text = page.text.as_str();

    let idle_quotes = extract_section_raw(text, "Idle Quotes")
        .map(parse_idle_quotes)
        .unwrap_or_default();

    let mut dialogues = Vec::new();
    if let Some(section) = extract_section_raw(text, "Dialogue") {
        dialogues.extend(parse_scenario(section, None));
    }
    if let Some(section) = extract_section_raw(text, "Special Dialogue") {
        dialogues.extend(parse_special_dialogues(section));
    }

    let companion = Companion {
        idle_quotes,
        dialogues,
    };
    (companion != Companion::default()).then_some(companion)
}

fn parse_idle_quotes(section: &str) -> Vec<IdleQuote> {
    let mut quotes = Vec::new();
    let mut context: Option<String> = None;

    for line in dialogue_block(section).lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(';') {
            context = non_empty(clean_condition(rest));
        } else if line.starts_with(':') {
            let body = DICON_REGEX.replace_all(line.trim_start_matches(':'), "");
            if let Some(text) = non_empty(clean_inline(&body)) {
                quotes.push(IdleQuote {
                    text,
                    context: context.clone(),
                });
            }
        }
    }

    quotes
}

/// One conversation: `;` lines are conditions, `:{{DIcon}}` lines are player choices
/// (consecutive choices share a group), other `:`/`::` lines are spoken by the NPC.
/// Any line outside that flow ends the current choice group.
fn parse_scenario(section: &str, title: Option<String>) -> Option<DialogueScenario> {
    let mut scenario = DialogueScenario {
        scenario_title: title,
        ..DialogueScenario::default()
    };
    let mut group: Option<u32> = None;
    let mut groups_seen = 0u32;

    for raw in dialogue_block(section).lines() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        if let Some(rest) = raw.strip_prefix(';') {
            if let Some(condition) = non_empty(clean_condition(rest)) {
                scenario.conditions.push(condition);
            }
            continue;
        }
        if !raw.starts_with(':') {
            group = None;
            continue;
        }

        let body = raw.trim_start_matches(':').trim();
        if DICON_REGEX.is_match(body) {
            let id = *group.get_or_insert_with(|| {
                groups_seen += 1;
                groups_seen
            });
            let text = clean_inline(&DICON_REGEX.replace_all(body, ""));
            if !text.is_empty() {
                scenario.entries.push(DialogueEntry {
                    role: Speaker::Player,
                    text,
                    audio_files: Vec::new(),
                    choice_group: Some(id),
                });
            }
            continue;
        }

        let audio_files: Vec<String> = AUDIO_REGEX
            .captures_iter(body)
            .filter_map(|c| non_empty(clean_inline(&c[1])))
            .collect();
        let spoken = AUDIO_REGEX.replace_all(body, "");
        let text = clean_inline(&SPEAKER_REGEX.replace(spoken.trim(), ""));
        if !text.is_empty() || !audio_files.is_empty() {
            scenario.entries.push(DialogueEntry {
                role: Speaker::Npc,
                text,
                audio_files,
                choice_group: group,
            });
        }
    }

    (!scenario.entries.is_empty() || !scenario.conditions.is_empty()).then_some(scenario)
}

fn parse_special_dialogues(section: &str) -> Vec<DialogueScenario> {
    let headings: Vec<_> = SUBHEADING_REGEX.captures_iter(section).collect();
    if headings.is_empty() {
        return parse_scenario(section, None).into_iter().collect();
    }

    headings
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let start = caps.get(0)?.end();
            let end = headings
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(section.len(), |m| m.start());
            parse_scenario(&section[start..end], non_empty(clean_inline(&caps[1])))
        })
        .collect()
}

/// The text between `{{Dialogue Start}}` and `{{Dialogue End}}`, or the whole
/// section when it has no such markers.
fn dialogue_block(section: &str) -> &str {
    match (
        DIALOGUE_START_REGEX.find(section),
        DIALOGUE_END_REGEX.find(section),
    ) {
        (Some(start), Some(end)) if end.start() >= start.end() => {
            section[start.end()..end.start()].trim()
        }
        _ => section.trim(),
    }
}

fn clean_condition(raw: &str) -> String {
    let stripped = NOWIKI_REGEX.replace_all(raw, "");
    let trimmed = stripped.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);
    clean_inline(inner)
}

/// A namecard titled `Owner: Card`. The owner key is the text before the first `:`.
pub fn parse_namecard(page: &Page) -> Option<(String, Namecard)> {
    if !is_candidate(SatelliteKind::Namecard, page) {
        return None;
    }
    let (owner, card_title) = page.title.split_once(':')?;
    let owner = owner.trim();
    if owner.is_empty() {
        return None;
    }

    let span = extract_template(&page.text, "Item Infobox")?;
    let fields = parse_fields(span, "Item Infobox");
    let is_namecard = ["type", "group"]
        .iter()
        .any(|key| fields.get(key).is_some_and(|v| contains_ignore_case(v, "Namecard")));
    if !is_namecard {
        return None;
    }

    let card = Namecard {
        title: card_title.trim().to_string(),
        id: fields.get("id").and_then(|v| v.parse().ok()),
        description: fields.inline("description"),
        sources: fields
            .numbered("source")
            .into_iter()
            .filter_map(|v| non_empty(clean_inline(v)))
            .collect(),
    };
    if card.id.is_none() && card.description.is_none() {
        return None;
    }

    Some((owner.to_string(), card))
}

fn has_suffix(title: &str, suffix: &str) -> bool {
    title
        .trim_end()
        .len()
        .checked_sub(suffix.len())
        .and_then(|at| title.trim_end().get(at..))
        .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}
