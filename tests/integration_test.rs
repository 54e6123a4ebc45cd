//! End-to-end tests: BZ2-compressed XML dump in, sharded JSON files out.
//!
//! All tests share the `sample_xml()` fixture, a small dump where a lore sub-page
//! arrives before its character, a namecard arrives after it, one page is caught by
//! the ignore list, one satellite has no primary at all, and a redirect is mixed in.

use bzip2::write::BzEncoder;
use bzip2::Compression;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use wikishard::extract::{inspect, run_extraction, ExtractOptions, Inspection};
use wikishard::parser::WikiReader;
use wikishard::registry::BudgetOverrides;
use wikishard::sink::ShardError;

/// Helper: create a BZ2-compressed XML file with a `.xml.bz2` name.
fn create_bz2_xml(xml: &str) -> NamedTempFile {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(xml.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut tmp = tempfile::Builder::new()
        .suffix(".xml.bz2")
        .tempfile()
        .unwrap();
    tmp.write_all(&compressed).unwrap();
    tmp.flush().unwrap();
    tmp
}

fn sample_xml() -> &'static str {
    r#"<mediawiki>
        <siteinfo><sitename>Test Wiki</sitename></siteinfo>
        <page>
            <title>Amber/Lore</title>
            <ns>0</ns>
            <revision><text>== Personality ==
Amber is cheerful.
</text></revision>
        </page>
        <page>
            <title>Amber</title>
            <ns>0</ns>
            <revision><text>{{CharacterTabs}}
{{Character Infobox
|name = Amber
|region = Mondstadt
|affiliation = [[Knights of Favonius]]
}}
'''Amber''' is a playable character.</text></revision>
        </page>
        <page>
            <title>Amber: Outrider</title>
            <ns>0</ns>
            <revision><text>{{Item Infobox
|type = Namecard
|id = 210001
|description = Amber's namecard.
|source1 = Reach Friendship Level 10 with Amber
}}
'''Amber: Outrider''' is a [[Namecard]] obtained by raising friendship.</text></revision>
        </page>
        <page>
            <title>Dull Blade</title>
            <ns>0</ns>
            <revision><text>{{Weapon Infobox
|type = Sword
|rarity = 1
}}
'''Dull Blade''' is a one-star [[sword]].</text></revision>
        </page>
        <page>
            <title>Version 1.0</title>
            <ns>0</ns>
            <revision><text>{{Weapon Infobox
|type = Sword
}}</text></revision>
        </page>
        <page>
            <title>Amber (Character)</title>
            <ns>0</ns>
            <redirect title="Amber" />
            <revision><text>#REDIRECT [[Amber]]</text></revision>
        </page>
        <page>
            <title>Ghost/Lore</title>
            <ns>0</ns>
            <revision><text>== Personality ==
Nobody is here.
</text></revision>
        </page>
        <page>
            <title>Main Page</title>
            <ns>0</ns>
            <revision><text>Welcome to the wiki!</text></revision>
        </page>
    </mediawiki>"#
}

fn ignore_file() -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    write!(tmp, r#"{{"titles": ["Version"], "keywords": []}}"#).unwrap();
    tmp.flush().unwrap();
    tmp
}

fn options(input: &Path, output: &Path) -> ExtractOptions {
    ExtractOptions {
        input: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        ..ExtractOptions::default()
    }
}

fn read_json(path: PathBuf) -> Value {
    let data = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("missing {}: {e}", path.display()));
    serde_json::from_str(&data).unwrap()
}

// ============================================================================
// Parser Tests
// ============================================================================

#[test]
fn test_reader_decompresses_and_skips_redirects() {
    let input = create_bz2_xml(sample_xml());
    let titles: Vec<String> = WikiReader::open(input.path())
        .unwrap()
        .map(|page| page.unwrap().title)
        .collect();

    assert_eq!(titles.len(), 7);
    assert!(!titles.iter().any(|t| t == "Amber (Character)"));
    assert_eq!(titles[0], "Amber/Lore");
}

// ============================================================================
// Extraction Tests
// ============================================================================

#[test]
fn test_full_extraction() {
    let input = create_bz2_xml(sample_xml());
    let ignore = ignore_file();
    let out = TempDir::new().unwrap();

    let mut opts = options(input.path(), out.path());
    opts.ignore_list = Some(ignore.path().to_path_buf());
    let report = run_extraction(&opts).unwrap();
    let stats = &report.stats;

    assert_eq!(stats.pages(), 7);
    assert_eq!(stats.skipped(), 1);
    assert_eq!(stats.primaries(), 2);
    assert_eq!(stats.deferred(), 2);
    assert_eq!(stats.claimed(), 1);
    assert_eq!(stats.attached(), 1);
    assert_eq!(stats.orphans(), 1);
    assert_eq!(stats.unclassified(), 1);
    assert_eq!(stats.records(), 2);

    // The lore page came first, the namecard after: both end up on Amber.
    let characters = read_json(
        out.path()
            .join("playableCharacters/playableCharacters.0000.json"),
    );
    let characters = characters.as_array().unwrap();
    assert_eq!(characters.len(), 1);
    let amber = &characters[0];
    assert_eq!(amber["name"], "Amber");
    assert_eq!(amber["kind"], "playableCharacter");
    assert_eq!(amber["fields"]["affiliation"], "Knights of Favonius");
    assert_eq!(amber["lore"]["personality"], "Amber is cheerful.");
    assert_eq!(amber["namecard"]["title"], "Outrider");
    assert_eq!(amber["namecard"]["id"], 210001);

    let weapons = read_json(out.path().join("weapons/weapons.D.json"));
    assert_eq!(weapons.as_array().unwrap().len(), 1);
    assert_eq!(weapons[0]["title"], "Dull Blade");
    assert!(!out.path().join("weapons/weapons.V.json").exists());
}

#[test]
fn test_empty_categories_are_valid_arrays() {
    let input = create_bz2_xml(sample_xml());
    let out = TempDir::new().unwrap();
    run_extraction(&options(input.path(), out.path())).unwrap();

    assert_eq!(read_json(out.path().join("npcs/npcs.0000.json")), Value::Array(vec![]));
    assert_eq!(read_json(out.path().join("quest/quest.0000.json")), Value::Array(vec![]));
    assert_eq!(read_json(out.path().join("books/books._.json")), Value::Array(vec![]));
}

#[test]
fn test_without_ignore_list_all_weapons_are_written() {
    let input = create_bz2_xml(sample_xml());
    let out = TempDir::new().unwrap();
    let report = run_extraction(&options(input.path(), out.path())).unwrap();

    assert_eq!(report.stats.skipped(), 0);
    let weapons = report
        .summaries
        .iter()
        .find(|s| s.category == "weapons")
        .unwrap();
    assert_eq!(weapons.total_items, 2);
    assert!(out.path().join("weapons/weapons.V.json").exists());
}

#[test]
fn test_summaries_match_files_on_disk() {
    let input = create_bz2_xml(sample_xml());
    let out = TempDir::new().unwrap();
    let report = run_extraction(&options(input.path(), out.path())).unwrap();

    assert_eq!(report.summaries.len(), 11);
    for summary in &report.summaries {
        let dir = out.path().join(&summary.category);
        let mut items = 0;
        for shard in &summary.shards {
            let path = dir.join(&shard.file);
            assert_eq!(fs::metadata(&path).unwrap().len(), shard.bytes);
            items += read_json(path).as_array().unwrap().len();
        }
        assert_eq!(items, summary.total_items);
    }
}

#[test]
fn test_dry_run_writes_nothing() {
    let input = create_bz2_xml(sample_xml());
    let out = TempDir::new().unwrap();
    let target = out.path().join("never");

    let mut opts = options(input.path(), &target);
    opts.dry_run = true;
    let report = run_extraction(&opts).unwrap();

    assert!(report.summaries.is_empty());
    assert_eq!(report.stats.primaries(), 3);
    assert_eq!(report.stats.records(), 0);
    assert!(!target.exists());
}

#[test]
fn test_limit_stops_early() {
    let input = create_bz2_xml(sample_xml());
    let out = TempDir::new().unwrap();

    let mut opts = options(input.path(), out.path());
    opts.limit = Some(1);
    let report = run_extraction(&opts).unwrap();

    assert_eq!(report.stats.pages(), 1);
    assert_eq!(report.stats.orphans(), 1);
    assert_eq!(report.stats.records(), 0);
}

#[test]
fn test_clean_removes_previous_output() {
    let input = create_bz2_xml(sample_xml());
    let out = TempDir::new().unwrap();
    let stale = out.path().join("stale.json");
    fs::write(&stale, "[]").unwrap();

    let mut opts = options(input.path(), out.path());
    opts.clean = true;
    run_extraction(&opts).unwrap();

    assert!(!stale.exists());
    assert!(out.path().join("playableCharacters").is_dir());
}

#[test]
fn test_fail_on_oversize_aborts_with_typed_error() {
    let input = create_bz2_xml(sample_xml());
    let out = TempDir::new().unwrap();

    let mut opts = options(input.path(), out.path());
    opts.overrides = BudgetOverrides {
        max_bytes: Some(16),
        fail_on_oversize: true,
        ..BudgetOverrides::default()
    };
    let err = run_extraction(&opts).err().unwrap();

    match err.downcast_ref::<ShardError>() {
        Some(ShardError::Oversize {
            category,
            max_bytes,
            ..
        }) => {
            assert_eq!(category, "playableCharacters");
            assert_eq!(*max_bytes, 16);
        }
        other => panic!("expected oversize error, got {other:?}"),
    }

    // Writers opened before the failure were still closed.
    assert_eq!(
        read_json(out.path().join("npcs/npcs.0000.json")),
        Value::Array(vec![])
    );
}

#[test]
fn test_missing_input_is_an_error() {
    let out = TempDir::new().unwrap();
    let opts = options(Path::new("/no/such/dump.xml.bz2"), out.path());
    let err = run_extraction(&opts).err().unwrap();
    assert!(format!("{err:#}").contains("Failed to open wiki dump"));
}

// ============================================================================
// Inspect Tests
// ============================================================================

#[test]
fn test_inspect_finds_page_by_title() {
    let input = create_bz2_xml(sample_xml());

    match inspect(input.path(), "amber: outrider").unwrap() {
        Some(Inspection::Satellite { owner_key, kind, .. }) => {
            assert_eq!(owner_key, "Amber");
            assert_eq!(kind, "namecard");
        }
        other => panic!("expected namecard, got {other:?}"),
    }

    match inspect(input.path(), "Dull Blade").unwrap() {
        Some(Inspection::Primary { record }) => assert_eq!(record.name, "Dull Blade"),
        other => panic!("expected weapon, got {other:?}"),
    }

    assert!(inspect(input.path(), "Nowhere").unwrap().is_none());
}
