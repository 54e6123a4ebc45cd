use crate::config::PROGRESS_INTERVAL;
use crate::ignore::IgnoreList;
use crate::models::{EntityKind, EntityRecord, Page, Satellite};
use crate::parser::WikiReader;
use crate::registry::{
    apply_overrides, default_registry, validate, BudgetOverrides, CategoryRegistration,
};
use crate::resolver::{classify, AssociationResolver, Classified};
use crate::sink::{RecordSink, ShardSummary};
use crate::stats::RunStats;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything one `extract` run needs.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub ignore_list: Option<PathBuf>,
    pub limit: Option<u64>,
    pub dry_run: bool,
    pub clean: bool,
    pub overrides: BudgetOverrides,
}

pub struct RunReport {
    pub summaries: Vec<ShardSummary>,
    pub stats: RunStats,
}

/// Single pass over `pages`: skip, classify, link, then write every record into the
/// first registration of its kind.
///
/// Writers are opened before the first page is read, so a failure part-way still
/// leaves a closed, valid file for every category. A dry run opens no writers and
/// writes nothing.
pub fn process_pages<I, F>(
    pages: I,
    skip: F,
    registry: &[CategoryRegistration],
    output_dir: &Path,
    dry_run: bool,
    stats: &RunStats,
) -> Result<Vec<ShardSummary>>
where
    I: IntoIterator<Item = Result<Page>>,
    F: Fn(&Page) -> bool,
{
    validate(registry)?;

    let mut sinks: Vec<Box<dyn RecordSink<EntityRecord>>> = if dry_run {
        Vec::new()
    } else {
        registry
            .iter()
            .map(|registration| {
                registration.open(output_dir).with_context(|| {
                    format!("Failed to open writer for category '{}'", registration.key)
                })
            })
            .collect::<Result<_>>()?
    };

    let pb = ProgressBar::new_spinner();
    let mut resolver = AssociationResolver::new();

    for page in pages {
        let page = page?;
        stats.inc_pages();
        if stats.pages() % PROGRESS_INTERVAL == 0 {
            pb.set_message(format!("{} pages", stats.pages()));
            pb.tick();
        }

        if skip(&page) {
            debug!(title = %page.title, "Skipping ignored page");
            stats.inc_skipped();
            continue;
        }
        stats.record_outcome(resolver.resolve(&page));
    }

    pb.finish_and_clear();

    let resolution = resolver.finish();
    stats.add_orphans(resolution.orphans as u64);
    info!(
        pages = stats.pages(),
        records = resolution.records.len(),
        orphans = resolution.orphans,
        "Classification pass complete"
    );

    for record in &resolution.records {
        let Some(index) = route(registry, record.kind) else {
            debug!(title = %record.title, kind = %record.kind, "No category registered for record");
            stats.add_unrouted(1);
            continue;
        };
        if let Some(sink) = sinks.get_mut(index) {
            sink.write(record)?;
            stats.add_records(1);
        }
    }

    let mut summaries = Vec::with_capacity(sinks.len());
    for sink in sinks {
        let summary = sink.finish()?;
        stats.add_shards(summary.shards.len() as u64);
        info!(
            category = %summary.category,
            items = summary.total_items,
            shards = summary.shards.len(),
            "Category written"
        );
        summaries.push(summary);
    }
    Ok(summaries)
}

fn route(registry: &[CategoryRegistration], kind: EntityKind) -> Option<usize> {
    registry.iter().position(|r| r.kind == kind)
}

/// Opens the dump, loads the ignore list and runs [`process_pages`] against the
/// default registry with `options.overrides` folded in.
pub fn run_extraction(options: &ExtractOptions) -> Result<RunReport> {
    let output_dir = options.output_dir.as_path();

    if options.clean && output_dir.exists() {
        info!("Cleaning output directory: {}", output_dir.display());
        fs::remove_dir_all(output_dir).with_context(|| {
            format!("Failed to clean output directory: {}", output_dir.display())
        })?;
    }
    if !options.dry_run {
        fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory: {}", output_dir.display())
        })?;
    }

    let ignore = match &options.ignore_list {
        Some(path) => IgnoreList::load(path)?,
        None => IgnoreList::default(),
    };

    let mut registry = default_registry();
    apply_overrides(&mut registry, &options.overrides);

    let reader = WikiReader::open(&options.input)?;
    let limit = options
        .limit
        .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

    info!(input = %options.input.display(), "Starting extraction pass");
    let stats = RunStats::new();
    let summaries = process_pages(
        reader.take(limit),
        |page| ignore.should_skip(&page.title, &page.text),
        &registry,
        output_dir,
        options.dry_run,
        &stats,
    )?;

    Ok(RunReport { summaries, stats })
}

/// How one page classifies, for the `inspect` command.
#[derive(Debug, Serialize)]
#[serde(tag = "classification", rename_all = "camelCase")]
pub enum Inspection {
    Primary {
        record: EntityRecord,
    },
    #[serde(rename_all = "camelCase")]
    Satellite {
        title: String,
        kind: String,
        owner_key: String,
        payload: Satellite,
    },
    Unclassified {
        title: String,
    },
}

pub fn inspect_page(page: &Page) -> Inspection {
    match classify(page) {
        Some(Classified::Primary(record)) => Inspection::Primary { record },
        Some(Classified::Satellite(owner_key, payload)) => Inspection::Satellite {
            title: page.title.clone(),
            kind: payload.kind().to_string(),
            owner_key,
            payload,
        },
        None => Inspection::Unclassified {
            title: page.title.clone(),
        },
    }
}

/// Scans the dump for `title` (case-insensitive) and classifies the first match.
pub fn inspect(input: &Path, title: &str) -> Result<Option<Inspection>> {
    let wanted = title.trim().to_lowercase();
    for page in WikiReader::open(input)? {
        let page = page?;
        if page.title.trim().to_lowercase() == wanted {
            return Ok(Some(inspect_page(&page)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ShardPolicy;
    use crate::sink::ShardBudget;
    use tempfile::TempDir;

    const CHARACTER: &str = "{{CharacterTabs}}\n{{Character Infobox\n|name = Foo\n|region = Mondstadt\n}}\nFoo is a knight.";
    const LORE: &str = "== Personality ==\nFoo is kind.\n";
    const WEAPON: &str = "{{Weapon Infobox\n|type = Sword\n}}\nA sword.";

    fn pages(items: &[(&str, &str)]) -> Vec<Result<Page>> {
        items
            .iter()
            .map(|(title, text)| Ok(Page::new(*title, *text)))
            .collect()
    }

    fn registry() -> Vec<CategoryRegistration> {
        vec![
            CategoryRegistration::new(
                "characters",
                EntityKind::PlayableCharacter,
                ShardPolicy::Count(ShardBudget::items(10)),
            ),
            CategoryRegistration::new("weapons", EntityKind::Weapon, ShardPolicy::Single),
        ]
    }

    #[test]
    fn pass_merges_and_writes() {
        let dir = TempDir::new().unwrap();
        let stats = RunStats::new();
        let summaries = process_pages(
            pages(&[("Foo/Lore", LORE), ("Foo", CHARACTER), ("Blade", WEAPON)]),
            |_| false,
            &registry(),
            dir.path(),
            false,
            &stats,
        )
        .unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].total_items, 1);
        assert_eq!(summaries[1].total_items, 1);
        assert_eq!(stats.pages(), 3);
        assert_eq!(stats.deferred(), 1);
        assert_eq!(stats.claimed(), 1);
        assert_eq!(stats.records(), 2);

        let written = fs::read_to_string(dir.path().join("characters/characters.0000.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(json[0]["name"], "Foo");
        assert_eq!(json[0]["lore"]["personality"], "Foo is kind.");
    }

    #[test]
    fn skipped_pages_never_classify() {
        let dir = TempDir::new().unwrap();
        let stats = RunStats::new();
        let summaries = process_pages(
            pages(&[("Foo", CHARACTER), ("Blade", WEAPON)]),
            |page| page.title == "Blade",
            &registry(),
            dir.path(),
            false,
            &stats,
        )
        .unwrap();

        assert_eq!(stats.skipped(), 1);
        assert_eq!(summaries[1].total_items, 0);
        let weapons = fs::read_to_string(dir.path().join("weapons/weapons.0000.json")).unwrap();
        assert_eq!(weapons, "[]");
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let stats = RunStats::new();
        let summaries = process_pages(
            pages(&[("Foo", CHARACTER)]),
            |_| false,
            &registry(),
            &out,
            true,
            &stats,
        )
        .unwrap();

        assert!(summaries.is_empty());
        assert_eq!(stats.primaries(), 1);
        assert_eq!(stats.records(), 0);
        assert!(!out.exists());
    }

    #[test]
    fn records_without_a_category_are_counted() {
        let dir = TempDir::new().unwrap();
        let stats = RunStats::new();
        let only_weapons = vec![CategoryRegistration::new(
            "weapons",
            EntityKind::Weapon,
            ShardPolicy::Single,
        )];
        process_pages(
            pages(&[("Foo", CHARACTER), ("Blade", WEAPON)]),
            |_| false,
            &only_weapons,
            dir.path(),
            false,
            &stats,
        )
        .unwrap();

        assert_eq!(stats.unrouted(), 1);
        assert_eq!(stats.records(), 1);
    }

    #[test]
    fn read_errors_stop_the_pass() {
        let dir = TempDir::new().unwrap();
        let stats = RunStats::new();
        let input = vec![
            Ok(Page::new("Foo", CHARACTER)),
            Err(anyhow::anyhow!("Malformed XML at byte 10")),
        ];
        let err = process_pages(input, |_| false, &registry(), dir.path(), false, &stats)
            .unwrap_err();
        assert!(err.to_string().contains("Malformed XML"));

        let characters =
            fs::read_to_string(dir.path().join("characters/characters.0000.json")).unwrap();
        assert_eq!(characters, "[]");
    }

    #[test]
    fn inspect_reports_satellite_owner() {
        let inspection = inspect_page(&Page::new("Foo/Lore", LORE));
        let json = serde_json::to_value(&inspection).unwrap();
        assert_eq!(json["classification"], "satellite");
        assert_eq!(json["ownerKey"], "Foo");
        assert_eq!(json["kind"], "lore");
        assert_eq!(json["payload"]["personality"], "Foo is kind.");

        let json = serde_json::to_value(inspect_page(&Page::new("Main Page", "Hi"))).unwrap();
        assert_eq!(json["classification"], "unclassified");
    }
}
