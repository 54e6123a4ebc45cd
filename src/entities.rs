//! Table-driven mapping from a page to an [`EntityRecord`].
//!
//! Every kind reads its infobox with the shared template and field primitives; the
//! table only says which template, which sections, and which guard apply.

use crate::clean::{clean_inline, non_empty};
use crate::config::CHARACTER_TABS_MARKER;
use crate::content::{contains_ignore_case, description_template, extract_lead, extract_section};
use crate::fields::{parse_fields, FieldRecord};
use crate::models::{EntityKind, EntityRecord, Page};
use crate::template::extract_template;
use tracing::trace;

/// What a kind's page looks like.
#[derive(Debug, Clone, Copy)]
pub struct EntityShape {
    pub kind: EntityKind,
    pub template: &'static str,
    pub sections: &'static [&'static str],
}

static SHAPES: [EntityShape; 11] = [
    EntityShape {
        kind: EntityKind::PlayableCharacter,
        template: "Character Infobox",
        sections: &["Profile", "Appearance"],
    },
    EntityShape {
        kind: EntityKind::Npc,
        template: "Character Infobox",
        sections: &["Profile", "Appearance"],
    },
    EntityShape {
        kind: EntityKind::Weapon,
        template: "Weapon Infobox",
        sections: &["Lore"],
    },
    EntityShape {
        kind: EntityKind::Artifact,
        template: "Artifact Infobox",
        sections: &["Lore"],
    },
    EntityShape {
        kind: EntityKind::Enemy,
        template: "Enemy Infobox",
        sections: &["Descriptions"],
    },
    EntityShape {
        kind: EntityKind::Faction,
        template: "Faction Infobox",
        sections: &["History", "Responsibilities", "Associates"],
    },
    EntityShape {
        kind: EntityKind::Book,
        template: "Book Collection Infobox",
        sections: &["Volumes"],
    },
    EntityShape {
        kind: EntityKind::Location,
        template: "Location Infobox",
        sections: &["History"],
    },
    EntityShape {
        kind: EntityKind::Item,
        template: "Item Infobox",
        sections: &[],
    },
    EntityShape {
        kind: EntityKind::Furnishing,
        template: "Furnishing Infobox",
        sections: &[],
    },
    EntityShape {
        kind: EntityKind::Quest,
        template: "Quest Infobox",
        sections: &["Steps", "Dialogue"],
    },
];

pub fn shape(kind: EntityKind) -> &'static EntityShape {
    let index = EntityKind::ALL
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_default();
    &SHAPES[index]
}

/// Maps `page` to a record of `kind`, or `None` when the page is not that kind.
pub fn parse_entity(kind: EntityKind, page: &Page) -> Option<EntityRecord> {
    let shape = shape(kind);
    let text = page.text.as_str();

    if kind == EntityKind::PlayableCharacter && !contains_ignore_case(text, CHARACTER_TABS_MARKER)
    {
        return None;
    }

    let span = extract_template(text, shape.template)?;
    let fields = parse_fields(span, shape.template);
    if !passes_guard(kind, &fields) {
        trace!(title = %page.title, kind = %kind, "Infobox found but guard rejected page");
        return None;
    }

    let mut record = EntityRecord::new(
        page.title.trim(),
        fields
            .inline("name")
            .unwrap_or_else(|| clean_inline(&page.title)),
        kind,
    );

    record.description = fields
        .inline("description")
        .or_else(|| description_template(text))
        .or_else(|| extract_lead(text, shape.template));

    for (key, value) in fields.iter() {
        if key.starts_with("image") || key.starts_with("source") {
            continue;
        }
        if let Some(cleaned) = non_empty(clean_inline(value)) {
            record.fields.insert(key.to_string(), cleaned);
        }
    }

    record.sources = fields
        .numbered("source")
        .into_iter()
        .filter_map(|v| non_empty(clean_inline(v)))
        .collect();

    for heading in shape.sections {
        if let Some(body) = extract_section(text, heading) {
            record.sections.insert(heading.to_lowercase(), body);
        }
    }

    Some(record)
}

fn passes_guard(kind: EntityKind, fields: &FieldRecord) -> bool {
    match kind {
        EntityKind::Npc => fields
            .inline("type")
            .is_none_or(|t| contains_ignore_case(&t, "npc")),
        EntityKind::Item => fields.get("type").is_some() || fields.get("description").is_some(),
        _ => true,
    }
}
