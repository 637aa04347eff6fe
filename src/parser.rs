//! The parsing engine: one JSON document plus one [`ContentTypeConfiguration`]
//! in, pagination + categories + canonical items out.
//!
//! Only two conditions are fatal ([`ParseError`]). Missing arrays, bad
//! pagination values, malformed category entries and non-numeric numbers all
//! degrade to defaults.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::mapping::{CanonicalField, ContentTypeConfiguration, FieldMapping, ValueKind};
use crate::types::{CanonicalCategory, CanonicalItem, Pagination, ParsedResponse};

const PAGE_INDEX_KEYS: &[&str] = &["page", "pageindex"];
const PAGE_COUNT_KEYS: &[&str] = &["pagecount"];
const PAGE_SIZE_KEYS: &[&str] = &["limit", "pagesize"];
const RECORD_COUNT_KEYS: &[&str] = &["total", "recordcount"];

/// Canonical slot per rule, index-aligned with the configuration's mapping list.
/// Rules without a slot still take part in the required check.
#[derive(Debug, Clone, Default)]
struct Plan {
    slots: Vec<Option<CanonicalField>>,
}

impl Plan {
    fn build(config: &ContentTypeConfiguration) -> Self {
        let slots = config
            .field_mappings
            .iter()
            .map(|m| {
                let slot = m.canonical();
                if slot.is_none() {
                    debug!(target_field = %m.target_field, "no canonical slot for target field; value discarded");
                }
                slot
            })
            .collect();
        Self { slots }
    }
}

/// A configuration prepared for repeated parsing. Cheap to clone and share.
#[derive(Debug, Clone)]
pub struct SourceParser {
    source_id: String,
    revision: Option<String>,
    config: Arc<ContentTypeConfiguration>,
    plan: Arc<Plan>,
}

impl SourceParser {
    pub fn new(source_id: &str, config: ContentTypeConfiguration, revision: Option<String>) -> Self {
        let plan = Plan::build(&config);
        Self {
            source_id: source_id.to_string(),
            revision,
            config: Arc::new(config),
            plan: Arc::new(plan),
        }
    }

    pub fn source_id(&self) -> &str { &self.source_id }
    pub fn revision(&self) -> Option<&str> { self.revision.as_deref() }
    pub fn config(&self) -> &ContentTypeConfiguration { &self.config }

    pub fn parse(&self, document: &str) -> Result<ParsedResponse, ParseError> {
        run(document, &self.config, &self.plan)
    }
}

/// Parse `document` with an ad-hoc configuration.
pub fn parse(document: &str, config: &ContentTypeConfiguration) -> Result<ParsedResponse, ParseError> {
    run(document, config, &Plan::build(config))
}

fn run(document: &str, config: &ContentTypeConfiguration, plan: &Plan) -> Result<ParsedResponse, ParseError> {
    let root = parse_root(document)?;
    let pagination = extract_pagination(&root);
    let categories = extract_categories(&root, config);

    let elements = array_at(&root, &config.list_response_path);
    let mut items = Vec::with_capacity(elements.len());
    let mut skipped_items = 0;
    for (position, element) in elements.iter().enumerate() {
        match map_item(element, config, plan) {
            Ok(item) => items.push(item),
            Err(e) if !config.fail_fast => {
                warn!(position, error = %e, "skipping item");
                skipped_items += 1;
            }
            Err(e) => return Err(e),
        }
    }

    debug!(
        items = items.len(),
        categories = categories.len(),
        skipped = skipped_items,
        page = pagination.page_index,
        "parsed document"
    );
    Ok(ParsedResponse { pagination, categories, items, skipped_items })
}

fn parse_root(document: &str) -> Result<Map<String, Value>, ParseError> {
    match serde_json::from_str::<Value>(document) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ParseError::malformed(format!("top level is {}, expected an object", json_kind(&other)))),
        Err(e) => Err(ParseError::malformed(e.to_string())),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Array stored under a top-level key; anything else reads as empty.
fn array_at<'a>(root: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    root.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

fn extract_pagination(root: &Map<String, Value>) -> Pagination {
    let d = Pagination::default();
    let lookup = |keys: &[&str], fallback: i64| keys.iter().find_map(|k| root.get(*k).and_then(numeric)).unwrap_or(fallback);
    Pagination {
        page_index: lookup(PAGE_INDEX_KEYS, d.page_index),
        page_count: lookup(PAGE_COUNT_KEYS, d.page_count),
        page_size: lookup(PAGE_SIZE_KEYS, d.page_size),
        record_count: lookup(RECORD_COUNT_KEYS, d.record_count),
    }
}

fn extract_categories(root: &Map<String, Value>, config: &ContentTypeConfiguration) -> Vec<CanonicalCategory> {
    let elements = array_at(root, &config.category_response_path);
    if elements.is_empty() {
        return Vec::new();
    }
    let Some((id_field, name_field)) = config.category_source_fields() else {
        debug!(count = elements.len(), "category array present but no category fields configured");
        return Vec::new();
    };

    let categories: Vec<CanonicalCategory> = elements
        .iter()
        .filter_map(|el| {
            let id = el.get(id_field).and_then(numeric).filter(|id| *id > 0)?;
            let name = el.get(name_field).and_then(Value::as_str).filter(|s| !s.trim().is_empty())?;
            Some(CanonicalCategory { id, name: name.to_string(), parent_id: 0 })
        })
        .collect();
    let dropped = elements.len() - categories.len();
    if dropped > 0 {
        debug!(dropped, "dropped category entries without a positive id and a name");
    }
    categories
}

enum Resolved {
    Int(i64),
    Text(String),
}

fn map_item(element: &Value, config: &ContentTypeConfiguration, plan: &Plan) -> Result<CanonicalItem, ParseError> {
    let mut item = CanonicalItem::default();
    for (rule, &slot) in config.field_mappings.iter().zip(&plan.slots) {
        let resolved = resolve(element.get(rule.source_field.as_str()), rule, slot)?;
        if let (Some(field), Some(value)) = (slot, resolved) {
            assign(&mut item, field, value);
        }
    }
    Ok(item)
}

/// Precedence: present value, then default, then required failure, else unset.
/// JSON null counts as absent. Slotless rules coerce as text.
fn resolve(raw: Option<&Value>, rule: &FieldMapping, slot: Option<CanonicalField>) -> Result<Option<Resolved>, ParseError> {
    let kind = slot.map_or(ValueKind::Text, CanonicalField::kind);
    match raw {
        Some(v) if !v.is_null() => Ok(Some(coerce(kind, v))),
        _ => {
            if let Some(default) = &rule.default_value {
                return Ok(Some(coerce_text(kind, default)));
            }
            if rule.is_required {
                return Err(ParseError::required_missing(&rule.source_field));
            }
            Ok(None)
        }
    }
}

fn coerce(kind: ValueKind, v: &Value) -> Resolved {
    match kind {
        ValueKind::Integer => Resolved::Int(numeric(v).unwrap_or(0)),
        ValueKind::Text => Resolved::Text(match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }),
    }
}

fn coerce_text(kind: ValueKind, s: &str) -> Resolved {
    match kind {
        ValueKind::Integer => Resolved::Int(parse_int(s).unwrap_or(0)),
        ValueKind::Text => Resolved::Text(s.to_string()),
    }
}

/// Integer view of a JSON number or numeric string. Fractions truncate.
fn numeric(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => parse_int(s),
        _ => None,
    }
}

fn parse_int(s: &str) -> Option<i64> {
    let t = s.trim();
    t.parse::<i64>().ok().or_else(|| t.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
}

fn assign(item: &mut CanonicalItem, field: CanonicalField, value: Resolved) {
    use CanonicalField::*;
    match value {
        Resolved::Int(v) => match field {
            Id => item.id = v,
            SerialNumber => item.serial_number = Some(v),
            CategoryId => item.category_id = v,
            Year => item.year = Some(v),
            DurationMinutes => item.duration_minutes = Some(v),
            _ => {}
        },
        Resolved::Text(s) => match field {
            Name => item.name = s,
            Subtitle => item.subtitle = Some(s),
            Remarks => item.remarks = Some(s),
            Actor => item.actor = Some(s),
            Director => item.director = Some(s),
            CoverUrl => item.cover_url = Some(s),
            Description => item.description = Some(s),
            UpdateTime => item.update_time = Some(s),
            Area => item.area = Some(s),
            Language => item.language = Some(s),
            CategoryName => item.category_name = Some(s),
            Tags => item.tags = Some(s),
            PlayUrl => item.play_url = Some(s),
            _ => {}
        },
    }
}
