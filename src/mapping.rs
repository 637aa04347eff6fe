use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::dao::{CategoryInsert, ItemInsert};
use crate::error::ConfigError;
use crate::types::{CanonicalCategory, CanonicalItem};

/// How a raw source value is coerced for a canonical slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Text,
}

/// The slots of [`CanonicalItem`] a mapping rule can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Id,
    Name,
    Subtitle,
    Remarks,
    SerialNumber,
    CategoryId,
    Actor,
    Director,
    CoverUrl,
    Description,
    UpdateTime,
    Area,
    Language,
    Year,
    CategoryName,
    Tags,
    PlayUrl,
    DurationMinutes,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 18] = [
        Self::Id,
        Self::Name,
        Self::Subtitle,
        Self::Remarks,
        Self::SerialNumber,
        Self::CategoryId,
        Self::Actor,
        Self::Director,
        Self::CoverUrl,
        Self::Description,
        Self::UpdateTime,
        Self::Area,
        Self::Language,
        Self::Year,
        Self::CategoryName,
        Self::Tags,
        Self::PlayUrl,
        Self::DurationMinutes,
    ];

    /// Target-field name used in mapping rules.
    pub fn target_name(self) -> &'static str {
        match self {
            Self::Id => "vod_id",
            Self::Name => "vod_name",
            Self::Subtitle => "vod_sub",
            Self::Remarks => "vod_remarks",
            Self::SerialNumber => "vod_serial",
            Self::CategoryId => "type_id",
            Self::Actor => "vod_actor",
            Self::Director => "vod_director",
            Self::CoverUrl => "vod_pic",
            Self::Description => "vod_content",
            Self::UpdateTime => "vod_time",
            Self::Area => "vod_area",
            Self::Language => "vod_lang",
            Self::Year => "vod_year",
            Self::CategoryName => "type_name",
            Self::Tags => "vod_tag",
            Self::PlayUrl => "vod_play_url",
            Self::DurationMinutes => "vod_duration",
        }
    }

    fn alias(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Subtitle => "subtitle",
            Self::Remarks => "remarks",
            Self::SerialNumber => "serialNumber",
            Self::CategoryId => "categoryId",
            Self::Actor => "actor",
            Self::Director => "director",
            Self::CoverUrl => "coverUrl",
            Self::Description => "description",
            Self::UpdateTime => "updateTime",
            Self::Area => "area",
            Self::Language => "language",
            Self::Year => "year",
            Self::CategoryName => "categoryName",
            Self::Tags => "tags",
            Self::PlayUrl => "playUrl",
            Self::DurationMinutes => "durationMinutes",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            Self::Id | Self::CategoryId | Self::Year | Self::SerialNumber | Self::DurationMinutes => ValueKind::Integer,
            _ => ValueKind::Text,
        }
    }

    pub fn from_target(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.target_name() == name || f.alias() == name)
    }
}

/// One rule translating a source key into a canonical slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: String,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub default_value: Option<String>,
}

impl FieldMapping {
    pub fn new(source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
            is_required: false,
            default_value: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn canonical(&self) -> Option<CanonicalField> { CanonicalField::from_target(&self.target_field) }
}

/// Content kind of a source. Only the UI branches on it; the engine does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentType {
    Movie,
    Book,
    Music,
    Custom { label: String },
}

impl ContentType {
    pub fn default_detail_screen(&self) -> &'static str {
        match self {
            Self::Movie => "video",
            Self::Book => "reader",
            Self::Music => "audio",
            Self::Custom { .. } => "generic",
        }
    }
}

/// Source keys holding a category's id and name inside the category array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFields {
    pub id_field: String,
    pub name_field: String,
}

/// Full mapping description for one source's responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeConfiguration {
    pub content_type: ContentType,
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
    pub detail_screen_type: String,
    pub list_response_path: String,
    pub category_response_path: String,
    /// Explicit category keys. When unset, the rules targeting `type_id`/`type_name` are used.
    #[serde(default)]
    pub category_fields: Option<CategoryFields>,
    /// Abort the whole parse on the first item missing a required field.
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
}

fn default_fail_fast() -> bool { true }

impl ContentTypeConfiguration {
    pub fn new(content_type: ContentType, list_response_path: &str, category_response_path: &str) -> Self {
        Self {
            detail_screen_type: content_type.default_detail_screen().to_string(),
            content_type,
            field_mappings: Vec::new(),
            list_response_path: list_response_path.to_string(),
            category_response_path: category_response_path.to_string(),
            category_fields: None,
            fail_fast: true,
        }
    }

    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.field_mappings.push(mapping);
        self
    }

    pub fn with_category_fields(mut self, id_field: &str, name_field: &str) -> Self {
        self.category_fields = Some(CategoryFields { id_field: id_field.to_string(), name_field: name_field.to_string() });
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// First rule whose target field is literally `target`.
    pub fn mapping_for_target(&self, target: &str) -> Option<&FieldMapping> {
        self.field_mappings.iter().find(|m| m.target_field == target)
    }

    /// Source keys (id, name) used for category extraction, if any can be determined.
    pub fn category_source_fields(&self) -> Option<(&str, &str)> {
        if let Some(cf) = &self.category_fields {
            return Some((cf.id_field.as_str(), cf.name_field.as_str()));
        }
        let id = self.mapping_for_target("type_id")?;
        let name = self.mapping_for_target("type_name")?;
        Some((id.source_field.as_str(), name.source_field.as_str()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.list_response_path.trim().is_empty() {
            return Err(ConfigError::EmptyListPath);
        }
        let mut seen = HashSet::new();
        for (index, m) in self.field_mappings.iter().enumerate() {
            if m.source_field.trim().is_empty() {
                return Err(ConfigError::EmptySourceField { index });
            }
            if m.target_field.trim().is_empty() {
                return Err(ConfigError::EmptyTargetField { index });
            }
            // aliases collapse onto the canonical name
            let key = m.canonical().map(|f| f.target_name().to_string()).unwrap_or_else(|| m.target_field.clone());
            if !seen.insert(key.clone()) {
                return Err(ConfigError::DuplicateTarget { target: key });
            }
        }
        Ok(())
    }
}

/// What the configuration store holds for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfiguration {
    pub source_id: String,
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Unset for sources that use the app's built-in response shape.
    #[serde(default)]
    pub content_type_config: Option<ContentTypeConfiguration>,
    /// Assigned by the store on every save.
    #[serde(default)]
    pub revision: Option<String>,
}

impl SourceConfiguration {
    pub fn new(source_id: &str, name: &str, config: Option<ContentTypeConfiguration>) -> Self {
        Self {
            source_id: source_id.to_string(),
            name: name.to_string(),
            base_url: None,
            content_type_config: config,
            revision: None,
        }
    }
}

pub fn item_insert_from(source_id: &str, item: &CanonicalItem) -> ItemInsert {
    ItemInsert {
        source_id: source_id.to_string(),
        id: item.id,
        name: item.name.clone(),
        subtitle: item.subtitle.clone(),
        remarks: item.remarks.clone(),
        serial_number: item.serial_number,
        category_id: item.category_id,
        actor: item.actor.clone(),
        director: item.director.clone(),
        cover_url: item.cover_url.clone(),
        description: item.description.clone(),
        update_time: item.update_time.clone(),
        area: item.area.clone(),
        language: item.language.clone(),
        year: item.year,
        category_name: item.category_name.clone(),
        tags: item.tags.clone(),
        play_url: item.play_url.clone(),
        duration_minutes: item.duration_minutes,
    }
}

pub fn category_insert_from(source_id: &str, c: &CanonicalCategory) -> CategoryInsert {
    CategoryInsert {
        source_id: source_id.to_string(),
        id: c.id,
        name: c.name.clone(),
        parent_id: c.parent_id,
    }
}
