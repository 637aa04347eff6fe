//! Built-in configurations offered as starting points for common content kinds.

use crate::mapping::{ContentType, ContentTypeConfiguration, FieldMapping};

/// Video sources speaking the common `vod_*` list API.
pub fn movie_template() -> ContentTypeConfiguration {
    ContentTypeConfiguration::new(ContentType::Movie, "list", "class")
        .with_mapping(FieldMapping::new("vod_id", "vod_id").required())
        .with_mapping(FieldMapping::new("vod_name", "vod_name").required())
        .with_mapping(FieldMapping::new("vod_sub", "vod_sub"))
        .with_mapping(FieldMapping::new("vod_remarks", "vod_remarks"))
        .with_mapping(FieldMapping::new("vod_serial", "vod_serial"))
        .with_mapping(FieldMapping::new("type_id", "type_id").with_default("0"))
        .with_mapping(FieldMapping::new("type_name", "type_name"))
        .with_mapping(FieldMapping::new("vod_actor", "vod_actor"))
        .with_mapping(FieldMapping::new("vod_director", "vod_director"))
        .with_mapping(FieldMapping::new("vod_pic", "vod_pic"))
        .with_mapping(FieldMapping::new("vod_content", "vod_content"))
        .with_mapping(FieldMapping::new("vod_time", "vod_time"))
        .with_mapping(FieldMapping::new("vod_area", "vod_area"))
        .with_mapping(FieldMapping::new("vod_lang", "vod_lang"))
        .with_mapping(FieldMapping::new("vod_year", "vod_year"))
        .with_mapping(FieldMapping::new("vod_tag", "vod_tag"))
        .with_mapping(FieldMapping::new("vod_play_url", "vod_play_url"))
        .with_mapping(FieldMapping::new("vod_duration", "vod_duration"))
}

pub fn book_template() -> ContentTypeConfiguration {
    ContentTypeConfiguration::new(ContentType::Book, "list", "class")
        .with_mapping(FieldMapping::new("book_id", "vod_id").required())
        .with_mapping(FieldMapping::new("book_name", "vod_name").required())
        .with_mapping(FieldMapping::new("author", "vod_actor"))
        .with_mapping(FieldMapping::new("cover", "vod_pic"))
        .with_mapping(FieldMapping::new("intro", "vod_content"))
        .with_mapping(FieldMapping::new("status", "vod_remarks"))
        .with_mapping(FieldMapping::new("chapter_count", "vod_serial"))
        .with_mapping(FieldMapping::new("category_id", "type_id").with_default("0"))
        .with_mapping(FieldMapping::new("category_name", "type_name"))
        .with_mapping(FieldMapping::new("update_time", "vod_time"))
        .with_mapping(FieldMapping::new("tags", "vod_tag"))
        .with_mapping(FieldMapping::new("read_url", "vod_play_url"))
        .with_category_fields("category_id", "category_name")
}

pub fn music_template() -> ContentTypeConfiguration {
    ContentTypeConfiguration::new(ContentType::Music, "list", "class")
        .with_mapping(FieldMapping::new("song_id", "vod_id").required())
        .with_mapping(FieldMapping::new("song_name", "vod_name").required())
        .with_mapping(FieldMapping::new("singer", "vod_actor"))
        .with_mapping(FieldMapping::new("album", "vod_sub"))
        .with_mapping(FieldMapping::new("cover", "vod_pic"))
        .with_mapping(FieldMapping::new("lyric", "vod_content"))
        .with_mapping(FieldMapping::new("duration", "vod_duration"))
        .with_mapping(FieldMapping::new("release_year", "vod_year"))
        .with_mapping(FieldMapping::new("language", "vod_lang"))
        .with_mapping(FieldMapping::new("category_id", "type_id").with_default("0"))
        .with_mapping(FieldMapping::new("category_name", "type_name"))
        .with_mapping(FieldMapping::new("url", "vod_play_url").required())
        .with_category_fields("category_id", "category_name")
}

/// Template lookup by kind name (`movie`/`video`, `book`, `music`).
pub fn template_for(kind: &str) -> Option<ContentTypeConfiguration> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "movie" | "video" => Some(movie_template()),
        "book" => Some(book_template()),
        "music" => Some(music_template()),
        _ => None,
    }
}

pub fn all_templates() -> Vec<ContentTypeConfiguration> { vec![movie_template(), book_template(), music_template()] }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_are_valid_and_deterministic() {
        for t in all_templates() {
            assert!(t.validate().is_ok(), "{:?} should validate", t.content_type);
            assert!(t.fail_fast);
            assert!(t.category_source_fields().is_some());
        }
        assert_eq!(movie_template(), movie_template());
    }

    #[test]
    fn every_template_requires_id_and_name() {
        for t in all_templates() {
            for target in ["vod_id", "vod_name"] {
                let rule = t.mapping_for_target(target).expect("rule present");
                assert!(rule.is_required && rule.default_value.is_none());
            }
        }
    }

    #[test]
    fn lookup_by_kind() {
        assert_eq!(template_for("Video").map(|t| t.content_type), Some(ContentType::Movie));
        assert_eq!(template_for("book").map(|t| t.detail_screen_type), Some("reader".to_string()));
        assert!(template_for("podcast").is_none());
    }
}
