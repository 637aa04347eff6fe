//! Dynamic schema-mapping parser for third-party mini-site sources.
//!
//! Each source answers with JSON of its own shape. A per-source
//! [`ContentTypeConfiguration`](mapping::ContentTypeConfiguration) says which
//! source keys feed which canonical slots; the [`parser`] turns a document into
//! a [`ParsedResponse`](types::ParsedResponse), and the [`registry`] keeps one
//! prepared parser per configured source.

pub mod aggregator;
pub mod dao;
pub mod db;
pub mod error;
pub mod fetch;
pub mod mapping;
pub mod parser;
pub mod registry;
pub mod settings;
pub mod storage;
pub mod templates;
pub mod types;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::aggregator::{Aggregator, Listing};
    pub use crate::error::{ConfigError, ParseError};
    pub use crate::mapping::{CanonicalField, CategoryFields, ContentType, ContentTypeConfiguration, FieldMapping, SourceConfiguration};
    pub use crate::parser::{parse, SourceParser};
    pub use crate::registry::ParserRegistry;
    pub use crate::storage::{ConfigChange, ConfigStore, ContentStore};
    pub use crate::templates::{book_template, movie_template, music_template};
    pub use crate::types::{CanonicalCategory, CanonicalItem, Pagination, ParsedResponse};
}
