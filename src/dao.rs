use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::AnyPool;

use crate::types::{CanonicalCategory, CanonicalItem};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfigInsert {
    pub source_id: String,
    pub name: String,
    pub payload: String, // JSON blob of SourceConfiguration
    pub revision: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInsert {
    pub source_id: String,
    pub id: i64,
    pub name: String,
    pub parent_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemInsert {
    pub source_id: String,
    pub id: i64,
    pub name: String,
    pub subtitle: Option<String>,
    pub remarks: Option<String>,
    pub serial_number: Option<i64>,
    pub category_id: i64,
    pub actor: Option<String>,
    pub director: Option<String>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub update_time: Option<String>,
    pub area: Option<String>,
    pub language: Option<String>,
    pub year: Option<i64>,
    pub category_name: Option<String>,
    pub tags: Option<String>,
    pub play_url: Option<String>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ItemRow {
    id: i64,
    name: String,
    subtitle: Option<String>,
    remarks: Option<String>,
    serial_number: Option<i64>,
    category_id: i64,
    actor: Option<String>,
    director: Option<String>,
    cover_url: Option<String>,
    description: Option<String>,
    update_time: Option<String>,
    area: Option<String>,
    language: Option<String>,
    year: Option<i64>,
    category_name: Option<String>,
    tags: Option<String>,
    play_url: Option<String>,
    duration_minutes: Option<i64>,
}

impl From<ItemRow> for CanonicalItem {
    fn from(r: ItemRow) -> Self {
        CanonicalItem {
            id: r.id,
            name: r.name,
            subtitle: r.subtitle,
            remarks: r.remarks,
            serial_number: r.serial_number,
            category_id: r.category_id,
            actor: r.actor,
            director: r.director,
            cover_url: r.cover_url,
            description: r.description,
            update_time: r.update_time,
            area: r.area,
            language: r.language,
            year: r.year,
            category_name: r.category_name,
            tags: r.tags,
            play_url: r.play_url,
            duration_minutes: r.duration_minutes,
        }
    }
}

const ITEM_COLUMNS: &str = "id, name, subtitle, remarks, serial_number, category_id, actor, director, cover_url, description, update_time, area, language, year, category_name, tags, play_url, duration_minutes";

pub async fn upsert_source_config(pool: &AnyPool, c: &SourceConfigInsert) -> Result<()> {
    sqlx::query(
        "INSERT INTO source_configs(source_id, name, payload, revision) VALUES(?, ?, ?, ?)\n         ON CONFLICT(source_id) DO UPDATE SET\n           name=excluded.name, payload=excluded.payload, revision=excluded.revision, updated_at=CURRENT_TIMESTAMP",
    )
    .bind(&c.source_id)
    .bind(&c.name)
    .bind(&c.payload)
    .bind(&c.revision)
    .execute(pool)
    .await?;
    Ok(())
}

/// (payload, revision) for a source.
pub async fn get_source_config(pool: &AnyPool, source_id: &str) -> Result<Option<(String, String)>> {
    let row: Option<(String, String)> = sqlx::query_as("SELECT payload, revision FROM source_configs WHERE source_id = ?")
        .bind(source_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn delete_source_config(pool: &AnyPool, source_id: &str) -> Result<u64> {
    let res = sqlx::query("DELETE FROM source_configs WHERE source_id = ?")
        .bind(source_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

/// (source_id, name) pairs ordered by source id.
pub async fn list_source_configs(pool: &AnyPool) -> Result<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT source_id, name FROM source_configs ORDER BY source_id")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn upsert_categories(pool: &AnyPool, categories: &[CategoryInsert]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for c in categories {
        sqlx::query(
            "INSERT INTO categories(source_id, id, name, parent_id) VALUES(?, ?, ?, ?)\n             ON CONFLICT(source_id, id) DO UPDATE SET\n               name=excluded.name, parent_id=excluded.parent_id, updated_at=CURRENT_TIMESTAMP",
        )
        .bind(&c.source_id)
        .bind(c.id)
        .bind(&c.name)
        .bind(c.parent_id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn upsert_items(pool: &AnyPool, items: &[ItemInsert]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for i in items {
        sqlx::query(
            "INSERT INTO items(\n            source_id, id, name, subtitle, remarks, serial_number, category_id, actor, director, cover_url,\n            description, update_time, area, language, year, category_name, tags, play_url, duration_minutes\n         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)\n         ON CONFLICT(source_id, id) DO UPDATE SET\n           name=excluded.name, subtitle=excluded.subtitle, remarks=excluded.remarks,\n           serial_number=excluded.serial_number, category_id=excluded.category_id,\n           actor=excluded.actor, director=excluded.director, cover_url=excluded.cover_url,\n           description=excluded.description, update_time=excluded.update_time, area=excluded.area,\n           language=excluded.language, year=excluded.year, category_name=excluded.category_name,\n           tags=excluded.tags, play_url=excluded.play_url, duration_minutes=excluded.duration_minutes,\n           updated_at=CURRENT_TIMESTAMP",
        )
        .bind(&i.source_id)
        .bind(i.id)
        .bind(&i.name)
        .bind(&i.subtitle)
        .bind(&i.remarks)
        .bind(i.serial_number)
        .bind(i.category_id)
        .bind(&i.actor)
        .bind(&i.director)
        .bind(&i.cover_url)
        .bind(&i.description)
        .bind(&i.update_time)
        .bind(&i.area)
        .bind(&i.language)
        .bind(i.year)
        .bind(&i.category_name)
        .bind(&i.tags)
        .bind(&i.play_url)
        .bind(i.duration_minutes)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn list_categories(pool: &AnyPool, source_id: &str) -> Result<Vec<CanonicalCategory>> {
    let rows: Vec<(i64, String, i64)> = sqlx::query_as(
        "SELECT id, name, parent_id FROM categories WHERE source_id = ? ORDER BY id",
    )
    .bind(source_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id, name, parent_id)| CanonicalCategory { id, name, parent_id }).collect())
}

pub async fn list_items(pool: &AnyPool, source_id: &str, category_id: Option<i64>) -> Result<Vec<CanonicalItem>> {
    let rows: Vec<ItemRow> = if let Some(cid) = category_id {
        sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE source_id = ? AND category_id = ? ORDER BY id"))
            .bind(source_id)
            .bind(cid)
            .fetch_all(pool)
            .await?
    } else {
        sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE source_id = ? ORDER BY id"))
            .bind(source_id)
            .fetch_all(pool)
            .await?
    };
    Ok(rows.into_iter().map(CanonicalItem::from).collect())
}
