//! Item repository on PostgreSQL
//!
//! Every call is one statement in its own implicit transaction. Ids are
//! `BIGSERIAL` in storage and strings at the API; a string that is not a decimal
//! integer can never match a row.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;

use super::{ItemCursor, ItemStore};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::Item;

/// Maximum number of items one `list` returns.
pub const LIST_PAGE_SIZE: i64 = 100;

const RESOURCE: &str = "item";

const GET_ITEM: &str = r#"
    SELECT id, name, warehouse_location, dimensions, weight,
           attributes, delivery_time_ms, description, last_updated
    FROM items
    WHERE id = $1
"#;

const CREATE_ITEM: &str = r#"
    INSERT INTO items
        (name, warehouse_location, dimensions, weight, attributes, delivery_time_ms, description)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    RETURNING id
"#;

const UPDATE_ITEM: &str = r#"
    UPDATE items
    SET name = $2,
        warehouse_location = $3,
        dimensions = $4,
        weight = $5,
        attributes = $6,
        delivery_time_ms = $7,
        description = $8,
        last_updated = NOW()
    WHERE id = $1
"#;

const DELETE_ITEM: &str = "DELETE FROM items WHERE id = $1";

const LIST_ITEMS: &str = r#"
    SELECT id, name, warehouse_location, dimensions, weight,
           attributes, delivery_time_ms, description, last_updated
    FROM items
    ORDER BY id
    LIMIT $1
"#;

/// Item repository bound to a live [`Database`]
#[derive(Debug, Clone)]
pub struct ItemRepo {
    db: Database,
}

impl ItemRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn parse_id(id: &str) -> Option<i64> {
    id.parse().ok()
}

fn item_from_row(row: &PgRow) -> std::result::Result<Item, sqlx::Error> {
    let id: i64 = row.try_get("id")?;
    let dimensions: Option<Vec<f64>> = row.try_get("dimensions")?;
    let attributes: Option<Json<Map<String, Value>>> = row.try_get("attributes")?;

    Ok(Item {
        id: id.to_string(),
        name: row.try_get("name")?,
        warehouse_location: row.try_get("warehouse_location")?,
        last_updated: Some(row.try_get("last_updated")?),
        weight: row.try_get("weight")?,
        dimensions: dimensions.unwrap_or_default(),
        attributes: attributes.map(|Json(map)| map),
        delivery_time_ms: row.try_get("delivery_time_ms")?,
        description: row.try_get("description")?,
    })
}

#[async_trait]
impl ItemStore for ItemRepo {
    async fn get(&self, id: &str) -> Result<Item> {
        let Some(key) = parse_id(id) else {
            return Err(Error::not_found(RESOURCE, id));
        };

        let row = self
            .db
            .traced(
                "get",
                &(key,),
                sqlx::query(GET_ITEM).bind(key).fetch_optional(self.db.pool()),
            )
            .await
            .map_err(Error::storage("get"))?
            .ok_or_else(|| Error::not_found(RESOURCE, id))?;

        item_from_row(&row).map_err(Error::storage("get"))
    }

    async fn create(&self, item: &Item) -> Result<String> {
        item.validate()?;

        let attributes = item.attributes.as_ref().map(Json);
        let id: i64 = self
            .db
            .traced(
                "create",
                &(
                    &item.name,
                    &item.warehouse_location,
                    &item.dimensions,
                    item.weight,
                    &item.attributes,
                    item.delivery_time_ms,
                    &item.description,
                ),
                sqlx::query_scalar::<_, i64>(CREATE_ITEM)
                    .bind(&item.name)
                    .bind(&item.warehouse_location)
                    .bind(&item.dimensions)
                    .bind(item.weight)
                    .bind(attributes)
                    .bind(item.delivery_time_ms)
                    .bind(&item.description)
                    .fetch_one(self.db.pool()),
            )
            .await
            .map_err(Error::storage("create"))?;

        self.db.rows_affected("create", 1);
        tracing::debug!(id, "created item");
        Ok(id.to_string())
    }

    async fn update(&self, item: &Item) -> Result<bool> {
        item.validate()?;
        let Some(key) = parse_id(&item.id) else {
            return Ok(false);
        };

        let attributes = item.attributes.as_ref().map(Json);
        let done = self
            .db
            .traced(
                "update",
                &(
                    key,
                    &item.name,
                    &item.warehouse_location,
                    &item.dimensions,
                    item.weight,
                    &item.attributes,
                    item.delivery_time_ms,
                    &item.description,
                ),
                sqlx::query(UPDATE_ITEM)
                    .bind(key)
                    .bind(&item.name)
                    .bind(&item.warehouse_location)
                    .bind(&item.dimensions)
                    .bind(item.weight)
                    .bind(attributes)
                    .bind(item.delivery_time_ms)
                    .bind(&item.description)
                    .execute(self.db.pool()),
            )
            .await
            .map_err(Error::storage("update"))?;

        self.db.rows_affected("update", done.rows_affected());
        Ok(done.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let Some(key) = parse_id(id) else {
            return Ok(false);
        };

        let done = self
            .db
            .traced(
                "delete",
                &(key,),
                sqlx::query(DELETE_ITEM).bind(key).execute(self.db.pool()),
            )
            .await
            .map_err(Error::storage("delete"))?;

        self.db.rows_affected("delete", done.rows_affected());
        Ok(done.rows_affected() > 0)
    }

    async fn list<'a>(&'a self) -> Result<ItemCursor<'a>> {
        if let Some(tracer) = self.db.tracer() {
            tracer.parameters("list", &(LIST_PAGE_SIZE,));
        }

        let rows = sqlx::query(LIST_ITEMS)
            .bind(LIST_PAGE_SIZE)
            .fetch(self.db.pool())
            .map(|row| {
                row.and_then(|row| item_from_row(&row))
                    .map_err(Error::storage("list"))
            })
            .boxed();

        Ok(ItemCursor::new(rows).traced(self.db.tracer()))
    }
}
