//! Typed decoding of the `{ data: ... }` envelopes the API wraps responses in.
//!
//! Anything that does not match the expected shape is rejected with
//! [`SyncError::Decode`] instead of leaking missing fields into pagination math.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SyncError};
use crate::model::{EntityKind, Record};
use crate::pagination;

/// One page of a remote collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Record>,
    pub page: u64,
    pub total: u64,
    pub limit: u64,
}

impl Page {
    pub fn page_count(&self) -> u64 {
        pagination::page_count(self.total, self.limit)
    }
}

/// Project status counters shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analytics {
    pub rejected: u64,
    pub verified: u64,
    pub pending: u64,
}

fn data<'a>(entity: EntityKind, body: &'a Value) -> Result<&'a Value> {
    body.get("data").ok_or_else(|| SyncError::Decode {
        entity,
        reason: "missing `data`".into(),
    })
}

fn data_object<'a>(entity: EntityKind, body: &'a Value) -> Result<&'a Map<String, Value>> {
    data(entity, body)?
        .as_object()
        .ok_or_else(|| SyncError::Decode {
            entity,
            reason: "`data` is not an object".into(),
        })
}

fn field_u64(entity: EntityKind, data: &Map<String, Value>, name: &str) -> Result<u64> {
    data.get(name)
        .and_then(Value::as_u64)
        .ok_or_else(|| SyncError::Decode {
            entity,
            reason: format!("`data.{name}` must be a non-negative integer"),
        })
}

/// Decode `{ data: { <plural>: [...], page, total, limit } }`.
pub fn decode_page(entity: EntityKind, body: &Value) -> Result<Page> {
    let data = data_object(entity, body)?;
    let key = entity.envelope_key();
    let raw_items = data
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| SyncError::Decode {
            entity,
            reason: format!("`data.{key}` must be an array"),
        })?;
    let items = raw_items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            Record::from_value(item.clone()).ok_or_else(|| SyncError::Decode {
                entity,
                reason: format!("`data.{key}[{idx}]` is not an object"),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let page = field_u64(entity, data, "page")?;
    let total = field_u64(entity, data, "total")?;
    let limit = field_u64(entity, data, "limit")?;
    if limit == 0 {
        return Err(SyncError::Decode {
            entity,
            reason: "`data.limit` must be > 0".into(),
        });
    }

    Ok(Page {
        items,
        page,
        total,
        limit,
    })
}

/// Decode `{ data: {...} }` for a single record.
pub fn decode_record(entity: EntityKind, body: &Value) -> Result<Record> {
    let data = data_object(entity, body)?;
    Ok(Record::from(data.clone()))
}

/// Decode `{ data: { file_url } }` from the media endpoints.
pub fn decode_upload(entity: EntityKind, body: &Value) -> Result<String> {
    data_object(entity, body)?
        .get("file_url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SyncError::Decode {
            entity,
            reason: "`data.file_url` must be a non-empty string".into(),
        })
}

pub fn decode_analytics(body: &Value) -> Result<Analytics> {
    let data = data(EntityKind::Project, body)?;
    serde_json::from_value(data.clone()).map_err(|err| SyncError::Decode {
        entity: EntityKind::Project,
        reason: err.to_string(),
    })
}
