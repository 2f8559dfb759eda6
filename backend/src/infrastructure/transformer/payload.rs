/// Serialized shape of a snapshot payload
///
/// These are node headers only. Children are written inline under a `blocks`
/// array added next to the header fields; when reading they stay in the JSON
/// document and are addressed by pointer until they are decoded.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PagePayload {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub url: Option<String>,
    pub route_name: Option<String>,
    pub page_alias: Option<String>,
    pub template_code: String,
    pub request_method: Option<String>,
    pub enabled: bool,
    #[serde(default)]
    pub edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BlockPayload {
    pub id: i64,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub block_type: String,
    pub code: Option<String>,
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
    pub enabled: bool,
    pub position: u32,
}
