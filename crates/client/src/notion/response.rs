//! Content API response types.
//!
//! Only the fields the engine reads are typed; block and property payloads
//! keep their type-specific body as raw JSON keyed by the `type` tag.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of a paginated list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl<T> Paginated<T> {
    /// A final page with no continuation.
    pub fn last(results: Vec<T>) -> Self {
        Self { results, has_more: false, next_cursor: None }
    }

    /// Cursor for the next request, if the remote says there is more.
    pub fn continuation(&self) -> Option<&str> {
        if self.has_more { self.next_cursor.as_deref() } else { None }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialUser {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub in_trash: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub last_edited_time: Option<String>,
    #[serde(default)]
    pub created_by: Option<PartialUser>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Page {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            archived: false,
            in_trash: false,
            url: None,
            created_time: None,
            last_edited_time: None,
            created_by: None,
            properties: BTreeMap::new(),
        }
    }

    /// Archived or trashed pages count as deleted.
    pub fn is_removed(&self) -> bool {
        self.archived || self.in_trash
    }

    /// First candidate property of type `title` with non-blank text.
    pub fn resolve_title<S: AsRef<str>>(&self, candidates: &[S]) -> Option<String> {
        candidates.iter().find_map(|name| {
            let property = self.properties.get(name.as_ref())?;
            if property.kind != "title" {
                return None;
            }
            let text = property.plain_text()?;
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.created_by.as_ref().map(|u| u.id.as_str())
    }
}

/// A page property value: `{"type": "...", "<type>": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyValue {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub data: BTreeMap<String, Value>,
}

impl PropertyValue {
    /// A `title` property holding `text`, in the wire shape.
    pub fn title(text: &str) -> Self {
        let mut data = BTreeMap::new();
        data.insert("title".to_string(), serde_json::json!([{ "plain_text": text }]));
        Self { id: None, kind: "title".into(), data }
    }

    /// Concatenated plain text for `title`/`rich_text` properties.
    pub fn plain_text(&self) -> Option<String> {
        match self.kind.as_str() {
            "title" | "rich_text" => self.data.get(&self.kind).and_then(Value::as_array).map(|v| join_plain_text(v)),
            _ => None,
        }
    }
}

fn join_plain_text(segments: &[Value]) -> String {
    segments
        .iter()
        .filter_map(|seg| seg.get("plain_text").and_then(Value::as_str))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub data: BTreeMap<String, Value>,
}

impl Block {
    /// A paragraph block holding `text`, in the wire shape.
    pub fn paragraph(id: impl Into<String>, text: &str) -> Self {
        let mut data = BTreeMap::new();
        data.insert("paragraph".to_string(), serde_json::json!({ "rich_text": [{ "plain_text": text }] }));
        Self { id: id.into(), kind: "paragraph".into(), has_children: false, data }
    }

    /// Plain text of the block's `rich_text`, if its type carries any.
    pub fn plain_text(&self) -> Option<String> {
        let body = self.data.get(&self.kind)?;
        let rich_text = body.get("rich_text")?.as_array()?;
        Some(join_plain_text(rich_text))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A property definition in a database schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseProperty {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub config: BTreeMap<String, Value>,
}

impl DatabaseProperty {
    /// Whether this property carries a list of named options.
    pub fn has_options(&self) -> bool {
        matches!(self.kind.as_str(), "select" | "multi_select" | "status")
    }

    pub fn options(&self) -> Vec<SelectOption> {
        if !self.has_options() {
            return Vec::new();
        }
        self.config
            .get(&self.kind)
            .and_then(|c| c.get("options"))
            .and_then(|o| serde_json::from_value(o.clone()).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    pub id: String,
    #[serde(default)]
    pub title: Vec<Value>,
    #[serde(default)]
    pub properties: BTreeMap<String, DatabaseProperty>,
}

impl Database {
    /// Name of the database's `title` property.
    pub fn title_property(&self) -> Option<&str> {
        self.properties
            .iter()
            .find(|(_, p)| p.kind == "title")
            .map(|(name, _)| name.as_str())
    }

    pub fn plain_title(&self) -> String {
        join_plain_text(&self.title)
    }
}
