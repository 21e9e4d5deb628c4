//! Protocol values.
//!
//! Values on the wire are polymorphic JSON documents. [`Object`] keeps the
//! document as-is and offers typed access to the properties the engine reads
//! and writes; everything else passes through untouched.

mod addressing;
mod kind;

pub use addressing::{
    ADDRESSING_PROPERTIES, FORWARDING_PROPERTIES, forwarding_recipients, is_public,
    normalize_recipients, recipients, strip_hidden_recipients,
};
pub use kind::ActivityKind;

use activitypub_federation::kinds::object::TombstoneType;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{FederationError, FederationResult};

/// The `ActivityStreams` JSON-LD context.
pub const AS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";

/// Media type of protocol documents.
pub const ACTIVITY_JSON: &str = "application/activity+json";

/// JSON-LD media type with the `ActivityStreams` profile.
pub const LD_JSON_PROFILE: &str =
    r#"application/ld+json; profile="https://www.w3.org/ns/activitystreams""#;

/// A JSON object value with typed property access.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Object(Map<String, Value>);

impl Object {
    /// An empty object.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// An object with `id` and `type` set.
    #[must_use]
    pub fn with_id(id: &Url, kind: &str) -> Self {
        let mut object = Self::new();
        object.set_id(id);
        object.set_kind(kind);
        object
    }

    /// Wrap a JSON value. Anything but a JSON object is rejected.
    pub fn from_value(value: Value) -> FederationResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(FederationError::BadRequest(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Unwrap into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Borrow the underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The `id` IRI, if present and well formed.
    #[must_use]
    pub fn id(&self) -> Option<Url> {
        self.0
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Url::parse(s).ok())
    }

    /// The `id` IRI, or `BadRequest` when missing.
    pub fn require_id(&self) -> FederationResult<Url> {
        self.id()
            .ok_or_else(|| FederationError::BadRequest("value has no id".to_string()))
    }

    /// Set the `id` property.
    pub fn set_id(&mut self, id: &Url) {
        self.0.insert("id".to_string(), Value::String(id.to_string()));
    }

    /// The `type` tag. When `type` is an array, the first string wins.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        match self.0.get("type")? {
            Value::String(s) => Some(s),
            Value::Array(values) => values.iter().find_map(Value::as_str),
            _ => None,
        }
    }

    /// Set the `type` tag.
    pub fn set_kind(&mut self, kind: &str) {
        self.0.insert("type".to_string(), Value::String(kind.to_string()));
    }

    /// The dispatch key of this value.
    #[must_use]
    pub fn activity_kind(&self) -> ActivityKind {
        ActivityKind::from_type(self.kind().unwrap_or_default())
    }

    /// Whether the `type` names an activity.
    #[must_use]
    pub fn is_activity(&self) -> bool {
        self.kind().is_some_and(ActivityKind::is_activity_type)
    }

    /// Whether the `type` names a collection or collection page.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(
            self.kind(),
            Some("Collection" | "OrderedCollection" | "CollectionPage" | "OrderedCollectionPage")
        )
    }

    /// Whether this is a Tombstone.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.kind() == Some("Tombstone")
    }

    /// Raw property value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Raw string property.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Set a raw property.
    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    /// Remove a property.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Whether the property is present and non-empty.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        match self.0.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::Array(values)) => !values.is_empty(),
            Some(_) => true,
        }
    }

    /// Every value of a property, treating a single value like a one-element array.
    #[must_use]
    pub fn references(&self, key: &str) -> Vec<Reference> {
        match self.0.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values.iter().filter_map(Reference::from_value).collect(),
            Some(value) => Reference::from_value(value).into_iter().collect(),
        }
    }

    /// The IRIs of every value of a property. Embedded values contribute their id.
    #[must_use]
    pub fn iris(&self, key: &str) -> Vec<Url> {
        self.references(key)
            .iter()
            .filter_map(Reference::id)
            .collect()
    }

    /// Replace a property with the given values, always written as an array.
    pub fn set_references(&mut self, key: &str, references: Vec<Reference>) {
        let values = references.into_iter().map(Reference::into_value).collect();
        self.0.insert(key.to_string(), Value::Array(values));
    }

    /// Insert an IRI at the front of an item list property.
    pub fn prepend_iri(&mut self, key: &str, iri: &Url) {
        let mut values = self.take_array(key);
        values.insert(0, Value::String(iri.to_string()));
        self.0.insert(key.to_string(), Value::Array(values));
    }

    /// Append an IRI at the end of an item list property.
    pub fn append_iri(&mut self, key: &str, iri: &Url) {
        let mut values = self.take_array(key);
        values.push(Value::String(iri.to_string()));
        self.0.insert(key.to_string(), Value::Array(values));
    }

    /// Drop every item whose id is `iri`. Returns the number removed.
    pub fn remove_iri(&mut self, key: &str, iri: &Url) -> usize {
        let values = self.take_array(key);
        let before = values.len();
        let kept: Vec<Value> = values
            .into_iter()
            .filter(|v| Reference::from_value(v).and_then(|r| r.id()).as_ref() != Some(iri))
            .collect();
        let removed = before - kept.len();
        self.0.insert(key.to_string(), Value::Array(kept));
        removed
    }

    fn take_array(&mut self, key: &str) -> Vec<Value> {
        match self.0.remove(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values,
            Some(value) => vec![value],
        }
    }

    /// Property name holding this collection's items.
    #[must_use]
    pub fn items_property(&self) -> &'static str {
        match self.kind() {
            Some("OrderedCollection" | "OrderedCollectionPage") => "orderedItems",
            _ => "items",
        }
    }

    /// Items of a collection, from `orderedItems` or `items`.
    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        ["orderedItems", "items"]
            .iter()
            .find_map(|key| match self.0.get(*key) {
                Some(Value::Array(values)) => Some(values.clone()),
                Some(Value::Null) | None => None,
                Some(value) => Some(vec![value.clone()]),
            })
            .unwrap_or_default()
    }

    /// The actor's `inbox`, when this value is an actor.
    #[must_use]
    pub fn inbox(&self) -> Option<Url> {
        self.iris("inbox").into_iter().next()
    }

    /// A single IRI-valued property such as `followers` or `outbox`.
    #[must_use]
    pub fn iri(&self, key: &str) -> Option<Url> {
        self.iris(key).into_iter().next()
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        object.into_value()
    }
}

/// One value of a property: an IRI or an embedded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// A bare IRI.
    Iri(Url),
    /// An embedded value.
    Embedded(Object),
}

impl Reference {
    /// Read a JSON value. Strings that are not IRIs and scalars are skipped.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Url::parse(s).ok().map(Self::Iri),
            Value::Object(map) => Some(Self::Embedded(Object(map.clone()))),
            _ => None,
        }
    }

    /// The referenced id. Links without an `id` fall back to `href`.
    #[must_use]
    pub fn id(&self) -> Option<Url> {
        match self {
            Self::Iri(iri) => Some(iri.clone()),
            Self::Embedded(object) => object.id().or_else(|| object.iri("href")),
        }
    }

    /// The embedded value, if any.
    #[must_use]
    pub const fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Iri(_) => None,
            Self::Embedded(object) => Some(object),
        }
    }

    /// Convert back into JSON.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Iri(iri) => Value::String(iri.to_string()),
            Self::Embedded(object) => object.into_value(),
        }
    }
}

/// Marker left in place of a deleted value.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    #[serde(rename = "@context")]
    context: &'static str,
    id: Url,
    #[serde(rename = "type")]
    kind: TombstoneType,
    #[serde(skip_serializing_if = "Option::is_none")]
    former_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    published: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated: Option<Value>,
    deleted: String,
}

impl Tombstone {
    /// Tombstone for `original`, stamped with `deleted`.
    #[must_use]
    pub fn replacing(id: Url, original: Option<&Object>, deleted: DateTime<Utc>) -> Self {
        Self {
            context: AS_CONTEXT,
            id,
            kind: TombstoneType::Tombstone,
            former_type: original.and_then(Object::kind).map(String::from),
            published: original.and_then(|o| o.get("published")).cloned(),
            updated: original.and_then(|o| o.get("updated")).cloned(),
            deleted: format_timestamp(deleted),
        }
    }

    /// Convert into a stored value.
    pub fn into_object(self) -> FederationResult<Object> {
        let value = serde_json::to_value(self)
            .map_err(|e| FederationError::Internal(e.to_string()))?;
        Object::from_value(value)
    }
}

/// `xsd:dateTime` rendering used for timestamps the engine writes.
#[must_use]
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
