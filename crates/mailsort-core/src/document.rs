//! Firestore document wire format (REST v1 / Eventarc JSON encoding).
//!
//! Every field value is a single-key object naming its type, e.g.
//! `{"stringValue": "Invoice due"}` or `{"integerValue": "42"}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A typed Firestore field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    /// Serialized as `null` or `"NULL_VALUE"` depending on the producer.
    NullValue(Option<String>),
    BooleanValue(bool),
    /// 64-bit integers travel as decimal strings.
    IntegerValue(String),
    /// A number, or `"NaN"`, `"Infinity"`, `"-Infinity"` for non-finite values.
    #[serde(with = "double")]
    DoubleValue(f64),
    /// RFC 3339 timestamp.
    TimestampValue(String),
    StringValue(String),
    /// Base64-encoded bytes.
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(GeoPoint),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Self::StringValue(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::StringValue(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&str> {
        match self {
            Self::TimestampValue(ts) => Some(ts),
            _ => None,
        }
    }
}

mod double {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_nan() {
            s.serialize_str("NaN")
        } else if v.is_infinite() {
            s.serialize_str(if *v > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            s.serialize_f64(*v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("invalid double value {other:?}"))),
            },
        }
    }
}

/// A Firestore document: full resource name plus its fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// `projects/{p}/databases/{d}/documents/{path}`; empty in write bodies.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// A name-less document carrying only the given fields (a write body).
    pub fn with_fields(fields: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Path relative to the database root, e.g. `users/u1/emails/e1`.
    pub fn relative_path(&self) -> Option<&str> {
        if self.name.is_empty() {
            None
        } else {
            Some(document_relative_path(&self.name))
        }
    }
}

/// Payload of a Firestore document event.
///
/// `value` is the document after the change (present for creates),
/// `old_value` the document before it (absent for creates).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEventData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Document>,
}

/// Strip `projects/{p}/databases/{d}/documents/` from a resource name.
///
/// Paths without that prefix are returned unchanged.
pub fn document_relative_path(name: &str) -> &str {
    let parts: Vec<&str> = name.splitn(6, '/').collect();
    match parts.as_slice() {
        ["projects", _, "databases", _, "documents", rest] => *rest,
        _ => name.strip_prefix("documents/").unwrap_or(name),
    }
}
