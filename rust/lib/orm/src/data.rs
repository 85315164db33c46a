use hexya_domain::Condition;
use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};
use serde_json::Value;

use crate::fields::FieldType;

/// Field values keyed by client field name, in insertion order.
pub type FieldMap = IndexMap<String, Value>;

/// Field values bound to a model.
///
/// Serializes as the bare field map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordData {
    pub model: String,
    pub fields: FieldMap,
}

impl RecordData {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            fields: FieldMap::new(),
        }
    }

    pub fn from_map(model: &str, fields: FieldMap) -> Self {
        Self {
            model: model.to_string(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for RecordData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// Client-facing description of a field, as returned by `fields_get`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub string: String,
    pub help: String,
    pub required: bool,
    pub readonly: bool,
    pub store: bool,
    pub sortable: bool,
    pub searchable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_field: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub selection: Vec<(String, String)>,
    /// Rendered domain sent to the client. Set by the web layer from
    /// `filter`.
    pub domain: Value,
    #[serde(skip)]
    pub filter: Option<Condition>,
}

/// Arguments of an `onchange` call.
#[derive(Debug, Clone, Default)]
pub struct OnchangeParams {
    pub values: RecordData,
    pub field_name: Vec<String>,
    pub field_onchange: Value,
}

/// Form values seen by onchange hooks, and the changes they make.
#[derive(Debug, Clone, Default)]
pub struct OnchangeValues {
    /// Values currently in the form.
    pub record: FieldMap,
    /// Values assigned by hooks.
    pub changes: FieldMap,
    /// New filters for relation fields, keyed by field name.
    pub filters: IndexMap<String, Condition>,
    pub warning: String,
}

impl OnchangeValues {
    pub fn new(record: FieldMap) -> Self {
        Self {
            record,
            ..Default::default()
        }
    }

    /// Latest value of `field`, taking earlier hooks into account.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.changes.get(field).or_else(|| self.record.get(field))
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.changes.insert(field.into(), value);
    }
}

#[derive(Debug, Clone, Default)]
pub struct OnchangeResult {
    pub value: RecordData,
    pub warning: String,
    pub filters: IndexMap<String, Condition>,
}
