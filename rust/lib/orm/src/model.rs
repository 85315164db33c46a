use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use crate::data::OnchangeValues;
use crate::error::OrmError;
use crate::fields::FieldDef;
use crate::method::{MethodDef, MethodDescriptor, MethodHandler};
use crate::recordset::RecordSet;

/// Computes the display name of one record from its stored values.
pub type NameFn = fn(&IndexMap<String, Value>) -> String;
pub type ConstraintFn = fn(&RecordSet) -> Result<(), OrmError>;
pub type OnchangeFn = fn(&RecordSet, &mut OnchangeValues) -> Result<(), OrmError>;

/// A check run on records after create and write.
#[derive(Clone)]
pub struct Constraint {
    pub name: String,
    /// Fields whose modification triggers the check. Empty means always.
    pub fields: Vec<String>,
    pub check: ConstraintFn,
}

/// A hook run when the client edits `field` in a form.
#[derive(Clone)]
pub struct OnchangeHook {
    pub field: String,
    pub hook: OnchangeFn,
}

/// Definition of a model: its fields, methods and hooks.
#[derive(Clone)]
pub struct ModelDef {
    pub name: String,
    pub description: String,
    /// Fields keyed by client name.
    pub fields: IndexMap<String, FieldDef>,
    pub methods: IndexMap<String, MethodDef>,
    /// Default order, e.g. `"name, id"`.
    pub order: String,
    pub name_fn: Option<NameFn>,
    pub constraints: Vec<Constraint>,
    pub onchanges: Vec<OnchangeHook>,
}

impl ModelDef {
    pub fn new(name: &str) -> Self {
        let mut model = Self {
            name: name.to_string(),
            description: name.to_string(),
            fields: IndexMap::new(),
            methods: IndexMap::new(),
            order: "id".to_string(),
            name_fn: None,
            constraints: Vec::new(),
            onchanges: Vec::new(),
        };
        for f in FieldDef::magic_fields() {
            model.fields.insert(f.json.clone(), f);
        }
        model
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.json.clone(), field);
        self
    }

    pub fn with_method(
        mut self,
        name: &str,
        descriptor: MethodDescriptor,
        handler: MethodHandler,
    ) -> Self {
        self.methods.insert(name.to_string(), MethodDef::new(name, descriptor, handler));
        self
    }

    pub fn with_order(mut self, order: &str) -> Self {
        self.order = order.to_string();
        self
    }

    pub fn with_name_fn(mut self, f: NameFn) -> Self {
        self.name_fn = Some(f);
        self
    }

    pub fn with_constraint(mut self, name: &str, fields: &[&str], check: ConstraintFn) -> Self {
        self.constraints.push(Constraint {
            name: name.to_string(),
            fields: fields.iter().map(|s| s.to_string()).collect(),
            check,
        });
        self
    }

    pub fn with_onchange(mut self, field: &str, hook: OnchangeFn) -> Self {
        self.onchanges.push(OnchangeHook {
            field: field.to_string(),
            hook,
        });
        self
    }

    /// Look up a field by client name or internal name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields
            .get(name)
            .or_else(|| self.fields.values().find(|f| f.name == name))
    }

    pub fn field_or_err(&self, name: &str) -> Result<&FieldDef, OrmError> {
        self.field(name).ok_or_else(|| OrmError::unknown_field(&self.name, name))
    }

    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.get(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Fields persisted in the record store.
    pub fn stored_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values().filter(|f| f.stored)
    }

    /// Display name of a stored record: the name hook, else the `name`
    /// field, else `Model,id`.
    pub fn display_name(&self, values: &IndexMap<String, Value>) -> String {
        if let Some(f) = self.name_fn {
            return f(values);
        }
        match values.get("name") {
            Some(Value::String(s)) => s.clone(),
            _ => {
                let id = values.get("id").and_then(Value::as_i64).unwrap_or_default();
                format!("{},{}", self.name, id)
            }
        }
    }
}

impl fmt::Debug for ModelDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDef")
            .field("name", &self.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn magic_fields_are_present() {
        let m = ModelDef::new("Partner");
        for name in ["id", "display_name", "create_date", "write_date", "__last_update"] {
            assert!(m.field(name).is_some(), "{name}");
        }
    }

    #[test]
    fn lookup_by_either_name() {
        let m = ModelDef::new("Partner").with_field(FieldDef::many2one("Country", "Country"));
        assert_eq!(m.field("country_id").map(|f| f.name.as_str()), Some("Country"));
        assert_eq!(m.field("Country").map(|f| f.json.as_str()), Some("country_id"));
        assert!(m.field_or_err("nope").is_err());
    }

    #[test]
    fn display_name_fallbacks() {
        let m = ModelDef::new("Currency");
        let mut values = IndexMap::new();
        values.insert("id".to_string(), json!(3));
        assert_eq!(m.display_name(&values), "Currency,3");
        values.insert("name".to_string(), json!("EUR"));
        assert_eq!(m.display_name(&values), "EUR");
    }
}
