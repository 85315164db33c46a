use hexya_domain::Condition;
use serde::Serialize;
use serde_json::Value;

use crate::env::Environment;
use crate::error::OrmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Char,
    Text,
    Boolean,
    Integer,
    Float,
    Date,
    Datetime,
    Selection,
    Binary,
    Many2One,
    One2One,
    One2Many,
    Many2Many,
}

impl FieldType {
    pub fn is_to_one(&self) -> bool {
        matches!(self, FieldType::Many2One | FieldType::One2One)
    }

    pub fn is_to_many(&self) -> bool {
        matches!(self, FieldType::One2Many | FieldType::Many2Many)
    }

    pub fn is_relation(&self) -> bool {
        self.is_to_one() || self.is_to_many()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Char => "char",
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Selection => "selection",
            FieldType::Binary => "binary",
            FieldType::Many2One => "many2one",
            FieldType::One2One => "one2one",
            FieldType::One2Many => "one2many",
            FieldType::Many2Many => "many2many",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }

    /// Value returned by `read` for a field that was never set.
    pub fn empty_value(&self) -> Value {
        match self {
            FieldType::Integer => Value::from(0),
            FieldType::Float => Value::from(0.0),
            FieldType::One2Many | FieldType::Many2Many => Value::Array(Vec::new()),
            _ => Value::Bool(false),
        }
    }
}

pub type DefaultFn = fn(&Environment) -> Result<Value, OrmError>;

#[derive(Debug, Clone)]
pub enum DefaultValue {
    Value(Value),
    Func(DefaultFn),
}

impl DefaultValue {
    pub fn eval(&self, env: &Environment) -> Result<Value, OrmError> {
        match self {
            DefaultValue::Value(v) => Ok(v.clone()),
            DefaultValue::Func(f) => f(env),
        }
    }
}

/// Names of the fields every model carries.
pub mod magic {
    pub const ID: &str = "id";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const CREATE_DATE: &str = "create_date";
    pub const WRITE_DATE: &str = "write_date";
    pub const LAST_UPDATE: &str = "__last_update";

    pub fn is_magic(json: &str) -> bool {
        matches!(json, ID | DISPLAY_NAME | CREATE_DATE | WRITE_DATE | LAST_UPDATE)
    }
}

/// Definition of one model field.
///
/// `name` is the internal name (`Country`), `json` the client name
/// (`country_id`). Lookups accept either.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub json: String,
    pub label: String,
    pub help: String,
    pub field_type: FieldType,
    /// Target model of a relation field.
    pub relation: Option<String>,
    /// For one2many fields: the many2one field on the target model
    /// pointing back to the owner.
    pub reverse_fk: Option<String>,
    pub required: bool,
    pub readonly: bool,
    /// False for values computed on read (one2many, display_name).
    pub stored: bool,
    pub default: Option<DefaultValue>,
    /// Restriction on the records a relation field may point to.
    pub filter: Option<Condition>,
    pub selection: Vec<(String, String)>,
}

impl FieldDef {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            json: default_json_name(name, field_type),
            label: label_of(name),
            help: String::new(),
            field_type,
            relation: None,
            reverse_fk: None,
            required: false,
            readonly: false,
            stored: field_type != FieldType::One2Many,
            default: None,
            filter: None,
            selection: Vec::new(),
        }
    }

    pub fn char(name: &str) -> Self {
        Self::new(name, FieldType::Char)
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn date(name: &str) -> Self {
        Self::new(name, FieldType::Date)
    }

    pub fn datetime(name: &str) -> Self {
        Self::new(name, FieldType::Datetime)
    }

    pub fn binary(name: &str) -> Self {
        Self::new(name, FieldType::Binary)
    }

    pub fn selection(name: &str, options: &[(&str, &str)]) -> Self {
        let mut f = Self::new(name, FieldType::Selection);
        f.selection = options.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        f
    }

    pub fn many2one(name: &str, relation: &str) -> Self {
        let mut f = Self::new(name, FieldType::Many2One);
        f.relation = Some(relation.to_string());
        f
    }

    pub fn one2one(name: &str, relation: &str) -> Self {
        let mut f = Self::new(name, FieldType::One2One);
        f.relation = Some(relation.to_string());
        f
    }

    /// `reverse_fk` is the client name of the many2one on `relation`.
    pub fn one2many(name: &str, relation: &str, reverse_fk: &str) -> Self {
        let mut f = Self::new(name, FieldType::One2Many);
        f.relation = Some(relation.to_string());
        f.reverse_fk = Some(reverse_fk.to_string());
        f
    }

    pub fn many2many(name: &str, relation: &str) -> Self {
        let mut f = Self::new(name, FieldType::Many2Many);
        f.relation = Some(relation.to_string());
        f
    }

    pub fn json(mut self, json: &str) -> Self {
        self.json = json.to_string();
        self
    }

    pub fn string(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn help(mut self, help: &str) -> Self {
        self.help = help.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.stored = false;
        self.readonly = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_fn(mut self, f: DefaultFn) -> Self {
        self.default = Some(DefaultValue::Func(f));
        self
    }

    pub fn filter(mut self, cond: Condition) -> Self {
        self.filter = Some(cond);
        self
    }

    pub fn is_magic(&self) -> bool {
        magic::is_magic(&self.json)
    }

    pub fn relation_model(&self) -> Result<&str, OrmError> {
        self.relation.as_deref().ok_or_else(|| {
            OrmError::InvalidValue(format!("field '{}' is not a relation", self.json))
        })
    }

    /// Fields added to every model.
    pub(crate) fn magic_fields() -> Vec<FieldDef> {
        vec![
            FieldDef::integer("ID").json(magic::ID).string("ID").readonly(),
            FieldDef::char("DisplayName")
                .json(magic::DISPLAY_NAME)
                .string("Display Name")
                .computed(),
            FieldDef::datetime("CreateDate")
                .json(magic::CREATE_DATE)
                .string("Created on")
                .readonly(),
            FieldDef::datetime("WriteDate")
                .json(magic::WRITE_DATE)
                .string("Last Updated on")
                .readonly(),
            FieldDef::datetime("LastUpdate")
                .json(magic::LAST_UPDATE)
                .string("Last Modified on")
                .computed(),
        ]
    }
}

/// `IsCompany` → `is_company`; relations get `_id` / `_ids` suffixes.
fn default_json_name(name: &str, field_type: FieldType) -> String {
    let snake = snake_case(name);
    if field_type.is_to_one() && !snake.ends_with("_id") {
        format!("{}_id", snake)
    } else if field_type.is_to_many() && !snake.ends_with("_ids") {
        format!("{}_ids", snake)
    } else {
        snake
    }
}

pub(crate) fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

fn label_of(name: &str) -> String {
    let snake = snake_case(name);
    snake
        .split('_')
        .filter(|s| !s.is_empty())
        .map(hexya_core::title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_names() {
        assert_eq!(FieldDef::char("Name").json, "name");
        assert_eq!(FieldDef::boolean("IsCompany").json, "is_company");
        assert_eq!(FieldDef::many2one("Country", "Country").json, "country_id");
        assert_eq!(FieldDef::many2many("Categories", "PartnerCategory").json, "categories_ids");
        assert_eq!(FieldDef::one2many("Children", "Partner", "parent_id").json, "children_ids");
        assert_eq!(FieldDef::char("VATNumber").json, "vat_number");
        assert_eq!(FieldDef::many2many("Groups", "Group").json("group_ids").json, "group_ids");
    }

    #[test]
    fn labels() {
        assert_eq!(FieldDef::boolean("IsCompany").label, "Is Company");
        assert_eq!(FieldDef::char("Name").string("Filter Name").label, "Filter Name");
    }

    #[test]
    fn one2many_is_not_stored() {
        assert!(!FieldDef::one2many("Children", "Partner", "parent_id").stored);
        assert!(FieldDef::many2many("Groups", "Group").stored);
    }

    #[test]
    fn empty_values() {
        assert_eq!(FieldType::Integer.empty_value(), Value::from(0));
        assert_eq!(FieldType::Many2Many.empty_value(), Value::Array(vec![]));
        assert_eq!(FieldType::Many2One.empty_value(), Value::Bool(false));
        assert_eq!(FieldType::Char.empty_value(), Value::Bool(false));
    }
}
