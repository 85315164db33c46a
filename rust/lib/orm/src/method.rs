//! Method metadata and call values.
//!
//! Every model method declares the shape of its arguments with a
//! [`MethodDescriptor`]. Callers decode their input into [`Arg`] values
//! following that shape; handlers receive the decoded arguments and
//! return a [`CallResult`].

use std::fmt;

use hexya_core::RecordRef;
use hexya_domain::Domain;
use indexmap::IndexMap;
use serde_json::Value;

use crate::context::Context;
use crate::data::{FieldInfo, OnchangeResult, RecordData};
use crate::error::OrmError;
use crate::recordset::RecordSet;

/// Type of one method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any JSON value.
    Any,
    Bool,
    Int,
    Float,
    Str,
    Strings,
    Ids,
    RecordData,
    Domain,
    Context,
}

impl ParamKind {
    /// Value a parameter takes when the caller omits it or sends
    /// something that does not decode.
    pub fn zero(&self) -> Arg {
        match self {
            ParamKind::Any => Arg::Null,
            ParamKind::Bool => Arg::Bool(false),
            ParamKind::Int => Arg::Int(0),
            ParamKind::Float => Arg::Float(0.0),
            ParamKind::Str => Arg::Str(String::new()),
            ParamKind::Strings => Arg::Strings(Vec::new()),
            ParamKind::Ids => Arg::Ids(Vec::new()),
            ParamKind::RecordData => Arg::Data(RecordData::default()),
            ParamKind::Domain => Arg::Domain(Domain::default()),
            ParamKind::Context => Arg::Context(Context::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    /// Keyword name (`fields`, `domain`, ...).
    pub name: String,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub fn new(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// How a method takes its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodDescriptor {
    /// Plain positional parameters. With `variadic`, the last parameter
    /// may repeat any number of times (including zero).
    Positional { params: Vec<ParamSpec>, variadic: bool },
    /// A single parameter object, filled from the remaining positional
    /// arguments in order and then from keyword arguments by name.
    Struct(Vec<ParamSpec>),
}

impl MethodDescriptor {
    pub fn none() -> Self {
        MethodDescriptor::Positional {
            params: Vec::new(),
            variadic: false,
        }
    }

    pub fn positional(params: &[(&str, ParamKind)]) -> Self {
        MethodDescriptor::Positional {
            params: specs(params),
            variadic: false,
        }
    }

    pub fn variadic(params: &[(&str, ParamKind)]) -> Self {
        MethodDescriptor::Positional {
            params: specs(params),
            variadic: true,
        }
    }

    pub fn structure(params: &[(&str, ParamKind)]) -> Self {
        MethodDescriptor::Struct(specs(params))
    }

    pub fn params(&self) -> &[ParamSpec] {
        match self {
            MethodDescriptor::Positional { params, .. } => params,
            MethodDescriptor::Struct(params) => params,
        }
    }

    pub fn takes_args(&self) -> bool {
        !self.params().is_empty()
    }

    /// Smallest number of positional arguments accepted.
    pub fn min_args(&self) -> usize {
        match self {
            MethodDescriptor::Positional {
                params,
                variadic: true,
            } => params.len().saturating_sub(1),
            MethodDescriptor::Positional { params, .. } => params.len(),
            MethodDescriptor::Struct(_) => 0,
        }
    }

    /// Kind of the positional argument at `index`, if any.
    pub fn kind_at(&self, index: usize) -> Option<ParamKind> {
        match self {
            MethodDescriptor::Positional { params, variadic } => match params.get(index) {
                Some(p) => Some(p.kind),
                None if *variadic => params.last().map(|p| p.kind),
                None => None,
            },
            MethodDescriptor::Struct(params) => params.get(index).map(|p| p.kind),
        }
    }
}

fn specs(params: &[(&str, ParamKind)]) -> Vec<ParamSpec> {
    params.iter().map(|(name, kind)| ParamSpec::new(name, *kind)).collect()
}

/// A decoded argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Strings(Vec<String>),
    Ids(Vec<i64>),
    Json(Value),
    Data(RecordData),
    Domain(Domain),
    Context(Context),
    Struct(ArgStruct),
}

impl Arg {
    pub fn as_bool(&self) -> bool {
        matches!(self, Arg::Bool(true))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Arg::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Arg::Str(s) => s,
            _ => "",
        }
    }

    pub fn as_strings(&self) -> &[String] {
        match self {
            Arg::Strings(s) => s,
            _ => &[],
        }
    }

    pub fn as_ids(&self) -> &[i64] {
        match self {
            Arg::Ids(ids) => ids,
            _ => &[],
        }
    }

    pub fn as_data(&self) -> Option<&RecordData> {
        match self {
            Arg::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_domain(&self) -> Option<&Domain> {
        match self {
            Arg::Domain(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&ArgStruct> {
        match self {
            Arg::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// JSON rendering of the argument.
    pub fn to_json(&self) -> Value {
        match self {
            Arg::Null => Value::Null,
            Arg::Bool(b) => Value::Bool(*b),
            Arg::Int(i) => Value::from(*i),
            Arg::Float(f) => Value::from(*f),
            Arg::Str(s) => Value::String(s.clone()),
            Arg::Strings(s) => Value::from(s.clone()),
            Arg::Ids(ids) => Value::from(ids.clone()),
            Arg::Json(v) => v.clone(),
            Arg::Data(d) => serde_json::to_value(d).unwrap_or(Value::Null),
            Arg::Domain(d) => Value::Array(d.0.clone()),
            Arg::Context(c) => Value::Object(c.as_map().clone()),
            Arg::Struct(s) => Value::Object(
                s.fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Decoded parameter object of a struct-shaped method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgStruct {
    pub fields: IndexMap<String, Arg>,
}

impl ArgStruct {
    /// A parameter object with every field set to its zero value.
    pub fn zeroed(params: &[ParamSpec]) -> Self {
        Self {
            fields: params.iter().map(|p| (p.name.clone(), p.kind.zero())).collect(),
        }
    }

    pub fn set(&mut self, name: &str, value: Arg) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.fields.get(name)
    }

    pub fn get_str(&self, name: &str) -> &str {
        self.get(name).map(Arg::as_str).unwrap_or_default()
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).is_some_and(Arg::as_bool)
    }

    pub fn get_i64(&self, name: &str) -> i64 {
        self.get(name).and_then(Arg::as_i64).unwrap_or_default()
    }

    pub fn get_strings(&self, name: &str) -> &[String] {
        self.get(name).map(Arg::as_strings).unwrap_or_default()
    }

    pub fn get_domain(&self, name: &str) -> Domain {
        self.get(name).and_then(Arg::as_domain).cloned().unwrap_or_default()
    }

    pub fn get_data(&self, name: &str) -> Option<&RecordData> {
        self.get(name).and_then(Arg::as_data)
    }

    pub fn get_json(&self, name: &str) -> Value {
        self.get(name).map(Arg::to_json).unwrap_or(Value::Null)
    }

    /// A positive limit, or `None` for "no limit".
    pub fn get_limit(&self, name: &str) -> Option<usize> {
        match self.get_i64(name) {
            n if n > 0 => usize::try_from(n).ok(),
            _ => None,
        }
    }
}

/// Value returned by a method handler.
#[derive(Debug, Clone)]
pub enum CallResult {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Json(Value),
    Collection(RecordSet),
    Data(RecordData),
    DataList(Vec<RecordData>),
    Onchange(OnchangeResult),
    FieldInfos(IndexMap<String, FieldInfo>),
    NamePairs(Vec<RecordRef>),
}

impl CallResult {
    pub fn into_collection(self) -> Option<RecordSet> {
        match self {
            CallResult::Collection(rs) => Some(rs),
            _ => None,
        }
    }
}

pub type MethodHandler = fn(&RecordSet, Vec<Arg>) -> Result<CallResult, OrmError>;

#[derive(Clone)]
pub struct MethodDef {
    pub name: String,
    pub descriptor: MethodDescriptor,
    pub handler: MethodHandler,
}

impl MethodDef {
    pub fn new(name: &str, descriptor: MethodDescriptor, handler: MethodHandler) -> Self {
        Self {
            name: name.to_string(),
            descriptor,
            handler,
        }
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Positional argument `index`, or the zero value of `kind`.
pub fn arg_or_zero(args: &[Arg], index: usize, kind: ParamKind) -> Arg {
    args.get(index).cloned().unwrap_or_else(|| kind.zero())
}
