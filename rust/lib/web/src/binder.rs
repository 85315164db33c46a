//! Decoding of raw JSON arguments into the parameters a method declares.
//!
//! A method taking a parameter object gets it filled from the remaining
//! positional arguments in order, then from the keyword arguments by
//! name. A method taking positional parameters gets them one to one and
//! ignores keyword arguments.
//!
//! A fragment that does not decode into its parameter type leaves that
//! parameter at its zero value. Clients send `false` for "no value"
//! whatever the field type, so this is the normal case rather than an
//! error. In strict mode the same failure aborts the call instead.

use hexya_core::{cast_to_integer, RpcError};
use hexya_domain::Domain;
use hexya_orm::{Arg, ArgStruct, Context, MethodDescriptor, ParamKind, ParamSpec, RecordData};
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct Binder {
    strict: bool,
}

impl Binder {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Build the arguments of a call on `model` described by `descriptor`.
    pub fn bind(
        &self,
        model: &str,
        descriptor: &MethodDescriptor,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Vec<Arg>, RpcError> {
        if !descriptor.takes_args() {
            return Ok(Vec::new());
        }
        match descriptor {
            MethodDescriptor::Struct(params) => {
                let bound = self.bind_struct(model, params, args, kwargs)?;
                Ok(vec![Arg::Struct(bound)])
            }
            MethodDescriptor::Positional { params, variadic } => {
                self.bind_positional(model, descriptor, params.len(), *variadic, args)
            }
        }
    }

    fn bind_struct(
        &self,
        model: &str,
        params: &[ParamSpec],
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<ArgStruct, RpcError> {
        let mut out = ArgStruct::zeroed(params);
        for (param, raw) in params.iter().zip(args) {
            if let Some(arg) = self.decode_or_zero(model, param, raw)? {
                out.set(&param.name, arg);
            }
        }
        for (key, raw) in kwargs {
            let Some(param) = params.iter().find(|p| &p.name == key) else {
                continue;
            };
            if let Some(arg) = self.decode_or_zero(model, param, raw)? {
                out.set(&param.name, arg);
            }
        }
        Ok(out)
    }

    fn bind_positional(
        &self,
        model: &str,
        descriptor: &MethodDescriptor,
        declared: usize,
        variadic: bool,
        args: &[Value],
    ) -> Result<Vec<Arg>, RpcError> {
        if args.len() < descriptor.min_args() {
            return Err(RpcError::Arity(format!(
                "wrong number of args in non-struct function args ({} instead of {})",
                args.len(),
                declared
            )));
        }
        if !variadic && args.len() > declared {
            return Err(RpcError::Arity(format!(
                "too many args in non-struct function args ({} instead of {})",
                args.len(),
                declared
            )));
        }
        let mut out = Vec::with_capacity(args.len());
        for (i, raw) in args.iter().enumerate() {
            let Some(kind) = descriptor.kind_at(i) else { break };
            let param = ParamSpec::new(&format!("#{}", i), kind);
            let arg = self.decode_or_zero(model, &param, raw)?.unwrap_or_else(|| kind.zero());
            out.push(arg);
        }
        Ok(out)
    }

    /// `Some(arg)` on success, `None` when a tolerated failure leaves the
    /// parameter at its zero value.
    fn decode_or_zero(
        &self,
        model: &str,
        param: &ParamSpec,
        raw: &Value,
    ) -> Result<Option<Arg>, RpcError> {
        match decode(param.kind, raw, model) {
            Ok(arg) => Ok(Some(arg)),
            Err(err) if self.strict => Err(RpcError::TypeMismatch(format!(
                "argument '{}': {}",
                param.name, err
            ))),
            Err(err) => {
                debug!(
                    param = %param.name,
                    raw = %raw,
                    error = %err,
                    "unable to unmarshal argument"
                );
                Ok(None)
            }
        }
    }
}

/// Decode one JSON fragment into a value of `kind`.
///
/// `null` decodes to the zero value of every kind. Record data is bound
/// to `model`.
pub fn decode(kind: ParamKind, raw: &Value, model: &str) -> Result<Arg, String> {
    if raw.is_null() {
        return Ok(kind.zero());
    }
    let mismatch = || format!("cannot decode {} as {:?}", raw, kind);
    let arg = match kind {
        ParamKind::Any => Arg::Json(raw.clone()),
        ParamKind::Bool => Arg::Bool(raw.as_bool().ok_or_else(mismatch)?),
        ParamKind::Int => Arg::Int(cast_to_integer(raw).ok_or_else(mismatch)?),
        ParamKind::Float => Arg::Float(raw.as_f64().ok_or_else(mismatch)?),
        ParamKind::Str => Arg::Str(raw.as_str().ok_or_else(mismatch)?.to_string()),
        ParamKind::Strings => {
            let items = raw.as_array().ok_or_else(mismatch)?;
            let strings = items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(mismatch)?;
            Arg::Strings(strings)
        }
        ParamKind::Ids => {
            let items = raw.as_array().ok_or_else(mismatch)?;
            let ids = items
                .iter()
                .map(cast_to_integer)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(mismatch)?;
            Arg::Ids(ids)
        }
        ParamKind::RecordData => {
            let map = raw.as_object().ok_or_else(mismatch)?;
            let fields = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            Arg::Data(RecordData::from_map(model, fields))
        }
        ParamKind::Domain => match raw {
            Value::Array(_) | Value::String(_) => {
                Arg::Domain(Domain::from_value(raw).map_err(|e| e.to_string())?)
            }
            _ => return Err(mismatch()),
        },
        ParamKind::Context => {
            let map = raw.as_object().ok_or_else(mismatch)?;
            Arg::Context(Context::from_map(map.clone()))
        }
    };
    Ok(arg)
}
