//! A small record ORM: model registry, field metadata, method
//! descriptors and per-call environments over a [`RecordStore`].
//!
//! Models are declared with [`ModelDef`] and registered in a
//! [`Registry`]. Every call runs in its own [`Environment`], whose writes
//! are buffered and committed atomically when the call succeeds.
//!
//! [`RecordStore`]: hexya_store::RecordStore

pub mod builtin;
pub mod context;
pub mod data;
pub mod env;
pub mod error;
pub mod fields;
pub mod method;
pub mod model;
pub mod recordset;
pub mod registry;
pub mod search;
pub mod seed;

pub use context::Context;
pub use data::{FieldInfo, FieldMap, OnchangeParams, OnchangeResult, OnchangeValues, RecordData};
pub use env::{Environment, Orm, SUPERUSER_ID};
pub use error::OrmError;
pub use fields::{magic, DefaultFn, DefaultValue, FieldDef, FieldType};
pub use method::{
    arg_or_zero, Arg, ArgStruct, CallResult, MethodDef, MethodDescriptor, MethodHandler, ParamKind,
    ParamSpec,
};
pub use model::{Constraint, ConstraintFn, ModelDef, NameFn, OnchangeFn, OnchangeHook};
pub use recordset::{id_in, RecordSet, SKIP_CHECK_CONSTRAINTS};
pub use registry::Registry;
pub use search::SearchQuery;
pub use seed::{load_seed_dir, SeedFile};
