//! The web addon: everything the browser client talks to.
//!
//! Client calls name models and methods the way the client knows them
//! (`res.partner`, `search_read`). The [`Dispatcher`] maps them to ORM
//! models and methods, binds the JSON arguments to the method's declared
//! parameters, runs the call in its own transaction and converts the
//! result back to the client's wire forms.

pub mod adapters;
pub mod api;
pub mod binder;
pub mod cache;
pub mod dispatch;
pub mod filter;
pub mod mixin;
pub mod names;
pub mod relations;
pub mod resolver;

pub use adapters::{AdapterTable, MethodAdapter};
pub use api::{WebModule, WebState};
pub use binder::Binder;
pub use cache::FieldsCache;
pub use dispatch::{CallRequest, Dispatcher, SearchReadParams, SearchReadResult};

use hexya_orm::{OrmError, Registry};

/// Register the web models and the methods every model gets. Run after
/// the base models are registered so their web fields can be added.
pub fn register(reg: &mut Registry) -> Result<(), OrmError> {
    mixin::register(reg);
    reg.add_model(filter::filter_model());
    filter::extend_base_models(reg)
}
