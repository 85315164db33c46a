use std::sync::Arc;

use indexmap::IndexMap;

use crate::builtin;
use crate::error::OrmError;
use crate::method::{MethodDef, MethodDescriptor, MethodHandler};
use crate::model::ModelDef;

/// All models known to the server.
///
/// Methods registered with [`Registry::add_common_method`] are available
/// on every model, including models added later. A model's own method of
/// the same name takes precedence.
#[derive(Debug, Clone)]
pub struct Registry {
    models: IndexMap<String, Arc<ModelDef>>,
    common: IndexMap<String, MethodDef>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// A registry with the CRUD methods every model has.
    pub fn new() -> Self {
        let mut reg = Self {
            models: IndexMap::new(),
            common: IndexMap::new(),
        };
        builtin::register(&mut reg);
        reg
    }

    pub fn add_model(&mut self, mut model: ModelDef) {
        for (name, method) in &self.common {
            model.methods.entry(name.clone()).or_insert_with(|| method.clone());
        }
        tracing::debug!(model = %model.name, fields = model.fields.len(), "registered model");
        self.models.insert(model.name.clone(), Arc::new(model));
    }

    pub fn model(&self, name: &str) -> Result<Arc<ModelDef>, OrmError> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| OrmError::UnknownModel(name.to_string()))
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn model_mut(&mut self, name: &str) -> Result<&mut ModelDef, OrmError> {
        self.models
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| OrmError::UnknownModel(name.to_string()))
    }

    /// Apply `f` to an already registered model, e.g. to add fields from
    /// another module.
    pub fn extend_model(
        &mut self,
        name: &str,
        f: impl FnOnce(ModelDef) -> ModelDef,
    ) -> Result<(), OrmError> {
        let model = self.model_mut(name)?;
        let extended = f(model.clone());
        *model = extended;
        Ok(())
    }

    /// Add a method to every model, present and future.
    pub fn add_common_method(
        &mut self,
        name: &str,
        descriptor: MethodDescriptor,
        handler: MethodHandler,
    ) {
        let method = MethodDef::new(name, descriptor, handler);
        for model in self.models.values_mut() {
            Arc::make_mut(model)
                .methods
                .entry(name.to_string())
                .or_insert_with(|| method.clone());
        }
        self.common.insert(name.to_string(), method);
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::CallResult;
    use crate::recordset::RecordSet;
    use crate::Arg;

    fn answer(_rs: &RecordSet, _args: Vec<Arg>) -> Result<CallResult, OrmError> {
        Ok(CallResult::Int(42))
    }

    fn other(_rs: &RecordSet, _args: Vec<Arg>) -> Result<CallResult, OrmError> {
        Ok(CallResult::Int(7))
    }

    #[test]
    fn common_methods_reach_all_models() {
        let mut reg = Registry::new();
        reg.add_model(ModelDef::new("Partner"));
        reg.add_common_method("Answer", MethodDescriptor::none(), answer);
        reg.add_model(ModelDef::new("User"));

        assert!(reg.model("Partner").unwrap().has_method("Answer"));
        assert!(reg.model("User").unwrap().has_method("Answer"));
        assert!(reg.model("User").unwrap().has_method("Create"));
    }

    #[test]
    fn own_method_wins() {
        let mut reg = Registry::new();
        reg.add_model(ModelDef::new("Partner").with_method(
            "Answer",
            MethodDescriptor::positional(&[("x", crate::ParamKind::Int)]),
            other,
        ));
        reg.add_common_method("Answer", MethodDescriptor::none(), answer);
        let m = reg.model("Partner").unwrap();
        assert!(m.method("Answer").unwrap().descriptor.takes_args());
    }

    #[test]
    fn unknown_model() {
        let reg = Registry::new();
        assert!(matches!(reg.model("Nope"), Err(OrmError::UnknownModel(_))));
    }

    #[test]
    fn extend_model_adds_fields() {
        let mut reg = Registry::new();
        reg.add_model(ModelDef::new("Partner"));
        reg.extend_model("Partner", |m| m.with_field(crate::FieldDef::char("Ref")))
            .unwrap();
        assert!(reg.model("Partner").unwrap().field("ref").is_some());
    }
}
