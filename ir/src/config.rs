//! Config declarations: named records of persistent device state.

use std::sync::Arc;

use kiln_dtype::DType;

use crate::types::Sym;

/// A config record. Fields are scalar; their values are runtime state and
/// never participate in shapes, indices or guards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigDecl {
    name: Sym,
    fields: Vec<(Sym, DType)>,
}

impl ConfigDecl {
    pub fn new(name: impl Into<Sym>, fields: impl IntoIterator<Item = (impl Into<Sym>, DType)>) -> Arc<Self> {
        let fields = fields.into_iter().map(|(name, ty)| (name.into(), ty)).collect();
        Arc::new(Self { name: name.into(), fields })
    }

    pub fn name(&self) -> &Sym {
        &self.name
    }

    pub fn fields(&self) -> &[(Sym, DType)] {
        &self.fields
    }

    pub fn field_type(&self, field: &Sym) -> Option<DType> {
        self.fields.iter().find(|(name, _)| name == field).map(|(_, ty)| *ty)
    }
}

/// Key identifying one field of one config in side tables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigField {
    pub config: Sym,
    pub field: Sym,
}

impl ConfigField {
    pub fn new(config: &ConfigDecl, field: &Sym) -> Self {
        Self { config: config.name().clone(), field: field.clone() }
    }
}

impl std::fmt::Display for ConfigField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.config, self.field)
    }
}
