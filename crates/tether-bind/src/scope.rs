//! Scopes and symbol resolution
//!
//! A [`Scope`] is an immutable, ordered list of symbol tables. Lookup is
//! first match, most specific table first. Child scopes prepend a table to a
//! copy of the parent's list; the parent is never touched.

use std::rc::Rc;

use crate::model::{FieldHandle, Model};
use crate::value::{Func, Value};

/// What a name resolves to
#[derive(Debug, Clone)]
pub enum Symbol {
    /// Plain value, not addressable (loop outputs, constants)
    Value(Value),
    /// Model field, addressable unless computed
    Field(FieldHandle),
    /// Registered helper function
    Helper(Func),
}

impl Symbol {
    pub fn value(&self) -> Value {
        match self {
            Symbol::Value(v) => v.clone(),
            Symbol::Field(h) => h.get(),
            Symbol::Helper(f) => Value::Func(f.clone()),
        }
    }
}

/// Name to symbol mapping
pub trait SymbolTable {
    fn lookup(&self, name: &str) -> Option<Symbol>;
}

/// Symbol table backed by a model's fields
pub struct ModelTable {
    model: Model,
}

impl ModelTable {
    pub fn new(model: Model) -> Self {
        Self { model }
    }
}

impl SymbolTable for ModelTable {
    fn lookup(&self, name: &str) -> Option<Symbol> {
        self.model.handle(name).map(Symbol::Field)
    }
}

/// Fixed set of named values, e.g. the outputs of one `each` item
#[derive(Debug, Default)]
pub struct LocalTable {
    names: Vec<(String, Value)>,
}

impl LocalTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.names.push((name.to_string(), value));
        self
    }
}

impl SymbolTable for LocalTable {
    fn lookup(&self, name: &str) -> Option<Symbol> {
        self.names
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| Symbol::Value(v.clone()))
    }
}

/// Ordered, immutable list of symbol tables
#[derive(Clone)]
pub struct Scope {
    tables: Rc<[Rc<dyn SymbolTable>]>,
}

impl Scope {
    pub fn new(tables: Vec<Rc<dyn SymbolTable>>) -> Self {
        Self { tables: tables.into() }
    }

    /// One table per model, in the given order
    pub fn from_models(models: &[Model]) -> Self {
        Self::new(
            models
                .iter()
                .map(|m| Rc::new(ModelTable::new(m.clone())) as Rc<dyn SymbolTable>)
                .collect(),
        )
    }

    /// New scope with `table` in front of this one's tables
    pub fn child(&self, table: Rc<dyn SymbolTable>) -> Scope {
        let mut tables = Vec::with_capacity(self.tables.len() + 1);
        tables.push(table);
        tables.extend(self.tables.iter().cloned());
        Self::new(tables)
    }

    /// New scope with `fallback`'s tables after this one's
    pub fn merge(&self, fallback: &Scope) -> Scope {
        let tables = self.tables.iter().chain(fallback.tables.iter()).cloned().collect();
        Self::new(tables)
    }

    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        self.tables.iter().find_map(|t| t.lookup(name))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope").field("tables", &self.tables.len()).finish()
    }
}
