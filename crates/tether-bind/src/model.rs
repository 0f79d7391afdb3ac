//! Application models
//!
//! A [`Model`] is a named record whose fields are declared once through
//! [`ModelBuilder`]. Each stored field has a stable [`Location`] the watch
//! table keys registrations on; computed fields have none and therefore
//! cannot be watched.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ExpressionErrorKind;
use crate::value::{Value, ValueKind, ValueShape};

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// Addressable storage location: one field of one model instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    model: u64,
    field: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model{}.{}", self.model, self.field)
    }
}

type ComputeFn = Rc<dyn Fn(&Model) -> Value>;

enum Access {
    ReadWrite,
    ReadOnly,
    Computed(ComputeFn),
}

struct Field {
    name: String,
    /// Kind declared at registration; `Null` means dynamic
    kind: ValueKind,
    access: Access,
    value: RefCell<Value>,
}

struct ModelInner {
    id: u64,
    name: String,
    fields: Vec<Field>,
}

/// Shared handle to a model instance
#[derive(Clone)]
pub struct Model(Rc<ModelInner>);

impl Model {
    /// Start declaring a model
    pub fn builder(name: &str) -> ModelBuilder {
        ModelBuilder { name: name.to_string(), fields: Vec::new() }
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.fields.iter().map(|f| f.name.as_str())
    }

    /// Field index by name. Exact match wins, then ASCII case-insensitive
    /// (attribute names arrive lowercased from the HTML tokenizer).
    fn index_of(&self, name: &str) -> Option<usize> {
        let fields = &self.0.fields;
        fields
            .iter()
            .position(|f| f.name == name)
            .or_else(|| fields.iter().position(|f| f.name.eq_ignore_ascii_case(name)))
    }

    /// Typed capability for a field
    pub fn handle(&self, name: &str) -> Option<FieldHandle> {
        self.index_of(name).map(|index| FieldHandle { model: self.clone(), index })
    }

    /// Current value of a field
    pub fn get(&self, name: &str) -> Option<Value> {
        self.handle(name).map(|h| h.get())
    }

    /// Location of a stored field
    pub fn location(&self, name: &str) -> Option<Location> {
        self.handle(name)?.location()
    }

    /// Assign a stored, settable field without notifying any watcher
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), ExpressionErrorKind> {
        self.handle(name)
            .ok_or_else(|| ExpressionErrorKind::UnresolvedName(name.to_string()))?
            .set(value.into())
    }

    pub fn ptr_eq(&self, other: &Model) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(&self.0.name);
        for field in &self.0.fields {
            match field.access {
                Access::Computed(_) => s.field(&field.name, &"<computed>"),
                _ => s.field(&field.name, &*field.value.borrow()),
            };
        }
        s.finish()
    }
}

/// Declares the fields of a [`Model`]
pub struct ModelBuilder {
    name: String,
    fields: Vec<Field>,
}

impl ModelBuilder {
    fn push(mut self, name: &str, kind: ValueKind, access: Access, value: Value) -> Self {
        let field = Field { name: name.to_string(), kind, access, value: RefCell::new(value) };
        match self.fields.iter().position(|f| f.name == name) {
            Some(i) => self.fields[i] = field,
            None => self.fields.push(field),
        }
        self
    }

    /// Settable stored field; its kind is taken from the initial value
    pub fn field(self, name: &str, initial: impl Into<Value>) -> Self {
        let value = initial.into();
        self.push(name, value.kind(), Access::ReadWrite, value)
    }

    /// Stored field that bindings may read and watch but not write
    pub fn readonly(self, name: &str, initial: impl Into<Value>) -> Self {
        let value = initial.into();
        self.push(name, value.kind(), Access::ReadOnly, value)
    }

    /// Derived field, recomputed on every read. Not addressable.
    pub fn computed(self, name: &str, compute: impl Fn(&Model) -> Value + 'static) -> Self {
        self.push(name, ValueKind::Null, Access::Computed(Rc::new(compute)), Value::Null)
    }

    pub fn build(self) -> Model {
        let id = NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed);
        Model(Rc::new(ModelInner { id, name: self.name, fields: self.fields }))
    }
}

/// Typed field capability: location, shape and settable flag of one field
#[derive(Clone)]
pub struct FieldHandle {
    model: Model,
    index: usize,
}

impl FieldHandle {
    fn field(&self) -> &Field {
        &self.model.0.fields[self.index]
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn name(&self) -> &str {
        &self.field().name
    }

    /// Declared kind (`Null` for dynamic and computed fields)
    pub fn kind(&self) -> ValueKind {
        self.field().kind
    }

    pub fn shape(&self) -> ValueShape {
        self.kind().shape()
    }

    /// Storage location; computed fields have none
    pub fn location(&self) -> Option<Location> {
        match self.field().access {
            Access::Computed(_) => None,
            _ => Some(Location { model: self.model.id(), field: self.index }),
        }
    }

    pub fn is_addressable(&self) -> bool {
        self.location().is_some()
    }

    pub fn is_settable(&self) -> bool {
        matches!(self.field().access, Access::ReadWrite)
    }

    pub fn get(&self) -> Value {
        let field = self.field();
        match &field.access {
            Access::Computed(compute) => compute(&self.model),
            _ => field.value.borrow().clone(),
        }
    }

    /// Store a value, coercing host text into the declared kind
    pub fn set(&self, value: Value) -> Result<(), ExpressionErrorKind> {
        let field = self.field();
        if !self.is_settable() {
            return Err(ExpressionErrorKind::ReadOnlyField(field.name.clone()));
        }
        let value = value
            .coerce(field.kind)
            .map_err(|found| ExpressionErrorKind::TypeMismatch { expected: field.kind, found })?;
        *field.value.borrow_mut() = value;
        Ok(())
    }
}

impl fmt::Debug for FieldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.model.name(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Model {
        Model::builder("Person")
            .field("Name", "Ada")
            .field("Age", 36)
            .readonly("Id", "p1")
            .computed("Greeting", |m| {
                Value::from(format!("Hi {}", m.get("Name").unwrap_or_default().to_display_string()))
            })
            .build()
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let m = person();
        assert_eq!(m.get("name"), Some(Value::from("Ada")));
        assert_eq!(m.location("NAME"), m.location("Name"));
        assert!(m.handle("missing").is_none());
    }

    #[test]
    fn test_assignment_rules() {
        let m = person();
        m.set("Age", "41").unwrap();
        assert_eq!(m.get("Age"), Some(Value::Number(41.0)));

        assert_eq!(
            m.set("Age", true),
            Err(ExpressionErrorKind::TypeMismatch { expected: ValueKind::Number, found: ValueKind::Bool })
        );
        assert_eq!(m.set("Id", "p2"), Err(ExpressionErrorKind::ReadOnlyField("Id".into())));
    }

    #[test]
    fn test_computed_is_not_addressable() {
        let m = person();
        let greeting = m.handle("Greeting").unwrap();
        assert!(!greeting.is_addressable());
        assert_eq!(greeting.get(), Value::from("Hi Ada"));

        m.set("Name", "Grace").unwrap();
        assert_eq!(greeting.get(), Value::from("Hi Grace"));
    }

    #[test]
    fn test_locations_are_per_instance() {
        let a = person();
        let b = person();
        assert_ne!(a.location("Name"), b.location("Name"));
        assert_ne!(a.location("Name"), a.location("Age"));
    }
}
