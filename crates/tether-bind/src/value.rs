//! Binding values
//!
//! Everything an expression can evaluate to. Equality is deep for data and
//! by identity for records and functions, which is what change detection
//! compares with.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::model::Model;
use crate::router::RouteInfo;

/// Value produced by evaluating a binding expression
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Value>),
    /// Ordered keys keep `each` over a mapping deterministic
    Map(BTreeMap<String, Value>),
    Record(Model),
    Func(Func),
    Route(RouteInfo),
}

/// Exact variant tag, used for assignment compatibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    Str,
    List,
    Map,
    Record,
    Func,
    Route,
}

/// Coarse shape of a value, as seen by field-access chains and `each`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueShape {
    Scalar,
    Sequence,
    Mapping,
    Record,
    Opaque,
}

impl ValueKind {
    pub fn shape(self) -> ValueShape {
        match self {
            ValueKind::Null | ValueKind::Bool | ValueKind::Number | ValueKind::Str => ValueShape::Scalar,
            ValueKind::List => ValueShape::Sequence,
            ValueKind::Map => ValueShape::Mapping,
            ValueKind::Record => ValueShape::Record,
            ValueKind::Func | ValueKind::Route => ValueShape::Opaque,
        }
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Str(_) => ValueKind::Str,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Record(_) => ValueKind::Record,
            Value::Func(_) => ValueKind::Func,
            Value::Route(_) => ValueKind::Route,
        }
    }

    pub fn shape(&self) -> ValueShape {
        self.kind().shape()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&Func> {
        match self {
            Value::Func(f) => Some(f),
            _ => None,
        }
    }

    /// Length of a string, list or map
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(l) => Some(l.len()),
            Value::Map(m) => Some(m.len()),
            _ => None,
        }
    }

    /// Text used when a value is written into the tree
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::to_display_string).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.to_display_string()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Record(model) => format!("<{}>", model.name()),
            Value::Func(_) => "<func>".to_string(),
            Value::Route(route) => route.full_url.clone(),
        }
    }

    /// Convert for storage into a field of `kind`.
    ///
    /// `Null` fields are dynamic and take anything. Text coming from the
    /// host (input values, static attributes) is parsed into numbers and
    /// booleans.
    pub fn coerce(self, kind: ValueKind) -> Result<Value, ValueKind> {
        if kind == ValueKind::Null || self.kind() == kind {
            return Ok(self);
        }
        match (&self, kind) {
            (Value::Str(s), ValueKind::Number) => s.trim().parse::<f64>().map(Value::Number).map_err(|_| ValueKind::Str),
            (Value::Str(s), ValueKind::Bool) => match s.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(ValueKind::Str),
            },
            _ => Err(self.kind()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => a.ptr_eq(b),
            (Value::Route(a), Value::Route(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(l) => f.debug_list().entries(l).finish(),
            Value::Map(m) => f.debug_map().entries(m).finish(),
            Value::Record(m) => write!(f, "Record({})", m.name()),
            Value::Func(func) => write!(f, "Func({})", func.arity()),
            Value::Route(r) => write!(f, "Route({})", r.path),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<Model> for Value {
    fn from(model: Model) -> Self {
        Value::Record(model)
    }
}

impl From<Func> for Value {
    fn from(func: Func) -> Self {
        Value::Func(func)
    }
}

impl From<RouteInfo> for Value {
    fn from(route: RouteInfo) -> Self {
        Value::Route(route)
    }
}

/// Accepted argument count of a callable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

type FuncBody = dyn Fn(&[Value]) -> anyhow::Result<Value>;

/// Callable value: helpers, event handlers, model methods
#[derive(Clone)]
pub struct Func {
    arity: Arity,
    body: Rc<FuncBody>,
}

impl Func {
    pub fn new(arity: Arity, body: impl Fn(&[Value]) -> anyhow::Result<Value> + 'static) -> Self {
        Self { arity, body: Rc::new(body) }
    }

    /// Zero-argument callable, the shape event bindings expect
    pub fn action(body: impl Fn() + 'static) -> Self {
        Self::new(Arity::Exact(0), move |_| {
            body();
            Ok(Value::Null)
        })
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Invoke with already evaluated arguments. Arity is checked by the caller.
    pub fn call(&self, args: &[Value]) -> anyhow::Result<Value> {
        (self.body)(args)
    }

    pub fn ptr_eq(&self, other: &Func) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Func").field("arity", &self.arity).finish_non_exhaustive()
    }
}
