//! Helper functions
//!
//! Global, name-keyed pure functions callable from binding expressions.
//! Operator sugar is routed here too: `!x` calls `not`, `a == b` calls
//! `isEqual`, `a + b` calls `concat`.

use std::collections::HashMap;

use anyhow::bail;

use crate::error::ConfigurationError;
use crate::scope::{Symbol, SymbolTable};
use crate::value::{Arity, Func, Value};

/// Registry of helper functions
#[derive(Debug, Default, Clone)]
pub struct HelperTable {
    helpers: HashMap<String, Func>,
}

impl HelperTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding the stock helpers
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for (name, func) in default_helpers() {
            table.helpers.insert(name.to_string(), func);
        }
        table
    }

    /// Register a helper. Names are unique.
    pub fn register(&mut self, name: &str, func: Func) -> Result<(), ConfigurationError> {
        if self.helpers.contains_key(name) {
            return Err(ConfigurationError::DuplicateHelper(name.to_string()));
        }
        self.helpers.insert(name.to_string(), func);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Func> {
        self.helpers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}

impl SymbolTable for HelperTable {
    fn lookup(&self, name: &str) -> Option<Symbol> {
        self.helpers.get(name).cloned().map(Symbol::Helper)
    }
}

fn string_arg<'a>(helper: &str, value: &'a Value) -> anyhow::Result<&'a str> {
    match value {
        Value::Str(s) => Ok(s),
        other => bail!("{} expects a string, got {:?}", helper, other.kind()),
    }
}

fn default_helpers() -> Vec<(&'static str, Func)> {
    vec![
        ("toUpper", Func::new(Arity::Exact(1), |args| {
            Ok(Value::Str(string_arg("toUpper", &args[0])?.to_uppercase()))
        })),
        ("toLower", Func::new(Arity::Exact(1), |args| {
            Ok(Value::Str(string_arg("toLower", &args[0])?.to_lowercase()))
        })),
        ("concat", Func::new(Arity::AtLeast(2), |args| {
            Ok(Value::Str(args.iter().map(Value::to_display_string).collect()))
        })),
        ("isEqual", Func::new(Arity::Exact(2), |args| {
            Ok(Value::Bool(args[0] == args[1]))
        })),
        ("not", Func::new(Arity::Exact(1), |args| match &args[0] {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => bail!("not expects a boolean, got {:?}", other.kind()),
        })),
        ("isEmpty", Func::new(Arity::Exact(1), |args| match args[0].len() {
            Some(n) => Ok(Value::Bool(n == 0)),
            None => bail!("isEmpty expects a collection, got {:?}", args[0].kind()),
        })),
        ("len", Func::new(Arity::Exact(1), |args| match args[0].len() {
            Some(n) => Ok(Value::from(n)),
            None => bail!("len expects a collection, got {:?}", args[0].kind()),
        })),
        ("isEmptyStr", Func::new(Arity::Exact(1), |args| {
            Ok(Value::Bool(string_arg("isEmptyStr", &args[0])?.is_empty()))
        })),
        ("toStr", Func::new(Arity::Exact(1), |args| {
            Ok(Value::Str(args[0].to_display_string()))
        })),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> anyhow::Result<Value> {
        HelperTable::with_defaults().get(name).unwrap().call(args)
    }

    #[test]
    fn test_duplicate_registration() {
        let mut table = HelperTable::with_defaults();
        let err = table.register("toUpper", Func::action(|| {})).unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateHelper("toUpper".into()));

        table.register("shout", Func::action(|| {})).unwrap();
        assert!(table.contains("shout"));
    }

    #[test]
    fn test_stock_helpers() {
        assert_eq!(call("toUpper", &["ab".into()]).unwrap(), Value::from("AB"));
        assert_eq!(call("concat", &["a".into(), 1.into()]).unwrap(), Value::from("a1"));
        assert_eq!(call("isEqual", &[1.into(), 1.into()]).unwrap(), Value::Bool(true));
        assert_eq!(call("len", &[vec![1, 2, 3].into()]).unwrap(), Value::from(3));
        assert_eq!(call("isEmpty", &[Value::List(vec![])]).unwrap(), Value::Bool(true));
        assert_eq!(call("toStr", &[2.5.into()]).unwrap(), Value::from("2.5"));
    }

    #[test]
    fn test_helper_type_errors() {
        assert!(call("not", &["yes".into()]).is_err());
        assert!(call("len", &[true.into()]).is_err());
        assert!(call("toLower", &[3.into()]).is_err());
    }
}
