//! Binder protocol
//!
//! Every directive runs the same per-occurrence state machine:
//!
//! ```text
//! bind ──> [watch] ──> update ──> update ... (one per change notification)
//! ```
//!
//! `bind` runs once and may restructure the tree around the node. `watch`
//! only runs for two-way binders whose expression read exactly one
//! settable location; it receives a [`PushBack`] for host-originated edits.
//! `update` runs right after bind with the initial value and again on every
//! change, unless the binding is one-shot.

use std::cell::RefMut;
use std::rc::{Rc, Weak};

use tether_dom::{NodeId, TreeHost};

use crate::binding::{Engine, SharedHost};
use crate::config::BindConfig;
use crate::error::{BindError, BindResult, BindingExpressionError, ConfigurationError, ErrorSink, ExpressionErrorKind};
use crate::model::FieldHandle;
use crate::scope::{LocalTable, Scope};
use crate::value::{Value, ValueKind};
use crate::watch::{WatchGroup, WatchTable};

/// Directive implementation, one instance per occurrence
pub trait Binder {
    /// Number of positional arguments, `#name(a, b)`
    fn arg_count(&self) -> usize {
        0
    }

    /// Whether host edits flow back into the model
    fn two_way(&self) -> bool {
        false
    }

    fn bind(&mut self, _ctx: &mut BindContext) -> BindResult<()> {
        Ok(())
    }

    fn watch(&mut self, _ctx: &mut BindContext, _push: PushBack) -> BindResult<()> {
        Ok(())
    }

    fn update(&mut self, ctx: &mut BindContext) -> BindResult<()>;
}

/// Registered once per directive name; creates fresh binder instances
pub trait BinderFactory {
    fn create(&self) -> Box<dyn Binder>;
}

impl<F> BinderFactory for F
where
    F: Fn() -> Box<dyn Binder>,
{
    fn create(&self) -> Box<dyn Binder> {
        self()
    }
}

/// What the tree binder does with the element after a binder's `bind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Continue,
    /// Process the remaining bindings but leave the children alone
    SkipChildren,
    /// The binder took the element over; skip everything else
    Stop,
}

/// Per-occurrence state handed to every binder call
pub struct BindContext {
    /// Annotated node
    pub node: NodeId,
    /// Current value
    pub value: Value,
    /// Value before the change that triggered this update (`Null` at first)
    pub old_value: Value,
    /// Positional directive arguments
    pub args: Vec<String>,
    /// Names after `->`
    pub outputs: Vec<String>,
    pub(crate) binder: String,
    pub(crate) expression: String,
    pub(crate) scope: Scope,
    pub(crate) group: WatchGroup,
    pub(crate) once: bool,
    pub(crate) chain: Rc<[String]>,
    pub(crate) flow: Flow,
    pub(crate) host: SharedHost,
    pub(crate) config: Rc<BindConfig>,
    pub(crate) watches: Rc<WatchTable>,
    pub(crate) sink: Rc<dyn ErrorSink>,
    pub(crate) engine: Weak<Engine>,
}

impl BindContext {
    /// Mutable access to the host. Do not hold across calls back into the engine.
    pub fn host(&self) -> RefMut<'_, dyn TreeHost> {
        self.host.borrow_mut()
    }

    /// Handle for listeners, which must not keep the host alive
    pub fn weak_host(&self) -> Weak<std::cell::RefCell<dyn TreeHost>> {
        Rc::downgrade(&self.host)
    }

    pub fn binder(&self) -> &str {
        &self.binder
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn config(&self) -> &BindConfig {
        &self.config
    }

    pub fn sink(&self) -> Rc<dyn ErrorSink> {
        self.sink.clone()
    }

    pub fn is_one_shot(&self) -> bool {
        self.once
    }

    /// The binder took the node over
    pub fn stop_descent(&mut self) {
        self.flow = Flow::Stop;
    }

    /// Leave the node's children unbound
    pub fn skip_children(&mut self) {
        if self.flow == Flow::Continue {
            self.flow = Flow::SkipChildren;
        }
    }

    /// New watch group below this binding's group
    pub fn child_group(&self) -> WatchGroup {
        self.watches.group(self.group)
    }

    pub fn release_group(&self, group: WatchGroup) -> usize {
        let released = self.watches.release(group);
        if let Some(engine) = self.engine.upgrade() {
            engine.forget_released();
        }
        released
    }

    /// Error for a value of the wrong kind
    pub fn type_error(&self, expected: ValueKind) -> BindError {
        BindingExpressionError::whole(
            &self.expression,
            ExpressionErrorKind::TypeMismatch { expected, found: self.value.kind() },
        )
        .into()
    }

    /// Error for an element this binder cannot drive
    pub fn unsupported(&self, requirement: &'static str) -> BindError {
        let tag = self.host.borrow().tag_name(self.node).unwrap_or_default();
        ConfigurationError::UnsupportedElement { binder: self.binder.clone(), tag, requirement }.into()
    }

    /// Bind `node` in a child scope exposing `key`/`value` under the output
    /// names: none binds the value to the default name, one name binds the
    /// value, two bind the key and the value.
    pub fn bind_item(&self, node: NodeId, group: WatchGroup, key: Value, value: Value) -> BindResult<()> {
        let locals = match self.outputs.as_slice() {
            [] => LocalTable::new().with(&self.config.default_output, value),
            [name] => LocalTable::new().with(name, value),
            [key_name, value_name] => LocalTable::new().with(key_name, key).with(value_name, value),
            _ => return Err(self.too_many_outputs().into()),
        };
        let scope = self.scope.child(Rc::new(locals));
        let engine = self.engine.upgrade().ok_or(BindError::Detached)?;
        engine.bind_node(node, &scope, group, self.once, &self.chain)
    }

    /// Validate the `->` list for binders that use `bind_item`
    pub fn check_outputs(&self) -> Result<(), ConfigurationError> {
        if self.outputs.len() > 2 {
            return Err(self.too_many_outputs());
        }
        Ok(())
    }

    fn too_many_outputs(&self) -> ConfigurationError {
        ConfigurationError::MalformedDirective {
            directive: self.expression.clone(),
            reason: format!("at most 2 output names are allowed, got {}", self.outputs.len()),
        }
    }
}

impl std::fmt::Debug for BindContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindContext")
            .field("binder", &self.binder)
            .field("node", &self.node)
            .field("value", &self.value)
            .field("args", &self.args)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

/// Writes host-originated edits back into the bound location
#[derive(Clone)]
pub struct PushBack {
    pub(crate) handle: FieldHandle,
    pub(crate) expression: String,
    pub(crate) watches: Weak<WatchTable>,
    pub(crate) sink: Rc<dyn ErrorSink>,
}

impl PushBack {
    /// Assign the field and notify its watchers
    pub fn push(&self, value: Value) -> BindResult<usize> {
        self.handle
            .set(value)
            .map_err(|kind| BindingExpressionError::whole(&self.expression, kind))?;
        let watches = self.watches.upgrade().ok_or(BindError::Detached)?;
        Ok(self.handle.location().map_or(0, |loc| watches.notify(loc)))
    }

    /// `push`, routing failures to the error sink
    pub fn push_or_report(&self, value: Value) {
        if let Err(e) = self.push(value) {
            self.sink.report(e);
        }
    }

    pub fn handle(&self) -> &FieldHandle {
        &self.handle
    }
}

impl std::fmt::Debug for PushBack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushBack").field("handle", &self.handle).finish_non_exhaustive()
    }
}
