//! Tether Bind - reactive data-binding engine
//!
//! Binds markup annotated with binding expressions against application
//! models and keeps the tree in sync as the models change.
//!
//! ```text
//! Tree binder ──> evaluator ──> binder ──> TreeHost
//!      │              ▲            │
//!      └── scopes ────┘            └──> watch table <── notify(location)
//! ```

mod config;
mod error;
mod value;
mod model;
mod scope;
mod helpers;
pub mod expr;
mod watch;
mod binder;
pub mod binders;
mod binding;
mod components;
mod router;
mod controller;

pub use config::BindConfig;
pub use error::{
    BindError, BindResult, BindingExpressionError, CollectingSink, ConfigurationError, ErrorSink,
    ExpressionErrorKind, LogSink, StructuralError,
};
pub use value::{Arity, Func, Value, ValueKind, ValueShape};
pub use model::{FieldHandle, Location, Model, ModelBuilder};
pub use scope::{LocalTable, ModelTable, Scope, Symbol, SymbolTable};
pub use helpers::HelperTable;
pub use watch::{OnChange, Recompute, Recomputed, WatchError, WatchGroup, WatchTable};
pub use binder::{BindContext, Binder, BinderFactory, Flow, PushBack};
pub use binding::{Binding, BindingBuilder, SharedHost};
pub use components::{Component, ComponentContext, ComponentSpec, SwitchMenu};
pub use router::{PageRouter, RouteError, RouteInfo, RouteTable, with_query};
pub use controller::{PageController, PageRequest, load_models, page_controller};
