//! Recursive tree binder
//!
//! Walks a subtree depth first. Text nodes go through mustache
//! interpolation; elements have their `@attr` and `#binder(args)`
//! annotations dispatched in source order (`#each` first, since it turns the
//! element into a prototype); registered custom tags are handed to component
//! instantiation; ghost wrappers push their binder annotations down to their
//! children and are spliced out.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use once_cell::sync::Lazy;
use regex::Regex;
use tether_dom::{NodeId, TreeHost};

use crate::binder::{BindContext, Binder, BinderFactory, Flow, PushBack};
use crate::components::ComponentSpec;
use crate::config::BindConfig;
use crate::error::{
    BindResult, BindingExpressionError, ConfigurationError, ErrorSink, ExpressionErrorKind, LogSink,
};
use crate::expr::{ParsedBinding, evaluate, parse_binding};
use crate::helpers::HelperTable;
use crate::model::{Location, Model};
use crate::router::PageRouter;
use crate::scope::{Scope, SymbolTable};
use crate::value::{Arity, Func, Value};
use crate::watch::{Recomputed, WatchGroup, WatchTable};

/// Host document shared by the engine, binders and listeners
pub type SharedHost = Rc<RefCell<dyn TreeHost>>;

static MUSTACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("valid mustache pattern"));

/// `name` or `name(arg, arg)`
static DIRECTIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+)(?:\((.*)\))?$").expect("valid directive pattern"));

static DIRECTIVE_ARG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w-]+$").expect("valid argument pattern"));

/// One binding annotation read off an element
#[derive(Debug, Clone)]
pub(crate) enum Annotation {
    /// `@name="expr"`
    Attr { name: String, expression: String },
    /// `#binder(args)="expr"`
    Binder { name: String, args: Vec<String>, expression: String },
}

/// Shared state of a binding session
pub(crate) struct Engine {
    pub(crate) host: SharedHost,
    pub(crate) config: Rc<BindConfig>,
    binders: HashMap<String, Rc<dyn BinderFactory>>,
    pub(crate) components: HashMap<String, ComponentSpec>,
    helpers: Rc<HelperTable>,
    pub(crate) watches: Rc<WatchTable>,
    pub(crate) sink: Rc<dyn ErrorSink>,
    /// Bound roots and the watch group owning each
    roots: RefCell<HashMap<NodeId, WatchGroup>>,
    /// Nodes already bound by an enclosing pass (component contents), with
    /// the watch group that owns them
    pub(crate) bound: RefCell<HashMap<NodeId, WatchGroup>>,
    me: Weak<Engine>,
}

/// Binding session: registries, watch table and bound roots
#[derive(Clone)]
pub struct Binding {
    inner: Rc<Engine>,
}

/// Registers helpers, binders and components before a session starts
pub struct BindingBuilder {
    host: SharedHost,
    config: BindConfig,
    sink: Rc<dyn ErrorSink>,
    binders: HashMap<String, Rc<dyn BinderFactory>>,
    components: HashMap<String, ComponentSpec>,
    helpers: HelperTable,
}

impl BindingBuilder {
    fn new(host: SharedHost) -> Self {
        let binders = crate::binders::defaults()
            .into_iter()
            .map(|(name, factory)| (name.to_string(), factory))
            .collect();
        let switchmenu = crate::components::SwitchMenu::spec();

        Self {
            host,
            config: BindConfig::default(),
            sink: Rc::new(LogSink),
            binders,
            components: HashMap::from([(switchmenu.name().to_string(), switchmenu)]),
            helpers: HelperTable::with_defaults(),
        }
    }

    pub fn config(mut self, config: BindConfig) -> Self {
        self.config = config;
        self
    }

    /// Channel for errors raised by live updates
    pub fn error_sink(mut self, sink: Rc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn register_helper(mut self, name: &str, func: Func) -> Result<Self, ConfigurationError> {
        self.helpers.register(name, func)?;
        Ok(self)
    }

    pub fn register_binder(
        mut self,
        name: &str,
        factory: impl BinderFactory + 'static,
    ) -> Result<Self, ConfigurationError> {
        if self.binders.contains_key(name) {
            return Err(ConfigurationError::DuplicateBinder(name.to_string()));
        }
        self.binders.insert(name.to_string(), Rc::new(factory));
        Ok(self)
    }

    pub fn register_component(mut self, spec: ComponentSpec) -> Result<Self, ConfigurationError> {
        if self.components.contains_key(spec.name()) {
            return Err(ConfigurationError::DuplicateComponent(spec.name().to_string()));
        }
        self.components.insert(spec.name().to_string(), spec);
        Ok(self)
    }

    /// Attach a router; registers the `url(page, params...)` helper
    pub fn router(self, router: Rc<dyn PageRouter>) -> Result<Self, ConfigurationError> {
        let url = Func::new(Arity::AtLeast(1), move |args| {
            let page = args[0].to_display_string();
            Ok(Value::Route(router.route(&page, &args[1..])?))
        });
        self.register_helper("url", url)
    }

    pub fn build(self) -> Binding {
        let inner = Rc::new_cyclic(|me| Engine {
            host: self.host,
            config: Rc::new(self.config),
            binders: self.binders,
            components: self.components,
            helpers: Rc::new(self.helpers),
            watches: Rc::new(WatchTable::new(self.sink.clone())),
            sink: self.sink,
            roots: RefCell::new(HashMap::new()),
            bound: RefCell::new(HashMap::new()),
            me: me.clone(),
        });
        Binding { inner }
    }
}

impl Binding {
    /// Session with the stock helpers, binders and components
    pub fn new(host: SharedHost) -> Self {
        Self::builder(host).build()
    }

    pub fn builder(host: SharedHost) -> BindingBuilder {
        BindingBuilder::new(host)
    }

    /// Bind the children of `root` against `models`.
    ///
    /// Rebinding a bound root is a no-op. Errors during this initial pass
    /// fail the call and drop every registration it made.
    pub fn bind_models(&self, root: NodeId, models: &[Model], once: bool) -> BindResult<()> {
        let engine = &self.inner;
        let children = engine.host.borrow().children(root);
        if children.is_empty() {
            let info = engine.host.borrow().debug_info(root);
            return Err(ConfigurationError::InvalidRoot(info).into());
        }
        if engine.roots.borrow().contains_key(&root) {
            tracing::debug!("Root {} already bound", root);
            return Ok(());
        }

        let scope = Scope::from_models(models).merge(&engine.base_scope());
        let group = engine.watches.group(WatchGroup::ROOT);
        let chain: Rc<[String]> = Rc::from(Vec::new());

        for child in children {
            if let Err(e) = engine.bind_node(child, &scope, group, once, &chain) {
                engine.watches.release(group);
                engine.forget_released();
                return Err(e);
            }
        }

        engine.roots.borrow_mut().insert(root, group);
        tracing::info!(
            "Bound {} against {} model(s), {} live watch(es)",
            root,
            models.len(),
            engine.watches.len()
        );
        Ok(())
    }

    /// Bind against a single model
    pub fn bind(&self, root: NodeId, model: &Model, once: bool) -> BindResult<()> {
        self.bind_models(root, std::slice::from_ref(model), once)
    }

    /// Drop every watch rooted in `root` and clear its bound marker
    pub fn unbind(&self, root: NodeId) -> bool {
        let engine = &self.inner;
        let Some(group) = engine.roots.borrow_mut().remove(&root) else {
            return false;
        };
        let released = engine.watches.release(group);
        engine.forget_released();
        tracing::debug!("Unbound {}, {} watch(es) released", root, released);
        true
    }

    pub fn is_bound(&self, root: NodeId) -> bool {
        self.inner.roots.borrow().contains_key(&root)
    }

    /// Mark the current registrations as permanent for `reset`
    pub fn checkpoint(&self) {
        self.inner.watches.checkpoint();
    }

    /// Drop everything bound since the last checkpoint
    pub fn reset(&self) {
        let engine = &self.inner;
        engine.watches.reset();
        engine.roots.borrow_mut().retain(|_, group| engine.watches.contains_group(*group));
        engine.forget_released();
    }

    /// Deliver a direct write to `location`
    pub fn notify(&self, location: Location) -> usize {
        self.inner.watches.notify(location)
    }

    /// Assign a model field and notify its watchers
    pub fn set(&self, model: &Model, field: &str, value: impl Into<Value>) -> BindResult<usize> {
        let value = value.into();
        let handle = model.handle(field).ok_or_else(|| {
            BindingExpressionError::whole(field, ExpressionErrorKind::UnresolvedName(field.to_string()))
        })?;
        handle.set(value).map_err(|kind| BindingExpressionError::whole(field, kind))?;
        Ok(handle.location().map_or(0, |loc| self.notify(loc)))
    }

    pub fn host(&self) -> &SharedHost {
        &self.inner.host
    }

    pub fn config(&self) -> &BindConfig {
        &self.inner.config
    }

    pub fn watches(&self) -> &WatchTable {
        &self.inner.watches
    }

    pub fn helpers(&self) -> &HelperTable {
        &self.inner.helpers
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Binder state holds the watch table; break the cycle
        let released = self.watches.clear();
        tracing::debug!("Binding session dropped, {} watch(es) released", released);
    }
}

impl std::fmt::Debug for BindingBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingBuilder")
            .field("binders", &self.binders.len())
            .field("components", &self.components.len())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("roots", &self.inner.roots.borrow().len())
            .field("watches", &*self.inner.watches)
            .finish_non_exhaustive()
    }
}

/// Bind string parse failures surface as expression errors
pub(crate) fn parse(expression: &str) -> BindResult<ParsedBinding> {
    Ok(parse_binding(expression)?)
}

impl Engine {
    /// Scope with only the helper table
    pub(crate) fn base_scope(&self) -> Scope {
        Scope::new(vec![self.helpers.clone() as Rc<dyn SymbolTable>])
    }

    /// Drop bound markers whose owning group was released
    pub(crate) fn forget_released(&self) {
        self.bound.borrow_mut().retain(|_, group| self.watches.contains_group(*group));
    }

    pub(crate) fn bind_node(
        &self,
        node: NodeId,
        scope: &Scope,
        group: WatchGroup,
        once: bool,
        chain: &Rc<[String]>,
    ) -> BindResult<()> {
        if self.bound.borrow().contains_key(&node) {
            return Ok(());
        }

        let (is_text, tag) = {
            let host = self.host.borrow();
            (host.is_text(node), host.tag_name(node))
        };
        if is_text {
            return self.bind_text(node, scope, group, once);
        }
        let Some(tag) = tag else {
            return Ok(());
        };

        let result = if tag == self.config.ghost_tag {
            self.bind_ghost(node, scope, group, once, chain)
        } else {
            self.bind_element(node, &tag, scope, group, once, chain)
        };
        result.map_err(|e| e.at(self.host.borrow().debug_info(node)))
    }

    pub(crate) fn bind_children(
        &self,
        node: NodeId,
        scope: &Scope,
        group: WatchGroup,
        once: bool,
        chain: &Rc<[String]>,
    ) -> BindResult<()> {
        let children = self.host.borrow().children(node);
        for child in children {
            self.bind_node(child, scope, group, once, chain)?;
        }
        Ok(())
    }

    /// Binding annotations of an element in source order
    fn annotations(&self, node: NodeId) -> BindResult<Vec<(String, Annotation)>> {
        let attrs = self.host.borrow().attrs(node);
        let mut out = Vec::new();
        for (name, expression) in attrs {
            if let Some(target) = name.strip_prefix(self.config.attr_prefix) {
                let annotation = Annotation::Attr { name: target.to_string(), expression };
                out.push((name, annotation));
            } else if let Some(directive) = name.strip_prefix(self.config.binder_prefix) {
                let annotation = parse_directive(directive, expression)?;
                out.push((name, annotation));
            }
        }
        Ok(out)
    }

    fn bind_element(
        &self,
        node: NodeId,
        tag: &str,
        scope: &Scope,
        group: WatchGroup,
        once: bool,
        chain: &Rc<[String]>,
    ) -> BindResult<()> {
        let mut annotations = self.annotations(node)?;

        // `each` clones the element with its other annotations intact
        if let Some(i) = annotations
            .iter()
            .position(|(_, a)| matches!(a, Annotation::Binder { name, .. } if name == "each"))
        {
            let (attr, annotation) = annotations.remove(i);
            self.host.borrow_mut().remove_attr(node, &attr)?;
            if self.run_binder(node, &annotation, scope, group, once, chain)? == Flow::Stop {
                return Ok(());
            }
        }

        let component = self.components.get(tag);
        let mut field_binds = Vec::new();
        let mut flow = Flow::Continue;

        for (_, annotation) in &annotations {
            match annotation {
                Annotation::Attr { .. } if component.is_some() => field_binds.push(annotation.clone()),
                Annotation::Attr { name, expression } => {
                    self.bind_attr(node, name, expression, scope, group, once)?;
                }
                Annotation::Binder { .. } => match self.run_binder(node, annotation, scope, group, once, chain)? {
                    Flow::Stop => {
                        flow = Flow::Stop;
                        break;
                    }
                    Flow::SkipChildren => flow = Flow::SkipChildren,
                    Flow::Continue => {}
                },
            }
        }

        // Annotations leave the tree only once all of them went through
        self.strip_annotations(node, &annotations)?;
        if flow == Flow::Stop {
            return Ok(());
        }

        if let Some(spec) = component {
            return self.instantiate(node, spec, &field_binds, scope, group, once, chain);
        }
        if flow == Flow::Continue {
            self.bind_children(node, scope, group, once, chain)?;
        }
        Ok(())
    }

    fn strip_annotations(&self, node: NodeId, annotations: &[(String, Annotation)]) -> BindResult<()> {
        let mut host = self.host.borrow_mut();
        for (attr, _) in annotations {
            host.remove_attr(node, attr)?;
        }
        if self.config.debug_bind_info && !annotations.is_empty() {
            let info: Vec<String> = annotations
                .iter()
                .map(|(_, a)| match a {
                    Annotation::Attr { name, expression } | Annotation::Binder { name, expression, .. } => {
                        format!("{name}={expression}")
                    }
                })
                .collect();
            host.set_attr(node, &self.config.bind_info_attr, &info.join("; "))?;
        }
        Ok(())
    }

    /// Push the ghost's annotations down, splice its children in, bind them
    fn bind_ghost(
        &self,
        node: NodeId,
        scope: &Scope,
        group: WatchGroup,
        once: bool,
        chain: &Rc<[String]>,
    ) -> BindResult<()> {
        let children = {
            let mut host = self.host.borrow_mut();
            let attrs: Vec<(String, String)> = host
                .attrs(node)
                .into_iter()
                .filter(|(name, _)| name.starts_with(self.config.binder_prefix))
                .collect();
            let children = host.children(node);

            for &child in &children {
                if host.is_element(child) {
                    for (name, value) in &attrs {
                        host.set_attr(child, name, value)?;
                    }
                }
            }
            if host.parent(node).is_some() {
                for &child in &children {
                    host.insert_before(node, child)?;
                }
                host.remove(node)?;
            }
            children
        };

        tracing::debug!("Ghost {} spliced into {} node(s)", node, children.len());
        for child in children {
            self.bind_node(child, scope, group, once, chain)?;
        }
        Ok(())
    }

    /// `{{ expr }}` interpolation inside a text node
    fn bind_text(&self, node: NodeId, scope: &Scope, group: WatchGroup, once: bool) -> BindResult<()> {
        let text = self.host.borrow().text(node);
        if !MUSTACHE.is_match(&text) {
            return Ok(());
        }

        let mut parts = Vec::new();
        let mut last = 0;
        for caps in MUSTACHE.captures_iter(&text) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            parts.push(TextPart::Literal(text[last..whole.start()].to_string()));
            parts.push(TextPart::Binding(parse(inner.as_str().trim())?));
            last = whole.end();
        }
        parts.push(TextPart::Literal(text[last..].to_string()));

        let parts = Rc::new(parts);
        let live = !once && parts.iter().any(|p| matches!(p, TextPart::Binding(b) if !b.one_shot));
        let (rendered, deps) = render_text(&parts, scope, live)?;
        self.host.borrow_mut().set_text(node, &rendered)?;

        // Literals and helper calls without field reads render once
        if !live || deps.is_empty() {
            return Ok(());
        }

        let recompute_scope = scope.clone();
        let host = self.host.clone();
        self.watches.watch(
            group,
            &deps,
            Value::Str(rendered),
            Box::new(move || {
                let (text, deps) = render_text(&parts, &recompute_scope, false)?;
                Ok(Recomputed { value: Value::Str(text), deps: Some(deps) })
            }),
            Box::new(move |new, _| {
                host.borrow_mut().set_text(node, &new.to_display_string())?;
                Ok(())
            }),
        )?;
        Ok(())
    }

    /// `@name="expr"` on a plain element
    pub(crate) fn bind_attr(
        &self,
        node: NodeId,
        name: &str,
        expression: &str,
        scope: &Scope,
        group: WatchGroup,
        once: bool,
    ) -> BindResult<()> {
        let parsed = Rc::new(parse(expression)?);
        let eval = evaluate(&parsed, scope)?;
        let live = !once && !parsed.one_shot;
        if live {
            eval.check_watchable(expression)?;
        }
        apply_attr(&mut *self.host.borrow_mut(), node, name, &eval.value)?;

        if !live || eval.deps.is_empty() {
            return Ok(());
        }

        let deps = eval.locations();
        let recompute_scope = scope.clone();
        let host = self.host.clone();
        let name = name.to_string();
        self.watches.watch(
            group,
            &deps,
            eval.value,
            Box::new(move || Ok(Recomputed::from(evaluate(&parsed, &recompute_scope)?))),
            Box::new(move |new, _| apply_attr(&mut *host.borrow_mut(), node, &name, new)),
        )?;
        Ok(())
    }

    /// Run one binder occurrence through bind, watch and update
    fn run_binder(
        &self,
        node: NodeId,
        annotation: &Annotation,
        scope: &Scope,
        group: WatchGroup,
        once: bool,
        chain: &Rc<[String]>,
    ) -> BindResult<Flow> {
        let Annotation::Binder { name, args, expression } = annotation else {
            return Ok(Flow::Continue);
        };
        let factory = self
            .binders
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownBinder(name.clone()))?;
        let mut binder = factory.create();
        if binder.arg_count() != args.len() {
            return Err(ConfigurationError::BinderArity {
                binder: name.clone(),
                expected: binder.arg_count(),
                found: args.len(),
            }
            .into());
        }

        let parsed = Rc::new(parse(expression)?);
        let eval = evaluate(&parsed, scope)?;
        let once = once || parsed.one_shot;

        // Two-way checks happen before the binder touches the tree
        let mut push = None;
        if binder.two_way() && !once {
            let handle = match &eval.target {
                Some(handle) if handle.is_addressable() => handle,
                _ => {
                    return Err(BindingExpressionError::whole(expression, ExpressionErrorKind::NotAddressable).into());
                }
            };
            if !handle.is_settable() {
                let kind = ExpressionErrorKind::ReadOnlyField(handle.name().to_string());
                return Err(BindingExpressionError::whole(expression, kind).into());
            }
            push = Some(PushBack {
                handle: handle.clone(),
                expression: expression.clone(),
                watches: Rc::downgrade(&self.watches),
                sink: self.sink.clone(),
            });
        }

        if !once {
            eval.check_watchable(expression)?;
        }

        let deps = eval.locations();
        let mut ctx = BindContext {
            node,
            value: eval.value,
            old_value: Value::Null,
            args: args.clone(),
            outputs: parsed.outputs.clone(),
            binder: name.clone(),
            expression: expression.clone(),
            scope: scope.clone(),
            group,
            once,
            chain: chain.clone(),
            flow: Flow::Continue,
            host: self.host.clone(),
            config: self.config.clone(),
            watches: self.watches.clone(),
            sink: self.sink.clone(),
            engine: self.me.clone(),
        };

        binder.bind(&mut ctx)?;
        if let Some(push) = push {
            binder.watch(&mut ctx, push)?;
        }
        binder.update(&mut ctx)?;
        let flow = ctx.flow;
        tracing::debug!("Bound #{} on {} ({} dep(s))", name, node, deps.len());

        if once || deps.is_empty() {
            return Ok(flow);
        }

        let initial = ctx.value.clone();
        let recompute_scope = scope.clone();
        let info = self.host.borrow().debug_info(node);
        let state: Rc<RefCell<(Box<dyn Binder>, BindContext)>> = Rc::new(RefCell::new((binder, ctx)));
        self.watches.watch(
            group,
            &deps,
            initial,
            Box::new(move || Ok(Recomputed::from(evaluate(&parsed, &recompute_scope)?))),
            Box::new(move |new, old| {
                let mut state = state.borrow_mut();
                let (binder, ctx) = &mut *state;
                ctx.value = new.clone();
                ctx.old_value = old.clone();
                binder.update(ctx).map_err(|e| e.at(info.clone()))
            }),
        )?;
        Ok(flow)
    }
}

/// Parse `name` / `name(a, b)` and its bind string
fn parse_directive(directive: &str, expression: String) -> Result<Annotation, ConfigurationError> {
    let malformed = |reason: &str| ConfigurationError::MalformedDirective {
        directive: directive.to_string(),
        reason: reason.to_string(),
    };

    let caps = DIRECTIVE
        .captures(directive.trim())
        .ok_or_else(|| malformed("expected name or name(args)"))?;
    let name = caps.get(1).map_or("", |m| m.as_str()).to_string();

    let mut args = Vec::new();
    if let Some(list) = caps.get(2) {
        for arg in list.as_str().split(',').map(str::trim) {
            if !DIRECTIVE_ARG.is_match(arg) {
                return Err(malformed(&format!("invalid argument \"{arg}\"")));
            }
            args.push(arg.to_string());
        }
    }

    Ok(Annotation::Binder { name, args, expression })
}

enum TextPart {
    Literal(String),
    Binding(ParsedBinding),
}

/// Render the text and collect the locations of its live parts. With
/// `check`, a live part reading an unwatchable field is an error.
fn render_text(parts: &[TextPart], scope: &Scope, check: bool) -> BindResult<(String, Vec<Location>)> {
    let mut out = String::new();
    let mut deps = Vec::new();
    for part in parts {
        match part {
            TextPart::Literal(text) => out.push_str(text),
            TextPart::Binding(parsed) => {
                let eval = evaluate(parsed, scope)?;
                if !parsed.one_shot {
                    if check {
                        eval.check_watchable(&parsed.source)?;
                    }
                    deps.extend(eval.locations());
                }
                out.push_str(&eval.value.to_display_string());
            }
        }
    }
    deps.sort();
    deps.dedup();
    Ok((out, deps))
}

/// `true` sets an empty attribute; `false` and null remove it
pub(crate) fn apply_attr(host: &mut dyn TreeHost, node: NodeId, name: &str, value: &Value) -> BindResult<()> {
    match value {
        Value::Bool(false) | Value::Null => host.remove_attr(node, name)?,
        Value::Bool(true) => host.set_attr(node, name, "")?,
        other => host.set_attr(node, name, &other.to_display_string())?,
    }
    Ok(())
}
