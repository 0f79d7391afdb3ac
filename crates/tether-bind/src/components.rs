//! Custom components
//!
//! A component is a custom tag backed by its own model and an optional
//! template. Its template is bound in a fresh scope holding only the
//! component model and the helpers; data from the surrounding markup enters
//! through `@field` binds evaluated in the parent scope. The tag's original
//! children are its contents: they are bound with the parent scope and then
//! moved into the template's `<wcontents>` placeholder.

use std::cell::{RefCell, RefMut};
use std::rc::{Rc, Weak};

use anyhow::bail;
use tether_dom::{NodeId, TreeHost};

use crate::binding::{Annotation, Engine, SharedHost, parse};
use crate::error::{BindError, BindResult, BindingExpressionError, StructuralError};
use crate::expr::evaluate;
use crate::model::Model;
use crate::scope::Scope;
use crate::value::Value;
use crate::watch::{Recomputed, WatchGroup, WatchTable};

/// Component behavior
pub trait Component {
    fn model(&self) -> &Model;

    /// Runs once the element, its contents and its template are bound
    fn init(&mut self, ctx: &mut ComponentContext) -> anyhow::Result<()>;

    /// Runs after a bound field changed
    fn update(&mut self, ctx: &mut ComponentContext) -> anyhow::Result<()> {
        self.init(ctx)
    }
}

/// What a component hook sees of its element
pub struct ComponentContext {
    pub element: NodeId,
    /// Original children, bound in the parent scope
    pub contents: Vec<NodeId>,
    host: SharedHost,
}

impl ComponentContext {
    pub fn host(&self) -> RefMut<'_, dyn TreeHost> {
        self.host.borrow_mut()
    }
}

type ComponentFactory = Rc<dyn Fn() -> Box<dyn Component>>;

/// Registration entry for a custom tag
#[derive(Clone)]
pub struct ComponentSpec {
    name: String,
    template: Option<String>,
    factory: ComponentFactory,
}

impl ComponentSpec {
    /// Tag names are matched lowercase, as the HTML tokenizer emits them
    pub fn new(name: &str, factory: impl Fn() -> Box<dyn Component> + 'static) -> Self {
        Self { name: name.to_ascii_lowercase(), template: None, factory: Rc::new(factory) }
    }

    pub fn with_template(mut self, markup: &str) -> Self {
        self.template = Some(markup.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }
}

impl std::fmt::Debug for ComponentSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSpec")
            .field("name", &self.name)
            .field("template", &self.template.is_some())
            .finish_non_exhaustive()
    }
}

struct Instance {
    component: Box<dyn Component>,
    ctx: ComponentContext,
    initialized: bool,
}

impl Instance {
    fn run_update(&mut self, tag: &str) -> BindResult<()> {
        if !self.initialized {
            return Ok(());
        }
        self.component
            .update(&mut self.ctx)
            .map_err(|e| BindError::Component { tag: tag.to_string(), message: e.to_string() })
    }
}

/// First element below `node` with the given tag
fn find_element(host: &dyn TreeHost, node: NodeId, tag: &str) -> Option<NodeId> {
    for child in host.child_elements(node) {
        if host.tag_name(child).as_deref() == Some(tag) {
            return Some(child);
        }
        if let Some(found) = find_element(host, child, tag) {
            return Some(found);
        }
    }
    None
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn instantiate(
        &self,
        node: NodeId,
        spec: &ComponentSpec,
        field_binds: &[Annotation],
        scope: &Scope,
        group: WatchGroup,
        once: bool,
        chain: &Rc<[String]>,
    ) -> BindResult<()> {
        let tag = spec.name();
        if chain.iter().any(|t| t == tag) {
            return Err(StructuralError::RecursiveComponent(tag.to_string()).into());
        }
        tracing::debug!("Instantiating <{}> at {}", tag, node);

        let component = (spec.factory)();
        let model = component.model().clone();
        let group = self.watches.group(group);

        // Static attributes seed settable fields
        let attrs = self.host.borrow().attrs(node);
        for (name, text) in attrs {
            if let Some(handle) = model.handle(&name) {
                if handle.is_settable() {
                    handle
                        .set(Value::Str(text.clone()))
                        .map_err(|kind| BindingExpressionError::whole(&text, kind))?;
                }
            }
        }

        let instance = Rc::new(RefCell::new(Instance {
            component,
            ctx: ComponentContext { element: node, contents: Vec::new(), host: self.host.clone() },
            initialized: false,
        }));

        for annotation in field_binds {
            let Annotation::Attr { name, expression } = annotation else {
                continue;
            };
            match model.handle(name) {
                Some(handle) if handle.is_settable() => {
                    self.bind_field(handle, expression, &instance, tag, scope, group, once)?;
                }
                _ => self.bind_attr(node, name, expression, scope, group, once)?,
            }
        }

        // Contents belong to the parent scope
        let contents = self.host.borrow().children(node);
        for &child in &contents {
            self.bind_node(child, scope, group, once, chain)?;
        }
        let contents = self.host.borrow().children(node);
        self.bound.borrow_mut().extend(contents.iter().map(|&child| (child, group)));

        if let Some(template) = spec.template() {
            let mut host = self.host.borrow_mut();
            let nodes = host.parse_fragment(template)?;
            for &child in &contents {
                host.remove(child)?;
            }
            for child in nodes {
                host.append_child(node, child)?;
            }
            if let Some(slot) = find_element(&*host, node, &self.config.contents_tag) {
                for &child in &contents {
                    host.insert_before(slot, child)?;
                }
                host.remove(slot)?;
            }
        }

        let inner_scope = Scope::from_models(std::slice::from_ref(&model)).merge(&self.base_scope());
        let mut inner_chain = chain.to_vec();
        inner_chain.push(tag.to_string());
        self.bind_children(node, &inner_scope, group, once, &Rc::from(inner_chain))?;

        let mut instance = instance.borrow_mut();
        instance.ctx.contents = contents;
        let Instance { component, ctx, initialized } = &mut *instance;
        component
            .init(ctx)
            .map_err(|e| BindError::Component { tag: tag.to_string(), message: e.to_string() })?;
        *initialized = true;
        Ok(())
    }

    /// `@field="expr"`: parent expression into a component field
    #[allow(clippy::too_many_arguments)]
    fn bind_field(
        &self,
        handle: crate::model::FieldHandle,
        expression: &str,
        instance: &Rc<RefCell<Instance>>,
        tag: &str,
        scope: &Scope,
        group: WatchGroup,
        once: bool,
    ) -> BindResult<()> {
        let parsed = parse(expression)?;
        let eval = evaluate(&parsed, scope)?;
        let live = !once && !parsed.one_shot;
        if live {
            eval.check_watchable(expression)?;
        }
        handle
            .set(eval.value.clone())
            .map_err(|kind| BindingExpressionError::whole(expression, kind))?;

        if !live || eval.deps.is_empty() {
            return Ok(());
        }

        let deps = eval.locations();
        let recompute_scope = scope.clone();
        let watches: Weak<WatchTable> = Rc::downgrade(&self.watches);
        let instance = instance.clone();
        let tag = tag.to_string();
        let source = expression.to_string();

        self.watches.watch(
            group,
            &deps,
            eval.value,
            Box::new(move || Ok(Recomputed::from(evaluate(&parsed, &recompute_scope)?))),
            Box::new(move |new, _| {
                handle
                    .set(new.clone())
                    .map_err(|kind| BindingExpressionError::whole(&source, kind))?;
                if let (Some(watches), Some(location)) = (watches.upgrade(), handle.location()) {
                    watches.notify(location);
                }
                instance.borrow_mut().run_update(&tag)
            }),
        )?;
        Ok(())
    }
}

/// Menu whose `<li case="...">` items follow a `Current` value
///
/// ```html
/// <switchmenu @current="Section">
///   <ul><li case="home">Home</li><li case="about team">About</li></ul>
/// </switchmenu>
/// ```
pub struct SwitchMenu {
    model: Model,
}

impl Default for SwitchMenu {
    fn default() -> Self {
        let model = Model::builder("SwitchMenu")
            .field("Current", "")
            .field("ActiveClass", "active")
            .build();
        Self { model }
    }
}

impl SwitchMenu {
    pub fn spec() -> ComponentSpec {
        ComponentSpec::new("switchmenu", || Box::new(SwitchMenu::default()))
    }
}

impl Component for SwitchMenu {
    fn model(&self) -> &Model {
        &self.model
    }

    fn init(&mut self, ctx: &mut ComponentContext) -> anyhow::Result<()> {
        let field = |name: &str| self.model.get(name).unwrap_or_default().to_display_string();
        let current = field("Current");
        let active = field("ActiveClass");
        if current.is_empty() {
            bail!("attribute \"current\" is required");
        }

        let mut host = ctx.host();
        let lists: Vec<NodeId> = ctx.contents.iter().copied().filter(|&n| host.is_element(n)).collect();
        let [ul] = lists.as_slice() else {
            bail!("contents must be exactly one <ul>, found {} element(s)", lists.len());
        };
        if host.tag_name(*ul).as_deref() != Some("ul") {
            bail!("contents must be a <ul>");
        }

        for li in host.child_elements(*ul) {
            if host.tag_name(li).as_deref() != Some("li") {
                bail!("<ul> children must be <li> elements");
            }
            let Some(cases) = host.get_attr(li, "case") else {
                bail!("<li> is missing its \"case\" attribute");
            };
            if cases.split_whitespace().any(|c| c == current) {
                host.add_class(li, &active)?;
            } else {
                host.remove_class(li, &active)?;
            }
        }
        Ok(())
    }
}
