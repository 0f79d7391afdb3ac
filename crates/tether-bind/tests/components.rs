//! Custom component tests

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tether_bind::{
    BindError, Binding, Component, ComponentContext, ComponentSpec, ConfigurationError, Model, StructuralError,
    SwitchMenu,
};
use tether_dom::{Document, NodeId, TreeHost};

fn parse(markup: &str) -> (Rc<RefCell<Document>>, NodeId) {
    let doc = Rc::new(RefCell::new(Document::new()));
    let root = doc.borrow_mut().fragment(markup).unwrap();
    (doc, root)
}

fn items(doc: &RefCell<Document>, root: NodeId) -> Vec<NodeId> {
    let doc = doc.borrow();
    let menu = doc.child_elements(root)[0];
    let ul = doc.child_elements(menu)[0];
    doc.child_elements(ul)
}

fn active(doc: &RefCell<Document>, root: NodeId) -> Vec<bool> {
    let nodes = items(doc, root);
    let doc = doc.borrow();
    nodes.iter().map(|&li| doc.has_class(li, "active")).collect()
}

const MENU: &str = r#"<switchmenu @current="Section"><ul><li case="a">A</li><li case="b c">B</li></ul></switchmenu>"#;

#[test]
fn test_switchmenu_follows_current() {
    let (doc, root) = parse(MENU);
    let binding = Binding::new(doc.clone());
    let model = Model::builder("Nav").field("Section", "a").build();

    binding.bind(root, &model, false).unwrap();
    assert_eq!(active(&doc, root), vec![true, false]);

    binding.set(&model, "Section", "c").unwrap();
    assert_eq!(active(&doc, root), vec![false, true]);

    binding.set(&model, "Section", "z").unwrap();
    assert_eq!(active(&doc, root), vec![false, false]);
    // No leftover empty class attribute
    let li = items(&doc, root)[1];
    assert_eq!(doc.borrow().get_attr(li, "class"), None);
}

#[test]
fn test_switchmenu_static_current() {
    let (doc, root) = parse(r#"<switchmenu current="b"><ul><li case="a">A</li><li case="b">B</li></ul></switchmenu>"#);
    let binding = Binding::new(doc.clone());
    binding.bind_models(root, &[], true).unwrap();
    assert_eq!(active(&doc, root), vec![false, true]);
}

#[test]
fn test_switchmenu_custom_active_class() {
    let (doc, root) = parse(
        r#"<switchmenu @current="Section" activeclass="on"><ul><li case="a">A</li></ul></switchmenu>"#,
    );
    let binding = Binding::new(doc.clone());
    let model = Model::builder("Nav").field("Section", "a").build();
    binding.bind(root, &model, false).unwrap();

    let li = items(&doc, root)[0];
    assert!(doc.borrow().has_class(li, "on"));
    assert!(!doc.borrow().has_class(li, "active"));
}

#[test]
fn test_switchmenu_rejects_bad_contents() {
    let cases = [
        r#"<switchmenu current="a"><ol><li case="a">A</li></ol></switchmenu>"#,
        r#"<switchmenu current="a"><ul><li>A</li></ul></switchmenu>"#,
        r#"<switchmenu current="a"><ul></ul><ul></ul></switchmenu>"#,
        r#"<switchmenu><ul><li case="a">A</li></ul></switchmenu>"#,
    ];
    for markup in cases {
        let (doc, root) = parse(markup);
        let binding = Binding::new(doc);
        let err = binding.bind_models(root, &[], true).unwrap_err();
        assert!(
            matches!(err.root_cause(), BindError::Component { tag, .. } if tag == "switchmenu"),
            "{markup}: {err}"
        );
    }
}

struct Card {
    model: Model,
    updates: Rc<Cell<usize>>,
}

impl Component for Card {
    fn model(&self) -> &Model {
        &self.model
    }

    fn init(&mut self, ctx: &mut ComponentContext) -> anyhow::Result<()> {
        ctx.host().set_attr(ctx.element, "data-contents", &ctx.contents.len().to_string())?;
        Ok(())
    }

    fn update(&mut self, _ctx: &mut ComponentContext) -> anyhow::Result<()> {
        self.updates.set(self.updates.get() + 1);
        Ok(())
    }
}

fn card_spec(updates: Rc<Cell<usize>>) -> ComponentSpec {
    ComponentSpec::new("card", move || {
        Box::new(Card {
            model: Model::builder("Card").field("Title", "").build(),
            updates: updates.clone(),
        })
    })
    .with_template(r#"<div class="card"><h2>{{Title}}</h2><wcontents></wcontents></div>"#)
}

#[test]
fn test_component_template_and_contents() {
    let updates = Rc::new(Cell::new(0));
    let (doc, root) = parse(r#"<card @title="Heading"><p>{{Body}}</p></card>"#);
    let binding = Binding::builder(doc.clone())
        .register_component(card_spec(updates.clone()))
        .unwrap()
        .build();
    let page = Model::builder("Page").field("Heading", "Hi").field("Body", "text").build();

    binding.bind(root, &page, false).unwrap();
    let html = |doc: &RefCell<Document>| doc.borrow().tree.inner_html(root);
    assert_eq!(
        html(&doc),
        r#"<card data-contents="1"><div class="card"><h2>Hi</h2><p>text</p></div></card>"#
    );
    assert_eq!(updates.get(), 0);

    // Parent field flows into the template through the component model
    binding.set(&page, "Heading", "Hello").unwrap();
    assert!(html(&doc).contains("<h2>Hello</h2>"));
    assert_eq!(updates.get(), 1);

    // Contents stay in the parent scope
    binding.set(&page, "Body", "more").unwrap();
    assert!(html(&doc).contains("<p>more</p>"));
    assert_eq!(updates.get(), 1);
}

#[test]
fn test_component_template_cannot_see_parent() {
    let spec = ComponentSpec::new("leaky", || Box::new(SwitchMenu::default())).with_template("<p>{{Heading}}</p>");
    let (doc, root) = parse("<leaky></leaky>");
    let binding = Binding::builder(doc).register_component(spec).unwrap().build();
    let page = Model::builder("Page").field("Heading", "Hi").build();

    let err = binding.bind(root, &page, false).unwrap_err();
    assert!(matches!(err.root_cause(), BindError::Expression(_)));
}

#[test]
fn test_unknown_field_becomes_attribute() {
    let updates = Rc::new(Cell::new(0));
    let (doc, root) = parse(r#"<card @title="Heading" @role="Role"></card>"#);
    let binding = Binding::builder(doc.clone())
        .register_component(card_spec(updates))
        .unwrap()
        .build();
    let page = Model::builder("Page").field("Heading", "Hi").field("Role", "note").build();

    binding.bind(root, &page, false).unwrap();
    let card = doc.borrow().child_elements(root)[0];
    assert_eq!(doc.borrow().get_attr(card, "role").as_deref(), Some("note"));
    assert_eq!(doc.borrow().get_attr(card, "title"), None);
}

#[test]
fn test_recursive_component() {
    let spec = ComponentSpec::new("loop-tag", || Box::new(SwitchMenu::default()))
        .with_template("<div><loop-tag></loop-tag></div>");
    let (doc, root) = parse("<loop-tag></loop-tag>");
    let binding = Binding::builder(doc).register_component(spec).unwrap().build();

    let err = binding.bind_models(root, &[], true).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        BindError::Structural(StructuralError::RecursiveComponent(tag)) if tag == "loop-tag"
    ));
    assert!(err.to_string().contains("Infinite loop detected"));
}

#[test]
fn test_duplicate_component() {
    let doc = Rc::new(RefCell::new(Document::new()));
    let err = Binding::builder(doc).register_component(SwitchMenu::spec()).unwrap_err();
    assert_eq!(err, ConfigurationError::DuplicateComponent("switchmenu".into()));
}
