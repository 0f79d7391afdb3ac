//! Built-in binder behavior against a real document

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use tether_bind::{
    BindError, Binding, CollectingSink, ConfigurationError, ExpressionErrorKind, Func, Model, RouteTable, Value,
};
use tether_dom::{Document, NodeId, TreeHost, dispatch_event};

struct Fixture {
    doc: Rc<RefCell<Document>>,
    binding: Binding,
    root: NodeId,
    sink: Rc<CollectingSink>,
}

fn fixture(markup: &str) -> Fixture {
    let doc = Rc::new(RefCell::new(Document::new()));
    let root = doc.borrow_mut().fragment(markup).unwrap();
    let sink = Rc::new(CollectingSink::new());
    let binding = Binding::builder(doc.clone()).error_sink(sink.clone()).build();
    Fixture { doc, binding, root, sink }
}

impl Fixture {
    fn html(&self) -> String {
        self.doc.borrow().tree.inner_html(self.root)
    }

    fn first_element(&self) -> NodeId {
        self.doc.borrow().child_elements(self.root)[0]
    }
}

fn expression_kind(err: &BindError) -> Option<&ExpressionErrorKind> {
    match err.root_cause() {
        BindError::Expression(e) => Some(&e.kind),
        _ => None,
    }
}

#[test]
fn test_each_shrinks_from_the_end() {
    let f = fixture(r#"<ul><li #each="Items">{{_}}</li></ul>"#);
    let model = Model::builder("List").field("Items", vec!["a", "b", "c"]).build();
    f.binding.bind(f.root, &model, false).unwrap();
    assert_eq!(f.html(), "<ul><!--each--><li>a</li><li>b</li><li>c</li></ul>");

    f.binding.set(&model, "Items", vec!["z"]).unwrap();
    assert_eq!(f.html(), "<ul><!--each--><li>z</li></ul>");
    assert!(f.sink.is_empty());
}

#[test]
fn test_each_grows_in_source_order() {
    let f = fixture(r#"<ul><li #each="Items">{{_}}</li><li>tail</li></ul>"#);
    let model = Model::builder("List").field("Items", vec!["1"]).build();
    f.binding.bind(f.root, &model, false).unwrap();

    f.binding.set(&model, "Items", vec!["1", "2", "3", "4"]).unwrap();
    assert_eq!(
        f.html(),
        "<ul><!--each--><li>1</li><li>2</li><li>3</li><li>4</li><li>tail</li></ul>"
    );
}

#[test]
fn test_each_over_mapping_with_outputs() {
    let f = fixture(r#"<p #each="Scores -> name, score">{{name}}={{score}}</p>"#);
    let mut scores = BTreeMap::new();
    scores.insert("bob".to_string(), Value::from(2));
    scores.insert("ada".to_string(), Value::from(3));
    let model = Model::builder("Board").field("Scores", scores).build();

    f.binding.bind(f.root, &model, false).unwrap();
    assert_eq!(f.html(), "<!--each--><p>ada=3</p><p>bob=2</p>");
}

#[test]
fn test_each_releases_item_watches() {
    let f = fixture(r#"<ul><li #each="Items">{{_}}{{Suffix}}</li></ul>"#);
    let model = Model::builder("List")
        .field("Items", vec!["a", "b", "c"])
        .field("Suffix", "!")
        .build();
    f.binding.bind(f.root, &model, false).unwrap();
    // One for the list, one per item
    assert_eq!(f.binding.watches().len(), 4);

    f.binding.set(&model, "Items", vec!["a"]).unwrap();
    assert_eq!(f.binding.watches().len(), 2);

    f.binding.set(&model, "Suffix", "?").unwrap();
    assert_eq!(f.html(), "<ul><!--each--><li>a?</li></ul>");
}

#[test]
fn test_each_rejects_scalars() {
    let f = fixture(r#"<li #each="Name"></li>"#);
    let model = Model::builder("M").field("Name", "x").build();
    let err = f.binding.bind(f.root, &model, false).unwrap_err();
    assert!(matches!(expression_kind(&err), Some(ExpressionErrorKind::TypeMismatch { .. })));
}

#[test]
fn test_each_too_many_outputs() {
    let f = fixture(r#"<li #each="Items -> a, b, c"></li>"#);
    let model = Model::builder("M").field("Items", vec![1]).build();
    let err = f.binding.bind(f.root, &model, false).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        BindError::Configuration(ConfigurationError::MalformedDirective { .. })
    ));
}

#[test]
fn test_if_toggle_restores_position() {
    let f = fixture(r#"<div><p>first</p><p #if="Show">middle</p><p>last</p></div>"#);
    let model = Model::builder("M").field("Show", true).build();
    f.binding.bind(f.root, &model, false).unwrap();
    let shown = "<div><p>first</p><p>middle</p><p>last</p></div>";
    assert_eq!(f.html(), shown);

    f.binding.set(&model, "Show", false).unwrap();
    assert_eq!(f.html(), "<div><p>first</p><!--if--><p>last</p></div>");

    f.binding.set(&model, "Show", true).unwrap();
    assert_eq!(f.html(), shown);
}

#[test]
fn test_ifn_negates() {
    let f = fixture(r#"<p #ifn="Hidden">x</p><p #if="!Hidden">y</p>"#);
    let model = Model::builder("M").field("Hidden", true).build();
    f.binding.bind(f.root, &model, false).unwrap();
    assert_eq!(f.html(), "<!--ifn--><!--if-->");

    f.binding.set(&model, "Hidden", false).unwrap();
    assert_eq!(f.html(), "<p>x</p><p>y</p>");
}

#[test]
fn test_if_requires_boolean() {
    let f = fixture(r#"<p #if="Name">x</p>"#);
    let model = Model::builder("M").field("Name", "yes").build();
    let err = f.binding.bind(f.root, &model, false).unwrap_err();
    assert!(matches!(expression_kind(&err), Some(ExpressionErrorKind::TypeMismatch { .. })));
}

#[test]
fn test_value_binder_round_trip() {
    let f = fixture(r#"<input #value="Name"><p>{{Name}}</p>"#);
    let model = Model::builder("Form").field("Name", "ada").build();
    f.binding.bind(f.root, &model, false).unwrap();
    let input = f.first_element();
    assert_eq!(f.doc.borrow().value(input).as_deref(), Some("ada"));

    // User edit
    f.doc.borrow_mut().set_value(input, "bob").unwrap();
    dispatch_event(&*f.doc, input, "change");
    assert_eq!(model.get("Name"), Some(Value::from("bob")));
    assert_eq!(f.html(), "<input><p>bob</p>");

    // Model edit
    f.binding.set(&model, "Name", "cy").unwrap();
    assert_eq!(f.doc.borrow().value(input).as_deref(), Some("cy"));
}

#[test]
fn test_value_binder_coerces_numbers() {
    let f = fixture(r#"<input #value="Age">"#);
    let model = Model::builder("Form").field("Age", 30).build();
    f.binding.bind(f.root, &model, false).unwrap();
    let input = f.first_element();

    f.doc.borrow_mut().set_value(input, "31").unwrap();
    dispatch_event(&*f.doc, input, "change");
    assert_eq!(model.get("Age"), Some(Value::from(31)));

    f.doc.borrow_mut().set_value(input, "old").unwrap();
    dispatch_event(&*f.doc, input, "change");
    assert_eq!(model.get("Age"), Some(Value::from(31)));
    assert_eq!(f.sink.len(), 1);
}

#[test]
fn test_two_way_non_addressable_is_rejected() {
    let markup = r#"<input #value="toUpper(Name)">"#;
    let f = fixture(markup);
    let model = Model::builder("Form").field("Name", "ada").build();
    let before = f.html();

    let err = f.binding.bind(f.root, &model, false).unwrap_err();
    assert_eq!(expression_kind(&err), Some(&ExpressionErrorKind::NotAddressable));
    assert_eq!(f.html(), before);
    assert_eq!(f.doc.borrow().value(f.first_element()).as_deref(), Some(""));
    assert!(f.binding.watches().is_empty());
}

#[test]
fn test_two_way_read_only_is_rejected() {
    let f = fixture(r#"<input #value="Id">"#);
    let model = Model::builder("Form").readonly("Id", "x1").build();
    let err = f.binding.bind(f.root, &model, false).unwrap_err();
    assert_eq!(expression_kind(&err), Some(&ExpressionErrorKind::ReadOnlyField("Id".into())));

    // One-shot bindings never push back
    let f = fixture(r#"<input #value="|Id">"#);
    f.binding.bind(f.root, &model, false).unwrap();
    assert_eq!(f.doc.borrow().value(f.first_element()).as_deref(), Some("x1"));
}

#[test]
fn test_value_binder_requires_editable() {
    let f = fixture(r#"<div #value="Name"></div>"#);
    let model = Model::builder("Form").field("Name", "ada").build();
    let err = f.binding.bind(f.root, &model, false).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        BindError::Configuration(ConfigurationError::UnsupportedElement { tag, .. }) if tag == "div"
    ));
}

#[test]
fn test_on_binder_calls_action() {
    let clicks = Rc::new(Cell::new(0));
    let counter = clicks.clone();
    let model = Model::builder("Page")
        .field("Save", Func::action(move || counter.set(counter.get() + 1)))
        .build();

    let f = fixture(r#"<form><button #on(click)="Save">Save</button></form>"#);
    f.binding.bind(f.root, &model, false).unwrap();
    let button = f.doc.borrow().child_elements(f.first_element())[0];

    let event = dispatch_event(&*f.doc, button, "click");
    assert_eq!(clicks.get(), 1);
    assert!(event.default_prevented());
}

#[test]
fn test_on_binder_requires_function() {
    let f = fixture(r#"<button #on(click)="Name">x</button>"#);
    let model = Model::builder("Page").field("Name", "x").build();
    let err = f.binding.bind(f.root, &model, false).unwrap_err();
    assert!(matches!(
        expression_kind(&err),
        Some(ExpressionErrorKind::TypeMismatch { found: tether_bind::ValueKind::Str, .. })
    ));
}

#[test]
fn test_html_and_attr_binders() {
    let f = fixture(r#"<div #html="Body" #attr(title)="Title"></div>"#);
    let model = Model::builder("Page")
        .field("Body", "<em>{{Title}}</em>")
        .field("Title", "hello")
        .build();
    f.binding.bind(f.root, &model, false).unwrap();
    // Injected markup is not bound
    assert_eq!(f.html(), r#"<div title="hello"><em>{{Title}}</em></div>"#);

    f.binding.set(&model, "Title", "bye").unwrap();
    assert_eq!(f.html(), r#"<div title="bye"><em>{{Title}}</em></div>"#);
}

#[test]
fn test_page_binder() {
    let mut routes = RouteTable::new("https://example.com/").unwrap();
    routes.add_page("user", "/users/:id").unwrap();

    let doc = Rc::new(RefCell::new(Document::new()));
    let root = doc.borrow_mut().fragment(r#"<a #page="url('user', Id)">profile</a>"#).unwrap();
    let binding = Binding::builder(doc.clone()).router(Rc::new(routes)).unwrap().build();
    let model = Model::builder("Page").field("Id", 7).build();

    binding.bind(root, &model, false).unwrap();
    assert_eq!(
        doc.borrow().tree.inner_html(root),
        r#"<a href="https://example.com/users/7" data-page="/users/7">profile</a>"#
    );

    binding.set(&model, "Id", 8).unwrap();
    let link = doc.borrow().child_elements(root)[0];
    assert_eq!(doc.borrow().get_attr(link, "data-page").as_deref(), Some("/users/8"));
}

#[test]
fn test_page_binder_requires_link() {
    let mut routes = RouteTable::new("https://example.com/").unwrap();
    routes.add_page("home", "/").unwrap();

    let doc = Rc::new(RefCell::new(Document::new()));
    let root = doc.borrow_mut().fragment(r#"<span #page="url('home')"></span>"#).unwrap();
    let binding = Binding::builder(doc.clone()).router(Rc::new(routes)).unwrap().build();

    let err = binding.bind_models(root, &[], true).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        BindError::Configuration(ConfigurationError::UnsupportedElement { .. })
    ));
}

#[test]
fn test_ghost_pushes_binders_down() {
    let f = fixture(r#"<dl><w-ghost #if="Show"><dt>k</dt><dd>{{Value}}</dd></w-ghost></dl>"#);
    let model = Model::builder("M").field("Show", true).field("Value", "v").build();
    f.binding.bind(f.root, &model, false).unwrap();
    assert_eq!(f.html(), "<dl><dt>k</dt><dd>v</dd></dl>");

    f.binding.set(&model, "Show", false).unwrap();
    assert_eq!(f.html(), "<dl><!--if--><!--if--></dl>");
}
