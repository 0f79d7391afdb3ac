//! Built-in binders
//!
//! | Name | Args | Effect |
//! |------|------|--------|
//! | `value` | - | two-way editable value |
//! | `html` | - | inner markup |
//! | `attr` | name | attribute |
//! | `on` | event | invokes a zero-argument function |
//! | `each` | - | one clone per item |
//! | `if` / `ifn` | - | shows or hides the node |
//! | `page` | - | navigation link |

mod value;
mod html;
mod attr;
mod event;
mod each;
mod cond;
mod page;

pub use value::ValueBinder;
pub use html::HtmlBinder;
pub use attr::AttrBinder;
pub use event::EventBinder;
pub use each::EachBinder;
pub use cond::CondBinder;
pub use page::PageBinder;

use std::rc::Rc;

use crate::binder::{Binder, BinderFactory};

fn factory<B: Binder + 'static>(make: impl Fn() -> B + 'static) -> Rc<dyn BinderFactory> {
    Rc::new(move || Box::new(make()) as Box<dyn Binder>)
}

/// Stock binders under their directive names
pub(crate) fn defaults() -> Vec<(&'static str, Rc<dyn BinderFactory>)> {
    vec![
        ("value", factory(ValueBinder::default)),
        ("html", factory(|| HtmlBinder)),
        ("attr", factory(|| AttrBinder)),
        ("on", factory(EventBinder::default)),
        ("each", factory(EachBinder::default)),
        ("if", factory(|| CondBinder::new(false))),
        ("ifn", factory(|| CondBinder::new(true))),
        ("page", factory(|| PageBinder)),
    ]
}
