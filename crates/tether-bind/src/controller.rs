//! Page controllers
//!
//! A page is backed by zero or more async controllers, each producing one
//! model. All of them run on a local executor and are joined before the page
//! is bound, so binding never observes a partial model list.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use smol::LocalExecutor;
use tether_dom::NodeId;

use crate::binding::Binding;
use crate::error::{BindError, BindResult};
use crate::model::Model;

/// Navigation request handed to every controller of a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page: String,
    pub params: BTreeMap<String, String>,
}

impl PageRequest {
    pub fn new(page: &str) -> Self {
        Self { page: page.to_string(), params: BTreeMap::new() }
    }

    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }
}

/// Async model producer
pub type PageController = Rc<dyn Fn(PageRequest) -> Pin<Box<dyn Future<Output = anyhow::Result<Model>>>>>;

/// Wrap an async fn as a [`PageController`]
pub fn page_controller<F, Fut>(f: F) -> PageController
where
    F: Fn(PageRequest) -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<Model>> + 'static,
{
    Rc::new(move |request: PageRequest| -> Pin<Box<dyn Future<Output = anyhow::Result<Model>>>> {
        Box::pin(f(request))
    })
}

/// Run every controller and join them. Model order follows controller order.
pub fn load_models(request: &PageRequest, controllers: &[PageController]) -> anyhow::Result<Vec<Model>> {
    let ex = LocalExecutor::new();
    let tasks: Vec<_> = controllers.iter().map(|c| ex.spawn(c(request.clone()))).collect();

    smol::block_on(ex.run(async {
        let mut models = Vec::with_capacity(tasks.len());
        for task in tasks {
            models.push(task.await?);
        }
        Ok::<_, anyhow::Error>(models)
    }))
}

impl Binding {
    /// Load the page's models and bind `root` against them.
    ///
    /// Any previous binding of `root` is dropped first. A page without
    /// controllers gets a one-shot pass with the helpers only.
    pub fn bind_page(&self, root: NodeId, request: &PageRequest, controllers: &[PageController]) -> BindResult<()> {
        self.unbind(root);
        if controllers.is_empty() {
            return self.bind_models(root, &[], true);
        }

        let models = load_models(request, controllers).map_err(|e| BindError::Controller(e.to_string()))?;
        tracing::info!("Page \"{}\" loaded {} model(s)", request.page, models.len());
        self.bind_models(root, &models, false)
    }
}
