//! Host events
//!
//! Events bubble from the target up through its ancestors. Listeners are
//! snapshotted under a short borrow and run with the host released, so a
//! handler may freely mutate the tree.

use std::cell::RefCell;
use std::rc::Rc;

use crate::{NodeId, TreeHost};

/// Listener callback
pub type EventHandler = Rc<dyn Fn(&mut Event)>;

/// Event delivered to listeners
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub target: NodeId,
    /// Node whose listeners are currently running
    pub current_target: NodeId,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl Event {
    pub fn new(event_type: &str, target: NodeId) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            current_target: target,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// Suppress the host's default action
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Stop bubbling after the current node
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// Fire an event at `target` and bubble it to the root
pub fn dispatch_event<H: TreeHost + ?Sized>(host: &RefCell<H>, target: NodeId, event_type: &str) -> Event {
    let mut event = Event::new(event_type, target);
    let mut current = Some(target);

    while let Some(node) = current {
        let (handlers, parent) = {
            let host = host.borrow();
            (host.listeners(node, event_type), host.parent(node))
        };

        event.current_target = node;
        for handler in handlers {
            handler(&mut event);
        }
        if event.propagation_stopped {
            break;
        }
        current = parent;
    }

    tracing::debug!(
        "Dispatched {} at {} (default prevented: {})",
        event_type,
        target,
        event.default_prevented
    );
    event
}
