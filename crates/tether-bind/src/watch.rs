//! Watch table
//!
//! Maps model locations to recompute/on-change callbacks. `notify` is called
//! once per direct write to a location; every live watcher registered there
//! recomputes, and its on-change callback runs only when the new value
//! differs from the last one.
//!
//! Registrations live in nested [`WatchGroup`]s so a subtree can be torn down
//! in one call. Removal marks watchers dead (tombstones) and compacts the
//! index later; `notify` iterates over a snapshot, so callbacks may register
//! or release watchers while a notification is in flight.
//!
//! A recompute may report a new dependency set (replacing `User` moves
//! `User.Name` to another record); the watcher is then re-keyed on it.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::error::{BindError, ErrorSink};
use crate::expr::Evaluation;
use crate::model::Location;
use crate::value::Value;

/// Fresh value of a watched expression
#[derive(Debug, Clone)]
pub struct Recomputed {
    pub value: Value,
    /// Locations read this time; `None` keeps the registered ones
    pub deps: Option<Vec<Location>>,
}

impl From<Value> for Recomputed {
    fn from(value: Value) -> Self {
        Self { value, deps: None }
    }
}

impl From<Evaluation> for Recomputed {
    fn from(eval: Evaluation) -> Self {
        let deps = eval.locations();
        Self { value: eval.value, deps: Some(deps) }
    }
}

/// Recomputes a watched expression against the current scope
pub type Recompute = Box<dyn Fn() -> Result<Recomputed, BindError>>;

/// Receives `(new, old)` after a change
pub type OnChange = Box<dyn Fn(&Value, &Value) -> Result<(), BindError>>;

/// Owner of a set of registrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchGroup(u64);

impl WatchGroup {
    /// Group every other group descends from
    pub const ROOT: WatchGroup = WatchGroup(0);
}

impl std::fmt::Display for WatchGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "group{}", self.0)
    }
}

/// Registration refused by the watch table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    #[error("Nothing to watch: the expression read no addressable location")]
    NoLocations,

    #[error("Watch {0} has been released")]
    GroupReleased(WatchGroup),
}

struct Watcher {
    id: u64,
    group: WatchGroup,
    deps: RefCell<Vec<Location>>,
    recompute: Recompute,
    on_change: OnChange,
    last: RefCell<Value>,
    alive: Cell<bool>,
    running: Cell<bool>,
}

#[derive(Default)]
struct GroupEntry {
    parent: Option<WatchGroup>,
    children: Vec<WatchGroup>,
}

struct WatchState {
    next_watch: u64,
    next_group: u64,
    groups: BTreeMap<WatchGroup, GroupEntry>,
    /// Registration order
    watchers: Vec<Rc<Watcher>>,
    by_location: HashMap<Location, Vec<Rc<Watcher>>>,
    tombstones: usize,
    /// (watch horizon, group horizon)
    checkpoint: Option<(u64, u64)>,
}

impl WatchState {
    fn new() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(WatchGroup::ROOT, GroupEntry::default());
        Self {
            next_watch: 0,
            next_group: 1,
            groups,
            watchers: Vec::new(),
            by_location: HashMap::new(),
            tombstones: 0,
            checkpoint: None,
        }
    }

    /// `group` and everything below it
    fn subtree(&self, group: WatchGroup) -> Vec<WatchGroup> {
        let mut out = vec![group];
        let mut i = 0;
        while i < out.len() {
            if let Some(entry) = self.groups.get(&out[i]) {
                out.extend(entry.children.iter().copied());
            }
            i += 1;
        }
        out
    }

    fn kill(&mut self, dead: impl Fn(&Watcher) -> bool) -> usize {
        let mut killed = 0;
        for watcher in &self.watchers {
            if watcher.alive.get() && dead(watcher) {
                watcher.alive.set(false);
                killed += 1;
            }
        }
        self.tombstones += killed;
        killed
    }

    fn drop_group(&mut self, group: WatchGroup) {
        if group == WatchGroup::ROOT {
            if let Some(root) = self.groups.get_mut(&group) {
                root.children.clear();
            }
            return;
        }
        if let Some(entry) = self.groups.remove(&group) {
            if let Some(parent) = entry.parent.and_then(|p| self.groups.get_mut(&p)) {
                parent.children.retain(|&c| c != group);
            }
        }
    }

    fn compact(&mut self) {
        if self.tombstones == 0 {
            return;
        }
        self.watchers.retain(|w| w.alive.get());
        self.by_location.retain(|_, list| {
            list.retain(|w| w.alive.get());
            !list.is_empty()
        });
        self.tombstones = 0;
    }

    fn maybe_compact(&mut self) {
        if self.tombstones * 2 >= self.watchers.len() {
            self.compact();
        }
    }

    /// Move a live watcher onto a new dependency set, keeping every
    /// location's list in registration order
    fn rekey(&mut self, watcher: &Rc<Watcher>, deps: Vec<Location>) {
        let old = watcher.deps.replace(deps);
        let new = watcher.deps.borrow();
        for location in old.iter().filter(|l| !new.contains(l)) {
            if let Some(list) = self.by_location.get_mut(location) {
                list.retain(|w| !Rc::ptr_eq(w, watcher));
                if list.is_empty() {
                    self.by_location.remove(location);
                }
            }
        }
        for location in new.iter().filter(|l| !old.contains(l)) {
            let list = self.by_location.entry(*location).or_default();
            let at = list.partition_point(|w| w.id < watcher.id);
            list.insert(at, watcher.clone());
        }
    }
}

/// Registry of live watches for one binding session
pub struct WatchTable {
    state: RefCell<WatchState>,
    sink: Rc<dyn ErrorSink>,
}

impl WatchTable {
    /// Errors raised while recomputing go to `sink`
    pub fn new(sink: Rc<dyn ErrorSink>) -> Self {
        Self { state: RefCell::new(WatchState::new()), sink }
    }

    /// Create a group nested in `parent`
    pub fn group(&self, parent: WatchGroup) -> WatchGroup {
        let mut state = self.state.borrow_mut();
        let group = WatchGroup(state.next_group);
        state.next_group += 1;

        let parent = if state.groups.contains_key(&parent) {
            parent
        } else {
            tracing::debug!("Parent {} already released, nesting {} under root", parent, group);
            WatchGroup::ROOT
        };
        if let Some(entry) = state.groups.get_mut(&parent) {
            entry.children.push(group);
        }
        state.groups.insert(group, GroupEntry { parent: Some(parent), children: Vec::new() });
        group
    }

    pub fn contains_group(&self, group: WatchGroup) -> bool {
        self.state.borrow().groups.contains_key(&group)
    }

    /// Register a watcher on every location in `deps` and return its id.
    ///
    /// `initial` is the value the caller has already rendered.
    pub fn watch(
        &self,
        group: WatchGroup,
        deps: &[Location],
        initial: Value,
        recompute: Recompute,
        on_change: OnChange,
    ) -> Result<u64, WatchError> {
        let mut state = self.state.borrow_mut();
        if deps.is_empty() {
            return Err(WatchError::NoLocations);
        }
        if !state.groups.contains_key(&group) {
            return Err(WatchError::GroupReleased(group));
        }

        let mut deps = deps.to_vec();
        deps.sort();
        deps.dedup();
        let id = state.next_watch;
        let watcher = Rc::new(Watcher {
            id,
            group,
            deps: RefCell::new(deps),
            recompute,
            on_change,
            last: RefCell::new(initial),
            alive: Cell::new(true),
            running: Cell::new(false),
        });
        state.next_watch += 1;

        for location in watcher.deps.borrow().iter() {
            state.by_location.entry(*location).or_default().push(watcher.clone());
        }
        state.watchers.push(watcher);
        Ok(id)
    }

    /// Deliver a write to `location`. Returns the number of on-change
    /// callbacks that ran.
    pub fn notify(&self, location: Location) -> usize {
        let snapshot = match self.state.borrow().by_location.get(&location) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut fired = 0;
        for watcher in snapshot {
            if !watcher.alive.get() {
                continue;
            }
            if watcher.running.get() {
                tracing::warn!("Skipping re-entrant notification of watcher {} on {}", watcher.id, location);
                continue;
            }

            watcher.running.set(true);
            match (watcher.recompute)() {
                Ok(Recomputed { value: new, deps }) => {
                    if let Some(mut deps) = deps.filter(|d| !d.is_empty()) {
                        deps.sort();
                        deps.dedup();
                        if watcher.alive.get() && *watcher.deps.borrow() != deps {
                            self.state.borrow_mut().rekey(&watcher, deps);
                        }
                    }
                    if *watcher.last.borrow() != new {
                        let old = watcher.last.replace(new.clone());
                        fired += 1;
                        if let Err(e) = (watcher.on_change)(&new, &old) {
                            self.sink.report(e);
                        }
                    }
                }
                Err(e) => self.sink.report(e),
            }
            watcher.running.set(false);
        }

        tracing::debug!("Notified {}: {} change(s)", location, fired);
        fired
    }

    /// Remove `group`, its descendants and all of their watchers
    pub fn release(&self, group: WatchGroup) -> usize {
        let mut state = self.state.borrow_mut();
        let groups = state.subtree(group);
        let killed = state.kill(|w| groups.contains(&w.group));
        for g in groups.into_iter().rev() {
            state.drop_group(g);
        }
        state.maybe_compact();
        killed
    }

    /// Remember the current registration horizon for `reset`
    pub fn checkpoint(&self) {
        let mut state = self.state.borrow_mut();
        state.checkpoint = Some((state.next_watch, state.next_group));
    }

    /// Remove everything registered since the last checkpoint, or everything
    /// when no checkpoint was taken. The checkpoint itself is kept.
    pub fn reset(&self) -> usize {
        let mut state = self.state.borrow_mut();
        let (watch_horizon, group_horizon) = state.checkpoint.unwrap_or((0, 1));

        let killed = state.kill(|w| w.id >= watch_horizon || w.group.0 >= group_horizon);
        let doomed: Vec<WatchGroup> = state.groups.keys().copied().filter(|g| g.0 >= group_horizon).collect();
        for g in doomed.into_iter().rev() {
            state.drop_group(g);
        }
        state.compact();

        tracing::info!("Watch table reset, {} registration(s) removed", killed);
        killed
    }

    /// Drop every registration and group, checkpoint included
    pub fn clear(&self) -> usize {
        let (watchers, live) = {
            let mut state = self.state.borrow_mut();
            let watchers = std::mem::take(&mut state.watchers);
            let live = watchers.iter().filter(|w| w.alive.replace(false)).count();
            state.by_location.clear();
            state.tombstones = 0;
            state.checkpoint = None;
            state.groups.retain(|&g, _| g == WatchGroup::ROOT);
            state.drop_group(WatchGroup::ROOT);
            (watchers, live)
        };
        // Callbacks are dropped with the table unborrowed
        drop(watchers);
        live
    }

    /// Live registrations
    pub fn len(&self) -> usize {
        let state = self.state.borrow();
        state.watchers.len() - state.tombstones
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live registrations on one location
    pub fn watch_count(&self, location: Location) -> usize {
        self.state
            .borrow()
            .by_location
            .get(&location)
            .map_or(0, |list| list.iter().filter(|w| w.alive.get()).count())
    }
}

impl std::fmt::Debug for WatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("WatchTable")
            .field("watchers", &(state.watchers.len() - state.tombstones))
            .field("groups", &state.groups.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectingSink;
    use crate::model::Model;

    fn table() -> (Rc<WatchTable>, Rc<CollectingSink>) {
        let sink = Rc::new(CollectingSink::new());
        (Rc::new(WatchTable::new(sink.clone())), sink)
    }

    fn counter() -> Model {
        Model::builder("Counter").field("Count", 0).build()
    }

    /// Watch `Count`, counting on-change calls
    fn watch_count(table: &WatchTable, group: WatchGroup, model: &Model, fired: &Rc<Cell<usize>>) {
        let location = model.location("Count").unwrap();
        let m = model.clone();
        let fired = fired.clone();
        table.watch(
            group,
            &[location],
            model.get("Count").unwrap(),
            Box::new(move || Ok(Recomputed::from(m.get("Count").unwrap()))),
            Box::new(move |_, _| {
                fired.set(fired.get() + 1);
                Ok(())
            }),
        )
        .unwrap();
    }

    #[test]
    fn test_fires_only_on_change() {
        let (table, _) = table();
        let model = counter();
        let fired = Rc::new(Cell::new(0));
        watch_count(&table, WatchGroup::ROOT, &model, &fired);
        let location = model.location("Count").unwrap();

        // Same value written again
        model.set("Count", 0).unwrap();
        assert_eq!(table.notify(location), 0);
        assert_eq!(fired.get(), 0);

        model.set("Count", 1).unwrap();
        assert_eq!(table.notify(location), 1);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_registration_order() {
        let (table, _) = table();
        let model = counter();
        let location = model.location("Count").unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let m = model.clone();
            let order = order.clone();
            table.watch(
                WatchGroup::ROOT,
                &[location],
                Value::from(0),
                Box::new(move || Ok(Recomputed::from(m.get("Count").unwrap()))),
                Box::new(move |_, _| {
                    order.borrow_mut().push(i);
                    Ok(())
                }),
            )
            .unwrap();
        }

        model.set("Count", 5).unwrap();
        table.notify(location);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_release_covers_descendants() {
        let (table, _) = table();
        let model = counter();
        let fired = Rc::new(Cell::new(0));

        let outer = table.group(WatchGroup::ROOT);
        let inner = table.group(outer);
        let sibling = table.group(WatchGroup::ROOT);
        watch_count(&table, outer, &model, &fired);
        watch_count(&table, inner, &model, &fired);
        watch_count(&table, sibling, &model, &fired);
        assert_eq!(table.len(), 3);

        assert_eq!(table.release(outer), 2);
        assert!(!table.contains_group(inner));
        assert!(table.contains_group(sibling));

        model.set("Count", 1).unwrap();
        assert_eq!(table.notify(model.location("Count").unwrap()), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_release_during_notify() {
        let (table, _) = table();
        let model = counter();
        let location = model.location("Count").unwrap();
        let fired = Rc::new(Cell::new(0));
        let doomed = table.group(WatchGroup::ROOT);

        let t = Rc::downgrade(&table);
        let m = model.clone();
        table.watch(
            WatchGroup::ROOT,
            &[location],
            Value::from(0),
            Box::new(move || Ok(Recomputed::from(m.get("Count").unwrap()))),
            Box::new(move |_, _| {
                if let Some(t) = t.upgrade() {
                    t.release(doomed);
                }
                Ok(())
            }),
        )
        .unwrap();
        watch_count(&table, doomed, &model, &fired);

        model.set("Count", 1).unwrap();
        assert_eq!(table.notify(location), 1);
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn test_checkpoint_and_reset() {
        let (table, _) = table();
        let model = counter();
        let fired = Rc::new(Cell::new(0));

        watch_count(&table, WatchGroup::ROOT, &model, &fired);
        table.checkpoint();
        let page = table.group(WatchGroup::ROOT);
        watch_count(&table, page, &model, &fired);
        watch_count(&table, WatchGroup::ROOT, &model, &fired);

        assert_eq!(table.reset(), 2);
        assert_eq!(table.len(), 1);
        assert!(!table.contains_group(page));

        // Checkpoint survives a reset
        watch_count(&table, WatchGroup::ROOT, &model, &fired);
        assert_eq!(table.reset(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_clear() {
        let (table, _) = table();
        let model = counter();
        let fired = Rc::new(Cell::new(0));
        let group = table.group(WatchGroup::ROOT);
        watch_count(&table, group, &model, &fired);
        watch_count(&table, WatchGroup::ROOT, &model, &fired);
        table.release(group);

        assert_eq!(table.clear(), 1);
        assert!(table.is_empty());
        assert!(!table.contains_group(group));
        model.set("Count", 1).unwrap();
        assert_eq!(table.notify(model.location("Count").unwrap()), 0);
    }

    #[test]
    fn test_watch_refusals() {
        let (table, _) = table();
        let model = counter();
        let location = model.location("Count").unwrap();
        let noop = || -> (Recompute, OnChange) {
            (Box::new(|| Ok(Recomputed::from(Value::Null))), Box::new(|_, _| Ok(())))
        };

        let (recompute, on_change) = noop();
        assert_eq!(
            table.watch(WatchGroup::ROOT, &[], Value::Null, recompute, on_change),
            Err(WatchError::NoLocations)
        );

        let gone = table.group(WatchGroup::ROOT);
        table.release(gone);
        let (recompute, on_change) = noop();
        assert_eq!(
            table.watch(gone, &[location], Value::Null, recompute, on_change),
            Err(WatchError::GroupReleased(gone))
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_recompute_rekeys_dependencies() {
        let (table, _) = table();
        let switch = Model::builder("Switch").field("UseB", false).build();
        let a = counter();
        let b = counter();
        let fired = Rc::new(Cell::new(0));

        let (s, ma, mb, f) = (switch.clone(), a.clone(), b.clone(), fired.clone());
        table
            .watch(
                WatchGroup::ROOT,
                &[switch.location("UseB").unwrap(), a.location("Count").unwrap()],
                Value::from(0),
                Box::new(move || {
                    let source = if s.get("UseB") == Some(Value::Bool(true)) { &mb } else { &ma };
                    let deps = vec![s.location("UseB").unwrap(), source.location("Count").unwrap()];
                    Ok(Recomputed { value: source.get("Count").unwrap(), deps: Some(deps) })
                }),
                Box::new(move |_, _| {
                    f.set(f.get() + 1);
                    Ok(())
                }),
            )
            .unwrap();

        b.set("Count", 7).unwrap();
        assert_eq!(table.notify(b.location("Count").unwrap()), 0);

        switch.set("UseB", true).unwrap();
        assert_eq!(table.notify(switch.location("UseB").unwrap()), 1);
        assert_eq!(table.watch_count(a.location("Count").unwrap()), 0);
        assert_eq!(table.watch_count(b.location("Count").unwrap()), 1);

        b.set("Count", 8).unwrap();
        assert_eq!(table.notify(b.location("Count").unwrap()), 1);
        a.set("Count", 3).unwrap();
        assert_eq!(table.notify(a.location("Count").unwrap()), 0);
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn test_errors_go_to_sink() {
        let (table, sink) = table();
        let model = counter();
        let location = model.location("Count").unwrap();

        table.watch(
            WatchGroup::ROOT,
            &[location],
            Value::from(0),
            Box::new(|| Err(BindError::Detached)),
            Box::new(|_, _| Ok(())),
        )
        .unwrap();

        table.notify(location);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_reentrant_notification_is_skipped() {
        let (table, _) = table();
        let model = counter();
        let location = model.location("Count").unwrap();
        let calls = Rc::new(Cell::new(0));

        let t = Rc::downgrade(&table);
        let m = model.clone();
        let writer = model.clone();
        let c = calls.clone();
        table.watch(
            WatchGroup::ROOT,
            &[location],
            Value::from(0),
            Box::new(move || Ok(Recomputed::from(m.get("Count").unwrap()))),
            Box::new(move |new, _| {
                c.set(c.get() + 1);
                // Write back from inside the callback
                let next = new.as_number().unwrap_or_default() + 1.0;
                writer.set("Count", next).unwrap();
                if let Some(t) = t.upgrade() {
                    assert_eq!(t.notify(location), 0);
                }
                Ok(())
            }),
        )
        .unwrap();

        model.set("Count", 1).unwrap();
        assert_eq!(table.notify(location), 1);
        assert_eq!(calls.get(), 1);
        assert_eq!(model.get("Count"), Some(Value::from(2)));
    }
}
