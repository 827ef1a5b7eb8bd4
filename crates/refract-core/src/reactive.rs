use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::config::config;
use crate::error::panic_message;

new_key_type! {
    pub struct AtomId;
    pub struct ReactionId;
}

thread_local! {
    static GRAPH: RefCell<DepGraph> = RefCell::new(DepGraph::default());
}

#[derive(Default)]
struct DepGraph {
    atoms: SlotMap<AtomId, AtomNode>,
    reactions: SlotMap<ReactionId, ReactionNode>,
    // innermost frame last; `None` marks an untracked section
    tracking: Vec<Frame>,
    batch_depth: usize,
    pending: Vec<ReactionId>,
    running_reactions: bool,
    forbid_state_changes: bool,
}

struct AtomNode {
    name: String,
    observers: SmallVec<[ReactionId; 4]>,
}

struct ReactionNode {
    name: String,
    observing: SmallVec<[AtomId; 8]>,
    on_invalidate: Rc<dyn Fn()>,
    scheduled: bool,
}

struct Frame {
    reaction: Option<ReactionId>,
    observed: SmallVec<[AtomId; 8]>,
}

impl DepGraph {
    fn remove_reaction(&mut self, id: ReactionId) -> Option<ReactionNode> {
        let node = self.reactions.remove(id)?;
        for atom in &node.observing {
            if let Some(a) = self.atoms.get_mut(*atom) {
                a.observers.retain(|r| *r != id);
            }
        }
        self.pending.retain(|r| *r != id);
        Some(node)
    }

    fn remove_atom(&mut self, id: AtomId) -> Option<AtomNode> {
        let node = self.atoms.remove(id)?;
        for reaction in &node.observers {
            if let Some(r) = self.reactions.get_mut(*reaction) {
                r.observing.retain(|a| *a != id);
            }
        }
        Some(node)
    }

    fn bind_dependencies(&mut self, id: ReactionId, observed: SmallVec<[AtomId; 8]>) {
        let Some(node) = self.reactions.get_mut(id) else {
            // disposed while tracking
            return;
        };
        let previous = std::mem::replace(&mut node.observing, observed.clone());
        for atom in previous {
            if observed.contains(&atom) {
                continue;
            }
            if let Some(a) = self.atoms.get_mut(atom) {
                a.observers.retain(|r| *r != id);
            }
        }
        for atom in observed {
            match self.atoms.get_mut(atom) {
                Some(a) if !a.observers.contains(&id) => a.observers.push(id),
                Some(_) => {}
                None => {
                    if let Some(node) = self.reactions.get_mut(id) {
                        node.observing.retain(|a| *a != atom);
                    }
                }
            }
        }
    }
}

fn start_batch() {
    GRAPH.with(|g| g.borrow_mut().batch_depth += 1);
}

fn end_batch() {
    let run = GRAPH.with(|g| {
        let mut g = g.borrow_mut();
        g.batch_depth = g.batch_depth.saturating_sub(1);
        g.batch_depth == 0 && !g.running_reactions
    });
    if run {
        run_pending_reactions();
    }
}

fn run_pending_reactions() {
    GRAPH.with(|g| g.borrow_mut().running_reactions = true);
    let limit = config().max_reaction_iterations;
    let mut iterations = 0;
    loop {
        let batch = GRAPH.with(|g| std::mem::take(&mut g.borrow_mut().pending));
        if batch.is_empty() {
            break;
        }
        iterations += 1;
        if iterations > limit {
            log::error!(
                "reactions did not converge after {limit} iterations; dropping {} pending reaction(s)",
                batch.len()
            );
            GRAPH.with(|g| {
                let mut g = g.borrow_mut();
                for id in batch {
                    if let Some(node) = g.reactions.get_mut(id) {
                        node.scheduled = false;
                    }
                }
            });
            break;
        }
        for id in batch {
            run_reaction(id);
        }
    }
    GRAPH.with(|g| g.borrow_mut().running_reactions = false);
}

fn run_reaction(id: ReactionId) {
    let callback = GRAPH.with(|g| {
        let mut g = g.borrow_mut();
        let node = g.reactions.get_mut(id)?;
        node.scheduled = false;
        Some((node.on_invalidate.clone(), node.name.clone()))
    });
    let Some((on_invalidate, name)) = callback else {
        return;
    };
    start_batch();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| on_invalidate())) {
        log::error!(
            "uncaught panic in reaction '{name}': {}",
            panic_message(payload.as_ref())
        );
    }
    end_batch();
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            GRAPH.with(|g| {
                let mut g = g.borrow_mut();
                g.batch_depth = g.batch_depth.saturating_sub(1);
            });
        } else {
            end_batch();
        }
    }
}

/// Runs `f` as one transaction: reactions invalidated inside run once, after
/// the outermost batch ends.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    start_batch();
    let _guard = BatchGuard;
    f()
}

/// Runs `f` without recording any reads into the enclosing tracking scope.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    GRAPH.with(|g| {
        g.borrow_mut().tracking.push(Frame {
            reaction: None,
            observed: SmallVec::new(),
        })
    });
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    GRAPH.with(|g| g.borrow_mut().tracking.pop());
    match result {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}

struct StateChangesGuard(bool);

impl Drop for StateChangesGuard {
    fn drop(&mut self) {
        GRAPH.with(|g| g.borrow_mut().forbid_state_changes = self.0);
    }
}

/// Runs `f` with state changes allowed or disallowed. A disallowed change is
/// still applied, but logged.
pub fn allow_state_changes<R>(allow: bool, f: impl FnOnce() -> R) -> R {
    let previous = GRAPH.with(|g| {
        let mut g = g.borrow_mut();
        std::mem::replace(&mut g.forbid_state_changes, !allow)
    });
    let _guard = StateChangesGuard(previous);
    f()
}

/// Minimal dependency cell: knows who read it and tells them when it changed.
#[derive(Clone)]
pub struct Atom(Rc<AtomHandle>);

struct AtomHandle {
    id: AtomId,
}

impl Atom {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = GRAPH.with(|g| {
            g.borrow_mut().atoms.insert(AtomNode {
                name,
                observers: SmallVec::new(),
            })
        });
        Self(Rc::new(AtomHandle { id }))
    }

    pub fn id(&self) -> AtomId {
        self.0.id
    }

    pub fn name(&self) -> String {
        GRAPH.with(|g| {
            g.borrow()
                .atoms
                .get(self.0.id)
                .map(|a| a.name.clone())
                .unwrap_or_default()
        })
    }

    /// Registers the innermost tracking reaction as a reader. Returns whether
    /// a reaction was tracking.
    pub fn report_observed(&self) -> bool {
        let id = self.0.id;
        GRAPH.with(|g| {
            let mut g = g.borrow_mut();
            match g.tracking.last_mut() {
                Some(Frame {
                    reaction: Some(_),
                    observed,
                }) => {
                    if !observed.contains(&id) {
                        observed.push(id);
                    }
                    true
                }
                _ => false,
            }
        })
    }

    /// Schedules every current reader. Readers run when the outermost batch
    /// ends, which for a lone write is before this call returns.
    pub fn report_changed(&self) {
        let id = self.0.id;
        start_batch();
        let _guard = BatchGuard;
        GRAPH.with(|g| {
            let mut g = g.borrow_mut();
            let g = &mut *g;
            let Some(atom) = g.atoms.get(id) else {
                return;
            };
            if g.forbid_state_changes {
                log::warn!(
                    "'{}' changed while state changes are not allowed (side effect in render?)",
                    atom.name
                );
            }
            for reaction in atom.observers.iter() {
                if let Some(node) = g.reactions.get_mut(*reaction) {
                    if !node.scheduled {
                        node.scheduled = true;
                        g.pending.push(*reaction);
                    }
                }
            }
        });
    }

    pub fn observer_count(&self) -> usize {
        GRAPH.with(|g| {
            g.borrow()
                .atoms
                .get(self.0.id)
                .map_or(0, |a| a.observers.len())
        })
    }
}

impl Drop for AtomHandle {
    fn drop(&mut self) {
        let removed = GRAPH
            .try_with(|g| g.try_borrow_mut().ok().and_then(|mut g| g.remove_atom(self.id)))
            .ok()
            .flatten();
        drop(removed);
    }
}

impl std::fmt::Debug for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atom")
            .field("name", &self.name())
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// A trackable computation. `track` records the atoms read by its closure;
/// when any of them changes, `on_invalidate` is called. The reaction does not
/// re-track by itself.
#[derive(Clone)]
pub struct Reaction(Rc<ReactionHandle>);

struct ReactionHandle {
    id: ReactionId,
    name: String,
}

impl Reaction {
    pub fn new(name: impl Into<String>, on_invalidate: impl Fn() + 'static) -> Self {
        let name = name.into();
        let id = GRAPH.with(|g| {
            g.borrow_mut().reactions.insert(ReactionNode {
                name: name.clone(),
                observing: SmallVec::new(),
                on_invalidate: Rc::new(on_invalidate),
                scheduled: false,
            })
        });
        log::debug!("created reaction '{name}'");
        Self(Rc::new(ReactionHandle { id, name }))
    }

    pub fn id(&self) -> ReactionId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_disposed(&self) -> bool {
        GRAPH.with(|g| !g.borrow().reactions.contains_key(self.0.id))
    }

    /// Runs `f` and makes the atoms it read the reaction's dependencies,
    /// replacing the previous set. Dependencies read before a panic are
    /// kept. On a disposed reaction `f` runs untracked.
    pub fn track<R>(&self, f: impl FnOnce() -> R) -> R {
        let id = self.0.id;
        if self.is_disposed() {
            return untracked(f);
        }
        start_batch();
        let _guard = BatchGuard;
        GRAPH.with(|g| {
            g.borrow_mut().tracking.push(Frame {
                reaction: Some(id),
                observed: SmallVec::new(),
            })
        });
        let result = panic::catch_unwind(AssertUnwindSafe(f));
        GRAPH.with(|g| {
            let mut g = g.borrow_mut();
            if let Some(frame) = g.tracking.pop() {
                g.bind_dependencies(id, frame.observed);
            }
        });
        match result {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Permanent. Safe to call any number of times.
    pub fn dispose(&self) {
        let removed = GRAPH.with(|g| g.borrow_mut().remove_reaction(self.0.id));
        if removed.is_some() {
            log::debug!("disposed reaction '{}'", self.0.name);
        }
        drop(removed);
    }

    pub fn dependency_count(&self) -> usize {
        GRAPH.with(|g| {
            g.borrow()
                .reactions
                .get(self.0.id)
                .map_or(0, |r| r.observing.len())
        })
    }
}

impl Drop for ReactionHandle {
    fn drop(&mut self) {
        let removed = GRAPH
            .try_with(|g| {
                g.try_borrow_mut()
                    .ok()
                    .and_then(|mut g| g.remove_reaction(self.id))
            })
            .ok()
            .flatten();
        drop(removed);
    }
}

impl std::fmt::Debug for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reaction")
            .field("name", &self.0.name)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counting_reaction(name: &str) -> (Reaction, Rc<Cell<usize>>) {
        let hits = Rc::new(Cell::new(0));
        let reaction = Reaction::new(name, {
            let hits = hits.clone();
            move || hits.set(hits.get() + 1)
        });
        (reaction, hits)
    }

    #[test]
    fn test_tracked_read_is_notified_on_change() {
        let atom = Atom::new("a");
        let (reaction, hits) = counting_reaction("r");

        let observed = reaction.track(|| atom.report_observed());
        assert!(observed);
        assert_eq!(atom.observer_count(), 1);

        atom.report_changed();
        assert_eq!(hits.get(), 1);

        // still subscribed until it re-tracks or is disposed
        atom.report_changed();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_reads_outside_tracking_are_ignored() {
        let atom = Atom::new("a");
        assert!(!atom.report_observed());

        let (reaction, hits) = counting_reaction("r");
        reaction.track(|| untracked(|| atom.report_observed()));
        atom.report_changed();
        assert_eq!(hits.get(), 0);
        assert_eq!(reaction.dependency_count(), 0);
    }

    #[test]
    fn test_batch_coalesces_notifications() {
        let a = Atom::new("a");
        let b = Atom::new("b");
        let (reaction, hits) = counting_reaction("r");
        reaction.track(|| {
            a.report_observed();
            b.report_observed();
        });

        batch(|| {
            a.report_changed();
            b.report_changed();
            a.report_changed();
            assert_eq!(hits.get(), 0);
        });
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_retracking_drops_stale_dependencies() {
        let a = Atom::new("a");
        let b = Atom::new("b");
        let (reaction, hits) = counting_reaction("r");

        reaction.track(|| a.report_observed());
        reaction.track(|| b.report_observed());

        a.report_changed();
        assert_eq!(hits.get(), 0);
        b.report_changed();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_dispose_is_idempotent_and_final() {
        let atom = Atom::new("a");
        let (reaction, hits) = counting_reaction("r");
        reaction.track(|| atom.report_observed());

        reaction.dispose();
        reaction.dispose();
        assert!(reaction.is_disposed());
        assert_eq!(atom.observer_count(), 0);

        atom.report_changed();
        assert_eq!(hits.get(), 0);

        // tracking a disposed reaction still runs the closure, untracked
        let ran = reaction.track(|| {
            atom.report_observed();
            true
        });
        assert!(ran);
        assert_eq!(atom.observer_count(), 0);
    }

    #[test]
    fn test_dependencies_read_before_a_panic_are_kept() {
        let atom = Atom::new("a");
        let (reaction, hits) = counting_reaction("r");

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            reaction.track(|| {
                atom.report_observed();
                panic!("boom");
            })
        }));
        assert!(result.is_err());

        atom.report_changed();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_panicking_reaction_does_not_starve_others() {
        let _ = env_logger::builder().is_test(true).try_init();
        let atom = Atom::new("a");
        let bad = Reaction::new("bad", || panic!("bad reaction"));
        let (good, hits) = counting_reaction("good");
        bad.track(|| atom.report_observed());
        good.track(|| atom.report_observed());

        atom.report_changed();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_changes_made_by_a_reaction_are_picked_up_in_the_same_flush() {
        let a = Atom::new("a");
        let b = Atom::new("b");
        let (downstream, hits) = counting_reaction("downstream");
        downstream.track(|| b.report_observed());

        let upstream = Reaction::new("upstream", {
            let b = b.clone();
            move || b.report_changed()
        });
        upstream.track(|| a.report_observed());

        a.report_changed();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_dropping_the_last_handle_disposes() {
        let atom = Atom::new("a");
        let (reaction, _hits) = counting_reaction("r");
        reaction.track(|| atom.report_observed());
        assert_eq!(atom.observer_count(), 1);
        drop(reaction);
        assert_eq!(atom.observer_count(), 0);
    }
}
