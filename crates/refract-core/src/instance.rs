use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use crate::component::{ClassKind, Component, ComponentClass, Lifecycle};
use crate::config::config;
use crate::error::{RenderError, RenderResult};
use crate::scheduler::{self, PendingUpdate};
use crate::slots::Slots;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Constructed,
    Mounted,
    /// The unmount hook is running; updates are dropped.
    Unmounting,
    Unmounted,
}

/// Host-side record of what the instance was last given, independent of
/// whatever the instance's own `props`/`state` properties currently hold.
struct Fiber<C: Component> {
    props: Rc<C::Props>,
    state: Rc<C::State>,
}

/// One live occurrence of a component class.
pub struct Instance<C: Component> {
    class: Rc<ComponentClass<C>>,
    this: RefCell<C>,
    display_name: RefCell<Option<String>>,
    slots: Slots,
    fiber: RefCell<Fiber<C>>,
    props: RefCell<Option<Rc<C::Props>>>,
    state: RefCell<Option<Rc<C::State>>>,
    output: RefCell<Option<C::Output>>,
    last_error: RefCell<Option<RenderError>>,
    phase: Cell<Phase>,
    rendering: Cell<bool>,
    rerender_requested: Cell<bool>,
    queued: Cell<bool>,
    render_count: Cell<usize>,
    weak_self: Weak<Instance<C>>,
}

struct RenderingGuard<'a>(&'a Cell<bool>);

impl Drop for RenderingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<C: Component> Instance<C> {
    /// Constructs an instance without rendering it. Props and state are
    /// assigned through the class's property accessors.
    pub fn new(
        class: &Rc<ComponentClass<C>>,
        this: C,
        props: C::Props,
        state: C::State,
    ) -> Rc<Self> {
        let props = Rc::new(props);
        let state = Rc::new(state);
        let instance = Rc::new_cyclic(|weak_self| Instance {
            class: class.clone(),
            this: RefCell::new(this),
            display_name: RefCell::new(None),
            slots: Slots::new(),
            fiber: RefCell::new(Fiber {
                props: props.clone(),
                state: state.clone(),
            }),
            props: RefCell::new(None),
            state: RefCell::new(None),
            output: RefCell::new(None),
            last_error: RefCell::new(None),
            phase: Cell::new(Phase::Constructed),
            rendering: Cell::new(false),
            rerender_requested: Cell::new(false),
            queued: Cell::new(false),
            render_count: Cell::new(0),
            weak_self: weak_self.clone(),
        });
        instance.write_props(props);
        instance.write_state(state);
        instance
    }

    pub fn class(&self) -> &Rc<ComponentClass<C>> {
        &self.class
    }

    pub fn downgrade(&self) -> Weak<Self> {
        self.weak_self.clone()
    }

    pub fn component(&self) -> Ref<'_, C> {
        self.this.borrow()
    }

    pub fn component_mut(&self) -> RefMut<'_, C> {
        self.this.borrow_mut()
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    /// Instance-level name, if one was given.
    pub fn display_name(&self) -> Option<String> {
        self.display_name.borrow().clone()
    }

    pub fn set_display_name(&self, name: impl Into<String>) {
        *self.display_name.borrow_mut() = Some(name.into());
    }

    pub fn props(&self) -> Rc<C::Props> {
        let current = match self.class.props_accessor() {
            Some(accessor) => accessor.get(&self.slots),
            None => self.props.borrow().clone(),
        };
        current.unwrap_or_else(|| self.fiber.borrow().props.clone())
    }

    pub fn state(&self) -> Rc<C::State> {
        let current = match self.class.state_accessor() {
            Some(accessor) => accessor.get(&self.slots),
            None => self.state.borrow().clone(),
        };
        current.unwrap_or_else(|| self.fiber.borrow().state.clone())
    }

    /// Assigns the instance's `props` property. The host does this on every
    /// update pass, including forced ones.
    pub fn write_props(&self, props: Rc<C::Props>) {
        match self.class.props_accessor() {
            Some(accessor) => accessor.set(&self.slots, props),
            None => {
                let old = self.props.replace(Some(props));
                drop(old);
            }
        }
    }

    pub fn write_state(&self, state: Rc<C::State>) {
        match self.class.state_accessor() {
            Some(accessor) => accessor.set(&self.slots, state),
            None => {
                let old = self.state.replace(Some(state));
                drop(old);
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn is_mounted(&self) -> bool {
        self.phase.get() == Phase::Mounted
    }

    fn is_torn_down(&self) -> bool {
        matches!(self.phase.get(), Phase::Unmounting | Phase::Unmounted)
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering.get()
    }

    pub fn output(&self) -> Option<C::Output> {
        self.output.borrow().clone()
    }

    pub fn last_error(&self) -> Option<RenderError> {
        self.last_error.borrow().clone()
    }

    /// Number of completed (committed) renders.
    pub fn render_count(&self) -> usize {
        self.render_count.get()
    }

    fn label(&self) -> String {
        self.display_name()
            .or_else(|| self.class.display_name().map(str::to_owned))
            .unwrap_or_else(|| self.class.name().to_owned())
    }

    /// First render. A failed mount leaves the instance constructed, so it
    /// may be retried.
    pub fn mount(&self) -> RenderResult<()> {
        if self.phase.get() != Phase::Constructed {
            log::warn!("{} is already mounted or was unmounted", self.label());
            return Ok(());
        }
        self.render_and_commit()?;
        self.phase.set(Phase::Mounted);
        log::debug!("mounted {}", self.label());
        self.class.call_hook(Lifecycle::DidMount, self);
        Ok(())
    }

    /// Re-renders without consulting the update policy. Deferred while a
    /// batched-updates scope is open, and replayed after the current render
    /// if the instance is rendering right now.
    pub fn force_update(&self) -> RenderResult<()> {
        match self.phase.get() {
            Phase::Unmounting | Phase::Unmounted => {
                log::warn!("can't force an update of unmounted {}", self.label());
                return Ok(());
            }
            Phase::Constructed if !self.rendering.get() => {
                // nothing on screen yet; the pending mount will render anyway
                return Ok(());
            }
            _ => {}
        }
        if self.rendering.get() {
            self.rerender_requested.set(true);
            return Ok(());
        }
        if scheduler::is_batching_updates() {
            if !self.queued.replace(true) {
                if let Some(this) = self.weak_self.upgrade() {
                    scheduler::enqueue(this);
                }
            }
            return Ok(());
        }
        let (props, state) = self.memoized();
        self.update(props, state, true)
    }

    /// Parent re-rendered with `next` props.
    pub fn receive_props(&self, next: C::Props) -> RenderResult<()> {
        let state = self.fiber.borrow().state.clone();
        self.update(Rc::new(next), state, false)
    }

    pub fn set_state(&self, f: impl FnOnce(&C::State) -> C::State) -> RenderResult<()> {
        let (props, state) = self.memoized();
        let next = Rc::new(f(&state));
        self.update(props, next, false)
    }

    fn memoized(&self) -> (Rc<C::Props>, Rc<C::State>) {
        let fiber = self.fiber.borrow();
        (fiber.props.clone(), fiber.state.clone())
    }

    fn should_update(&self, next_props: &Rc<C::Props>, next_state: &Rc<C::State>) -> bool {
        if let Some(policy) = self.class.update_policy() {
            return policy.should_update(self, next_props, next_state);
        }
        match self.class.kind() {
            ClassKind::Component => true,
            ClassKind::Pure => {
                let fiber = self.fiber.borrow();
                !(Rc::ptr_eq(&fiber.props, next_props) && Rc::ptr_eq(&fiber.state, next_state))
            }
        }
    }

    fn update(
        &self,
        next_props: Rc<C::Props>,
        next_state: Rc<C::State>,
        forced: bool,
    ) -> RenderResult<()> {
        if self.is_torn_down() {
            log::warn!("can't update unmounted {}", self.label());
            return Ok(());
        }
        let should_update = forced || self.should_update(&next_props, &next_state);
        {
            let mut fiber = self.fiber.borrow_mut();
            fiber.props = next_props.clone();
            fiber.state = next_state.clone();
        }
        // assigned even when the update is skipped
        self.write_props(next_props);
        self.write_state(next_state);
        if !should_update {
            return Ok(());
        }
        if self.rendering.get() {
            self.rerender_requested.set(true);
            return Ok(());
        }
        self.render_and_commit()?;
        if self.phase.get() == Phase::Mounted {
            self.class.call_hook(Lifecycle::DidUpdate, self);
        }
        Ok(())
    }

    fn render_and_commit(&self) -> RenderResult<()> {
        let limit = config().max_update_depth;
        let mut passes = 0;
        loop {
            passes += 1;
            if passes > limit {
                self.rerender_requested.set(false);
                let err = RenderError::UpdateDepthExceeded {
                    component: self.label(),
                };
                log::error!("{err}");
                *self.last_error.borrow_mut() = Some(err.clone());
                return Err(err);
            }
            self.rerender_requested.set(false);
            let render = self.class.render();
            let rendered = {
                self.rendering.set(true);
                let _guard = RenderingGuard(&self.rendering);
                render(self)
            };
            match rendered {
                Ok(output) => {
                    let old = self.output.replace(Some(output));
                    drop(old);
                    *self.last_error.borrow_mut() = None;
                    self.render_count.set(self.render_count.get() + 1);
                }
                Err(err) => {
                    self.rerender_requested.set(false);
                    *self.last_error.borrow_mut() = Some(err.clone());
                    return Err(err);
                }
            }
            if !self.rerender_requested.get() {
                return Ok(());
            }
        }
    }

    /// Runs the unmount hook once; later calls are ignored. Updates requested
    /// by the hook itself are dropped.
    pub fn unmount(&self) {
        if self.is_torn_down() {
            log::debug!("{} is already unmounted", self.label());
            return;
        }
        self.phase.set(Phase::Unmounting);
        self.class.call_hook(Lifecycle::WillUnmount, self);
        self.phase.set(Phase::Unmounted);
        log::debug!("unmounted {}", self.label());
    }
}

impl<C: Component> PendingUpdate for Instance<C> {
    fn flush(&self) {
        self.queued.set(false);
        if self.is_torn_down() {
            return;
        }
        let (props, state) = self.memoized();
        if let Err(err) = self.update(props, state, true) {
            log::error!("batched update of {} failed: {err}", self.label());
        }
    }
}

impl<C: Component> std::fmt::Debug for Instance<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name())
            .field("phase", &self.phase.get())
            .field("render_count", &self.render_count.get())
            .finish()
    }
}
