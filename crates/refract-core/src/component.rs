use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::RenderResult;
use crate::instance::Instance;
use crate::slots::Slots;

/// Type-level description of a class component.
///
/// The implementing type is the component's own instance data (its "fields");
/// `Props` come from the parent, `State` is owned by the instance and
/// `Output` is whatever render produces.
pub trait Component: Sized + 'static {
    type Props: 'static;
    type State: 'static;
    type Output: Clone + 'static;
}

pub type RenderFn<C> = Rc<dyn Fn(&Instance<C>) -> RenderResult<<C as Component>::Output>>;
pub type LifecycleFn<C> = Rc<dyn Fn(&Instance<C>)>;
pub type UpdateDecision<C> = Rc<
    dyn Fn(&Instance<C>, &Rc<<C as Component>::Props>, &Rc<<C as Component>::State>) -> bool,
>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassKind {
    Component,
    /// Skips updates whose props and state are the very same values as last
    /// time (pointer identity).
    Pure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    DidMount,
    DidUpdate,
    WillUnmount,
    /// Legacy hook. The host never calls it; it only exists so that wrappers
    /// can refuse classes that still define it.
    WillReact,
}

/// Who installed an update policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyOrigin {
    User,
    Tagged(&'static str),
}

/// The `should_component_update` hook, tagged with its origin so wrappers
/// can recognise their own installation.
pub struct UpdatePolicy<C: Component> {
    origin: PolicyOrigin,
    decide: UpdateDecision<C>,
}

impl<C: Component> Clone for UpdatePolicy<C> {
    fn clone(&self) -> Self {
        Self {
            origin: self.origin,
            decide: self.decide.clone(),
        }
    }
}

impl<C: Component> UpdatePolicy<C> {
    pub fn new(
        origin: PolicyOrigin,
        decide: impl Fn(&Instance<C>, &Rc<C::Props>, &Rc<C::State>) -> bool + 'static,
    ) -> Self {
        Self {
            origin,
            decide: Rc::new(decide),
        }
    }

    pub fn origin(&self) -> PolicyOrigin {
        self.origin
    }

    pub fn should_update(
        &self,
        this: &Instance<C>,
        next_props: &Rc<C::Props>,
        next_state: &Rc<C::State>,
    ) -> bool {
        (self.decide)(this, next_props, next_state)
    }
}

/// Intercepts reads and writes of an instance's `props` or `state`. Values
/// live wherever the accessor puts them, usually in the instance's slots.
pub trait PropertyAccessor<T>: 'static {
    /// Identifies the installer, so installing twice can be detected.
    fn tag(&self) -> Option<&'static str> {
        None
    }

    fn get(&self, slots: &Slots) -> Option<Rc<T>>;

    fn set(&self, slots: &Slots, value: Rc<T>);
}

struct HookSlot<C: Component> {
    method: Option<LifecycleFn<C>>,
    mixins: SmallVec<[(&'static str, LifecycleFn<C>); 2]>,
    locks: Cell<usize>,
}

impl<C: Component> Default for HookSlot<C> {
    fn default() -> Self {
        Self {
            method: None,
            mixins: SmallVec::new(),
            locks: Cell::new(0),
        }
    }
}

/// Template shared by every instance of a component.
///
/// Built with the `with_*` methods, optionally rewritten by a wrapper (render
/// replaced, hooks patched, properties intercepted), then frozen behind an
/// `Rc` before the first instance is created.
pub struct ComponentClass<C: Component> {
    name: String,
    display_name: Option<String>,
    kind: ClassKind,
    render: RenderFn<C>,
    update_policy: Option<UpdatePolicy<C>>,
    hooks: HashMap<Lifecycle, HookSlot<C>>,
    props_accessor: Option<Rc<dyn PropertyAccessor<C::Props>>>,
    state_accessor: Option<Rc<dyn PropertyAccessor<C::State>>>,
    markers: SmallVec<[&'static str; 2]>,
    is_injector: bool,
}

impl<C: Component> ComponentClass<C> {
    pub fn new(
        name: impl Into<String>,
        render: impl Fn(&Instance<C>) -> RenderResult<C::Output> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            kind: ClassKind::Component,
            render: Rc::new(render),
            update_policy: None,
            hooks: HashMap::new(),
            props_accessor: None,
            state_accessor: None,
            markers: SmallVec::new(),
            is_injector: false,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn pure(mut self) -> Self {
        self.kind = ClassKind::Pure;
        self
    }

    pub fn with_hook(mut self, hook: Lifecycle, f: impl Fn(&Instance<C>) + 'static) -> Self {
        self.hooks.entry(hook).or_default().method = Some(Rc::new(f));
        self
    }

    pub fn with_should_component_update(
        mut self,
        decide: impl Fn(&Instance<C>, &Rc<C::Props>, &Rc<C::State>) -> bool + 'static,
    ) -> Self {
        self.update_policy = Some(UpdatePolicy::new(PolicyOrigin::User, decide));
        self
    }

    /// Marks the class as produced by a store-injecting wrapper.
    pub fn injector(mut self) -> Self {
        self.is_injector = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    pub fn is_injector(&self) -> bool {
        self.is_injector
    }

    pub fn render(&self) -> RenderFn<C> {
        self.render.clone()
    }

    pub fn set_render(
        &mut self,
        render: impl Fn(&Instance<C>) -> RenderResult<C::Output> + 'static,
    ) {
        self.render = Rc::new(render);
    }

    pub fn update_policy(&self) -> Option<&UpdatePolicy<C>> {
        self.update_policy.as_ref()
    }

    pub fn set_update_policy(&mut self, policy: UpdatePolicy<C>) {
        self.update_policy = Some(policy);
    }

    /// Whether the class itself defines `hook` (mixins do not count).
    pub fn has_hook(&self, hook: Lifecycle) -> bool {
        self.hooks.get(&hook).is_some_and(|h| h.method.is_some())
    }

    /// Adds `mixin` to `hook`, to run after the class's own method. A mixin
    /// whose tag is already present is not added again; returns whether it
    /// was added.
    pub fn add_mixin(&mut self, hook: Lifecycle, tag: &'static str, mixin: LifecycleFn<C>) -> bool {
        let slot = self.hooks.entry(hook).or_default();
        if slot.mixins.iter().any(|(t, _)| *t == tag) {
            return false;
        }
        slot.mixins.push((tag, mixin));
        true
    }

    /// Calls the class's own method for `hook`, then its mixins. Mixins run
    /// only once the outermost call of a reentrant chain finishes, and they
    /// still run if the method panics.
    pub fn call_hook(&self, hook: Lifecycle, this: &Instance<C>) {
        let Some(slot) = self.hooks.get(&hook) else {
            return;
        };
        slot.locks.set(slot.locks.get() + 1);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            if let Some(method) = &slot.method {
                method(this);
            }
        }));
        slot.locks.set(slot.locks.get() - 1);
        if slot.locks.get() == 0 {
            for (_, mixin) in &slot.mixins {
                mixin(this);
            }
        }
        if let Err(payload) = result {
            panic::resume_unwind(payload);
        }
    }

    pub fn props_accessor(&self) -> Option<&Rc<dyn PropertyAccessor<C::Props>>> {
        self.props_accessor.as_ref()
    }

    pub fn state_accessor(&self) -> Option<&Rc<dyn PropertyAccessor<C::State>>> {
        self.state_accessor.as_ref()
    }

    pub fn define_props_property(&mut self, accessor: Rc<dyn PropertyAccessor<C::Props>>) {
        self.props_accessor = Some(accessor);
    }

    pub fn define_state_property(&mut self, accessor: Rc<dyn PropertyAccessor<C::State>>) {
        self.state_accessor = Some(accessor);
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| *m == marker)
    }

    pub fn mark(&mut self, marker: &'static str) {
        if !self.has_marker(marker) {
            self.markers.push(marker);
        }
    }
}

impl<C: Component> std::fmt::Debug for ComponentClass<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("kind", &self.kind)
            .field("update_policy", &self.update_policy.as_ref().map(|p| p.origin))
            .field("markers", &self.markers)
            .finish()
    }
}
