use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::LazyLock;

use refract_core::{
    Component, Instance, Reaction, RenderFn, RenderResult, allow_state_changes,
    is_using_static_rendering, panic_message,
};

use crate::hidden::{HiddenKey, hidden_flag, hidden_prop, set_hidden_prop};
use crate::observer_class::{IS_FORCING_UPDATE, IS_UNMOUNTED, SKIP_RENDER};

/// The instance's render reaction.
pub(crate) static REACTION: LazyLock<HiddenKey> = LazyLock::new(|| HiddenKey::new("reaction"));
static TRACKED_RENDER: LazyLock<HiddenKey> = LazyLock::new(|| HiddenKey::new("trackedRender"));

/// Per-instance tracking state, built on the first render.
pub(crate) struct TrackedRender<C: Component> {
    reaction: Reaction,
    base_render: RenderFn<C>,
    pending: Rc<Cell<bool>>,
}

impl<C: Component> TrackedRender<C> {
    fn install(this: &Instance<C>, base_render: RenderFn<C>) -> Rc<Self> {
        let slots = this.slots();
        set_hidden_prop(slots, &SKIP_RENDER, false);
        set_hidden_prop(slots, &IS_FORCING_UPDATE, false);

        let name = debug_name(this);
        let pending = Rc::new(Cell::new(false));
        let reaction = Reaction::new(format!("{name}.render()"), {
            let instance = this.downgrade();
            let pending = pending.clone();
            move || on_dependency_changed(&instance, &pending)
        });
        set_hidden_prop(slots, &REACTION, reaction.clone());

        let tracked = Rc::new(TrackedRender {
            reaction,
            base_render,
            pending,
        });
        set_hidden_prop(slots, &TRACKED_RENDER, tracked.clone());
        tracked
    }

    fn render(&self, this: &Instance<C>) -> RenderResult<C::Output> {
        self.pending.set(false);
        let outcome = self.reaction.track(|| {
            panic::catch_unwind(AssertUnwindSafe(|| {
                allow_state_changes(false, || (self.base_render)(this))
            }))
        });
        match outcome {
            Ok(rendering) => rendering,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.get()
    }

    #[cfg(test)]
    pub(crate) fn reaction(&self) -> &Reaction {
        &self.reaction
    }
}

/// Render entry point installed on observed classes.
pub fn make_component_reactive<C: Component>(
    this: &Instance<C>,
    base_render: &RenderFn<C>,
) -> RenderResult<C::Output> {
    if is_using_static_rendering() {
        return base_render(this);
    }
    let tracked = match tracked_render::<C>(this) {
        Some(tracked) => tracked,
        None => TrackedRender::install(this, base_render.clone()),
    };
    tracked.render(this)
}

pub(crate) fn tracked_render<C: Component>(this: &Instance<C>) -> Option<Rc<TrackedRender<C>>> {
    hidden_prop::<Rc<TrackedRender<C>>>(this.slots(), &TRACKED_RENDER)
}

fn debug_name<C: Component>(this: &Instance<C>) -> String {
    let class = this.class();
    this.display_name()
        .or_else(|| class.display_name().map(str::to_owned))
        .or_else(|| (!class.name().is_empty()).then(|| class.name().to_owned()))
        .unwrap_or_else(|| "<component>".to_owned())
}

pub(crate) fn on_dependency_changed<C: Component>(
    instance: &Weak<Instance<C>>,
    pending: &Cell<bool>,
) {
    if pending.get() {
        return;
    }
    pending.set(true);
    let Some(this) = instance.upgrade() else {
        return;
    };
    let slots = this.slots();
    if hidden_flag(slots, &IS_UNMOUNTED) {
        return;
    }

    set_hidden_prop(slots, &IS_FORCING_UPDATE, true);
    let outcome = if hidden_flag(slots, &SKIP_RENDER) {
        Ok(Ok(()))
    } else {
        panic::catch_unwind(AssertUnwindSafe(|| this.force_update()))
    };
    set_hidden_prop(slots, &IS_FORCING_UPDATE, false);

    let failure = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };
    log::error!(
        "{}: forced update failed, component stops reacting: {failure}",
        debug_name(&this)
    );
    if let Some(reaction) = hidden_prop::<Reaction>(slots, &REACTION) {
        reaction.dispose();
    }
    set_hidden_prop(slots, &IS_UNMOUNTED, true);
}
