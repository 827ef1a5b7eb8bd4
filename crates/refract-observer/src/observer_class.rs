use std::sync::LazyLock;

use refract_core::{
    ClassKind, Component, ComponentClass, Instance, Lifecycle, PolicyOrigin, Reaction,
    is_using_static_rendering,
};

use crate::error::ObserverError;
use crate::hidden::{HiddenKey, hidden_prop, set_hidden_prop};
use crate::observable_prop::{ObservedProperty, install_observable_prop};
use crate::patch::patch;
use crate::policy::{OBSERVER_POLICY, observer_policy};
use crate::reactive_render::{REACTION, make_component_reactive};
use crate::shallow::ShallowEq;

pub(crate) static IS_UNMOUNTED: LazyLock<HiddenKey> =
    LazyLock::new(|| HiddenKey::new("isUnmounted"));
pub(crate) static SKIP_RENDER: LazyLock<HiddenKey> = LazyLock::new(|| HiddenKey::new("skipRender"));
pub(crate) static IS_FORCING_UPDATE: LazyLock<HiddenKey> =
    LazyLock::new(|| HiddenKey::new("isForcingUpdate"));

/// Class marker set once render has been made reactive.
pub const OBSERVER_MARKER: &str = "refract.observer";
const DISPOSE_MIXIN: &str = "refract.observer.dispose";

/// Makes every instance of `class` re-render when observable data read by
/// its last render changes.
///
/// Fails if the class defines the legacy `WillReact` hook, or carries an
/// update policy that `observer` did not install (pure classes keep the
/// host's own check instead). Applying it again to an observed class is a
/// no-op.
pub fn make_class_component_observer<C: Component>(
    mut class: ComponentClass<C>,
) -> Result<ComponentClass<C>, ObserverError>
where
    C::Props: ShallowEq,
    C::State: ShallowEq,
{
    if class.has_hook(Lifecycle::WillReact) {
        return Err(ObserverError::LegacyHook {
            hook: "component_will_react",
        });
    }

    if class.kind() != ClassKind::Pure {
        match class.update_policy().map(|p| p.origin()) {
            None => class.set_update_policy(observer_policy()),
            Some(PolicyOrigin::Tagged(OBSERVER_POLICY)) => {}
            Some(_) => {
                return Err(ObserverError::UpdatePolicyConflict {
                    component: class.name().to_owned(),
                });
            }
        }
    }

    install_observable_prop(&mut class, ObservedProperty::Props);
    install_observable_prop(&mut class, ObservedProperty::State);

    if !class.has_marker(OBSERVER_MARKER) {
        let base_render = class.render();
        class.set_render(move |this| make_component_reactive(this, &base_render));
        class.mark(OBSERVER_MARKER);
    }

    patch(
        &mut class,
        Lifecycle::WillUnmount,
        DISPOSE_MIXIN,
        dispose_on_unmount::<C>,
    );
    Ok(class)
}

fn dispose_on_unmount<C: Component>(this: &Instance<C>) {
    if is_using_static_rendering() {
        return;
    }
    // an instance that never rendered has no reaction
    if let Some(reaction) = hidden_prop::<Reaction>(this.slots(), &REACTION) {
        reaction.dispose();
    }
    set_hidden_prop(this.slots(), &IS_UNMOUNTED, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hidden::hidden_flag;
    use crate::reactive_render::{on_dependency_changed, tracked_render};
    use refract_core::{Observable, RenderError};
    use std::cell::Cell;
    use std::rc::Rc;

    struct Ticker;

    impl Component for Ticker {
        type Props = ();
        type State = Observable<u32>;
        type Output = u32;
    }

    fn ticker_class() -> ComponentClass<Ticker> {
        ComponentClass::new("Ticker", |this: &Instance<Ticker>| Ok(this.state().get()))
    }

    fn mounted(class: ComponentClass<Ticker>, ticks: &Observable<u32>) -> Rc<Instance<Ticker>> {
        let class = Rc::new(class);
        let inst = Instance::new(&class, Ticker, (), ticks.clone());
        inst.mount().unwrap();
        inst
    }

    #[test]
    fn test_first_render_creates_one_named_reaction() {
        let ticks = Observable::new(0);
        let class = make_class_component_observer(ticker_class().with_display_name("Clock")).unwrap();
        let inst = mounted(class, &ticks);

        let tracked = tracked_render(&inst).unwrap();
        assert_eq!(tracked.reaction().name(), "Clock.render()");
        assert!(!tracked.is_pending());
        assert!(!hidden_flag(inst.slots(), &SKIP_RENDER));
        assert!(!hidden_flag(inst.slots(), &IS_FORCING_UPDATE));

        ticks.set(1);
        ticks.set(2);
        let again = tracked_render(&inst).unwrap();
        assert!(Rc::ptr_eq(&tracked, &again));
        assert_eq!(inst.output(), Some(2));
    }

    #[test]
    fn test_reaction_name_prefers_the_instance_name() {
        let ticks = Observable::new(0);
        let class = Rc::new(
            make_class_component_observer(ticker_class().with_display_name("Clock")).unwrap(),
        );
        let inst = Instance::new(&class, Ticker, (), ticks.clone());
        inst.set_display_name("Alarm");
        inst.mount().unwrap();
        assert_eq!(
            tracked_render(&inst).unwrap().reaction().name(),
            "Alarm.render()"
        );

        let anonymous = ComponentClass::new("", |this: &Instance<Ticker>| Ok(this.state().get()));
        let inst = mounted(make_class_component_observer(anonymous).unwrap(), &ticks);
        assert_eq!(
            tracked_render(&inst).unwrap().reaction().name(),
            "<component>.render()"
        );
    }

    #[test]
    fn test_stale_handler_after_unmount_is_ignored() {
        let ticks = Observable::new(0);
        let inst = mounted(make_class_component_observer(ticker_class()).unwrap(), &ticks);
        let tracked = tracked_render(&inst).unwrap();

        inst.unmount();
        assert!(tracked.reaction().is_disposed());
        assert!(hidden_flag(inst.slots(), &IS_UNMOUNTED));

        on_dependency_changed(&inst.downgrade(), &Cell::new(false));
        ticks.set(5);
        assert_eq!(inst.render_count(), 1);
    }

    #[test]
    fn test_pending_flag_coalesces_until_the_next_render() {
        let ticks = Observable::new(0);
        let inst = mounted(make_class_component_observer(ticker_class()).unwrap(), &ticks);
        let pending = Cell::new(true);

        on_dependency_changed(&inst.downgrade(), &pending);
        assert_eq!(inst.render_count(), 1);

        pending.set(false);
        on_dependency_changed(&inst.downgrade(), &pending);
        assert!(pending.get());
        assert_eq!(inst.render_count(), 2);
    }

    #[test]
    fn test_failing_forced_update_disposes_without_propagating() {
        let _ = env_logger::builder().is_test(true).try_init();
        let ticks = Observable::new(0);
        let class = ComponentClass::new("Fragile", |this: &Instance<Ticker>| {
            let n = this.state().get();
            if n >= 3 {
                Err(RenderError::new("too many ticks"))
            } else {
                Ok(n)
            }
        });
        let inst = mounted(make_class_component_observer(class).unwrap(), &ticks);
        let tracked = tracked_render(&inst).unwrap();

        ticks.set(3);
        assert!(tracked.reaction().is_disposed());
        assert!(hidden_flag(inst.slots(), &IS_UNMOUNTED));
        assert_eq!(inst.last_error(), Some(RenderError::new("too many ticks")));

        ticks.set(1);
        assert_eq!(inst.output(), Some(0));
    }

    #[test]
    fn test_panicking_forced_update_is_contained() {
        let _ = env_logger::builder().is_test(true).try_init();
        let ticks = Observable::new(0);
        let class = ComponentClass::new("Panicky", |this: &Instance<Ticker>| {
            let n = this.state().get();
            assert!(n < 2, "tick overflow");
            Ok(n)
        });
        let inst = mounted(make_class_component_observer(class).unwrap(), &ticks);

        ticks.set(2);
        assert!(tracked_render(&inst).unwrap().reaction().is_disposed());
        assert!(!inst.is_rendering());
    }

    #[test]
    fn test_unmount_keeps_the_class_hook() {
        let calls = Rc::new(Cell::new(0));
        let class = ticker_class().with_hook(Lifecycle::WillUnmount, {
            let calls = calls.clone();
            move |_| calls.set(calls.get() + 1)
        });
        let ticks = Observable::new(0);
        let inst = mounted(make_class_component_observer(class).unwrap(), &ticks);

        inst.unmount();
        assert_eq!(calls.get(), 1);
        assert!(hidden_flag(inst.slots(), &IS_UNMOUNTED));
    }

    #[test]
    fn test_legacy_hook_is_rejected() {
        let class = ticker_class().with_hook(Lifecycle::WillReact, |_| {});
        assert_eq!(
            make_class_component_observer(class).unwrap_err(),
            ObserverError::LegacyHook {
                hook: "component_will_react"
            }
        );
    }

    #[test]
    fn test_pure_classes_keep_the_host_check() {
        let class = make_class_component_observer(ticker_class().pure()).unwrap();
        assert!(class.update_policy().is_none());
        assert!(class.has_marker(OBSERVER_MARKER));
    }
}
