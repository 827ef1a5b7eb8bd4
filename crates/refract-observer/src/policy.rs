use std::rc::Rc;

use refract_core::{Component, Instance, PolicyOrigin, UpdatePolicy, is_using_static_rendering};

use crate::shallow::{ShallowEq, shallow_equal};

/// Origin tag of the policy installed by `observer`.
pub const OBSERVER_POLICY: &str = "refract.observer.should_component_update";

/// Always updates on a new state value; updates on props only when they are
/// not shallow-equal. Returning `true` for shallow prop changes keeps the
/// usual update hooks firing.
pub fn observer_should_update<C: Component>(
    this: &Instance<C>,
    next_props: &Rc<C::Props>,
    next_state: &Rc<C::State>,
) -> bool
where
    C::Props: ShallowEq,
{
    if is_using_static_rendering() {
        log::warn!(
            "a re-render of {} was triggered while rendering statically; components should render only once in that mode",
            this.class().name()
        );
    }
    if !Rc::ptr_eq(&this.state(), next_state) {
        return true;
    }
    !shallow_equal(&this.props(), next_props)
}

pub fn observer_policy<C: Component>() -> UpdatePolicy<C>
where
    C::Props: ShallowEq,
{
    UpdatePolicy::new(
        PolicyOrigin::Tagged(OBSERVER_POLICY),
        observer_should_update::<C>,
    )
}
