use std::rc::Rc;

use refract_core::{Component, ComponentClass, Instance, Lifecycle};

/// Makes `mixin` run after the class's own `hook`, leaving that method in
/// place. Patching twice with the same tag is a no-op; returns whether the
/// mixin was added.
pub fn patch<C: Component>(
    class: &mut ComponentClass<C>,
    hook: Lifecycle,
    tag: &'static str,
    mixin: impl Fn(&Instance<C>) + 'static,
) -> bool {
    let added = class.add_mixin(hook, tag, Rc::new(mixin));
    if !added {
        log::debug!("{}: {hook:?} already patched with '{tag}'", class.name());
    }
    added
}
