use std::marker::PhantomData;
use std::rc::Rc;

use refract_core::{Atom, Component, ComponentClass, PropertyAccessor, Slots};

use crate::hidden::{HiddenKey, hidden_flag, hidden_prop, set_hidden_prop};
use crate::observer_class::{IS_FORCING_UPDATE, SKIP_RENDER};
use crate::shallow::{ShallowEq, shallow_equal};

pub const OBSERVABLE_PROP_TAG: &str = "refract.observable_prop";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObservedProperty {
    Props,
    State,
}

impl ObservedProperty {
    pub fn name(self) -> &'static str {
        match self {
            ObservedProperty::Props => "props",
            ObservedProperty::State => "state",
        }
    }
}

/// Accessor that makes a component property reactive: reads report the
/// per-instance atom as observed, and writes that actually change the value
/// report it changed.
pub struct ObservableProperty<T> {
    name: &'static str,
    value_key: HiddenKey,
    atom_key: HiddenKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ShallowEq + 'static> ObservableProperty<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            value_key: HiddenKey::registered(&format!("reactProp_{name}_valueHolder")),
            atom_key: HiddenKey::registered(&format!("reactProp_{name}_atomHolder")),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The instance's atom for this property, created on first use.
    pub fn atom(&self, slots: &Slots) -> Atom {
        if let Some(atom) = hidden_prop::<Atom>(slots, &self.atom_key) {
            return atom;
        }
        let atom = Atom::new(format!("reactive {}", self.name));
        set_hidden_prop(slots, &self.atom_key, atom.clone());
        atom
    }
}

impl<T: ShallowEq + 'static> PropertyAccessor<T> for ObservableProperty<T> {
    fn tag(&self) -> Option<&'static str> {
        Some(OBSERVABLE_PROP_TAG)
    }

    fn get(&self, slots: &Slots) -> Option<Rc<T>> {
        self.atom(slots).report_observed();
        hidden_prop::<Rc<T>>(slots, &self.value_key)
    }

    fn set(&self, slots: &Slots, value: Rc<T>) {
        let current = hidden_prop::<Rc<T>>(slots, &self.value_key);
        let changed = current.is_none_or(|current| !shallow_equal(&current, &value));
        if !hidden_flag(slots, &IS_FORCING_UPDATE) && changed {
            set_hidden_prop(slots, &self.value_key, value);
            // the host renders right after assigning props/state itself
            set_hidden_prop(slots, &SKIP_RENDER, true);
            self.atom(slots).report_changed();
            set_hidden_prop(slots, &SKIP_RENDER, false);
        } else {
            set_hidden_prop(slots, &self.value_key, value);
        }
    }
}

/// Turns `property` of `class` into an observable property. Installing the
/// same property twice keeps the first installation.
pub fn install_observable_prop<C: Component>(
    class: &mut ComponentClass<C>,
    property: ObservedProperty,
) where
    C::Props: ShallowEq,
    C::State: ShallowEq,
{
    match property {
        ObservedProperty::Props => {
            if class.props_accessor().and_then(|a| a.tag()) != Some(OBSERVABLE_PROP_TAG) {
                class.define_props_property(Rc::new(ObservableProperty::<C::Props>::new(
                    property.name(),
                )));
            }
        }
        ObservedProperty::State => {
            if class.state_accessor().and_then(|a| a.tag()) != Some(OBSERVABLE_PROP_TAG) {
                class.define_state_property(Rc::new(ObservableProperty::<C::State>::new(
                    property.name(),
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refract_core::Reaction;
    use std::cell::Cell;
    use std::collections::BTreeMap;

    type Record = BTreeMap<&'static str, i32>;

    fn record(pairs: &[(&'static str, i32)]) -> Rc<Record> {
        Rc::new(pairs.iter().copied().collect())
    }

    fn watching(prop: &ObservableProperty<Record>, slots: &Slots) -> (Reaction, Rc<Cell<usize>>) {
        let hits = Rc::new(Cell::new(0));
        let reaction = Reaction::new("watcher", {
            let hits = hits.clone();
            move || hits.set(hits.get() + 1)
        });
        reaction.track(|| prop.get(slots));
        (reaction, hits)
    }

    #[test]
    fn test_read_creates_one_atom_lazily() {
        let slots = Slots::new();
        let prop = ObservableProperty::<Record>::new("props");
        assert!(slots.is_empty());

        assert!(prop.get(&slots).is_none());
        let atom = prop.atom(&slots);
        assert_eq!(atom.name(), "reactive props");
        assert_eq!(prop.atom(&slots).id(), atom.id());
    }

    #[test]
    fn test_shallow_equal_write_is_stored_silently() {
        let slots = Slots::new();
        let prop = ObservableProperty::<Record>::new("props");
        prop.set(&slots, record(&[("a", 1)]));
        let (_reaction, hits) = watching(&prop, &slots);

        let same = record(&[("a", 1)]);
        prop.set(&slots, same.clone());
        assert_eq!(hits.get(), 0);
        assert!(Rc::ptr_eq(&prop.get(&slots).unwrap(), &same));

        prop.set(&slots, record(&[("a", 2)]));
        assert_eq!(hits.get(), 1);
        prop.set(&slots, record(&[("a", 2), ("b", 0)]));
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_writes_while_forcing_update_never_notify() {
        let slots = Slots::new();
        let prop = ObservableProperty::<Record>::new("props");
        prop.set(&slots, record(&[("a", 1)]));
        let (_reaction, hits) = watching(&prop, &slots);

        set_hidden_prop(&slots, &IS_FORCING_UPDATE, true);
        prop.set(&slots, record(&[("z", 26)]));
        set_hidden_prop(&slots, &IS_FORCING_UPDATE, false);

        assert_eq!(hits.get(), 0);
        assert_eq!(prop.get(&slots).unwrap().get("z"), Some(&26));
    }

    #[test]
    fn test_skip_render_is_raised_only_during_notification() {
        let slots = Rc::new(Slots::new());
        let prop = ObservableProperty::<Record>::new("state");
        prop.set(&slots, record(&[]));

        let seen = Rc::new(Cell::new(None));
        let reaction = Reaction::new("probe", {
            let slots = slots.clone();
            let seen = seen.clone();
            move || seen.set(Some(hidden_flag(&slots, &SKIP_RENDER)))
        });
        reaction.track(|| prop.get(&slots));

        prop.set(&slots, record(&[("n", 1)]));
        assert_eq!(seen.get(), Some(true));
        assert!(!hidden_flag(&slots, &SKIP_RENDER));
    }

    #[test]
    fn test_each_slot_table_gets_its_own_atom() {
        let prop = ObservableProperty::<Record>::new("props");
        let a = Slots::new();
        let b = Slots::new();
        assert_ne!(prop.atom(&a).id(), prop.atom(&b).id());

        // a second installation shares the registered keys
        let again = ObservableProperty::<Record>::new("props");
        assert_eq!(again.atom(&a).id(), prop.atom(&a).id());
    }
}
