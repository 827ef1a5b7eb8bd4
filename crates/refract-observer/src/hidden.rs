use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use refract_core::{SlotKey, Slots};

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);
static REGISTRY: LazyLock<Mutex<HashMap<String, u64>>> = LazyLock::new(Default::default);

/// Key of a hidden instance slot. Hidden slots never show up as props or
/// state and cannot be reached without the key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HiddenKey {
    slot: SlotKey,
    description: Arc<str>,
}

impl HiddenKey {
    /// A fresh key, distinct from every other key even with the same
    /// description.
    pub fn new(description: &str) -> Self {
        Self {
            slot: SlotKey::from_raw(NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed)),
            description: Arc::from(description),
        }
    }

    /// The process-wide key registered under `description`; every call with
    /// the same description returns the same key.
    pub fn registered(description: &str) -> Self {
        let raw = *REGISTRY
            .lock()
            .entry(description.to_owned())
            .or_insert_with(|| NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed));
        Self {
            slot: SlotKey::from_raw(raw),
            description: Arc::from(description),
        }
    }

    pub fn slot(&self) -> SlotKey {
        self.slot
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

pub fn set_hidden_prop<T: 'static>(target: &Slots, key: &HiddenKey, value: T) {
    let previous = target.set(key.slot, value);
    drop(previous);
}

pub fn hidden_prop<T: Clone + 'static>(target: &Slots, key: &HiddenKey) -> Option<T> {
    target.get(key.slot)
}

/// A boolean slot; unset reads as `false`.
pub fn hidden_flag(target: &Slots, key: &HiddenKey) -> bool {
    hidden_prop::<bool>(target, key).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_keys_never_collide() {
        let a = HiddenKey::new("flag");
        let b = HiddenKey::new("flag");
        assert_ne!(a.slot(), b.slot());
        assert_eq!(a.description(), "flag");
    }

    #[test]
    fn test_registered_keys_are_shared() {
        let a = HiddenKey::registered("hidden-test-key");
        let b = HiddenKey::registered("hidden-test-key");
        assert_eq!(a, b);
        assert_ne!(a.slot(), HiddenKey::new("hidden-test-key").slot());
    }

    #[test]
    fn test_slots_hold_typed_values() {
        let slots = Slots::new();
        let flag = HiddenKey::new("flag");
        let name = HiddenKey::new("name");

        assert!(!hidden_flag(&slots, &flag));
        set_hidden_prop(&slots, &flag, true);
        set_hidden_prop(&slots, &name, String::from("Counter"));
        assert!(hidden_flag(&slots, &flag));
        assert_eq!(hidden_prop::<String>(&slots, &name).as_deref(), Some("Counter"));

        // wrong type reads as absent
        assert_eq!(hidden_prop::<u32>(&slots, &name), None);

        set_hidden_prop(&slots, &flag, false);
        assert!(!hidden_flag(&slots, &flag));
        assert_eq!(slots.len(), 2);
    }
}
