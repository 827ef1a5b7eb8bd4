use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotKey(u64);

impl SlotKey {
    pub const fn from_raw(raw: u64) -> Self {
        SlotKey(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Per-instance bookkeeping storage. Not part of a component's props or
/// state, never enumerated by the host, and invisible to render code unless
/// it holds the key.
#[derive(Default)]
pub struct Slots {
    map: RefCell<HashMap<SlotKey, Box<dyn Any>>>,
}

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Clone + 'static>(&self, key: SlotKey) -> Option<T> {
        self.map
            .borrow()
            .get(&key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Stores `value`, returning the previous occupant. The previous value is
    /// handed back rather than dropped under the borrow so that its `Drop`
    /// may touch these slots again.
    pub fn set<T: 'static>(&self, key: SlotKey, value: T) -> Option<Box<dyn Any>> {
        self.map.borrow_mut().insert(key, Box::new(value))
    }

    pub fn contains(&self, key: SlotKey) -> bool {
        self.map.borrow().contains_key(&key)
    }

    pub fn remove(&self, key: SlotKey) -> Option<Box<dyn Any>> {
        self.map.borrow_mut().remove(&key)
    }

    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }
}
