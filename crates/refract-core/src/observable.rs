use std::cell::RefCell;
use std::rc::Rc;

use crate::reactive::Atom;

/// A value paired with its own atom: `get` reports a read, `set` reports a
/// change. Cloning shares the value.
pub struct Observable<T: 'static>(Rc<Inner<T>>);

struct Inner<T> {
    atom: Atom,
    value: RefCell<T>,
}

impl<T: 'static> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self::named("observable", value)
    }

    pub fn named(name: impl Into<String>, value: T) -> Self {
        Self(Rc::new(Inner {
            atom: Atom::new(name),
            value: RefCell::new(value),
        }))
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.0.atom.report_observed();
        self.0.value.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.0.atom.report_observed();
        f(&self.0.value.borrow())
    }

    pub fn set(&self, v: T) {
        let old = std::mem::replace(&mut *self.0.value.borrow_mut(), v);
        drop(old);
        self.0.atom.report_changed();
    }

    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        f(&mut self.0.value.borrow_mut());
        self.0.atom.report_changed();
    }

    pub fn atom(&self) -> &Atom {
        &self.0.atom
    }

    /// Whether both handles share one value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Observable").field(&self.0.value.borrow()).finish()
    }
}

pub fn observable<T: 'static>(value: T) -> Observable<T> {
    Observable::new(value)
}
