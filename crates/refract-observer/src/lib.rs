//! # Observer
//!
//! `refract-observer` makes class components re-render when observable data
//! they read during their last render changes. It sits between the reactive
//! engine and the component runtime of `refract-core`, and only talks to them
//! through their public surface.
//!
//! Wrapping a class with [`observer()`]:
//!
//! - rejects the legacy `WillReact` hook and any user update policy;
//! - installs an update policy that compares props shallowly;
//! - turns `props` and `state` into observable properties, so assigning a
//!   different value notifies whatever read it;
//! - replaces render with a tracked render owning one reaction per instance;
//! - disposes that reaction when the instance unmounts.
//!
//! ```rust
//! use refract_core::{Component, ComponentClass, Instance, Observable};
//! use refract_observer::observer;
//! use std::rc::Rc;
//!
//! struct Counter;
//!
//! impl Component for Counter {
//!     type Props = ();
//!     type State = Observable<u32>;
//!     type Output = String;
//! }
//!
//! let class = ComponentClass::<Counter>::new("Counter", |this| {
//!     Ok(format!("count: {}", this.state().get()))
//! });
//! let class = Rc::new(observer(class).unwrap());
//!
//! let count = Observable::new(0);
//! let instance = Instance::new(&class, Counter, (), count.clone());
//! instance.mount().unwrap();
//!
//! count.set(1);
//! assert_eq!(instance.output().as_deref(), Some("count: 1"));
//! assert_eq!(instance.render_count(), 2);
//!
//! instance.unmount();
//! count.set(2);
//! assert_eq!(instance.render_count(), 2);
//! ```
//!
//! A change notifies at most once until the next render: notifications
//! arriving while a re-render is already queued (see
//! [`refract_core::batched_updates`]) are dropped.

pub mod error;
pub mod hidden;
pub mod observable_prop;
pub mod observer;
pub mod observer_class;
pub mod patch;
pub mod policy;
pub mod reactive_render;
pub mod shallow;

pub use error::*;
pub use hidden::*;
pub use observable_prop::{
    OBSERVABLE_PROP_TAG, ObservableProperty, ObservedProperty, install_observable_prop,
};
pub use observer::*;
pub use observer_class::{OBSERVER_MARKER, make_class_component_observer};
pub use patch::patch;
pub use policy::{OBSERVER_POLICY, observer_policy, observer_should_update};
pub use reactive_render::make_component_reactive;
pub use shallow::*;
