//! # Atoms, Reactions, and Class Components
//!
//! `refract-core` is the ground floor Refract builds on. It has two halves
//! that know nothing about each other:
//!
//! - a small reactive engine: `Atom`, `Reaction`, `batch`, `untracked`,
//!   `allow_state_changes`, and the `Observable<T>` convenience cell;
//! - a host component runtime: `ComponentClass` templates, `Instance`s with
//!   a mount/update/unmount lifecycle, and `batched_updates`.
//!
//! `refract-observer` joins the two.
//!
//! ## Atoms and reactions
//!
//! An atom is a dependency cell with no value of its own. Reading code calls
//! `report_observed`, writing code calls `report_changed`:
//!
//! ```rust
//! use refract_core::*;
//! use std::{cell::Cell, rc::Rc};
//!
//! let atom = Atom::new("clicks");
//! let hits = Rc::new(Cell::new(0));
//! let reaction = Reaction::new("logger", {
//!     let hits = hits.clone();
//!     move || hits.set(hits.get() + 1)
//! });
//!
//! reaction.track(|| atom.report_observed());
//! atom.report_changed();
//! assert_eq!(hits.get(), 1);
//! ```
//!
//! A reaction is invalidated once per change and does not re-run its tracked
//! closure by itself; whoever owns it decides when to `track` again. Changes
//! made inside `batch` notify once, when the outermost batch ends.
//!
//! ## Class components
//!
//! ```rust
//! use refract_core::*;
//! use std::rc::Rc;
//!
//! struct Greeting;
//!
//! impl Component for Greeting {
//!     type Props = String;
//!     type State = ();
//!     type Output = String;
//! }
//!
//! let class = Rc::new(ComponentClass::<Greeting>::new("Greeting", |this| {
//!     Ok(format!("Hello, {}!", this.props()))
//! }));
//!
//! let instance = Instance::new(&class, Greeting, "Ada".to_string(), ());
//! instance.mount().unwrap();
//! assert_eq!(instance.output().as_deref(), Some("Hello, Ada!"));
//!
//! instance.receive_props("Grace".to_string()).unwrap();
//! assert_eq!(instance.output().as_deref(), Some("Hello, Grace!"));
//! ```
//!
//! The host always reassigns `props` and `state` through the class's property
//! accessors, even on a forced update and even when the update policy
//! declines to render. Wrappers rely on that to observe those writes.

pub mod component;
pub mod config;
pub mod error;
pub mod instance;
pub mod observable;
pub mod reactive;
pub mod scheduler;
pub mod slots;
pub mod static_rendering;

pub use component::*;
pub use config::{Config, config, configure};
pub use error::*;
pub use instance::*;
pub use observable::*;
pub use reactive::*;
pub use scheduler::{batched_updates, is_batching_updates};
pub use slots::*;
pub use static_rendering::*;
