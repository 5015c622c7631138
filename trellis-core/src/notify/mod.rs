//! Change Notification
//!
//! This module implements the notification layers every view-model is built
//! on.
//!
//! # Concepts
//!
//! ## Properties
//!
//! A [`Property`] is the named backing field of an observable value. Writes
//! go through a notifier so that change events fire only when the value
//! actually differs.
//!
//! ## Change notifiers
//!
//! [`ChangeNotifier`] raises "changing" before the store and "changed" after
//! it. [`ComputedNotifier`] adds declared dependencies: a "changed" for
//! `Age` is followed by a "changed" for every property computed from `Age`,
//! directly or transitively.
//!
//! ## Events
//!
//! All surfaces are [`EventHandlers`] lists. Handlers are plain closures;
//! [`Subscription`] removes one when dropped.
//!
//! # Implementation Notes
//!
//! Notification is synchronous and expected to run on one logical thread.
//! State is still guarded by `parking_lot` locks so view-models can be shared
//! with async command executions, and no lock is held while handlers run.

mod computed;
mod event;
mod notifier;
mod property;

pub use computed::ComputedNotifier;
pub use event::{EventHandlers, SubscriberId, Subscription};
pub use notifier::ChangeNotifier;
pub use property::Property;
