//! Dependency Graph
//!
//! This module holds the static and per-instance halves of the property
//! dependency graph.
//!
//! # Overview
//!
//! - [`TypeDescriptor`] is the static half: declarations written once per
//!   view-model type ("`IsAdult` depends on `Age`", "`Notes` does not affect
//!   the dirty flag").
//!
//! - [`NotificationCache`] is the per-instance half: the edges registered
//!   from those declarations plus memoized transitive closures.
//!
//! Edges point from a notifying property to the properties computed from it.
//! The graph is allowed to contain cycles; closure computation truncates
//! them.

mod cache;
mod descriptor;

pub use cache::NotificationCache;
pub use descriptor::{Exemption, PropertyDecl, TypeDescriptor, TypeDescriptorBuilder};
