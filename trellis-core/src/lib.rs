//! Trellis Core
//!
//! This crate provides the base layer for observable, validatable
//! view-models and the commands bound to them. It implements:
//!
//! - Change notification with dependency propagation between properties
//! - Commands whose executability follows view-model state
//! - Dirty tracking and read-only gating
//! - Per-property validation with aggregated errors
//! - Tri-state checked propagation for trees
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `notify`: properties, event lists and the change notifiers
//! - `graph`: the dependency graph, its closure cache and type descriptors
//! - `viewmodel`: the node every view-model embeds, plus observable collections
//! - `command`: synchronous and asynchronous commands
//! - `validation`: validators and the validation node
//! - `tree`: checked propagation across parent and children
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::graph::{PropertyDecl, TypeDescriptor};
//! use trellis_core::notify::Property;
//! use trellis_core::viewmodel::{ViewModel, ViewModelNode};
//!
//! struct Person {
//!     node: ViewModelNode,
//!     age: Property<u32>,
//! }
//!
//! static PERSON: OnceLock<TypeDescriptor> = OnceLock::new();
//! let descriptor = PERSON.get_or_init(|| {
//!     TypeDescriptor::builder("Person")
//!         .extends(ViewModelNode::descriptor())
//!         .property("Age", PropertyDecl::new())
//!         .property("IsAdult", PropertyDecl::new().depends_on(["Age"]))
//!         .build()
//! });
//!
//! let person = Person { node: ViewModelNode::new(descriptor), age: Property::new("Age", 0) };
//! person.node.property_changed().subscribe(|name: &str| println!("{name} changed"));
//!
//! person.node.set_property(&person.age, 18);
//! // Prints "Age changed", "IsAdult changed", "IsDirty changed"
//! ```

pub mod command;
pub mod error;
pub mod graph;
pub mod notify;
pub mod tree;
pub mod validation;
pub mod viewmodel;

pub use error::{Error, Result};
