//! # MolKit Base Library
//!
//! Foundational value and parameter infrastructure for the MolKit cheminformatics
//! toolkit: dynamically typed property storage and hierarchical control-parameter
//! resolution, independent of any chemical data model.
//!
//! ## Architectural Philosophy
//!
//! The crate is built bottom-up from three small, tightly coupled tiers:
//!
//! - **Identity.** [`key::UniqueKey`] provides process-wide unique, nameable,
//!   cheaply comparable identifiers. Every stored value in the toolkit is
//!   addressed by one of these keys, declared once per domain via
//!   [`define_unique_keys!`].
//!
//! - **Values.** [`value::AnyValue`] is a reference-counted, type-checked box
//!   for a single value of arbitrary type. Copies share the underlying storage;
//!   typed extraction is verified against the exact runtime type.
//!
//! - **Containers.** [`properties::PropertyContainer`] maps keys to values for
//!   plain per-object property storage. [`params::ControlParameterList`] layers
//!   parent-delegated lookup and live change notification on top of the same
//!   key/value model, so that behavioral settings resolve through a tree of
//!   contexts. [`controllable::Controllable`] packages a parameter list behind
//!   a forwarding interface for composition-style embedding.
//!
//! Higher layers of the toolkit (file-format readers and writers, molecular
//! data structures, binding layers) consume this crate; it has no knowledge
//! of them.

pub mod controllable;
pub mod error;
pub mod key;
pub mod params;
pub mod properties;
pub mod value;
