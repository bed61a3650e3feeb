//! Core types and trait definitions for the Axiom reasoning store.
//!
//! This crate is deliberately free of database and filesystem dependencies.
//! It defines the four record kinds, their field-level validation, the
//! invariant engine that guards every write, and the read-side query layer.
//! Storage backends implement [`store::ReasoningStore`].

pub mod assumption;
pub mod decision;
pub mod entity;
pub mod error;
pub mod evidence;
pub mod intent;
pub mod invariant;
pub mod policy;
pub mod query;
pub mod store;
pub mod validate;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
