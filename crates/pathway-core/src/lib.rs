//! Core types and logic for the Pathway progress & gating engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! It holds the pure pieces — requirement evaluation, module progress
//! aggregation, sequential gating, path-document normalisation — plus
//! the [`store::ProgressStore`] trait that backends implement.

pub mod activity;
pub mod aggregate;
pub mod curriculum;
pub mod gate;
pub mod ordering;
pub mod path_doc;
pub mod policy;
pub mod requirement;
pub mod store;
