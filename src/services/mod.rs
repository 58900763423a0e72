//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the operations that span several components
//! (registry, layout engine, sandbox host, store) so route handlers can
//! stay focused on protocol translation.

pub mod catalog;
pub mod dashboard;
pub mod generation;
pub mod persistence;
