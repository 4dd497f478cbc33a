//! CLI module for alignflow
//!
//! Each submodule owns one command family. Shared pieces: [`context`]
//! loads config, organization and engine; [`error`] turns failures into
//! actionable messages; [`output`] formats tables.

pub mod error;
pub mod output;

pub mod config;
pub mod context;

pub mod batch;
pub mod okr;
pub mod org;
pub mod queue;
