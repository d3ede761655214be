//! Setup for the main tracker application.
//!
//! The [`app::setup`] function builds the tracker from its configuration and
//! collaborators; [`jobs`] contains the starters for the long-running
//! services.
pub mod app;
pub mod jobs;
pub mod tracing;
