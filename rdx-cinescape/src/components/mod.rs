//! Contains the building blocks of the event model.
//!
//! This module provides the listener hubs (named events, dispatched per
//! instance and per class) and the breakpoint hubs (integer moments on a time
//! axis). Every entity in the crate is assembled from these components.

pub mod breakpoint;
pub mod listener;
pub(crate) mod table;
