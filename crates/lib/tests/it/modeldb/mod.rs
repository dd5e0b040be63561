//! ModelDB integration tests
//!
//! This module tests the document store: factory calls served from memory,
//! the move to the network document once it loads, views and teardown.

pub mod helpers;
mod lifecycle;
mod store_operations;
