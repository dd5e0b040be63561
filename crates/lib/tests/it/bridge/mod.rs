//! Bridge integration tests
//!
//! This module tests the string, list and map bridges against the in-memory
//! realtime primitives, plus undo/redo on top of the list bridge.

mod list_tests;
mod undo_tests;
