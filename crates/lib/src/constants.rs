//! Constants used throughout the Cosync library.
//!
//! This module provides central definitions for reserved keys in the shared
//! document root and other strings the library depends on.

/// Reserved root key holding the persisted collaborator roster.
pub const COLLABORATORS_MAP: &str = "collaborators:map";

/// Separator placed between the segments of a ModelDB path.
pub const PATH_SEPARATOR: &str = ".";

/// Resource id prefix handed out by the in-memory document provider.
pub const MEMORY_RESOURCE_PREFIX: &str = "memory:";
