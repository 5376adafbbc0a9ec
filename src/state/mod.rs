//! State management module
//!
//! This module handles all shelf state, including:
//! - The persisted project list (store.rs)
//! - Shared data structures (data.rs)
//! - The in-memory, sorted project collection (directory.rs)

pub mod data;
pub mod directory;
pub mod store;
