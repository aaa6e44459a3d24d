//! Modules layer - adapters for the external collaborators
//!
//! The relational store with realtime change feed, and object storage.

pub mod backend;
pub mod storage;
