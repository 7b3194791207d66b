//! Listkeep: per-user todo lists and items over a relational store, with a
//! cache-aside hash cache in front of the reads.

pub mod auth;
pub mod cache;
pub mod context;
pub mod db;
pub mod error;
pub mod server;
pub mod service;
pub mod types;

pub use context::RequestContext;
pub use error::{Error, Result};
