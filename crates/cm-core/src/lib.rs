//! Core types and trait definitions for the company manager.
//!
//! Entities, wire models, the copy contract between them, the predicate
//! compiler and the storage session abstraction. This crate has no HTTP or
//! database dependencies; every other crate builds on it.

// Native `async fn` in traits; the public traits spell out `Send` futures.
#![allow(async_fn_in_trait)]

pub mod entity;
pub mod error;
pub mod identity;
pub mod model;
pub mod predicate;
pub mod session;
pub mod shape;

pub use error::{Error, Result};
