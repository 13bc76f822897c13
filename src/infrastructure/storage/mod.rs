//! Storage adapters for Ulasan.
//!
//! This module exposes the embedded sled-backed review table used in local mode.

pub mod sled_store;

pub use sled_store::SledReviewStore;
