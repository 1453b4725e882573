//! Storage Engine Module
//!
//! This module provides the shared key-value store and the per-key expiry
//! timers that enforce TTLs.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               StorageEngine                 │
//! │   Mutex<key → value, generation, timer>     │
//! └─────────────────────────────────────────────┘
//!              ▲                    │ arm / cancel
//!              │ fire(key, gen)     ▼
//!        ┌─────────────────────────────────┐
//!        │         ExpiryScheduler         │
//!        │   (one Tokio task per TTL key)  │
//!        └─────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use respkv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = StorageEngine::new();
//!
//! engine.set(Bytes::from("name"), Bytes::from("Ariz"), None);
//! assert_eq!(engine.get(b"name"), Some(Bytes::from("Ariz")));
//!
//! // Set with TTL
//! engine.set(
//!     Bytes::from("session"),
//!     Bytes::from("token123"),
//!     Some(Duration::from_secs(3600)),
//! );
//! assert!(engine.has_pending_expiry(b"session"));
//! # }
//! ```

pub mod engine;
pub mod expiry;

// Re-export commonly used types
pub use engine::{StorageEngine, StorageStats};
pub use expiry::{ExpiryHandle, ExpiryScheduler, Generation};
