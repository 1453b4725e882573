//! Connection Handler Module
//!
//! This module manages individual client connections. Each client
//! connection is handled by its own async task; connections share nothing
//! except the store behind their [`CommandHandler`](crate::commands::CommandHandler).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept() + spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler (async I/O)               │
//! │                                                             │
//! │   ┌───────────────────────────────────────────────────┐     │
//! │   │               Session (no I/O)                    │     │
//! │   │  ByteBuffer ──> RespParser ──> CommandHandler     │     │
//! │   │                                      │            │     │
//! │   │                          RespValue::serialize_into│     │
//! │   └───────────────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use respkv::connection::{handle_connection, ConnectionStats};
//! use respkv::commands::CommandHandler;
//! use respkv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = CommandHandler::new(storage);
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler, stats));
//! ```

pub mod handler;
pub mod session;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
pub use session::{ProtocolHandler, Session};
