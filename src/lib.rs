//! # respkv - A Minimal RESP Key-Value Server
//!
//! respkv speaks the Redis Serialization Protocol (RESP) over TCP and keeps
//! binary-safe string keys and values in memory. Keys may carry a time to
//! live; each one gets its own timer, and overwriting a key cancels the
//! timer armed by the previous write.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                              respkv                              │
//! │                                                                  │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐           │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │           │
//! │  │ (Listener)  │    │  Session    │    │  Handler    │           │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘           │
//! │                            │                  │                  │
//! │                            ▼                  ▼                  │
//! │                     ┌─────────────┐    ┌─────────────────────┐   │
//! │                     │ ByteBuffer  │    │   StorageEngine     │   │
//! │                     │ RespParser  │    │   Mutex<HashMap>    │   │
//! │                     └─────────────┘    └──────────┬──────────┘   │
//! │                                                   │ arm/cancel   │
//! │                                        ┌──────────▼──────────┐   │
//! │                                        │  ExpiryScheduler    │   │
//! │                                        │  (task per TTL key) │   │
//! │                                        └─────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use respkv::commands::CommandHandler;
//! use respkv::connection::{handle_connection, ConnectionStats};
//! use respkv::storage::StorageEngine;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(StorageEngine::new());
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         let handler = CommandHandler::new(Arc::clone(&storage));
//!         tokio::spawn(handle_connection(stream, addr, handler, Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING [message]`
//! - `ECHO message`
//! - `SET key value [EX seconds | PX milliseconds]`
//! - `GET key`
//!
//! Every other command is acknowledged with `+OK`.
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP values, receive buffer and incremental decoder
//! - [`storage`]: Shared store and per-key expiry timers
//! - [`commands`]: Request dispatch and command errors
//! - [`connection`]: Per-client session and async connection driver

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ByteBuffer, ParseError, RespParser, RespValue};
pub use storage::StorageEngine;

/// The default port respkv listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host respkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of respkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
