//! # rioc
//!
//! Client-side runtime for the RIOC wire protocol: point operations
//! (GET/INSERT/DELETE/ATOMIC_INC_DEC), ordered range scans, and pipelined
//! batches over a single TCP connection, optionally wrapped in TLS 1.3.
//!
//! ## Features
//! - **Single-op and batch APIs**: point ops are a one-op batch executed
//!   synchronously; [`batch::Batch`] pipelines up to 128 ops in one
//!   vectored write.
//! - **Async batch execution**: [`tracker::Tracker`] runs a background
//!   completer that parses responses in submission order and publishes
//!   progress through atomics.
//! - **TLS 1.3**: peer verification, hostname/IP SAN checks, and depth
//!   limiting via `rustls`.

pub mod batch;
pub mod capi;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod io;
pub mod protocol;
pub mod result;
pub mod single_op;
pub mod tls;
pub mod tracker;

pub use batch::Batch;
pub use client::Client;
pub use config::{ClientConfig, TlsConfig};
pub use error::{RiocError, RiocResult};
pub use result::{free_range_results, RangeResult};
pub use tracker::{SlotResponse, Tracker};
