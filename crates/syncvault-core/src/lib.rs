//! SyncVault Core - Domain types, ports and configuration
//!
//! This crate contains the pieces every other SyncVault crate agrees on:
//! - **Domain entities** - `SyncProfile`, `ProfileStatus`, `SyncResult`, `CancellationHandle`
//! - **Port definitions** - `LogSink` and `ProgressSink`, the boundaries the sync
//!   core reports through
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module performs no filesystem I/O. Adapters and the sync
//! engine live in `syncvault-sync`; the CLI driver lives in `syncvault-cli`.

pub mod config;
pub mod domain;
pub mod ports;
