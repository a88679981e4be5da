//! Offline-first state synchronization core for a PAUD report-card
//! application.
//!
//! - `model`: entities, keyed tables and the snapshot document
//! - `remote`: tabular remote store adapter (PostgREST) and its codecs
//! - `storage`: sled-backed local cache for the snapshot and session
//! - `sync`: the engine, confirmation gate, auditor and backup codec
//! - `report`: report-card data assembly
//! - `api`: HTTP and WebSocket surface

pub mod api;
pub mod config;
pub mod model;
pub mod remote;
pub mod report;
pub mod storage;
pub mod sync;
