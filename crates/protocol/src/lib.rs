//! Wire types for the llgate session API.
//!
//! This crate contains the serde-serializable bodies exchanged between the
//! chat front-end and the gateway's lifecycle endpoints. These types represent
//! the "protocol layer" - the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * Front-end compatible: Field names match what the browser client reads
//! * Stable: Changes only when the HTTP contract changes
//!
//! Session orchestration lives in `llgate`; the HTTP wiring lives in `llgate-server`.

pub mod lifecycle;

pub use lifecycle::*;
