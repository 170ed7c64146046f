//! teamscope: read-only dashboard backend for agent teams.
//!
//! The aggregation engine and live channels live in `teamscope-core`; this
//! crate adds configuration, the HTTP/SSE surface and the binary.

pub mod config;
pub mod shutdown;
pub mod web;
