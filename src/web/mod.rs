//! Web server module for the team dashboard
//!
//! Provides the REST API and the SSE live stream.

mod api;
mod events;
mod server;

pub use server::{router, WebServer};
