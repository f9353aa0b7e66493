//! Administrative client for the backup coordinator.
//!
//! ```text
//! flags + config file -> ResolvedOptions -> Connection -> dispatch -> RPC -> render
//!                                              ^
//!                                 CancellationBridge (Ctrl+C)
//! ```

pub mod cli;
pub mod client;
pub mod connection;
pub mod dispatch;
pub mod helpers;
pub mod instrumentation;
pub mod proto;
pub mod render;
