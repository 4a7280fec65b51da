//! # Player Relay Server Library
//!
//! This library provides the relay that lets one host connection coordinate
//! any number of player connections in a multiplayer session. Players
//! register, signal readiness, and stream control input; the host is told
//! about every one of those events and can broadcast back to everyone.
//!
//! ## Core Responsibilities
//!
//! ### Connection Tracking
//! Every WebSocket connection gets a server-minted identifier the moment it
//! opens. Identifiers are never reused while the process runs.
//!
//! ### Role Assignment
//! A connection becomes the host or a client by sending a `register` frame.
//! There is exactly one host at a time; a later host registration replaces
//! the earlier one.
//!
//! ### Routing
//! Inbound frames are decoded into a tagged union and dispatched by their
//! `type` field:
//! - `register`: assign a role, announce new clients to the host
//! - `message`: relay the text to every other open connection
//! - `ready`: tell the host a registered player is ready
//! - `controls`: forward a registered player's input to the host
//!
//! ### Disconnect Handling
//! When a socket closes, the connection is pruned from the registry and the
//! host hears about departed clients.
//!
//! ## Architecture Design
//!
//! ### Single Owning Event Loop
//! The registry and host reference live inside one task. Connection tasks
//! talk to it over a channel, so frames are handled one at a time and a
//! registration can never interleave with a disconnect of the same host.
//!
//! ### Fire-and-Forget Delivery
//! Outbound frames are queued on each connection's unbounded outbox. A send
//! to a closed connection is skipped; nothing is retried and no error ever
//! goes back to the sender of a dropped frame.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! - Identifier minting and connection tracking
//! - Client registration and reverse lookup
//! - Host assignment
//!
//! ### Router Module (`router`)
//! - Frame decoding and dispatch
//! - Host notifications and message broadcast
//! - Disconnect propagation
//!
//! ### Network Module (`network`)
//! - TCP accept loop and WebSocket handshake
//! - Per-connection reader loop and writer task
//! - The owning server loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("0.0.0.0:8080").await?;
//!     let handle = server.handle();
//!
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         handle.shutdown();
//!     });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod registry;
pub mod router;
