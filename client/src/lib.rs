//! # Relay Client Library
//!
//! Async client for the player relay. It speaks the same JSON frames as a
//! browser host or controller page, which makes it handy for scripted hosts,
//! bots, and end-to-end tests.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::RelayClient;
//! use shared::PlayerProfile;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), client::network::ClientError> {
//! let mut host = RelayClient::connect("ws://127.0.0.1:8080").await?;
//! host.register_host().await?;
//!
//! let mut player = RelayClient::connect("ws://127.0.0.1:8080").await?;
//! player.register_client(PlayerProfile::named("Alice")).await?;
//!
//! let joined = host.expect_envelope(Duration::from_secs(1)).await?;
//! assert_eq!(joined.player_name(), Some("Alice"));
//! # Ok(())
//! # }
//! ```

pub mod network;
