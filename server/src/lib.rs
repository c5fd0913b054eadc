//! # Game Server Library
//!
//! This library provides the authoritative server implementation for the
//! emoji-story party game. Players gather in rooms, write short stories for
//! randomly drawn emoji combinations, and then guess which combination and
//! which author belong to each anonymized story. The server owns every room,
//! applies all rules, and pushes phase updates to the connected clients.
//!
//! ## Core Responsibilities
//!
//! ### Room Lifecycle
//! Rooms are created with a six-character code, filled in the lobby, and then
//! driven through the game phases by the host:
//! - Lobby: players join and the roster is broadcast
//! - Writing: each player gets a secret emoji combination and a deadline
//! - Guessing: stories are redistributed so nobody reviews their own
//! - Results: the reveal feed is stepped through under host control
//! - Leaderboard: cumulative scores and per-player justifications
//!
//! ### Round Engine
//! All guessing and scoring rules live in pure functions over plain data:
//! combination drawing, the derangement that assigns stories to guessers,
//! decoy option generation, and the point awards with their human-readable
//! justifications.
//!
//! ### Session Coordination
//! The network layer accepts TCP connections, frames packets, and funnels
//! everything a connection does into one coordination loop. Disconnects are
//! observed there too, so a vanished host tears the room down and everyone
//! left inside is told.
//!
//! ## Architecture Design
//!
//! ### Single-Writer Coordination Loop
//! One task owns the room registry and processes connection events
//! sequentially. Completion checks ("did the last story just arrive?") are
//! therefore atomic without any locking, and handlers can be freely
//! re-entered with duplicate or stale packets.
//!
//! ### Effects Instead of I/O
//! Room operations never touch a socket. They return the set of packets to
//! deliver and what to do with the room's writing-deadline timer; the
//! coordination loop performs those effects. Tests drive entire games
//! through the same entry points without any networking.
//!
//! ### TCP-Based Communication
//! Packets travel over TCP as length-prefixed bincode frames. Phase changes
//! are pushed by the server; clients only ever send intents and never learn
//! another player's secrets from the wire.
//!
//! ## Module Organization
//!
//! ### Catalog Module (`catalog`)
//! The emoji catalog the game draws from, with names for log lines.
//!
//! ### Assignment Module (`assignment`)
//! Random combination drawing, story-to-guesser assignment (a cyclic
//! derangement when everyone wrote, uniform picks otherwise), and decoy
//! guess options.
//!
//! ### Scoring Module (`scoring`)
//! Turns a finished guessing phase into score deltas, justification entries,
//! and the reveal feed.
//!
//! ### Room Module (`room`)
//! A single room's state machine: phase transitions, submissions, host
//! controls, and departure handling.
//!
//! ### Registry Module (`registry`)
//! All live rooms, code allocation, and the connection-to-room seating map.
//!
//! ### Network Module (`network`)
//! TCP listener, per-connection reader/writer tasks, packet framing, the
//! coordination loop, and the writing-deadline timers.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bind the listener; rooms get a three-minute writing phase.
//!     let mut server = Server::new(
//!         "127.0.0.1:3000",
//!         Duration::from_secs(180),
//!     ).await?;
//!
//!     // Run the coordination loop - this:
//!     // - Accepts connections and spawns their reader/writer tasks
//!     // - Applies every intent to the room registry in arrival order
//!     // - Delivers the resulting packets and manages deadline timers
//!     // - Cleans up rooms when their connections go away
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Security Considerations
//!
//! ### Input Validation
//! Every intent is validated against the sender's seat and the room's phase
//! before it is applied. Out-of-phase or non-host requests get an error
//! packet back; packets referencing rooms the sender never joined are
//! dropped.
//!
//! ### Information Hiding
//! Guessing-phase packets carry only the anonymized story, the option list,
//! and the candidate roster. The correct combination and the author identity
//! stay on the server until the results phase reveals them to everyone at
//! once.

pub mod assignment;
pub mod catalog;
pub mod network;
pub mod registry;
pub mod room;
pub mod scoring;
