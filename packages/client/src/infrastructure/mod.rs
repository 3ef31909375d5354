//! Adapters to the outside world: wire DTOs, relay transport, health probes
//! and a simulated player.

pub mod dto;
pub mod health;
pub mod player;
pub mod transport;
