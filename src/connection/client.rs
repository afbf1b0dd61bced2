//! Session handlers for connections accepted from Minecraft clients, one per
//! phase: handshake, status, login, initial connect and play.

pub mod handshake;
pub mod initial;
pub mod login;
pub mod play;
pub mod status;
