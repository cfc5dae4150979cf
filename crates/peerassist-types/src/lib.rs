//! Types shared between the PeerAssist store, API handlers and server.

pub mod api;
pub mod events;
pub mod models;
