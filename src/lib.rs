//! CityKiosk — a conversational catalog assistant.
//!
//! Users pick a city (by sharing coordinates or typing a name), browse a
//! catalog filtered by that city, and top up a balance; an administrator
//! moderates the catalog through the same chat surface.
//!
//! The two load-bearing subsystems are [`engine`] (the per-user conversation
//! state machine) and [`geo`] (city resolution with provider fallback and
//! caching). The chat transport itself is an external collaborator; [`chat`]
//! defines the event/response types it speaks and [`server`] exposes a thin
//! HTTP bridge for it.

pub mod chat;
pub mod config;
pub mod engine;
pub mod geo;
pub mod server;
pub mod store;
