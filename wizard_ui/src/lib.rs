//! Wireframe Wizard web front end: host page, SSE event stream, and the
//! REST endpoints driving generation, preview, and persistence.

pub mod account;
pub mod config;
pub mod events;
pub mod generate;
pub mod page;
pub mod state;
