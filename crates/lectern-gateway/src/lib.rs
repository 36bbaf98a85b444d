//! # Lectern Gateway
//!
//! Thin HTTP front for the query engine.
//!
//! ```text
//! POST /api/query          {query, session_id?}  → {answer, sources, session_id}
//! POST /api/clear-session  {session_id}          → {success, message}
//! GET  /api/courses                              → catalogue statistics
//! GET  /api/health                               → liveness + provider status
//! ```

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
