//! # Lectern Memory
//!
//! Conversation history keyed by session id.
//!
//! The outer map is only write-locked to create a session; each session's
//! transcript sits behind its own mutex, so traffic on one session never
//! waits on another. Transcripts are append-only. What the LLM sees is always
//! a bounded window cut from the tail, never a mutation of the stored history.

pub mod session;

pub use session::{SessionStore, format_history};
