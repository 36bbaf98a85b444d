//! Plain data shared between crates.

pub mod chat;
pub mod document;
pub mod search;
pub mod session;

pub use chat::*;
pub use document::*;
pub use search::*;
pub use session::*;
