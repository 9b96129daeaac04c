pub mod session_store;

pub use session_store::{SESSION_COOKIE, SessionEntry, SessionStore};
