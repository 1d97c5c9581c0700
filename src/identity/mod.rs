//! Session bridge: identity attributes, session records and the store seam.
//! Keep the public surface thin and split implementation across sub-modules.

mod attributes;
mod store;

pub use attributes::IdentityAttributes;
pub use store::{new_session_id, MemorySessionStore, SessionRecord, SessionStore};
