//! Session key helpers.
//!
//! The session stores two things: a stable per-session lock key and the id
//! of the persisted quote. Everything else about the quote lives behind
//! the Commerce Engine.

use stonefruit_core::QuoteId;
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::Result;

/// Session keys used by the cart API.
pub mod session_keys {
    /// Stable key the per-session quote lock hangs off.
    pub const LOCK_KEY: &str = "cart.lock_key";
    /// Id of the session's persisted quote.
    pub const QUOTE_ID: &str = "cart.quote_id";
}

/// Get or create the session's stable lock key.
pub async fn lock_key(session: &Session) -> Result<Uuid> {
    if let Some(key) = session.get::<Uuid>(session_keys::LOCK_KEY).await? {
        return Ok(key);
    }
    let key = Uuid::new_v4();
    session.insert(session_keys::LOCK_KEY, key).await?;
    Ok(key)
}

/// Get the quote id recorded against the session.
pub async fn quote_id(session: &Session) -> Result<Option<QuoteId>> {
    Ok(session.get::<QuoteId>(session_keys::QUOTE_ID).await?)
}

/// Record the persisted quote id against the session.
pub async fn set_quote_id(session: &Session, id: QuoteId) -> Result<()> {
    session.insert(session_keys::QUOTE_ID, id).await?;
    Ok(())
}
