//! Quote synchronization: the single load and commit point.
//!
//! Every handler goes through [`QuoteSynchronizer`]; no other component
//! persists the quote. Load and save both run the same email
//! reconciliation so the `customer_email == billing.email` invariant holds
//! whichever side was written last, and an emptied cart forcibly discards
//! cached per-address totals before the engine recomputes.

use std::sync::Arc;

use tower_sessions::Session;

use crate::engine::CommerceEngine;
use crate::error::Result;
use crate::model::Quote;
use crate::session;

/// Loads and commits the session's quote through the Commerce Engine.
pub struct QuoteSynchronizer {
    engine: Arc<dyn CommerceEngine>,
}

impl QuoteSynchronizer {
    #[must_use]
    pub fn new(engine: Arc<dyn CommerceEngine>) -> Self {
        Self { engine }
    }

    /// Fetch the session's active quote, creating one when absent, and
    /// reconcile emails.
    pub async fn load(&self, session: &Session) -> Result<Quote> {
        let stored = match session::quote_id(session).await? {
            Some(id) => self.engine.load_quote(id)?.filter(|quote| quote.is_active),
            None => None,
        };

        let mut quote = match stored {
            Some(quote) => quote,
            None => self.engine.create_quote()?,
        };

        reconcile_email(&mut quote);
        Ok(quote)
    }

    /// Commit the quote: reconcile emails, mark rates for re-collection,
    /// defend against stale empty-cart totals, collect totals, persist, and
    /// record the id against the session.
    pub async fn save(&self, session: &Session, quote: &mut Quote) -> Result<()> {
        reconcile_email(quote);

        quote.shipping_address.collect_shipping_rates = true;

        if quote.items_count() == 0 {
            // An empty cart must never serve cached non-zero totals.
            quote.billing_address.cached_totals = None;
            quote.shipping_address.cached_totals = None;
            quote.totals_collected = false;
        }

        self.engine.collect_totals(quote)?;
        self.engine.save_quote(quote)?;

        session::set_quote_id(session, quote.id).await?;
        Ok(())
    }
}

/// Three-way email reconciliation.
///
/// Whichever side is missing is derived from the other; when both are set
/// and differ, billing is authoritative. Applying this twice is a no-op.
pub fn reconcile_email(quote: &mut Quote) {
    match (
        quote.customer_email.clone(),
        quote.billing_address.email.clone(),
    ) {
        (Some(quote_email), None) => {
            quote.billing_address.email = Some(quote_email);
        }
        (None, Some(billing_email)) => {
            quote.customer_email = Some(billing_email);
        }
        (Some(quote_email), Some(billing_email)) if quote_email != billing_email => {
            quote.customer_email = Some(billing_email);
        }
        _ => {}
    }
}
