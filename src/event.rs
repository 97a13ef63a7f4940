//! The per-dispatch event handle.

use tokio_util::sync::CancellationToken;

/// Handed to every middleware alongside the exchange.
///
/// Cancellation belongs to the surrounding runtime: it cancels the token when
/// the client goes away or a deadline passes. The engine stops at the next
/// stage boundary and drops the middleware future that is in flight.
/// Long-running middleware may also watch [`Event::cancelled`] directly.
#[derive(Debug, Clone, Default)]
pub struct Event {
    token: CancellationToken,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ties this event to a token owned by the caller.
    pub fn with_token(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn token(&self) -> &CancellationToken { &self.token }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the event is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
