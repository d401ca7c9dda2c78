use std::collections::HashMap;

use crate::models::{PendingInput, SizingKind};

/// Tracks, per conversation, an outstanding request for free-text input.
///
/// At most one request per conversation: a new menu action overwrites any
/// stale pending state (last request wins), and the next text message
/// consumes it whether or not it parses.
#[derive(Debug, Default)]
pub struct InputRouter {
    pending: HashMap<i64, PendingInput>,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next text from this chat is a sizing value of the given kind
    pub fn expect_sizing_value(&mut self, chat_id: i64, kind: SizingKind) {
        self.pending.insert(chat_id, PendingInput::SizingValue(kind));
    }

    /// The next text from this chat is a new pair symbol
    pub fn expect_pair(&mut self, chat_id: i64) {
        self.pending.insert(chat_id, PendingInput::Pair);
    }

    /// Consume the pending request, if any
    pub fn take(&mut self, chat_id: i64) -> Option<PendingInput> {
        self.pending.remove(&chat_id)
    }

    pub fn pending(&self, chat_id: i64) -> Option<PendingInput> {
        self.pending.get(&chat_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_by_default() {
        let mut router = InputRouter::new();
        assert_eq!(router.pending(1), None);
        assert_eq!(router.take(1), None);
    }

    #[test]
    fn test_take_consumes_exactly_once() {
        let mut router = InputRouter::new();
        router.expect_pair(1);

        assert_eq!(router.take(1), Some(PendingInput::Pair));
        assert_eq!(router.take(1), None);
    }

    #[test]
    fn test_new_request_overwrites_pending_sizing() {
        let mut router = InputRouter::new();
        router.expect_sizing_value(1, SizingKind::PercentOfBalance);
        // A change-pair request discards the sizing flow
        router.expect_pair(1);

        assert_eq!(router.take(1), Some(PendingInput::Pair));
        assert_eq!(router.take(1), None);
    }

    #[test]
    fn test_conversations_are_independent() {
        let mut router = InputRouter::new();
        router.expect_pair(1);
        router.expect_sizing_value(2, SizingKind::FixedQuote);

        assert_eq!(router.take(1), Some(PendingInput::Pair));
        assert_eq!(
            router.take(2),
            Some(PendingInput::SizingValue(SizingKind::FixedQuote))
        );
    }
}
