//! Subscription Tracking
//!
//! Domain state for symbol subscriptions on the streaming connection.
//!
//! # Design
//!
//! A symbol requested by the application moves through two disjoint sets:
//!
//! - `pending`: requested but not yet sent on the wire (the connection may
//!   be down or still settling after open)
//! - `confirmed`: subscribe directive sent while connected
//!
//! Invariant: `pending ∩ confirmed = ∅` between operations; every symbol is
//! in at most one of the two sets at any observable instant. Requesting a
//! symbol that is already tracked is a no-op, which keeps subscribe
//! idempotent and prevents duplicate wire messages.
//!
//! The set is owned by the connection actor and mutated only from its task,
//! so it is a plain struct with no interior locking.

use std::collections::HashSet;

use crate::domain::streaming::Symbol;

/// Pending/confirmed subscription state for one streaming connection.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionSet {
    /// Requested, not yet sent on the wire.
    pending: HashSet<Symbol>,
    /// Subscribe directive sent while connected.
    confirmed: HashSet<Symbol>,
}

impl SubscriptionSet {
    /// Create an empty subscription set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request subscriptions for `symbols`.
    ///
    /// Symbols already pending or confirmed are skipped. Returns the symbols
    /// that were newly added to `pending`; an empty return means the whole
    /// request was a no-op.
    pub fn request<I>(&mut self, symbols: I) -> Vec<Symbol>
    where
        I: IntoIterator<Item = Symbol>,
    {
        let mut added = Vec::new();
        for symbol in symbols {
            if self.confirmed.contains(&symbol) || self.pending.contains(&symbol) {
                continue;
            }
            self.pending.insert(symbol.clone());
            added.push(symbol);
        }
        added
    }

    /// Drain `pending` into `confirmed`, returning the symbols flushed.
    ///
    /// Called when the connection sends the subscribe directives; the caller
    /// is responsible for actually putting them on the wire.
    pub fn take_pending(&mut self) -> Vec<Symbol> {
        let flushed: Vec<Symbol> = self.pending.drain().collect();
        for symbol in &flushed {
            self.confirmed.insert(symbol.clone());
        }
        flushed
    }

    /// Move all confirmed symbols back into `pending`.
    ///
    /// Soft-disconnect semantics: the wire subscriptions are gone with the
    /// transport, so confirmed symbols are demoted and re-sent after the
    /// next successful connect.
    pub fn demote_confirmed(&mut self) {
        for symbol in self.confirmed.drain() {
            self.pending.insert(symbol);
        }
    }

    /// Stop tracking `symbols`.
    ///
    /// Returns the subset that was confirmed; those need an unsubscribe
    /// directive on the wire; pending symbols are simply forgotten.
    pub fn remove(&mut self, symbols: &[Symbol]) -> Vec<Symbol> {
        let mut was_confirmed = Vec::new();
        for symbol in symbols {
            self.pending.remove(symbol);
            if self.confirmed.remove(symbol) {
                was_confirmed.push(symbol.clone());
            }
        }
        was_confirmed
    }

    /// Drop a symbol from `confirmed` after the upstream rejected it.
    ///
    /// Returns whether the symbol was tracked as confirmed.
    pub fn reject(&mut self, symbol: &str) -> bool {
        self.confirmed.remove(symbol)
    }

    /// Clear confirmed subscriptions only (hard disconnect keeps pending
    /// when `clear_pending` is false).
    pub fn clear_confirmed(&mut self) {
        self.confirmed.clear();
    }

    /// Clear both sets.
    pub fn clear_all(&mut self) {
        self.pending.clear();
        self.confirmed.clear();
    }

    /// Whether any symbols are waiting to be flushed.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether the symbol is tracked in either set.
    #[must_use]
    pub fn is_tracked(&self, symbol: &str) -> bool {
        self.pending.contains(symbol) || self.confirmed.contains(symbol)
    }

    /// Snapshot of the pending set.
    #[must_use]
    pub fn pending(&self) -> Vec<Symbol> {
        self.pending.iter().cloned().collect()
    }

    /// Snapshot of the confirmed set.
    #[must_use]
    pub fn confirmed(&self) -> Vec<Symbol> {
        self.confirmed.iter().cloned().collect()
    }

    /// Number of tracked symbols across both sets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len() + self.confirmed.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.confirmed.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(ToString::to_string).collect()
    }

    fn assert_disjoint(set: &SubscriptionSet) {
        let pending: HashSet<_> = set.pending().into_iter().collect();
        let confirmed: HashSet<_> = set.confirmed().into_iter().collect();
        assert!(
            pending.is_disjoint(&confirmed),
            "pending and confirmed must never overlap"
        );
    }

    #[test]
    fn request_adds_to_pending() {
        let mut set = SubscriptionSet::new();

        let added = set.request(symbols(&["AAPL", "MSFT"]));

        assert_eq!(added.len(), 2);
        assert!(set.has_pending());
        assert!(set.confirmed().is_empty());
        assert_disjoint(&set);
    }

    #[test]
    fn request_is_idempotent() {
        let mut set = SubscriptionSet::new();

        set.request(symbols(&["AAPL"]));
        let second = set.request(symbols(&["AAPL"]));

        assert!(second.is_empty());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn request_skips_confirmed_symbols() {
        let mut set = SubscriptionSet::new();
        set.request(symbols(&["AAPL"]));
        set.take_pending();

        let added = set.request(symbols(&["AAPL", "TSLA"]));

        assert_eq!(added, symbols(&["TSLA"]));
        assert_disjoint(&set);
    }

    #[test]
    fn superset_request_tracks_exactly_the_union() {
        // subscribe(S1) then subscribe(S2) with S1 ⊆ S2 tracks exactly S2,
        // and the second request only reports S2 − S1 as new.
        let mut set = SubscriptionSet::new();

        let s1 = symbols(&["AAPL", "MSFT"]);
        let s2 = symbols(&["AAPL", "MSFT", "TSLA", "NVDA"]);

        set.request(s1);
        set.take_pending();
        let added = set.request(s2.clone());

        assert_eq!(added, symbols(&["TSLA", "NVDA"]));
        assert_eq!(set.len(), s2.len());
        let tracked: HashSet<_> = set
            .pending()
            .into_iter()
            .chain(set.confirmed())
            .collect();
        assert_eq!(tracked, s2.into_iter().collect::<HashSet<_>>());
    }

    #[test]
    fn take_pending_promotes_everything() {
        let mut set = SubscriptionSet::new();
        set.request(symbols(&["AAPL", "MSFT"]));

        let flushed = set.take_pending();

        assert_eq!(flushed.len(), 2);
        assert!(!set.has_pending());
        assert_eq!(set.confirmed().len(), 2);
        assert_disjoint(&set);
    }

    #[test]
    fn take_pending_on_empty_is_noop() {
        let mut set = SubscriptionSet::new();
        assert!(set.take_pending().is_empty());
    }

    #[test]
    fn demote_confirmed_requeues_for_resubscribe() {
        let mut set = SubscriptionSet::new();
        set.request(symbols(&["AAPL", "MSFT"]));
        set.take_pending();

        set.demote_confirmed();

        assert!(set.confirmed().is_empty());
        assert_eq!(set.pending().len(), 2);
        assert_disjoint(&set);
    }

    #[test]
    fn remove_reports_only_confirmed_symbols() {
        let mut set = SubscriptionSet::new();
        set.request(symbols(&["AAPL"]));
        set.take_pending();
        set.request(symbols(&["MSFT"]));

        let was_confirmed = set.remove(&symbols(&["AAPL", "MSFT", "TSLA"]));

        assert_eq!(was_confirmed, symbols(&["AAPL"]));
        assert!(set.is_empty());
    }

    #[test]
    fn reject_drops_from_confirmed() {
        let mut set = SubscriptionSet::new();
        set.request(symbols(&["AAPL"]));
        set.take_pending();

        assert!(set.reject("AAPL"));
        assert!(!set.reject("AAPL"));
        assert!(set.is_empty());
    }

    #[test]
    fn clear_all_resets_both_sets() {
        let mut set = SubscriptionSet::new();
        set.request(symbols(&["AAPL"]));
        set.take_pending();
        set.request(symbols(&["MSFT"]));

        set.clear_all();

        assert!(set.is_empty());
    }

    #[test]
    fn clear_confirmed_preserves_pending() {
        let mut set = SubscriptionSet::new();
        set.request(symbols(&["AAPL"]));
        set.take_pending();
        set.request(symbols(&["MSFT"]));

        set.clear_confirmed();

        assert_eq!(set.pending(), symbols(&["MSFT"]));
        assert!(set.confirmed().is_empty());
    }

    #[test]
    fn is_tracked_covers_both_sets() {
        let mut set = SubscriptionSet::new();
        set.request(symbols(&["AAPL"]));
        set.take_pending();
        set.request(symbols(&["MSFT"]));

        assert!(set.is_tracked("AAPL"));
        assert!(set.is_tracked("MSFT"));
        assert!(!set.is_tracked("TSLA"));
    }

    #[test]
    fn every_operation_preserves_disjointness() {
        let mut set = SubscriptionSet::new();

        set.request(symbols(&["AAPL", "MSFT", "TSLA"]));
        assert_disjoint(&set);

        set.take_pending();
        assert_disjoint(&set);

        set.request(symbols(&["NVDA", "AAPL"]));
        assert_disjoint(&set);

        set.demote_confirmed();
        assert_disjoint(&set);

        set.take_pending();
        set.remove(&symbols(&["MSFT"]));
        assert_disjoint(&set);

        set.reject("TSLA");
        assert_disjoint(&set);
    }
}
