//! Visibility tracker: which messages are leased and until when

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::message::{MessageId, PopToken};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Lease {
    pub pop_token: PopToken,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// At most one lease per message.
///
/// Expired leases may linger until the next `expire` call; every reader
/// treats them as absent.
#[derive(Default)]
pub(crate) struct VisibilityTracker {
    leases: HashMap<MessageId, Lease>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every lease that has expired at `now`, returning the freed ids
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<MessageId> {
        let expired: Vec<MessageId> = self
            .leases
            .iter()
            .filter(|(_, lease)| !lease.is_active(now))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.leases.remove(id);
        }
        expired
    }

    pub fn is_leased(&self, id: &MessageId, now: DateTime<Utc>) -> bool {
        self.active_lease(id, now).is_some()
    }

    pub fn active_lease(&self, id: &MessageId, now: DateTime<Utc>) -> Option<&Lease> {
        self.leases.get(id).filter(|lease| lease.is_active(now))
    }

    /// Number of unexpired leases at `now`
    pub fn active_count(&self, now: DateTime<Utc>) -> usize {
        self.leases.values().filter(|l| l.is_active(now)).count()
    }

    /// Lease a visible message.
    ///
    /// # Panics
    ///
    /// If the message already holds an unexpired lease. The engine only
    /// grants leases on messages it has just seen as visible under its lock,
    /// so reaching this means the locking discipline is broken.
    pub fn grant(
        &mut self,
        id: MessageId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Lease {
        assert!(
            !self.is_leased(&id, now),
            "message {id} already holds an active lease"
        );
        let lease = Lease {
            pop_token: PopToken::generate(),
            expires_at,
        };
        self.leases.insert(id, lease.clone());
        lease
    }

    /// Check that `token` is the current token of an unexpired lease on `id`
    pub fn verify(&self, id: &MessageId, token: &PopToken, now: DateTime<Utc>) -> bool {
        self.active_lease(id, now)
            .is_some_and(|lease| lease.pop_token == *token)
    }

    /// Replace a verified lease with a fresh token and expiry
    pub fn renew(
        &mut self,
        id: MessageId,
        token: &PopToken,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Option<Lease> {
        if !self.verify(&id, token, now) {
            return None;
        }
        let lease = Lease {
            pop_token: PopToken::generate(),
            expires_at,
        };
        self.leases.insert(id, lease.clone());
        Some(lease)
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<Lease> {
        self.leases.remove(id)
    }

    pub fn message_ids(&self) -> impl Iterator<Item = &MessageId> + '_ {
        self.leases.keys()
    }

    pub fn clear(&mut self) {
        self.leases.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_grant_makes_message_leased_until_expiry() {
        let mut tracker = VisibilityTracker::new();
        let id = MessageId::new();
        tracker.grant(id, t0(), t0() + Duration::seconds(30));

        assert!(tracker.is_leased(&id, t0()));
        assert!(tracker.is_leased(&id, t0() + Duration::seconds(29)));
        assert!(!tracker.is_leased(&id, t0() + Duration::seconds(30)));
    }

    #[test]
    #[should_panic(expected = "already holds an active lease")]
    fn test_double_grant_panics() {
        let mut tracker = VisibilityTracker::new();
        let id = MessageId::new();
        tracker.grant(id, t0(), t0() + Duration::seconds(30));
        tracker.grant(id, t0(), t0() + Duration::seconds(30));
    }

    #[test]
    fn test_grant_after_expiry_issues_new_token() {
        let mut tracker = VisibilityTracker::new();
        let id = MessageId::new();
        let first = tracker.grant(id, t0(), t0() + Duration::seconds(1));

        let later = t0() + Duration::seconds(2);
        let second = tracker.grant(id, later, later + Duration::seconds(1));
        assert_ne!(first.pop_token, second.pop_token);
        assert!(!tracker.verify(&id, &first.pop_token, later));
        assert!(tracker.verify(&id, &second.pop_token, later));
    }

    #[test]
    fn test_renew_rotates_token() {
        let mut tracker = VisibilityTracker::new();
        let id = MessageId::new();
        let lease = tracker.grant(id, t0(), t0() + Duration::seconds(30));

        let renewed = tracker
            .renew(id, &lease.pop_token, t0(), t0() + Duration::seconds(60))
            .unwrap();
        assert_ne!(renewed.pop_token, lease.pop_token);
        assert_eq!(renewed.expires_at, t0() + Duration::seconds(60));

        // The old token is spent
        assert!(tracker
            .renew(id, &lease.pop_token, t0(), t0() + Duration::seconds(90))
            .is_none());
    }

    #[test]
    fn test_renew_rejects_expired_lease() {
        let mut tracker = VisibilityTracker::new();
        let id = MessageId::new();
        let lease = tracker.grant(id, t0(), t0() + Duration::seconds(5));

        let later = t0() + Duration::seconds(6);
        assert!(tracker
            .renew(id, &lease.pop_token, later, later + Duration::seconds(5))
            .is_none());
    }

    #[test]
    fn test_expire_clears_only_expired() {
        let mut tracker = VisibilityTracker::new();
        let short = MessageId::new();
        let long = MessageId::new();
        tracker.grant(short, t0(), t0() + Duration::seconds(1));
        tracker.grant(long, t0(), t0() + Duration::seconds(100));

        let freed = tracker.expire(t0() + Duration::seconds(10));
        assert_eq!(freed, vec![short]);
        assert_eq!(tracker.message_ids().count(), 1);
        assert_eq!(tracker.active_count(t0() + Duration::seconds(10)), 1);
    }
}
