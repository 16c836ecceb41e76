//! Identity resolution
//!
//! Links a self-registered web account to an offline customer profile by
//! phone or email. Phone data is noisy, so matching is deliberately loose:
//! see [`PhonePattern`].

use crate::domain::aggregates::{CustomerProfile, WebAccount};
use crate::domain::value_objects::{AccountId, Email, PhonePattern};
use crate::error::Anomaly;

/// Disjunctive phone-or-email query, usable in both directions.
#[derive(Clone, Debug, Default)]
pub struct MatchQuery {
    phone: Option<PhonePattern>,
    email: Option<Email>,
}

impl MatchQuery {
    /// Inputs without digits or without a valid address drop their clause.
    pub fn new(phone: Option<&str>, email: Option<&str>) -> Self {
        Self {
            phone: phone.and_then(PhonePattern::from_raw),
            email: email.and_then(|e| Email::new(e).ok()),
        }
    }

    pub fn for_account(account: &WebAccount) -> Self {
        Self::new(account.phone.as_deref(), account.email.as_deref())
    }

    /// Query for the web accounts that belong to a profile.
    pub fn for_profile(profile: &CustomerProfile) -> Self {
        Self::new(Some(profile.mobile()), profile.email())
    }

    pub fn phone(&self) -> Option<&PhonePattern> {
        self.phone.as_ref()
    }

    pub fn email(&self) -> Option<&Email> {
        self.email.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.email.is_none()
    }

    pub fn matches(&self, phone: Option<&str>, email: Option<&str>) -> bool {
        let by_phone = matches!((&self.phone, phone), (Some(p), Some(stored)) if p.is_match(stored));
        let by_email = matches!((&self.email, email), (Some(e), Some(stored)) if e.matches(stored));
        by_phone || by_email
    }

    pub fn matches_profile(&self, profile: &CustomerProfile) -> bool {
        self.matches(Some(profile.mobile()), profile.email())
    }

    pub fn matches_account(&self, account: &WebAccount) -> bool {
        self.matches(account.phone.as_deref(), account.email.as_deref())
    }
}

/// Outcome of a resolution: the chosen profile and, when several matched,
/// the ambiguity that was logged.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    pub profile: Option<CustomerProfile>,
    pub anomaly: Option<Anomaly>,
}

pub struct IdentityResolver;

impl IdentityResolver {
    /// Resolve an account against an in-memory collection of profiles.
    pub fn resolve(account: &WebAccount, profiles: &[CustomerProfile]) -> Resolution {
        let query = MatchQuery::for_account(account);
        if query.is_empty() {
            return Resolution::default();
        }
        let candidates = profiles
            .iter()
            .filter(|p| query.matches_profile(p))
            .cloned()
            .collect();
        Self::pick(Some(&account.id), candidates)
    }

    /// Choose among matching profiles: the most recently updated wins.
    pub fn pick(account_id: Option<&AccountId>, mut candidates: Vec<CustomerProfile>) -> Resolution {
        if candidates.len() <= 1 {
            return Resolution { profile: candidates.pop(), anomaly: None };
        }

        candidates.sort_by(|a, b| {
            b.updated_at()
                .cmp(&a.updated_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        let anomaly = Anomaly::AmbiguousIdentity {
            account_id: account_id.cloned(),
            candidates: candidates.iter().map(|p| p.id().clone()).collect(),
            chosen: candidates[0].id().clone(),
        };
        anomaly.log();

        Resolution {
            profile: candidates.into_iter().next(),
            anomaly: Some(anomaly),
        }
    }
}
