//! Billing party resolution, memoized for one run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::sources::BillingPartyLookup;

/// Where billing parties come from.
#[derive(Clone)]
pub enum BillingPartySource {
    /// One sales order for every organization.
    Static(String),
    /// Per-organization lookup.
    Lookup(Arc<dyn BillingPartyLookup>),
}

impl BillingPartySource {
    /// Whether a static override is configured.
    #[must_use]
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }
}

impl std::fmt::Debug for BillingPartySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(party) => f.debug_tuple("Static").field(party).finish(),
            Self::Lookup(_) => f.write_str("Lookup"),
        }
    }
}

/// Resolves organizations to billing parties for the duration of one run.
///
/// Each distinct organization is looked up at most once; failures are
/// remembered too, so a broken organization costs a single call. Lookups are
/// evaluated at the run's reference instant.
#[derive(Debug)]
pub struct BillingPartyResolver<'a> {
    source: &'a BillingPartySource,
    at: DateTime<Utc>,
    cache: HashMap<String, Option<String>>,
}

impl<'a> BillingPartyResolver<'a> {
    /// Create a resolver with an empty cache, resolving as of `at`.
    #[must_use]
    pub fn new(source: &'a BillingPartySource, at: DateTime<Utc>) -> Self {
        Self {
            source,
            at,
            cache: HashMap::new(),
        }
    }

    /// Whether records are billed against a static override.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.source.is_static()
    }

    /// Billing party of `organization`, `None` if it cannot be resolved.
    pub async fn resolve(&mut self, organization: &str) -> Option<String> {
        let lookup = match self.source {
            BillingPartySource::Static(party) => return Some(party.clone()),
            BillingPartySource::Lookup(lookup) => lookup,
        };

        if let Some(cached) = self.cache.get(organization) {
            return cached.clone();
        }

        let resolved = match lookup.billing_party(organization, self.at).await {
            Ok(party) => {
                debug!(organization, billing_party = %party, "Billing party resolved");
                Some(party)
            }
            Err(e) => {
                warn!(organization, error = %e, "Unable to resolve billing party");
                None
            }
        };

        self.cache.insert(organization.to_string(), resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingLookup {
        calls: AtomicUsize,
        seen_at: Mutex<Vec<DateTime<Utc>>>,
    }

    #[async_trait]
    impl BillingPartyLookup for CountingLookup {
        async fn billing_party(
            &self,
            organization: &str,
            at: DateTime<Utc>,
        ) -> Result<String, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_at.lock().unwrap().push(at);
            if organization == "broken" {
                return Err(SourceError::NotFound(organization.to_string()));
            }
            Ok(format!("SO-{organization}"))
        }
    }

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 11, 10, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn one_lookup_per_organization() {
        let lookup = Arc::new(CountingLookup::default());
        let source = BillingPartySource::Lookup(lookup.clone());
        let mut resolver = BillingPartyResolver::new(&source, reference());

        for org in ["a", "b", "a", "a", "b"] {
            assert_eq!(resolver.resolve(org).await, Some(format!("SO-{org}")));
        }

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_cached() {
        let lookup = Arc::new(CountingLookup::default());
        let source = BillingPartySource::Lookup(lookup.clone());
        let mut resolver = BillingPartyResolver::new(&source, reference());

        assert_eq!(resolver.resolve("broken").await, None);
        assert_eq!(resolver.resolve("broken").await, None);

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn static_override_wins() {
        let source = BillingPartySource::Static("S10121".into());
        let mut resolver = BillingPartyResolver::new(&source, reference());

        assert!(resolver.is_static());
        assert_eq!(resolver.resolve("anything").await.as_deref(), Some("S10121"));
    }

    #[tokio::test]
    async fn new_resolver_starts_empty() {
        let lookup = Arc::new(CountingLookup::default());
        let source = BillingPartySource::Lookup(lookup.clone());

        BillingPartyResolver::new(&source, reference()).resolve("a").await;
        BillingPartyResolver::new(&source, reference()).resolve("a").await;

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn lookup_is_evaluated_at_the_reference() {
        let lookup = Arc::new(CountingLookup::default());
        let source = BillingPartySource::Lookup(lookup.clone());
        let past = Utc.with_ymd_and_hms(2022, 12, 1, 6, 0, 0).unwrap();

        BillingPartyResolver::new(&source, past).resolve("a").await;
        BillingPartyResolver::new(&source, reference()).resolve("a").await;

        assert_eq!(*lookup.seen_at.lock().unwrap(), vec![past, reference()]);
    }
}
