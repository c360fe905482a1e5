//! Usage fetching across zones.

use std::collections::HashMap;

use tracing::{debug, instrument};

use cloud_billing_core::{TimeRange, UsageReading};

use crate::error::SourceError;
use crate::sources::UsageSource;

/// Usage readings keyed by resource name.
pub type UsageMap = HashMap<String, UsageReading>;

/// Fetch usage from `source`.
///
/// With zones, each zone is queried in order and the results are
/// concatenated; without, the source is queried once. The first failing
/// call fails the fetch. On duplicate names the later reading wins.
///
/// # Errors
///
/// Returns the first source error.
#[instrument(skip(source, window), fields(zones = zones.len()))]
pub async fn fetch_usage(
    source: &dyn UsageSource,
    zones: &[String],
    window: &TimeRange,
) -> Result<UsageMap, SourceError> {
    let mut readings = Vec::new();

    if zones.is_empty() {
        readings = source.list_usage(None, window).await?;
    } else {
        for zone in zones {
            let zone_readings = source.list_usage(Some(zone), window).await?;
            debug!(zone = %zone, readings = zone_readings.len(), "Fetched zone usage");
            readings.extend(zone_readings);
        }
    }

    Ok(readings
        .into_iter()
        .map(|reading| (reading.resource_name.clone(), reading))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// Returns canned readings per zone and records the calls.
    struct ZonedSource {
        calls: Mutex<Vec<Option<String>>>,
        failing_zone: Option<&'static str>,
    }

    impl ZonedSource {
        fn new(failing_zone: Option<&'static str>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failing_zone,
            }
        }
    }

    #[async_trait]
    impl UsageSource for ZonedSource {
        async fn list_usage(
            &self,
            zone: Option<&str>,
            _window: &TimeRange,
        ) -> Result<Vec<UsageReading>, SourceError> {
            self.calls.lock().unwrap().push(zone.map(str::to_string));
            if zone.is_some() && zone == self.failing_zone {
                return Err(SourceError::NotFound("zone down".into()));
            }
            let zone = zone.unwrap_or("global");
            Ok(vec![
                UsageReading::new(format!("{zone}-db"), 1.0),
                UsageReading::new("shared", if zone == "ch-dk-2" { 2.0 } else { 1.0 }),
            ])
        }
    }

    fn window() -> TimeRange {
        TimeRange::hourly(Utc.with_ymd_and_hms(2023, 1, 11, 10, 30, 0).unwrap()).unwrap()
    }

    fn zones() -> Vec<String> {
        vec!["ch-gva-2".into(), "ch-dk-2".into()]
    }

    #[tokio::test]
    async fn zones_are_concatenated_and_last_write_wins() {
        let source = ZonedSource::new(None);

        let usage = fetch_usage(&source, &zones(), &window()).await.unwrap();

        assert_eq!(usage.len(), 3);
        assert!(usage.contains_key("ch-gva-2-db"));
        assert!(usage.contains_key("ch-dk-2-db"));
        assert!((usage["shared"].quantity - 2.0).abs() < f64::EPSILON);
        assert_eq!(
            *source.calls.lock().unwrap(),
            vec![Some("ch-gva-2".to_string()), Some("ch-dk-2".to_string())]
        );
    }

    #[tokio::test]
    async fn unzoned_source_is_queried_once() {
        let source = ZonedSource::new(None);

        let usage = fetch_usage(&source, &[], &window()).await.unwrap();

        assert!(usage.contains_key("global-db"));
        assert_eq!(*source.calls.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn failing_zone_fails_the_fetch() {
        let source = ZonedSource::new(Some("ch-gva-2"));

        let result = fetch_usage(&source, &zones(), &window()).await;

        assert!(result.is_err());
        // no further zones after the failure
        assert_eq!(source.calls.lock().unwrap().len(), 1);
    }
}
