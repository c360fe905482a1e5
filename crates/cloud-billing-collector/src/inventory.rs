//! Inventory resolution: managed resources joined with their organization.

use std::collections::HashMap;

use tracing::{info, instrument, warn};

use cloud_billing_core::{ClusterObject, ManagedResourceDetail, ResourceKind, NAMESPACE_LABEL};

use crate::error::SourceError;
use crate::sources::InventorySource;

/// Join listed objects with the namespace-to-organization map.
///
/// Objects without the claim namespace label, without a billable name, or
/// whose namespace has no organization are skipped and logged. The output
/// order carries no meaning.
#[must_use]
pub fn resolve(
    resource_lists: &[(ResourceKind, Vec<ClusterObject>)],
    namespace_to_org: &HashMap<String, String>,
) -> Vec<ManagedResourceDetail> {
    let mut details = Vec::new();

    for (kind, objects) in resource_lists {
        for object in objects {
            let object_name = object.metadata.name.as_str();

            let Some(namespace) = object.label(NAMESPACE_LABEL) else {
                info!(kind = %kind, object = object_name, "Namespace label is missing, skipping");
                continue;
            };

            let Some(organization) = namespace_to_org.get(namespace) else {
                info!(
                    kind = %kind,
                    object = object_name,
                    namespace,
                    "Namespace has no organization, skipping"
                );
                continue;
            };

            let Some(name) = kind.resource_name(object) else {
                warn!(kind = %kind, object = object_name, "Resource has no billable name, skipping");
                continue;
            };

            details.push(ManagedResourceDetail {
                organization: organization.clone(),
                name,
                namespace: namespace.to_string(),
                zone: kind.zone(object),
                kind: *kind,
            });
        }
    }

    details
}

/// List namespaces and the given kinds, then resolve them.
///
/// # Errors
///
/// Returns an error if any list call fails. A kind the cluster does not
/// serve contributes nothing.
#[instrument(skip(source))]
pub async fn fetch_details(
    source: &dyn InventorySource,
    kinds: &[ResourceKind],
) -> Result<Vec<ManagedResourceDetail>, SourceError> {
    let mut lists = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        lists.push((kind, source.list_objects(kind).await?));
    }
    let namespaces = source.namespace_organizations().await?;

    let details = resolve(&lists, &namespaces);
    info!(resources = details.len(), "Resolved managed resources");
    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bucket(name: &str, namespace: Option<&str>) -> ClusterObject {
        let labels = namespace.map_or_else(|| json!({}), |ns| json!({ NAMESPACE_LABEL: ns }));
        serde_json::from_value(json!({
            "metadata": { "name": format!("claim-{name}"), "labels": labels },
            "spec": { "forProvider": { "bucketName": name, "zone": "ch-gva-2" } }
        }))
        .unwrap()
    }

    fn namespaces() -> HashMap<String, String> {
        HashMap::from([("ns1".to_string(), "acme".to_string())])
    }

    #[test]
    fn resolves_labelled_resources() {
        let lists = vec![(ResourceKind::ExoscaleBucket, vec![bucket("b1", Some("ns1"))])];

        let details = resolve(&lists, &namespaces());

        assert_eq!(
            details,
            vec![ManagedResourceDetail {
                organization: "acme".into(),
                name: "b1".into(),
                namespace: "ns1".into(),
                zone: "ch-gva-2".into(),
                kind: ResourceKind::ExoscaleBucket,
            }]
        );
    }

    #[test]
    fn skips_missing_label_and_unknown_namespace() {
        let lists = vec![(
            ResourceKind::ExoscaleBucket,
            vec![
                bucket("no-label", None),
                bucket("orphan", Some("ns-unknown")),
                bucket("kept", Some("ns1")),
            ],
        )];

        let details = resolve(&lists, &namespaces());

        assert_eq!(details.len(), 1);
        assert_eq!(details[0].name, "kept");
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(resolve(&[], &namespaces()).is_empty());
    }
}
