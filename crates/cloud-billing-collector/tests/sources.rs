//! Source clients against mocked provider APIs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{header, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cloud_billing_collector::sources::prometheus::{instance_count_query, organization_info_query};
use cloud_billing_collector::sources::{
    BillingPartyLookup, BucketMeter, CloudscaleClient, CloudscaleUsage, ExoscaleClient,
    ExoscaleCredentials, ExoscaleDbaasUsage, InventorySource, KubernetesClient, PrometheusClient,
    SharedBucketMetrics, UsageSource,
};
use cloud_billing_collector::SourceError;
use cloud_billing_core::{DbaasType, ResourceKind, TimeRange, NAMESPACE_LABEL, ORGANIZATION_LABEL};

const TIMEOUT: Duration = Duration::from_secs(5);

fn reference() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 11, 10, 30, 0).unwrap()
}

fn window() -> TimeRange {
    TimeRange::daily(reference()).unwrap()
}

// ============================================================================
// Kubernetes
// ============================================================================

fn kubernetes(server: &MockServer) -> KubernetesClient {
    KubernetesClient::new(server.uri(), "k8s-token", None, TIMEOUT).unwrap()
}

#[tokio::test]
async fn namespaces_map_to_organizations() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces"))
        .and(header("authorization", "Bearer k8s-token"))
        .and(query_param("labelSelector", ORGANIZATION_LABEL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "NamespaceList",
            "items": [
                { "metadata": { "name": "ns1", "labels": { ORGANIZATION_LABEL: "acme" } } },
                { "metadata": { "name": "ns2", "labels": { ORGANIZATION_LABEL: "" } } }
            ]
        })))
        .mount(&server)
        .await;

    let orgs = kubernetes(&server).namespace_organizations().await.unwrap();

    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs["ns1"], "acme");
}

#[tokio::test]
async fn managed_resources_are_listed_per_kind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/exoscale.crossplane.io/v1/postgresqls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "metadata": {
                    "name": "postgres-abc",
                    "labels": { NAMESPACE_LABEL: "ns1" }
                },
                "spec": { "forProvider": { "size": { "plan": "hobbyist-2" } } }
            }]
        })))
        .mount(&server)
        .await;

    let objects = kubernetes(&server)
        .list_objects(ResourceKind::PostgreSql)
        .await
        .unwrap();

    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].label(NAMESPACE_LABEL), Some("ns1"));
}

#[tokio::test]
async fn unserved_kind_is_an_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("page not found"))
        .mount(&server)
        .await;

    let objects = kubernetes(&server)
        .list_objects(ResourceKind::Kafka)
        .await
        .unwrap();

    assert!(objects.is_empty());
}

#[tokio::test]
async fn list_without_items_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/exoscale.crossplane.io/v1/buckets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "BucketList",
            "metadata": { "resourceVersion": "42" }
        })))
        .mount(&server)
        .await;

    let objects = kubernetes(&server)
        .list_objects(ResourceKind::ExoscaleBucket)
        .await
        .unwrap();

    assert!(objects.is_empty());
}

#[tokio::test]
async fn forbidden_list_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = kubernetes(&server)
        .list_objects(ResourceKind::ExoscaleBucket)
        .await
        .unwrap_err();

    assert!(matches!(err, SourceError::Api { status: 403, .. }));
}

// ============================================================================
// Exoscale
// ============================================================================

fn exoscale(server: &MockServer) -> ExoscaleClient {
    ExoscaleClient::new(
        format!("{}/v2", server.uri()),
        ExoscaleCredentials {
            key: "EXOkey".into(),
            secret: "s3cret".into(),
        },
        TIMEOUT,
    )
    .unwrap()
}

#[tokio::test]
async fn dbaas_services_are_signed_and_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/dbaas-service"))
        .and(header_regex(
            "authorization",
            r"^EXO2-HMAC-SHA256 credential=EXOkey,expires=\d+,signature=[A-Za-z0-9+/=]+$",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dbaas-services": [
                { "name": "postgres-abc", "type": "pg", "plan": "hobbyist-2", "zone": "ch-gva-2" },
                { "name": "redis-xyz", "type": "redis", "plan": "startup-4", "zone": "ch-gva-2" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let usage = ExoscaleDbaasUsage::new(exoscale(&server).into())
        .list_usage(Some("ch-gva-2"), &window())
        .await
        .unwrap();

    assert_eq!(usage.len(), 2);
    assert_eq!(usage[0].resource_name, "postgres-abc");
    assert_eq!(usage[0].service_type, Some(DbaasType::Pg));
    assert_eq!(usage[0].service_plan.as_deref(), Some("hobbyist-2"));
    assert!((usage[0].quantity - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn service_without_plan_is_listed_without_one() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/dbaas-service"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dbaas-services": [
                { "name": "postgres-abc", "type": "pg", "plan": "hobbyist-2" },
                { "name": "creating-db", "type": "mysql" }
            ]
        })))
        .mount(&server)
        .await;

    let usage = ExoscaleDbaasUsage::new(exoscale(&server).into())
        .list_usage(Some("ch-gva-2"), &window())
        .await
        .unwrap();

    assert_eq!(usage.len(), 2);
    assert_eq!(usage[0].service_plan.as_deref(), Some("hobbyist-2"));
    assert_eq!(usage[1].resource_name, "creating-db");
    assert_eq!(usage[1].service_type, Some(DbaasType::Mysql));
    assert_eq!(usage[1].service_plan, None);
}

#[tokio::test]
async fn sos_bucket_usage_is_listed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/sos-buckets-usage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sos-buckets-usage": [
                { "name": "bucket-a", "size": 1_073_741_824_u64, "zone": "ch-gva-2" }
            ]
        })))
        .mount(&server)
        .await;

    let buckets = exoscale(&server).list_sos_buckets_usage().await.unwrap();

    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].size, 1_073_741_824);
}

// ============================================================================
// cloudscale
// ============================================================================

#[tokio::test]
async fn bucket_metrics_are_requested_for_one_day() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/metrics/buckets"))
        .and(header("authorization", "Bearer cs-token"))
        .and(query_param("start", "2023-01-10"))
        .and(query_param("end", "2023-01-10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "start": "2023-01-10T00:00:00Z",
            "end": "2023-01-10T23:59:59Z",
            "data": [{
                "subject": { "name": "bucket-a", "objects_user_id": "u1" },
                "time_series": [{
                    "start": "2023-01-10T00:00:00Z",
                    "end": "2023-01-11T00:00:00Z",
                    "usage": {
                        "requests": 120,
                        "object_count": 3,
                        "storage_bytes": 2048,
                        "received_bytes": 10,
                        "sent_bytes": 20
                    }
                }]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        CloudscaleClient::new(format!("{}/v1", server.uri()), "cs-token", TIMEOUT).unwrap();
    let metrics = client
        .bucket_metrics(NaiveDate::from_ymd_opt(2023, 1, 10).unwrap())
        .await
        .unwrap();

    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].name(), "bucket-a");
    assert_eq!(metrics[0].usage().next().unwrap().requests, 120);
}

#[tokio::test]
async fn meters_share_one_fetch_per_day() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/metrics/buckets"))
        .and(query_param("start", "2023-01-10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "subject": { "name": "bucket-a" },
                "time_series": [{
                    "usage": { "requests": 7, "storage_bytes": 2048, "sent_bytes": 512 }
                }]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        CloudscaleClient::new(format!("{}/v1", server.uri()), "cs-token", TIMEOUT).unwrap();
    let shared = Arc::new(SharedBucketMetrics::new(client));

    let mut quantities = Vec::new();
    for meter in BucketMeter::ALL {
        let usage = CloudscaleUsage::new(Arc::clone(&shared), meter)
            .list_usage(None, &window())
            .await
            .unwrap();
        assert_eq!(usage.len(), 1);
        quantities.push(usage[0].quantity);
    }

    assert_eq!(quantities, vec![2048.0, 512.0, 7.0]);
}

// ============================================================================
// Prometheus
// ============================================================================

#[tokio::test]
async fn sales_order_is_read_from_the_organization_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .and(query_param("query", organization_info_query("acme").as_str()))
        .and(query_param("time", "1673433000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [{
                    "metric": {
                        "__name__": "appuio_control_organization_info",
                        "organization": "acme",
                        "sales_order": "S10121"
                    },
                    "value": [1_673_400_000, "1"]
                }]
            }
        })))
        .mount(&server)
        .await;

    let client = PrometheusClient::new(server.uri(), TIMEOUT).unwrap();

    assert_eq!(client.billing_party("acme", reference()).await.unwrap(), "S10121");
}

#[tokio::test]
async fn organization_without_sales_order_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": { "resultType": "vector", "result": [] }
        })))
        .mount(&server)
        .await;

    let client = PrometheusClient::new(server.uri(), TIMEOUT).unwrap();
    let err = client.billing_party("ghost", reference()).await.unwrap_err();

    assert!(matches!(err, SourceError::NotFound(_)));
}

#[tokio::test]
async fn empty_count_is_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .and(query_param(
            "query",
            instance_count_query("compositeredisinstances", "besteffort").as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": { "resultType": "vector", "result": [] }
        })))
        .mount(&server)
        .await;

    let client = PrometheusClient::new(server.uri(), TIMEOUT).unwrap();
    let count = client
        .count_instances("compositeredisinstances", "besteffort", Utc::now())
        .await
        .unwrap();

    assert!(count.abs() < f64::EPSILON);
}

#[tokio::test]
async fn query_errors_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "parse error"
        })))
        .mount(&server)
        .await;

    let client = PrometheusClient::new(server.uri(), TIMEOUT).unwrap();
    let err = client.query("up{", Utc::now()).await.unwrap_err();

    assert!(matches!(err, SourceError::Api { status: 400, .. }));
}
