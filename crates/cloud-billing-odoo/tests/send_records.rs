//! Odoo client tests against a mocked billing API.

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cloud_billing_core::{BillingRecord, InstanceId, ProductId, TimeRange};
use cloud_billing_odoo::{OdooClient, OdooCredentials, OdooError};

fn record(name: &str) -> BillingRecord {
    let from = Utc.with_ymd_and_hms(2023, 1, 10, 23, 0, 0).unwrap();
    BillingRecord {
        product_id: ProductId::new("appcat-exoscale-object-storage").unwrap(),
        instance_id: InstanceId::for_resource("ch-gva-2", name).unwrap(),
        item_description: "AppCat Exoscale ObjectStorage".into(),
        item_group_description: "APPUiO Cloud - Zone: c-test / Namespace: ns1".into(),
        billing_party: "S10000".into(),
        unit_id: "GBDay".into(),
        consumed_units: 3.0,
        time_range: TimeRange {
            from,
            to: from + Duration::days(1),
        },
    }
}

fn client(server: &MockServer) -> OdooClient {
    OdooClient::new(
        format!("{}/api/v2/product_usage_report_POST", server.uri()),
        OdooCredentials {
            token_url: format!("{}/oauth2/token", server.uri()),
            client_id: "collector".into(),
            client_secret: "s3cret".into(),
        },
    )
    .unwrap()
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=collector"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-123",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn sends_batch_with_bearer_token() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/v2/product_usage_report_POST"))
        .and(header("authorization", "Bearer tok-123"))
        .and(body_partial_json(json!({
            "data": [{
                "product_id": "appcat-exoscale-object-storage",
                "instance_id": "ch-gva-2/bucket-a",
                "sales_order_id": "S10000",
                "unit_id": "GBDay",
                "consumed_units": 3.0,
                "timerange": "2023-01-10T23:00:00Z/2023-01-11T23:00:00Z"
            }]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .send_records(&[record("bucket-a")])
        .await
        .unwrap();
}

#[tokio::test]
async fn token_is_reused_across_batches() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/v2/product_usage_report_POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server);
    client.send_records(&[record("a")]).await.unwrap();
    client.send_records(&[record("b")]).await.unwrap();
}

#[tokio::test]
async fn empty_batch_is_not_sent() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;

    client(&server).send_records(&[]).await.unwrap();
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/v2/product_usage_report_POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .send_records(&[record("a")])
        .await
        .unwrap_err();

    match err {
        OdooError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn rejected_credentials_are_an_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "unknown client"
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .send_records(&[record("a")])
        .await
        .unwrap_err();

    assert!(matches!(err, OdooError::Auth { status: 401, ref message } if message == "unknown client"));
}
