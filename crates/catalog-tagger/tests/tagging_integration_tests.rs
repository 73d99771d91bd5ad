//! End-to-end tagging runs against a mocked catalog.
//!
//! These tests drive the real HTTP client through the engine and verify:
//! - The exact patch sent for an untagged table
//! - No patches for already-tagged tables, dry runs, or missing tags
//! - CSV-driven runs resolve bare names against the mapping scope
//! - FQN exports write every listed table and surface client failures

use serde_json::json;
use std::time::Duration;
use tagsync_catalog_client::{CatalogClient, ClientConfig, ClientError};
use tagsync_catalog_tagger::{
    export_table_fqns, load_fqn_list, ApplicationMapping, IdentityResolver, Mappings, RunOptions,
    SkipReason, TableAssignment, TaggerError, TaggingRun,
};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Test Helpers
// ============================================================================

fn test_client(server: &MockServer) -> CatalogClient {
    let config = ClientConfig::builder(server.uri())
        .jwt_token("test-jwt")
        .timeout(Duration::from_secs(5))
        .max_retries(2)
        .retry_initial_delay(Duration::from_millis(10))
        .retry_max_delay(Duration::from_millis(50))
        .build()
        .unwrap();
    CatalogClient::new(config).unwrap()
}

fn options(dry_run: bool) -> RunOptions {
    RunOptions {
        dry_run,
        batch_delay: Duration::ZERO,
        ..Default::default()
    }
}

fn ats_mapping() -> Mappings {
    let mut mappings = Mappings::new();
    mappings.insert(
        "ATS".to_string(),
        ApplicationMapping {
            tag_name: "ATS".to_string(),
            service: "SVC".to_string(),
            database: "DB".to_string(),
            schema: "SCHEMA".to_string(),
        },
    );
    mappings
}

fn table(fqn: &str, tags: &[&str]) -> serde_json::Value {
    json!({
        "id": format!("id-{}", fqn),
        "name": fqn.rsplit('.').next().unwrap(),
        "fullyQualifiedName": fqn,
        "tags": tags.iter().map(|t| json!({"tagFQN": t})).collect::<Vec<_>>()
    })
}

async fn mount_tag(server: &MockServer, encoded: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/tags/name/{}", encoded)))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"name": "ATS"})))
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, tables: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/v1/tables"))
        .and(query_param("databaseSchema", "SVC.DB.SCHEMA"))
        .and(query_param("include", "all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": tables,
            "paging": {"total": 1}
        })))
        .mount(server)
        .await;
}

async fn mount_snapshot(server: &MockServer, fqn: &str, tags: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/tables/name/{}", fqn)))
        .and(query_param("fields", "tags,owners"))
        .respond_with(ResponseTemplate::new(200).set_body_json(table(fqn, tags)))
        .mount(server)
        .await;
}

// ============================================================================
// Schema-driven runs
// ============================================================================

#[tokio::test]
async fn test_untagged_table_gets_single_add_patch() {
    let server = MockServer::start().await;
    mount_tag(&server, "Application%20System.ATS", 200).await;
    mount_listing(&server, vec![table("SVC.DB.SCHEMA.FOO", &[])]).await;
    mount_snapshot(&server, "SVC.DB.SCHEMA.FOO", &[]).await;

    Mock::given(method("PATCH"))
        .and(path("/v1/tables/name/SVC.DB.SCHEMA.FOO"))
        .and(header("Content-Type", "application/json-patch+json"))
        .and(body_json(json!([
            {"op": "add", "path": "/tags/-", "value": {"tagFQN": "Application System.ATS"}}
        ])))
        .respond_with(ResponseTemplate::new(200).set_body_json(table(
            "SVC.DB.SCHEMA.FOO",
            &["Application System.ATS"],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let opts = options(false);
    let summary = TaggingRun::new(&client, &opts)
        .tag_schemas(&ats_mapping(), None)
        .await;

    assert_eq!(summary.totals.newly_tagged, 1);
    assert_eq!(summary.totals.already_tagged, 0);
    assert_eq!(summary.totals.failed_tag_applications, 0);
}

#[tokio::test]
async fn test_already_tagged_schema_sends_nothing() {
    let server = MockServer::start().await;
    mount_tag(&server, "Application%20System.ATS", 200).await;
    mount_listing(
        &server,
        vec![table("SVC.DB.SCHEMA.FOO", &["Application System.ATS"])],
    )
    .await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let opts = options(false);
    let summary = TaggingRun::new(&client, &opts)
        .tag_schemas(&ats_mapping(), None)
        .await;

    assert_eq!(summary.totals.already_tagged, 1);
    assert_eq!(summary.totals.newly_tagged, 0);
}

#[tokio::test]
async fn test_missing_tag_skips_without_listing_or_patching() {
    let server = MockServer::start().await;
    mount_tag(&server, "Application%20System.ATS", 404).await;

    Mock::given(method("GET"))
        .and(path("/v1/tables"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let opts = options(false);
    let summary = TaggingRun::new(&client, &opts)
        .tag_schemas(&ats_mapping(), None)
        .await;

    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.missing_tags()[0].1.as_str(), "Application System.ATS");
    assert!(summary.to_string().contains("Missing Tag: Application System.ATS"));
}

#[tokio::test]
async fn test_dry_run_reads_but_never_patches() {
    let server = MockServer::start().await;
    mount_tag(&server, "Application%20System.ATS", 200).await;
    mount_listing(
        &server,
        vec![
            table("SVC.DB.SCHEMA.FOO", &[]),
            table("SVC.DB.SCHEMA.BAR", &["Application System.ATS"]),
        ],
    )
    .await;
    mount_snapshot(&server, "SVC.DB.SCHEMA.FOO", &[]).await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let opts = options(true);
    let summary = TaggingRun::new(&client, &opts)
        .tag_schemas(&ats_mapping(), None)
        .await;

    assert_eq!(summary.totals.simulated, 1);
    assert_eq!(summary.totals.already_tagged, 1);
    assert!(summary.to_string().contains("Would apply: 1"));
}

#[tokio::test]
async fn test_rejected_patch_counted_as_failure() {
    let server = MockServer::start().await;
    mount_tag(&server, "Application%20System.ATS", 200).await;
    mount_listing(&server, vec![table("SVC.DB.SCHEMA.FOO", &[])]).await;
    mount_snapshot(&server, "SVC.DB.SCHEMA.FOO", &[]).await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": 403,
            "message": "Principal is not allowed to EditTags"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let opts = options(false);
    let summary = TaggingRun::new(&client, &opts)
        .tag_schemas(&ats_mapping(), None)
        .await;

    assert_eq!(summary.totals.failed_tag_applications, 1);
    assert_eq!(summary.processed.len(), 1);
}

#[tokio::test]
async fn test_unreachable_tag_lookup_skips_application() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tags/name/Application%20System.ATS"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let opts = options(false);
    let summary = TaggingRun::new(&client, &opts)
        .tag_schemas(&ats_mapping(), None)
        .await;

    assert!(matches!(
        summary.skipped[0].reason,
        SkipReason::TagLookupFailed(_)
    ));
}

// ============================================================================
// CSV-driven runs
// ============================================================================

#[tokio::test]
async fn test_csv_rows_resolved_against_mapping_scope() {
    let server = MockServer::start().await;
    mount_tag(&server, "Application%20System.ATS", 200).await;
    mount_snapshot(&server, "SVC.DB.SCHEMA.orders", &[]).await;
    Mock::given(method("GET"))
        .and(path("/v1/tables/name/SVC.DB.SCHEMA.ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/v1/tables/name/SVC.DB.SCHEMA.orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let rows = vec![
        TableAssignment {
            table: "ORDERS".to_string(),
            application: "ATS".to_string(),
        },
        TableAssignment {
            table: "GHOST".to_string(),
            application: "ATS".to_string(),
        },
    ];

    let client = test_client(&server);
    let opts = options(false);
    let summary = TaggingRun::new(&client, &opts)
        .tag_assignments(&rows, &IdentityResolver::new(), &ats_mapping(), None, None)
        .await;

    assert_eq!(summary.totals.total_tables, 2);
    assert_eq!(summary.totals.existing_tables, 1);
    assert_eq!(summary.totals.missing_tables, 1);
    assert_eq!(summary.totals.newly_tagged, 1);
}

// ============================================================================
// FQN export
// ============================================================================

#[tokio::test]
async fn test_export_writes_listed_fqns() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tables"))
        .and(query_param("fields", "fullyQualifiedName"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                table("SVC.DB.SCHEMA.FOO", &[]),
                table("SVC.DB.SCHEMA.BAR", &[])
            ],
            "paging": {"total": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("data").join("fqns.csv");

    let written = export_table_fqns(&client, &output, 1000).await.unwrap();

    assert_eq!(written, 2);
    assert_eq!(
        load_fqn_list(&output).unwrap(),
        vec!["SVC.DB.SCHEMA.FOO", "SVC.DB.SCHEMA.BAR"]
    );
}

#[tokio::test]
async fn test_export_surfaces_client_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tables"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("fqns.csv");

    let err = export_table_fqns(&client, &output, 1000).await.unwrap_err();

    assert!(matches!(
        err,
        TaggerError::Client(ClientError::Unauthorized(_))
    ));
    assert!(!output.exists());
}
