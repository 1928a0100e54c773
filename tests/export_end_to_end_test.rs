//! End-to-end export tests
//!
//! Runs the driver built from a configuration file against a mock findings
//! API, writing objects and state into a temporary directory.

use mockito::{Matcher, Server};
use sechub_export::adapters::parameter::{FileCounterStore, FileLeaseStore};
use sechub_export::config::{parse_config, ExporterConfig};
use sechub_export::core::export::{ExecutionDriver, TerminalOutcome};
use sechub_export::core::state::{CounterStore, LeaseStore};
use sechub_export::domain::{Cursor, ExecutionId, ExportError};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::sync::watch;

const COUNTER: &str = "/sechubexport/count";

fn config(server_url: &str, dir: &Path, extra: &str) -> ExporterConfig {
    let toml = format!(
        r#"
[source]
endpoint = "{server_url}"
region = "eu-west-1"
api_token = "e2e-token"
max_results = 2
pages_per_call = 2
timeout_seconds = 5
throttle_delay_ms = 10

[storage]
path = "{storage}"
object_prefix = "security-hub-finding-export"

[state]
path = "{state}"

[workflow]
max_attempts = 2
initial_interval_ms = 10

[logging]
local_enabled = false

{extra}
"#,
        storage = dir.join("findings").display(),
        state = dir.join("state").display(),
    );
    parse_config(&toml).unwrap()
}

fn stored_objects(root: &Path) -> Vec<PathBuf> {
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, out);
            } else {
                out.push(path);
            }
        }
    }
    let mut out = Vec::new();
    walk(root, &mut out);
    out.sort();
    out
}

fn findings(ids: &[&str]) -> Vec<Value> {
    ids.iter()
        .map(|id| json!({ "Id": id, "Severity": { "Label": "HIGH" } }))
        .collect()
}

#[tokio::test]
async fn test_export_writes_batches_and_counts() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let first = server
        .mock("POST", "/findings")
        .match_header("authorization", "Bearer e2e-token")
        .match_body(Matcher::Json(json!({ "Filters": {}, "MaxResults": 2 })))
        .with_status(200)
        .with_body(json!({ "Findings": findings(&["f1", "f2"]), "NextToken": "t1" }).to_string())
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/findings")
        .match_body(Matcher::PartialJson(json!({ "NextToken": "t1" })))
        .with_status(200)
        .with_body(json!({ "Findings": findings(&["f3"]), "NextToken": "t2" }).to_string())
        .expect(1)
        .create_async()
        .await;
    let third = server
        .mock("POST", "/findings")
        .match_body(Matcher::PartialJson(json!({ "NextToken": "t2" })))
        .with_status(200)
        .with_body(json!({ "Findings": findings(&["f4", "f5"]) }).to_string())
        .expect(1)
        .create_async()
        .await;

    let config = config(&server.url(), dir.path(), "");
    let driver = ExecutionDriver::from_config(&config).unwrap();
    let (_tx, rx) = watch::channel(false);

    let summary = driver.run(None, rx).await.unwrap();

    first.assert_async().await;
    second.assert_async().await;
    third.assert_async().await;

    assert_eq!(summary.outcome, TerminalOutcome::Succeeded);
    assert_eq!(summary.items_exported, 5);
    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.counter_value, Some(5));

    // One object per fetch call: pages 1-2, then page 3
    let objects = stored_objects(&dir.path().join("findings"));
    assert_eq!(objects.len(), 2);
    let mut sizes: Vec<usize> = objects
        .iter()
        .map(|path| {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("security-hub-finding-export"));
            assert!(name.ends_with(".json"));
            let body: Vec<Value> =
                serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
            body.len()
        })
        .collect();
    sizes.sort();
    assert_eq!(sizes, vec![2, 3]);

    let counter = FileCounterStore::new(dir.path().join("state"), COUNTER);
    assert_eq!(counter.get().await.unwrap(), 5);

    let leases = FileLeaseStore::new(dir.path().join("state"));
    assert!(leases
        .current(&config.state.lease_name)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_resume_from_cursor() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let resumed = server
        .mock("POST", "/findings")
        .match_body(Matcher::PartialJson(json!({ "NextToken": "resume-here" })))
        .with_status(200)
        .with_body(json!({ "Findings": findings(&["f9"]) }).to_string())
        .expect(1)
        .create_async()
        .await;

    let config = config(&server.url(), dir.path(), "");
    let driver = ExecutionDriver::from_config(&config).unwrap();
    let (_tx, rx) = watch::channel(false);

    let summary = driver
        .run(Some(Cursor::new("resume-here").unwrap()), rx)
        .await
        .unwrap();

    resumed.assert_async().await;
    assert_eq!(summary.items_exported, 1);
}

#[tokio::test]
async fn test_rejected_requests_fail_without_writes() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let denied = server
        .mock("POST", "/findings")
        .with_status(403)
        .with_body("not authorized")
        .expect(2)
        .create_async()
        .await;

    let config = config(&server.url(), dir.path(), "");
    let counter = FileCounterStore::new(dir.path().join("state"), COUNTER);
    counter.set(11).await.unwrap();

    let driver = ExecutionDriver::from_config(&config).unwrap();
    let (_tx, rx) = watch::channel(false);

    let summary = driver.run(None, rx).await.unwrap();

    denied.assert_async().await;
    assert_eq!(summary.outcome, TerminalOutcome::Failed);
    assert_eq!(summary.cause.as_deref(), Some("Security Hub Export Failed."));
    assert!(summary.error.unwrap().contains("not authorized"));
    assert!(stored_objects(&dir.path().join("findings")).is_empty());
    assert_eq!(counter.get().await.unwrap(), 11);
}

#[tokio::test]
async fn test_status_webhook_receives_terminal_event() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let _findings = server
        .mock("POST", "/findings")
        .with_status(200)
        .with_body(json!({ "Findings": findings(&["f1"]) }).to_string())
        .create_async()
        .await;
    let webhook = server
        .mock("POST", "/hooks/status")
        .match_body(Matcher::PartialJson(json!({
            "status": "SUCCEEDED",
            "topic": "Security_Hub_Export_Status",
            "itemsExported": 1,
            "counterValue": 1
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let extra = format!(
        "[notification]\nwebhook_url = \"{}/hooks/status\"\n",
        server.url()
    );
    let config = config(&server.url(), dir.path(), &extra);
    let driver = ExecutionDriver::from_config(&config).unwrap();
    let (_tx, rx) = watch::channel(false);

    let summary = driver.run(None, rx).await.unwrap();

    assert!(summary.is_successful());
    webhook.assert_async().await;
}

#[tokio::test]
async fn test_running_execution_blocks_second() {
    let server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = config(&server.url(), dir.path(), "");

    let leases = FileLeaseStore::new(dir.path().join("state"));
    let other = ExecutionId::new();
    leases
        .try_acquire(&config.state.lease_name, other, None)
        .await
        .unwrap();

    let driver = ExecutionDriver::from_config(&config).unwrap();
    let (_tx, rx) = watch::channel(false);

    match driver.run(None, rx).await {
        Err(ExportError::LeaseHeld { holder, .. }) => assert_eq!(holder, other.to_string()),
        unexpected => panic!("expected LeaseHeld, got {unexpected:?}"),
    }
}

#[tokio::test]
async fn test_export_recovers_after_crashed_holder_expires() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let _findings = server
        .mock("POST", "/findings")
        .with_status(200)
        .with_body(json!({ "Findings": findings(&["f1"]) }).to_string())
        .create_async()
        .await;

    let config = config(&server.url(), dir.path(), "");

    // A previous process took the lease and died without releasing it
    let leases = FileLeaseStore::new(dir.path().join("state"));
    leases
        .try_acquire(
            &config.state.lease_name,
            ExecutionId::new(),
            Some(std::time::Duration::from_millis(10)),
        )
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let driver = ExecutionDriver::from_config(&config).unwrap();
    let (_tx, rx) = watch::channel(false);
    let summary = driver.run(None, rx).await.unwrap();

    assert!(summary.is_successful());
    assert_eq!(summary.items_exported, 1);
    assert!(leases
        .current(&config.state.lease_name)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_throttled_page_is_retried_within_one_call() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let first = server
        .mock("POST", "/findings")
        .match_body(Matcher::Json(json!({ "Filters": {}, "MaxResults": 2 })))
        .with_status(200)
        .with_body(json!({ "Findings": findings(&["f1", "f2"]), "NextToken": "t1" }).to_string())
        .expect(1)
        .create_async()
        .await;
    // Mockito serves the first matching mock still expecting hits, so the
    // 429 answers the first request for page 2 and the 200 the repeat
    let throttled = server
        .mock("POST", "/findings")
        .match_body(Matcher::PartialJson(json!({ "NextToken": "t1" })))
        .with_status(429)
        .with_body("Rate exceeded")
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/findings")
        .match_body(Matcher::PartialJson(json!({ "NextToken": "t1" })))
        .with_status(200)
        .with_body(json!({ "Findings": findings(&["f3"]) }).to_string())
        .expect(1)
        .create_async()
        .await;

    let config = config(&server.url(), dir.path(), "");
    let driver = ExecutionDriver::from_config(&config).unwrap();
    let (_tx, rx) = watch::channel(false);

    let summary = driver.run(None, rx).await.unwrap();

    first.assert_async().await;
    throttled.assert_async().await;
    second.assert_async().await;

    assert_eq!(summary.outcome, TerminalOutcome::Succeeded);
    assert_eq!(summary.items_exported, 3);
    assert_eq!(summary.pages_fetched, 1);

    let objects = stored_objects(&dir.path().join("findings"));
    assert_eq!(objects.len(), 1);
    let body: Vec<Value> = serde_json::from_slice(&std::fs::read(&objects[0]).unwrap()).unwrap();
    assert_eq!(body.len(), 3);
}
