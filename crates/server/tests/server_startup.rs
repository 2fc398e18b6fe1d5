use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a config with a fast simulated line
fn config_with_db(port: u16, db_path: &str) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[database]
path = "{}"

[campaign]
grace_interval_ms = 100
settle_delay_ms = 50

[telephony]
backend = "simulated"

[telephony.simulated]
ring_ms = 50
talk_ms = 100
answer = true
"#,
        port, db_path
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_dialer"))
        .env("DIALER_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_and_config_endpoints() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("dialer.db");
    let port = get_available_port();
    let config_file = write_config(&config_with_db(port, &db_path.display().to_string()));

    let mut server = spawn_server(config_file.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let health: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(health["status"], "ok");

    let config: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/api/v1/config", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(config["server"]["port"], port);
    assert_eq!(config["campaign"]["grace_interval_ms"], 100);
    assert_eq!(config["telephony"]["simulated"]["talk_ms"], 100);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_campaign_runs_to_completion_on_simulated_line() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("dialer.db");
    let port = get_available_port();
    let config_file = write_config(&config_with_db(port, &db_path.display().to_string()));

    let mut server = spawn_server(config_file.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{}/api/v1/campaign/start", port))
        .json(&json!({
            "targets": [
                { "id": "a", "phone": "555-0001", "display_name": "A" },
                { "id": "b", "phone": "555-0002", "display_name": "B" }
            ]
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    // Each call lasts ~150ms, then grace and settle; allow plenty of slack
    let mut final_status = serde_json::Value::Null;
    for _ in 0..100 {
        let status: serde_json::Value = client
            .get(format!("http://127.0.0.1:{}/api/v1/campaign/status", port))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        if status["status"] == "stopped" {
            final_status = status;
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(final_status["status"], "stopped", "Campaign did not complete");
    assert_eq!(final_status["cursor"], 2);

    let activity: serde_json::Value = client
        .get(format!(
            "http://127.0.0.1:{}/api/v1/activity?kind=call_ended",
            port
        ))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(activity["total"], 2);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_dialer"))
            .env("DIALER_CONFIG", "/nonexistent/config.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_campaign_delay_exits_with_error() {
    let config_file = write_config(
        r#"
[server]
port = 8080

[campaign]
grace_interval_ms = 0
"#,
    );

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_dialer"))
            .env("DIALER_CONFIG", config_file.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}
