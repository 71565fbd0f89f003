//! End-to-end tests against a real listening server.
//!
//! Nothing here touches SSH: the routes exercised are the ones that can be
//! answered from local state (profiles, local listings, validation errors).

use std::fs;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use skiff::registry::ServerRegistry;
use skiff::server::{self, AppState};

struct TestServer {
    base: String,
    _config_dir: TempDir,
}

async fn start_server() -> TestServer {
    let config_dir = TempDir::new().unwrap();
    let servers_file = config_dir.path().join("servers.json");
    fs::write(
        &servers_file,
        json!({
            "servers": [{
                "name": "staging",
                "host": "staging.example.com",
                "port": 22,
                "user": "deploy",
                "authMode": "ssh_agent"
            }]
        })
        .to_string(),
    )
    .unwrap();

    let registry = ServerRegistry::with_path(servers_file);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(listener, AppState::new(registry)));

    TestServer {
        base: format!("http://{}", addr),
        _config_dir: config_dir,
    }
}

#[tokio::test]
async fn servers_endpoint_returns_configured_profiles() {
    let srv = start_server().await;

    let body: Value = reqwest::get(format!("{}/api/servers", srv.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    let servers = body["data"].as_array().unwrap();
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0]["name"], "staging");
    assert_eq!(servers[0]["host"], "staging.example.com");
    assert_eq!(servers[0]["user"], "deploy");
    assert_eq!(servers[0]["authMode"], "ssh_agent");
    // Key material never crosses the API.
    assert!(servers[0].get("identityFile").is_none());
}

#[tokio::test]
async fn local_listing_skips_dotfiles_and_sorts_dirs_first() {
    let srv = start_server().await;

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
    fs::write(dir.path().join(".hidden"), b"x").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();

    let url = format!(
        "{}/api/local?path={}",
        srv.base,
        dir.path().to_str().unwrap()
    );
    let body: Value = reqwest::get(url).await.unwrap().json().await.unwrap();

    assert_eq!(body["success"], true);
    let files = body["data"]["files"].as_array().unwrap();
    let names: Vec<&str> = files.iter().map(|f| f["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["sub", "notes.txt"]);
    assert_eq!(files[0]["isDir"], true);
    assert_eq!(files[1]["size"], 5);
}

#[tokio::test]
async fn unknown_server_is_rejected_before_any_connection() {
    let srv = start_server().await;

    let body: Value = reqwest::get(format!("{}/api/remote?server=ghost", srv.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Server not found");

    let body: Value = reqwest::Client::new()
        .post(format!("{}/api/transfer", srv.base))
        .json(&json!({
            "server": "ghost",
            "direction": "upload",
            "localPath": "/tmp/a",
            "remotePath": "/tmp/b"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Server not found");
}

#[tokio::test]
async fn malformed_transfer_body_still_gets_the_envelope() {
    let srv = start_server().await;

    let body: Value = reqwest::Client::new()
        .post(format!("{}/api/transfer", srv.base))
        .header("content-type", "application/json")
        .body("{\"server\": \"staging\", \"direction\":")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], false);
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn preflight_gets_permissive_cors() {
    let srv = start_server().await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/api/servers", srv.base))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-methods")
            .unwrap(),
        "GET, POST, OPTIONS"
    );
}

#[tokio::test]
async fn index_serves_the_embedded_page() {
    let srv = start_server().await;

    let response = reqwest::get(format!("{}/", srv.base)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let text = response.text().await.unwrap();
    assert!(text.contains("skiff"));
}
