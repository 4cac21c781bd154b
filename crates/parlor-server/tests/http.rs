//! End-to-end HTTP tests against a real listener.

use std::sync::Arc;

use parlor_server::{ParlorServer, ServerConfig};
use parlor_store::Database;
use reqwest::StatusCode;

struct TestServer {
    base: String,
    server: Arc<ParlorServer>,
    _site: tempfile::TempDir,
    _db_dir: tempfile::TempDir,
}

async fn boot_server() -> TestServer {
    let site = tempfile::tempdir().unwrap();
    std::fs::write(site.path().join("index.html"), "<title>parlor</title>").unwrap();
    std::fs::write(site.path().join("style.css"), "body{}").unwrap();

    let db_dir = tempfile::tempdir().unwrap();
    let db = Database::open(&db_dir.path().join("parlor.db")).unwrap();

    let config = ServerConfig {
        static_dir: site.path().to_path_buf(),
        ..ServerConfig::default()
    };
    let server = Arc::new(ParlorServer::new(config, db));
    let (addr, _handle) = server.listen().await.unwrap();
    TestServer {
        base: format!("http://{addr}"),
        server,
        _site: site,
        _db_dir: db_dir,
    }
}

#[tokio::test]
async fn index_and_static_files() {
    let t = boot_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/", t.base)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "<title>parlor</title>");

    let resp = client
        .get(format!("{}/style.css", t.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{}/missing.png", t.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_connections() {
    let t = boot_server().await;
    let body: serde_json::Value = reqwest::get(format!("{}/health", t.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 0);
    assert_eq!(body["max_connections"], 1024);
}

#[tokio::test]
async fn signup_login_and_servers_flow() {
    let t = boot_server().await;
    let client = reqwest::Client::new();
    let creds = [("username", "ada"), ("password", "lovelace")];

    let resp = client
        .post(format!("{}/submit", t.base))
        .form(&creds)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "Form submitted successfully!");

    let resp = client
        .post(format!("{}/submit", t.base))
        .form(&creds)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let user: serde_json::Value = client
        .post(format!("{}/login", t.base))
        .form(&creds)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(user["username"], "ada");

    let resp = client
        .post(format!("{}/login", t.base))
        .form(&[("username", "ada"), ("password", "wrong")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let server: serde_json::Value = client
        .post(format!("{}/servers", t.base))
        .form(&[("username", "ada"), ("password", "lovelace"), ("name", "lobby")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(server["name"], "lobby");
    assert_eq!(server["created_by"], user["id"]);
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let t = boot_server().await;
    t.server.shutdown().shutdown();
    let mut refused = false;
    for _ in 0..50 {
        if reqwest::get(format!("{}/health", t.base)).await.is_err() {
            refused = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(refused);
}
