#![allow(dead_code)]

use formulary::api::{AppState, build_router};
use formulary::config::{database, settings::Settings};
use serde_json::{Value, json};
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A server on an ephemeral port, backed by a SQLite file and an upload
/// directory inside a temp dir that is removed on drop.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub upload_dir: PathBuf,
    _tmp: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn post_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }

    pub async fn patch_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.patch(self.url(path)).json(&body).send().await.unwrap()
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client.delete(self.url(path)).send().await.unwrap()
    }

    /// Creates an ingredient and returns its id.
    pub async fn create_ingredient(&self, name: &str) -> String {
        let resp = self
            .post_json("/ingredients", ingredient_body(name, "kg", 10.0))
            .await;
        assert_eq!(resp.status(), 201, "creating ingredient {name}");
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Creates a formula and returns its id.
    pub async fn create_formula(
        &self,
        name: &str,
        description: Option<&str>,
        shares: &[(&str, f64)],
    ) -> String {
        let resp = self
            .post_json("/formulas", formula_body(name, description, 100.0, shares))
            .await;
        assert_eq!(resp.status(), 201, "creating formula {name}");
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

pub fn ingredient_body(name: &str, unit: &str, cost: f64) -> Value {
    json!({
        "data": {
            "type": "ingredient",
            "attributes": { "name": name, "unit": unit, "cost_per_unit": cost }
        }
    })
}

pub fn share_links(shares: &[(&str, f64)]) -> Value {
    let data: Vec<Value> = shares
        .iter()
        .map(|(id, pct)| json!({ "type": "ingredient", "id": id, "meta": { "percentage": pct } }))
        .collect();
    json!({ "ingredients": { "data": data } })
}

pub fn formula_resource(
    name: &str,
    description: Option<&str>,
    mass: f64,
    shares: &[(&str, f64)],
) -> Value {
    json!({
        "type": "formula",
        "attributes": { "name": name, "description": description, "mass": mass },
        "relationships": share_links(shares)
    })
}

pub fn formula_body(
    name: &str,
    description: Option<&str>,
    mass: f64,
    shares: &[(&str, f64)],
) -> Value {
    json!({ "data": formula_resource(name, description, mass, shares) })
}

/// First error detail of an error document.
pub async fn error_detail(resp: reqwest::Response) -> String {
    let body: Value = resp.json().await.unwrap();
    body["errors"][0]["detail"].as_str().unwrap().to_string()
}

pub async fn start_test_server() -> TestServer {
    let tmp = tempfile::tempdir().unwrap();
    let upload_dir = tmp.path().join("uploads");

    let url = format!("sqlite://{}?mode=rwc", tmp.path().join("test.sqlite").display());
    let db = database::create_connection(&url).await.unwrap();
    database::create_tables(&db).await.unwrap();

    let mut settings = Settings::default();
    settings.storage.upload_dir = upload_dir.clone();

    let app = build_router(AppState::new(db, settings));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}/api/v1"),
        client: reqwest::Client::new(),
        upload_dir,
        _tmp: tmp,
    }
}
