use std::fs;
use std::path::Path;

use serde_json::json;
use tokio::task::JoinHandle;

use tabweave::config::{EngineConfig, ServerConfig};
use tabweave::server::{serve, AppState};

async fn start_ephemeral(input: &Path, output_dir: &Path, unique_output: bool) -> (JoinHandle<()>, String) {
    let config = ServerConfig {
        http_port: 0,
        input_dir: input.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        output_file: "processed_output.csv".to_string(),
        unique_output,
    };
    let state = AppState::from_config(&config, EngineConfig::default());
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await { eprintln!("http server task error: {e:?}"); }
    });
    (handle, format!("http://{}", addr))
}

fn seed(dir: &Path) {
    fs::write(dir.join("data1.csv"), "id,age\n1,20\n2,30\n3,40\n").unwrap();
    fs::write(dir.join("data2.csv"), "roll,city\n1,Oslo\n3,Lima\n").unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn health_and_process_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let out_dir = tmp.path().join("out");
    let (handle, base) = start_ephemeral(tmp.path(), &out_dir, false).await;
    let client = reqwest::Client::new();

    let health = client.get(format!("{}/", base)).send().await.unwrap();
    assert!(health.status().is_success());
    assert_eq!(health.text().await.unwrap(), "tabweave ok");

    let resp = client
        .post(format!("{}/process", base))
        .json(&json!({
            "tables_and_join": {
                "primary": { "name": "data1.csv", "join_keys": ["id"] },
                "secondaries": [ { "name": "data2.csv", "join_keys": ["roll"], "join_kind": "inner" } ]
            },
            "filters": [ { "name": "data1.csv", "conditions": { "expressions": ["age > 25"] } } ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let v: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(v["status"], json!("ok"));
    assert_eq!(v["rows"], json!(1));
    let dest = v["message"].as_str().unwrap().to_string();
    let text = fs::read_to_string(&dest).unwrap();
    assert!(text.lines().next().unwrap().contains("data1__id"));
    assert!(text.contains("Lima"));
    handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn errors_map_to_status_and_code() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (handle, base) = start_ephemeral(tmp.path(), &tmp.path().join("out"), false).await;
    let client = reqwest::Client::new();

    let cases = vec![
        // two expressions without an operator
        (json!({
            "tables_and_join": { "primary": { "name": "data1.csv" } },
            "filters": [ { "name": "data1.csv", "conditions": { "expressions": ["age > 1", "id < 3"] } } ]
        }), 400, "schema_validation"),
        (json!({
            "tables_and_join": { "primary": { "name": "data1.csv",
                "derived_columns": [ { "statement": "CASE WHEN age > 1 THEN 1 ELSE 0 END FROM data1" } ] } },
            "filters": [ { "name": "data1.csv", "conditions": { "expressions": ["age > 1"] } } ]
        }), 400, "derived_column_parse"),
        (json!({
            "tables_and_join": {
                "primary": { "name": "data1.csv", "join_keys": ["id", "age"] },
                "secondaries": [ { "name": "data2.csv", "join_keys": ["roll"] } ]
            }
        }), 400, "join_column_mismatch"),
        (json!({
            "tables_and_join": { "primary": { "name": "nothing.csv" } },
            "filters": [ { "name": "nothing.csv", "conditions": { "expressions": ["a > 1"] } } ]
        }), 404, "source_not_found"),
        (json!({
            "tables_and_join": { "primary": { "name": "data1.csv" } },
            "filters": [ { "name": "data1.csv", "conditions": { "expressions": ["weight > 1"] } } ]
        }), 422, "column_not_found"),
        (json!({ "unexpected": true }), 400, "schema_validation"),
    ];
    for (body, status, code) in cases {
        let resp = client.post(format!("{}/process", base)).json(&body).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), status, "body: {}", body);
        let v: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(v["status"], json!("error"));
        assert_eq!(v["code"], json!(code), "body: {}", body);
        assert!(v["message"].as_str().map(|m| !m.is_empty()).unwrap_or(false));
    }

    // a body that is not JSON still gets the JSON error envelope
    let resp = client
        .post(format!("{}/process", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let v: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(v["status"], json!("error"));
    assert_eq!(v["code"], json!("schema_validation"));
    handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_get_distinct_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (handle, base) = start_ephemeral(tmp.path(), &tmp.path().join("out"), true).await;
    let client = reqwest::Client::new();
    let body = json!({
        "tables_and_join": { "primary": { "name": "data1.csv" } },
        "filters": [ { "name": "data1.csv", "conditions": { "expressions": ["id >= 1"] } } ]
    });
    let requests = (0..4).map(|_| {
        let client = client.clone();
        let url = format!("{}/process", base);
        let body = body.clone();
        async move {
            let v: serde_json::Value = client.post(url).json(&body).send().await.unwrap().json().await.unwrap();
            v["message"].as_str().unwrap().to_string()
        }
    });
    let mut dests = futures::future::join_all(requests).await;
    dests.sort();
    dests.dedup();
    assert_eq!(dests.len(), 4);
    for d in &dests {
        assert_eq!(fs::read_to_string(d).unwrap().lines().count(), 4);
    }
    handle.abort();
}
