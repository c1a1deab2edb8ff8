//! End-to-end check-in over `/ws/checkin` with demo adapters.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use aura_checkin::ServerConfig;
use aura_checkin::core::report::ReportGenerator;
use aura_checkin::core::session::VendorAdapterFactory;
use aura_checkin::core::storage::CheckinRepository;
use aura_checkin::routes;
use aura_checkin::state::AppState;

/// Serve the app on an ephemeral port. No Hume key is configured, so both
/// channels run on demo data.
async fn spawn_server(repository: CheckinRepository) -> SocketAddr {
    let mut config = ServerConfig::default();
    config.checkin.tick_ms = 100;
    let factory = VendorAdapterFactory {
        facial: config.facial_config(),
        vocal: config.vocal_config(),
        demo_interval: Duration::from_millis(40),
    };
    let reports = ReportGenerator::new(repository.clone(), None);
    let state = AppState::with_parts(config, repository, reports, Arc::new(factory));
    let app = routes::create_app_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_checkin_runs_to_submission() {
    let repository = CheckinRepository::in_memory();
    let addr = spawn_server(repository.clone()).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws/checkin"))
        .await
        .unwrap();
    let start = json!({"type": "start", "patient_id": "p-9", "duration_secs": 1});
    ws.send(Message::Text(start.to_string().into())).await.unwrap();

    let mut types = Vec::new();
    let mut summary_points = None;
    let mut submitted_id = None;

    timeout(Duration::from_secs(10), async {
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let event: Value = serde_json::from_str(&text).unwrap();
            let kind = event["type"].as_str().unwrap().to_string();
            match kind.as_str() {
                "summary" => {
                    summary_points = event["summary"]["totalPoints"].as_u64();
                }
                "submitted" => {
                    submitted_id = event["id"].as_str().map(str::to_string);
                    types.push(kind);
                    break;
                }
                _ => {}
            }
            types.push(kind);
        }
    })
    .await
    .expect("check-in did not finish");

    assert_eq!(types.first().map(String::as_str), Some("phase"));
    assert!(types.iter().any(|t| t == "demo_mode"));
    assert!(types.iter().any(|t| t == "emotion"));
    assert!(types.iter().any(|t| t == "countdown"));
    assert!(summary_points.unwrap() > 0);

    let stored = repository.load_checkin(&submitted_id.unwrap()).await.unwrap();
    assert_eq!(stored.patient_id.as_deref(), Some("p-9"));
    assert_eq!(stored.emotion_timeline.len() as u64, summary_points.unwrap());
}

#[tokio::test]
async fn test_invalid_messages_report_errors() {
    let addr = spawn_server(CheckinRepository::in_memory()).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws/checkin"))
        .await
        .unwrap();

    ws.send(Message::Text(r#"{"type": "dance"}"#.into())).await.unwrap();
    ws.send(Message::Text(r#"{"type": "stop"}"#.into())).await.unwrap();

    let mut errors = Vec::new();
    timeout(Duration::from_secs(5), async {
        while errors.len() < 2 {
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                break;
            };
            let event: Value = serde_json::from_str(&text).unwrap();
            if event["type"] == "error" {
                errors.push(event["message"].as_str().unwrap().to_string());
            }
        }
    })
    .await
    .expect("no error events");

    assert!(errors[0].contains("Invalid message format"));
    // Stopping an idle session is rejected by the session loop
    assert!(errors[1].contains("finish"));
}
