//! Facial adapter tests against a mock Hume streaming endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_async, accept_hdr_async};

use aura_checkin::core::emotion::EmotionSource;
use aura_checkin::core::ingress::{
    AdapterStatus, CaptureInput, FacialAdapter, FacialConfig, FailureKind, IngressAdapter,
    IngressEvent, ReconnectPolicy,
};

fn test_config(addr: SocketAddr) -> FacialConfig {
    FacialConfig::new("test-key")
        .with_url(format!("ws://{addr}"))
        .with_capture_interval(Duration::from_millis(20))
        .with_reconnect(ReconnectPolicy {
            max_reconnects: 3,
            initial_delay_ms: 10,
            max_delay_ms: 50,
            backoff_multiplier: 1.0,
            jitter: false,
        })
}

/// Wait for the next event matching `pred`, skipping the rest.
async fn next_matching(
    rx: &mut mpsc::Receiver<IngressEvent>,
    pred: impl Fn(&IngressEvent) -> bool,
) -> IngressEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn test_frames_produce_readings_and_clears() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (key_tx, key_rx) = oneshot::channel::<Option<String>>();
    let (frame_tx, frame_rx) = oneshot::channel::<Value>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let key = req
                .headers()
                .get("x-hume-api-key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let _ = key_tx.send(key);
            Ok(resp)
        };
        let ws = accept_hdr_async(stream, callback).await.unwrap();
        let (mut write, mut read) = ws.split();

        let Some(Ok(Message::Text(text))) = read.next().await else {
            panic!("expected a frame request");
        };
        let _ = frame_tx.send(serde_json::from_str(&text).unwrap());

        let detected = json!({
            "face": {"predictions": [{
                "prob": 0.93,
                "emotions": [
                    {"name": "Joy", "score": 0.61},
                    {"name": "Sadness", "score": 0.12}
                ]
            }]}
        });
        write.send(Message::Text(detected.to_string().into())).await.unwrap();
        let cleared = json!({"face": {"predictions": []}});
        write.send(Message::Text(cleared.to_string().into())).await.unwrap();

        // Keep the socket open until the client leaves
        while let Some(Ok(_)) = read.next().await {}
    });

    let (tx, mut rx) = mpsc::channel(64);
    let mut adapter = FacialAdapter::new(test_config(addr));
    adapter.connect(tx).await.unwrap();
    adapter.accept(&CaptureInput::Frame("aGVsbG8=".to_string()));

    let event = next_matching(&mut rx, |e| matches!(e, IngressEvent::Reading { .. })).await;
    let IngressEvent::Reading {
        reading,
        face_predictions,
    } = event
    else {
        unreachable!()
    };
    assert_eq!(reading.source, EmotionSource::Facial);
    assert_eq!(reading.confidence, 0.93);
    assert_eq!(reading.emotions.dominant().unwrap().name, "Joy");
    assert_eq!(face_predictions.len(), 1);

    let event = next_matching(&mut rx, |e| matches!(e, IngressEvent::Cleared { .. })).await;
    assert!(matches!(
        event,
        IngressEvent::Cleared {
            source: EmotionSource::Facial
        }
    ));

    assert_eq!(key_rx.await.unwrap().as_deref(), Some("test-key"));
    let frame = frame_rx.await.unwrap();
    assert_eq!(frame["data"], "aGVsbG8=");
    assert_eq!(frame["reset_stream"], true);
    assert_eq!(frame["models"], json!({"face": {}}));
    assert_eq!(adapter.status(), AdapterStatus::Connected);

    adapter.dispose().await;
    assert_eq!(adapter.status(), AdapterStatus::Disconnected);
}

#[tokio::test]
async fn test_vendor_error_is_fatal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));

    let counter = connections.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                let error = json!({"error": "Invalid API key for streaming", "code": "E0300"});
                let _ = ws.send(Message::Text(error.to_string().into())).await;
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    let (tx, mut rx) = mpsc::channel(64);
    let mut adapter = FacialAdapter::new(test_config(addr));
    adapter.connect(tx).await.unwrap();

    let event = next_matching(&mut rx, |e| matches!(e, IngressEvent::Failed { .. })).await;
    match event {
        IngressEvent::Failed { source, kind, message } => {
            assert_eq!(source, EmotionSource::Facial);
            assert_eq!(kind, FailureKind::Vendor);
            assert!(message.contains("E0300"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(adapter.status(), AdapterStatus::Error);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(connections.load(Ordering::SeqCst), 1);

    // Dispose keeps the terminal status
    adapter.dispose().await;
    assert_eq!(adapter.status(), AdapterStatus::Error);
}

#[tokio::test]
async fn test_rejected_handshake_is_authentication_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 2048];
        let _ = stream.read(&mut buf).await;
        let _ = stream
            .write_all(b"HTTP/1.1 401 Unauthorized\r\ncontent-length: 0\r\n\r\n")
            .await;
    });

    let (tx, mut rx) = mpsc::channel(64);
    let mut adapter = FacialAdapter::new(test_config(addr));
    adapter.connect(tx).await.unwrap();

    let event = next_matching(&mut rx, |e| matches!(e, IngressEvent::Failed { .. })).await;
    assert!(matches!(
        event,
        IngressEvent::Failed {
            kind: FailureKind::Authentication,
            ..
        }
    ));
    adapter.dispose().await;
}
