//! Integration tests for the classroom server and the WebSocket client
//!
//! Every test starts its own server on an ephemeral port and talks to it over
//! a real socket.

use futures::{SinkExt, StreamExt};
use liveclass_core::{
    demo_classes, CaptureMode, ClassroomService, RecordingUpload, ServiceError, UploadProgress,
};
use liveclass_service::{
    ClassroomServer, ServiceRequest, ServiceResponse, WebSocketClassroomService, UPLOAD_FRAME_SIZE,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn start_test_server() -> (ClassroomServer, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = ClassroomServer::new(addr, demo_classes());
    let server_clone = server.clone();
    tokio::spawn(async move {
        let _ = server_clone.serve(listener).await;
    });

    (server, addr)
}

fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{}", addr)
}

fn upload(size: usize) -> RecordingUpload {
    RecordingUpload {
        title: "Fractions".to_string(),
        description: "Adding unlike fractions".to_string(),
        mode: CaptureMode::Screen,
        mime_type: "video/webm".to_string(),
        data: (0..size).map(|i| (i % 256) as u8).collect::<Vec<u8>>().into(),
    }
}

#[tokio::test]
async fn test_list_and_join() {
    let (server, addr) = start_test_server().await;
    let client = WebSocketClassroomService::connect(ws_url(addr)).await.unwrap();

    let classes = client.list_classes().await.unwrap();
    assert_eq!(classes.len(), 3);
    assert_eq!(classes[0].title, "Mathematics - Algebra Basics");

    assert!(client.join_class("1").await.unwrap());
    assert!(!client.join_class("3").await.unwrap());
    assert!(!client.join_class("missing").await.unwrap());
    assert_eq!(server.join_count("1"), 1);
}

#[tokio::test]
async fn test_upload_round_trip() {
    let (server, addr) = start_test_server().await;
    let client = WebSocketClassroomService::new(ws_url(addr));
    let (progress, rx) = UploadProgress::channel();

    let size = UPLOAD_FRAME_SIZE * 2 + 123;
    let lesson_id = timeout(
        Duration::from_secs(5),
        client.upload_recording(upload(size), progress),
    )
    .await
    .expect("upload timed out")
    .unwrap();

    assert!(lesson_id.starts_with("lesson-"));
    assert_eq!(*rx.borrow(), 100);

    let stored = server.lesson(&lesson_id).expect("stored lesson");
    assert_eq!(stored.data.len(), size);
    assert_eq!(stored.mode, CaptureMode::Screen);
    assert_eq!(stored.title, "Fractions");
}

#[tokio::test]
async fn test_unreachable_service_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = WebSocketClassroomService::new(ws_url(addr));
    let result = client.list_classes().await;
    assert!(matches!(result, Err(ServiceError::Network { .. })));
}

#[tokio::test]
async fn test_blank_title_is_refused() {
    let (server, addr) = start_test_server().await;
    let client = WebSocketClassroomService::connect(ws_url(addr)).await.unwrap();
    let (progress, _rx) = UploadProgress::channel();

    let mut recording = upload(16);
    recording.title = "  ".to_string();
    match client.upload_recording(recording, progress).await {
        Err(ServiceError::Server { code, .. }) => assert_eq!(code, "INVALID_UPLOAD"),
        other => panic!("Expected INVALID_UPLOAD, got {:?}", other),
    }
    assert!(server.lessons().is_empty());
}

#[tokio::test]
async fn test_raw_protocol_errors() {
    let (_server, addr) = start_test_server().await;
    let (mut ws, _) = connect_async(ws_url(addr)).await.unwrap();

    async fn next_response(
        ws: &mut tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    ) -> ServiceResponse {
        loop {
            let frame = timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("response timed out")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    ws.send(Message::Text("{not json".to_string())).await.unwrap();
    match next_response(&mut ws).await {
        ServiceResponse::Error { error_code, .. } => assert_eq!(error_code, "INVALID_MESSAGE"),
        other => panic!("Expected error, got {:?}", other),
    }

    let end = serde_json::to_string(&ServiceRequest::EndUpload).unwrap();
    ws.send(Message::Text(end)).await.unwrap();
    match next_response(&mut ws).await {
        ServiceResponse::Error { error_code, .. } => assert_eq!(error_code, "NO_UPLOAD"),
        other => panic!("Expected error, got {:?}", other),
    }

    let begin = serde_json::to_string(&ServiceRequest::BeginUpload {
        title: "Short".to_string(),
        description: String::new(),
        mode: CaptureMode::Camera,
        mime_type: "video/webm".to_string(),
        size: 10,
    })
    .unwrap();
    ws.send(Message::Text(begin)).await.unwrap();
    assert!(matches!(
        next_response(&mut ws).await,
        ServiceResponse::UploadReady { .. }
    ));

    ws.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    let end = serde_json::to_string(&ServiceRequest::EndUpload).unwrap();
    ws.send(Message::Text(end)).await.unwrap();
    match next_response(&mut ws).await {
        ServiceResponse::Error { error_code, .. } => assert_eq!(error_code, "SIZE_MISMATCH"),
        other => panic!("Expected error, got {:?}", other),
    }
}
