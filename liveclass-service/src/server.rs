//! Reference classroom server
//!
//! Serves a class list, answers join requests and stores uploaded lessons in
//! memory. Each WebSocket connection is handled on its own task.

use crate::protocol::{ServiceRequest, ServiceResponse};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use liveclass_core::{CaptureMode, ClassSession, ClassStatus, ServiceError, ServiceResult};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};
use uuid::Uuid;

/// A lesson received from a client
#[derive(Debug, Clone)]
pub struct StoredLesson {
    /// Lesson ID handed back to the client
    pub lesson_id: String,
    /// Lesson title
    pub title: String,
    /// Lesson description
    pub description: String,
    /// What the recording captured
    pub mode: CaptureMode,
    /// Container/codec of `data`
    pub mime_type: String,
    /// The recording
    pub data: Bytes,
    /// When the upload completed
    pub uploaded_at: DateTime<Utc>,
}

/// Upload in progress on one connection
#[derive(Debug)]
struct PendingUpload {
    upload_id: String,
    title: String,
    description: String,
    mode: CaptureMode,
    mime_type: String,
    expected: u64,
    data: BytesMut,
}

/// Per-connection protocol state
#[derive(Debug, Default)]
struct ConnectionState {
    upload: Option<PendingUpload>,
}

fn server_error(code: &str, message: impl Into<String>) -> ServiceError {
    ServiceError::Server {
        code: code.to_string(),
        message: message.into(),
    }
}

/// In-memory classroom server
#[derive(Debug, Clone)]
pub struct ClassroomServer {
    /// Address the server binds to
    pub bind_addr: SocketAddr,
    classes: Arc<RwLock<Vec<ClassSession>>>,
    lessons: Arc<DashMap<String, StoredLesson>>,
    joins: Arc<DashMap<String, usize>>,
}

impl ClassroomServer {
    /// Create a server publishing `classes`
    pub fn new(bind_addr: SocketAddr, classes: Vec<ClassSession>) -> Self {
        Self {
            bind_addr,
            classes: Arc::new(RwLock::new(classes)),
            lessons: Arc::new(DashMap::new()),
            joins: Arc::new(DashMap::new()),
        }
    }

    /// Bind and serve forever
    pub async fn start(&self) -> ServiceResult<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> ServiceResult<()> {
        tracing::info!("Classroom server listening on {}", listener.local_addr()?);

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::debug!("New connection from {}", addr);
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.handle_connection(stream).await;
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Handle one WebSocket connection until it closes
    pub async fn handle_connection(&self, stream: TcpStream) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::error!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let connection_id = Uuid::new_v4().to_string();
        tracing::debug!("WebSocket connection established: {}", connection_id);

        self.handle_messages(&connection_id, ws_stream).await;
        tracing::debug!("Connection {} finished", connection_id);
    }

    async fn handle_messages(&self, connection_id: &str, mut ws: WebSocketStream<TcpStream>) {
        let mut state = ConnectionState::default();

        while let Some(frame) = ws.next().await {
            let result = match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServiceRequest>(&text) {
                    Ok(request) => Some(self.handle_request(&mut state, request).await),
                    Err(e) => {
                        tracing::warn!("Invalid message format: {}", e);
                        Some(Err(server_error("INVALID_MESSAGE", e.to_string())))
                    }
                },
                Ok(Message::Binary(data)) => {
                    Self::handle_upload_frame(&mut state, &data).err().map(Err)
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!("Connection {} closed", connection_id);
                    break;
                }
                Err(e) => {
                    tracing::error!("WebSocket error on connection {}: {}", connection_id, e);
                    break;
                }
                // ping/pong are answered by tungstenite
                Ok(_) => None,
            };

            let response = match result {
                Some(Ok(response)) => response,
                Some(Err(e)) => {
                    tracing::warn!("Request failed on {}: {}", connection_id, e);
                    ServiceResponse::Error {
                        error: e.to_string(),
                        error_code: e.error_code(),
                    }
                }
                None => continue,
            };

            if let Err(e) = Self::send_response(&mut ws, &response).await {
                tracing::error!("Failed to send message to {}: {}", connection_id, e);
                break;
            }
        }
    }

    async fn send_response(
        ws: &mut WebSocketStream<TcpStream>,
        response: &ServiceResponse,
    ) -> ServiceResult<()> {
        let json = serde_json::to_string(response)?;
        ws.send(Message::Text(json))
            .await
            .map_err(|e| ServiceError::network(e.to_string()))
    }

    async fn handle_request(
        &self,
        state: &mut ConnectionState,
        request: ServiceRequest,
    ) -> ServiceResult<ServiceResponse> {
        match request {
            ServiceRequest::ListClasses => Ok(ServiceResponse::ClassList {
                classes: self.classes.read().await.clone(),
            }),
            ServiceRequest::JoinClass { class_id } => {
                let accepted = self.handle_join(&class_id).await;
                Ok(ServiceResponse::JoinResult { class_id, accepted })
            }
            ServiceRequest::BeginUpload {
                title,
                description,
                mode,
                mime_type,
                size,
            } => {
                if state.upload.is_some() {
                    return Err(server_error(
                        "UPLOAD_IN_PROGRESS",
                        "an upload is already in progress on this connection",
                    ));
                }
                if title.trim().is_empty() {
                    return Err(server_error("INVALID_UPLOAD", "lesson title is required"));
                }

                let upload_id = Uuid::new_v4().to_string();
                tracing::info!(
                    "Receiving upload {}: '{}' ({} bytes, {})",
                    upload_id,
                    title,
                    size,
                    mode.upload_tag()
                );
                state.upload = Some(PendingUpload {
                    upload_id: upload_id.clone(),
                    title,
                    description,
                    mode,
                    mime_type,
                    expected: size,
                    data: BytesMut::with_capacity(size.min(64 * 1024 * 1024) as usize),
                });
                Ok(ServiceResponse::UploadReady { upload_id })
            }
            ServiceRequest::EndUpload => {
                let upload = state
                    .upload
                    .take()
                    .ok_or_else(|| server_error("NO_UPLOAD", "no upload in progress"))?;
                if upload.data.len() as u64 != upload.expected {
                    return Err(server_error(
                        "SIZE_MISMATCH",
                        format!(
                            "expected {} bytes, received {}",
                            upload.expected,
                            upload.data.len()
                        ),
                    ));
                }

                let lesson_id = format!("lesson-{}", Uuid::new_v4());
                tracing::info!(
                    "Stored upload {} as {} ({} bytes)",
                    upload.upload_id,
                    lesson_id,
                    upload.data.len()
                );
                self.lessons.insert(
                    lesson_id.clone(),
                    StoredLesson {
                        lesson_id: lesson_id.clone(),
                        title: upload.title,
                        description: upload.description,
                        mode: upload.mode,
                        mime_type: upload.mime_type,
                        data: upload.data.freeze(),
                        uploaded_at: Utc::now(),
                    },
                );
                Ok(ServiceResponse::Uploaded { lesson_id })
            }
        }
    }

    /// Accept a join unless the class is unknown, over or full
    async fn handle_join(&self, class_id: &str) -> bool {
        let classes = self.classes.read().await;
        let accepted = classes
            .iter()
            .find(|c| c.id == class_id)
            .map(|c| c.status != ClassStatus::Ended && !c.is_full())
            .unwrap_or(false);

        if accepted {
            *self.joins.entry(class_id.to_string()).or_insert(0) += 1;
            tracing::info!("Join accepted for class {}", class_id);
        } else {
            tracing::info!("Join refused for class {}", class_id);
        }
        accepted
    }

    fn handle_upload_frame(state: &mut ConnectionState, data: &[u8]) -> ServiceResult<()> {
        let upload = state
            .upload
            .as_mut()
            .ok_or_else(|| server_error("NO_UPLOAD", "binary frame outside an upload"))?;

        if upload.data.len() as u64 + data.len() as u64 > upload.expected {
            let upload_id = upload.upload_id.clone();
            state.upload = None;
            return Err(server_error(
                "SIZE_MISMATCH",
                format!("upload {} exceeded its announced size", upload_id),
            ));
        }
        upload.data.extend_from_slice(data);
        Ok(())
    }

    /// Replace the published class list
    pub async fn set_classes(&self, classes: Vec<ClassSession>) {
        *self.classes.write().await = classes;
    }

    /// Stored lessons (for monitoring/debugging)
    pub fn lessons(&self) -> Vec<StoredLesson> {
        self.lessons.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Look up one stored lesson
    pub fn lesson(&self, lesson_id: &str) -> Option<StoredLesson> {
        self.lessons.get(lesson_id).map(|entry| entry.value().clone())
    }

    /// Accepted joins for a class
    pub fn join_count(&self, class_id: &str) -> usize {
        self.joins.get(class_id).map(|entry| *entry.value()).unwrap_or(0)
    }
}
