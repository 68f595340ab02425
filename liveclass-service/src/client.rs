//! WebSocket implementation of the classroom service contract

use crate::protocol::{ServiceRequest, ServiceResponse, UPLOAD_FRAME_SIZE};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use liveclass_core::{
    ClassSession, ClassroomService, RecordingUpload, ServiceError, ServiceResult, UploadProgress,
};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Connection = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Classroom service reached over a WebSocket
///
/// The connection is opened on first use and reopened after a network
/// failure. Calls are serialized over the single connection.
#[derive(Debug)]
pub struct WebSocketClassroomService {
    url: String,
    connection: Mutex<Option<Connection>>,
}

impl WebSocketClassroomService {
    /// Create a client for `url` without connecting yet
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection: Mutex::new(None),
        }
    }

    /// Create a client and connect right away
    pub async fn connect(url: impl Into<String>) -> ServiceResult<Self> {
        let service = Self::new(url);
        {
            let mut connection = service.connection.lock().await;
            *connection = Some(service.open().await?);
        }
        Ok(service)
    }

    /// Service URL
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn open(&self) -> ServiceResult<Connection> {
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ServiceError::network(format!("failed to connect to {}: {}", self.url, e)))?;
        tracing::debug!("Connected to classroom service at {}", self.url);
        Ok(ws)
    }

    /// Lock the shared connection, opening it if needed
    async fn connected(&self) -> ServiceResult<MutexGuard<'_, Option<Connection>>> {
        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            *guard = Some(self.open().await?);
        }
        Ok(guard)
    }

    /// Forget a connection that failed at the network level
    fn settle<T>(guard: &mut Option<Connection>, result: &ServiceResult<T>) {
        if matches!(result, Err(ServiceError::Network { .. })) {
            *guard = None;
        }
    }

    async fn call(&self, request: ServiceRequest) -> ServiceResult<ServiceResponse> {
        let mut guard = self.connected().await?;
        let Some(connection) = guard.as_mut() else {
            return Err(ServiceError::network("connection unavailable"));
        };
        let result = Self::round_trip(connection, request).await;
        Self::settle(&mut guard, &result);
        result
    }

    async fn upload_over(
        connection: &mut Connection,
        upload: RecordingUpload,
        progress: &UploadProgress,
    ) -> ServiceResult<String> {
        let total = upload.size() as u64;
        let begin = ServiceRequest::BeginUpload {
            title: upload.title,
            description: upload.description,
            mode: upload.mode,
            mime_type: upload.mime_type,
            size: total,
        };
        match Self::round_trip(connection, begin).await? {
            ServiceResponse::UploadReady { upload_id } => {
                tracing::debug!("Upload {} accepted by server", upload_id);
            }
            other => return Err(unexpected(other)),
        }

        let mut sent = 0u64;
        for frame in upload.data.chunks(UPLOAD_FRAME_SIZE) {
            Self::send(connection, Message::Binary(frame.to_vec())).await?;
            sent += frame.len() as u64;
            progress.report_bytes(sent, total);
        }

        match Self::round_trip(connection, ServiceRequest::EndUpload).await? {
            ServiceResponse::Uploaded { lesson_id } => Ok(lesson_id),
            other => Err(unexpected(other)),
        }
    }

    async fn send(connection: &mut Connection, message: Message) -> ServiceResult<()> {
        connection
            .send(message)
            .await
            .map_err(|e| ServiceError::network(e.to_string()))
    }

    async fn send_request(connection: &mut Connection, request: &ServiceRequest) -> ServiceResult<()> {
        let json = serde_json::to_string(request)?;
        Self::send(connection, Message::Text(json)).await
    }

    /// Read the next response; error responses become [`ServiceError::Server`]
    async fn read_response(connection: &mut Connection) -> ServiceResult<ServiceResponse> {
        while let Some(frame) = connection.next().await {
            match frame.map_err(|e| ServiceError::network(e.to_string()))? {
                Message::Text(text) => {
                    return match serde_json::from_str::<ServiceResponse>(&text)? {
                        ServiceResponse::Error { error, error_code } => Err(ServiceError::Server {
                            code: error_code,
                            message: error,
                        }),
                        response => Ok(response),
                    };
                }
                Message::Close(_) => break,
                _ => continue,
            }
        }
        Err(ServiceError::network("connection closed by server"))
    }

    async fn round_trip(
        connection: &mut Connection,
        request: ServiceRequest,
    ) -> ServiceResult<ServiceResponse> {
        Self::send_request(connection, &request).await?;
        Self::read_response(connection).await
    }
}

fn unexpected(response: ServiceResponse) -> ServiceError {
    ServiceError::Protocol {
        message: format!("unexpected response: {:?}", response),
    }
}

#[async_trait]
impl ClassroomService for WebSocketClassroomService {
    async fn list_classes(&self) -> ServiceResult<Vec<ClassSession>> {
        match self.call(ServiceRequest::ListClasses).await? {
            ServiceResponse::ClassList { classes } => Ok(classes),
            other => Err(unexpected(other)),
        }
    }

    async fn join_class(&self, class_id: &str) -> ServiceResult<bool> {
        tracing::info!("Joining class: {}", class_id);
        let request = ServiceRequest::JoinClass {
            class_id: class_id.to_string(),
        };
        match self.call(request).await? {
            ServiceResponse::JoinResult { accepted, .. } => Ok(accepted),
            other => Err(unexpected(other)),
        }
    }

    async fn upload_recording(
        &self,
        upload: RecordingUpload,
        progress: UploadProgress,
    ) -> ServiceResult<String> {
        tracing::info!(
            "Uploading recording: '{}' ({} bytes, {})",
            upload.title,
            upload.size(),
            upload.mode.upload_tag()
        );

        let mut guard = self.connected().await?;
        let Some(connection) = guard.as_mut() else {
            return Err(ServiceError::network("connection unavailable"));
        };
        let result = Self::upload_over(connection, upload, &progress).await;
        Self::settle(&mut guard, &result);
        if result.is_ok() {
            progress.complete();
        }
        result
    }
}
