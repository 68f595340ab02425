//! Classroom Demo
//!
//! Walks through a teacher's session against the mock capture platform: the
//! class list is fetched from a local classroom server over WebSocket, the
//! teacher joins, chats, records the camera for a few seconds and publishes
//! the recording as a lesson.
//!
//! Run with `cargo run --example classroom_demo`.

use anyhow::Result;
use liveclass::*;
use liveclass_core::demo_classes;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    info!("🎓 Live class demo");

    // Local classroom server on an ephemeral port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = ClassroomServer::new(addr, demo_classes());
    let server_task = server.clone();
    tokio::spawn(async move {
        let _ = server_task.serve(listener).await;
    });

    let config = ControllerConfig {
        service_url: Some(format!("ws://{}", addr)),
        ..ControllerConfig::default()
    };
    let local = MockSurface::new("local");
    let remote = MockSurface::new("remote");
    let mut controller = LiveClassBuilder::new()
        .platform(Arc::new(MockPlatform::new()))
        .config(config)
        .local_surface(local.clone())
        .remote_surface(remote.clone())
        .build()?;
    controller.watch_devices();

    let mut events = controller.events();
    let mut progress = controller.subscribe_upload_progress();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let percent = *progress.borrow_and_update();
            info!("📤 Upload progress: {}%", percent);
        }
    });

    // Devices
    let devices = controller.list_devices().await;
    for device in devices.cameras.iter().chain(devices.microphones.iter()) {
        info!("🎛️ {}: {}", device.kind, device.display_label());
    }

    // Classes
    for class in controller.load_classes().await? {
        info!(
            "📚 [{}] {} by {} ({:?}, {}/{})",
            class.id,
            class.title,
            class.instructor,
            class.status,
            class.participant_count,
            class.max_participants
        );
    }

    // Join as teacher
    controller.join("1", true).await?;
    controller.send_chat_message("Good morning everyone");
    controller.toggle_hand();
    controller.toggle_hand();

    // Record the camera while presenting
    controller.start_recording(CaptureMode::Camera).await?;
    for _ in 1..controller.slides().total() {
        tokio::time::sleep(Duration::from_millis(600)).await;
        let slide = controller.next_slide();
        info!(
            "🖼️ Slide {}/{} ({})",
            slide,
            controller.slides().total(),
            controller.recording_time()
        );
    }
    controller.pause_recording()?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    controller.pause_recording()?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    controller.stop_recording().await?;
    info!("⏹️ Recorded {}", controller.recording_time());

    let dir = std::env::temp_dir().join("liveclass-demo");
    let path = controller.save_recording(&dir).await?;
    info!("💾 Saved a copy to {}", path.display());

    // Publish
    controller.set_lesson_title("Algebra Basics");
    controller.set_lesson_description("Solving linear equations");
    let lesson_id = controller.publish_lesson().await?;
    if let Some(lesson) = server.lesson(&lesson_id) {
        info!("🗄️ Server stored '{}' ({} bytes)", lesson.title, lesson.data.len());
    }

    for message in controller.chat_messages() {
        info!("💬 {}: {}", message.sender, message.text);
    }
    controller.leave().await;

    for event in events.drain() {
        info!("📣 {}: {:?}", event.event_type(), event);
    }

    Ok(())
}
