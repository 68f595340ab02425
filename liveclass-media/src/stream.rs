//! Capture streams and tracks
//!
//! A [`MediaStream`] is an ordered set of [`MediaStreamTrack`]s. Cloning a
//! track (or a stream) yields another handle on the same underlying track, so
//! toggling or stopping it through any handle is visible through all of them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Microphone or system audio
    Audio,
    /// Camera or screen video
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

#[derive(Debug)]
struct TrackState {
    enabled: AtomicBool,
    ended: AtomicBool,
}

/// Handle on a single capture track
#[derive(Debug, Clone)]
pub struct MediaStreamTrack {
    id: String,
    kind: TrackKind,
    label: String,
    state: Arc<TrackState>,
}

impl MediaStreamTrack {
    /// Create a live, enabled track
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            state: Arc::new(TrackState {
                enabled: AtomicBool::new(true),
                ended: AtomicBool::new(false),
            }),
        }
    }

    /// Track ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Track kind
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Label of the device feeding the track
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the track currently carries media
    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable the track without releasing the device
    pub fn set_enabled(&self, enabled: bool) {
        self.state.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether the track has been stopped
    pub fn is_ended(&self) -> bool {
        self.state.ended.load(Ordering::SeqCst)
    }

    /// Stop the track and release its device; a stopped track never restarts
    pub fn stop(&self) {
        if !self.state.ended.swap(true, Ordering::SeqCst) {
            debug!("Stopped {} track {} ({})", self.kind, self.id, self.label);
        }
    }

    /// Whether two handles refer to the same underlying track
    pub fn same_track(&self, other: &MediaStreamTrack) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

/// Ordered collection of tracks produced by one capture request
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaStreamTrack>,
}

impl MediaStream {
    /// Create a stream from tracks
    pub fn new(tracks: Vec<MediaStreamTrack>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks,
        }
    }

    /// Stream ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All tracks in insertion order
    pub fn tracks(&self) -> &[MediaStreamTrack] {
        &self.tracks
    }

    /// Tracks of one kind
    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &MediaStreamTrack> {
        self.tracks.iter().filter(move |t| t.kind() == kind)
    }

    /// Video tracks
    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaStreamTrack> {
        self.tracks_of(TrackKind::Video)
    }

    /// Audio tracks
    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaStreamTrack> {
        self.tracks_of(TrackKind::Audio)
    }

    /// Whether the stream has at least one track of `kind`
    pub fn has_kind(&self, kind: TrackKind) -> bool {
        self.tracks_of(kind).next().is_some()
    }

    /// Append a track, e.g. a microphone track merged into a screen capture
    pub fn add_track(&mut self, track: MediaStreamTrack) {
        self.tracks.push(track);
    }

    /// Whether any track is still live
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(|t| !t.is_ended())
    }

    /// Stop every track
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_clones_share_state() {
        let track = MediaStreamTrack::new(TrackKind::Video, "FaceTime HD Camera");
        let borrowed = track.clone();

        borrowed.set_enabled(false);
        assert!(!track.is_enabled());

        track.stop();
        assert!(borrowed.is_ended());
        assert!(track.same_track(&borrowed));
    }

    #[test]
    fn test_stream_track_filters() {
        let mut stream = MediaStream::new(vec![MediaStreamTrack::new(TrackKind::Video, "Screen 1")]);
        assert!(stream.has_kind(TrackKind::Video));
        assert!(!stream.has_kind(TrackKind::Audio));

        stream.add_track(MediaStreamTrack::new(TrackKind::Audio, "Built-in Microphone"));
        assert_eq!(stream.audio_tracks().count(), 1);
        assert_eq!(stream.video_tracks().count(), 1);
    }

    #[test]
    fn test_stop_all_deactivates_stream() {
        let stream = MediaStream::new(vec![
            MediaStreamTrack::new(TrackKind::Video, "cam"),
            MediaStreamTrack::new(TrackKind::Audio, "mic"),
        ]);
        assert!(stream.is_active());
        stream.stop_all();
        assert!(!stream.is_active());
        assert!(stream.tracks().iter().all(|t| t.is_ended()));
    }
}
