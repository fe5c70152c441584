//! Room participants and their published tracks, as reported by the transport.
//!
//! These types are snapshots: the transport owns the live objects and hands a
//! fresh roster to the session on every join, leave or track change.

use serde::{Deserialize, Serialize};

/// The role a participant advertises to the room, when the transport knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantKind {
    #[default]
    Standard,
    Agent,
    Ingress,
    Egress,
    Sip,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Audio,
    Video,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackSource {
    Microphone,
    Camera,
    ScreenShare,
    ScreenShareAudio,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A media track published by a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPublication {
    pub sid: String,
    pub kind: TrackKind,
    #[serde(default)]
    pub source: TrackSource,
}

impl TrackPublication {
    /// Shorthand for a microphone publication.
    pub fn microphone(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            kind: TrackKind::Audio,
            source: TrackSource::Microphone,
        }
    }

    /// Shorthand for a camera publication.
    pub fn camera(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            kind: TrackKind::Video,
            source: TrackSource::Camera,
        }
    }
}

/// One remote endpoint in the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique within the room.
    pub identity: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Opaque string set by whoever minted the participant's token.
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub kind: ParticipantKind,
    #[serde(default)]
    pub tracks: Vec<TrackPublication>,
    #[serde(default)]
    pub is_speaking: bool,
    /// Last audio level reported by the transport's meter, if it has one.
    #[serde(default)]
    pub audio_level: Option<f32>,
}

impl Participant {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            name: None,
            metadata: None,
            kind: ParticipantKind::default(),
            tracks: Vec::new(),
            is_speaking: false,
            audio_level: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn with_kind(mut self, kind: ParticipantKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_track(mut self, track: TrackPublication) -> Self {
        self.tracks.push(track);
        self
    }

    pub fn speaking(mut self, is_speaking: bool) -> Self {
        self.is_speaking = is_speaking;
        self
    }

    /// Returns true if at least one published track carries audio.
    pub fn has_audio_track(&self) -> bool {
        self.tracks.iter().any(|t| t.kind == TrackKind::Audio)
    }
}

/// A single track as seen room-wide, including the local participant's own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRef {
    pub participant_identity: String,
    #[serde(default)]
    pub is_local: bool,
    #[serde(default)]
    pub is_speaking: bool,
    #[serde(default)]
    pub audio_level: Option<f32>,
    pub kind: TrackKind,
    #[serde(default)]
    pub source: TrackSource,
}

impl TrackRef {
    /// Builds the room-wide view of one of a remote participant's publications.
    pub fn from_publication(participant: &Participant, publication: &TrackPublication) -> Self {
        Self {
            participant_identity: participant.identity.clone(),
            is_local: false,
            is_speaking: participant.is_speaking,
            audio_level: participant.audio_level,
            kind: publication.kind,
            source: publication.source,
        }
    }
}
