//! Status derivation for the agent and the room's voice activity.
//!
//! Both views are recomputed from scratch on every roster or track change.
//! Nothing here remembers a previous snapshot.

use crate::participant::{Participant, TrackKind, TrackRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of what the room currently says about the agent.
///
/// `is_speaking` and `is_listening` are only ever true while `is_connected` is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub is_connected: bool,
    pub is_speaking: bool,
    pub is_listening: bool,
    /// Remote participants only.
    pub participant_count: usize,
    /// Identity of the classified agent, valid for this snapshot only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_identity: Option<String>,
}

/// Computes the agent status for a roster and the classifier's pick from it.
///
/// `tracks` is the room-wide track list once the transport has reported one.
/// It is authoritative for `is_listening`; until it arrives the agent's roster
/// publications are used instead.
pub fn derive_status(
    roster: &[Participant],
    agent: Option<&Participant>,
    tracks: Option<&[TrackRef]>,
) -> AgentStatus {
    match agent {
        Some(agent) => AgentStatus {
            is_connected: true,
            is_speaking: agent.is_speaking,
            is_listening: match tracks {
                Some(tracks) => tracks.iter().any(|t| {
                    t.kind == TrackKind::Audio && !t.is_local && t.participant_identity == agent.identity
                }),
                None => agent.has_audio_track(),
            },
            participant_count: roster.len(),
            agent_identity: Some(agent.identity.clone()),
        },
        None => AgentStatus {
            participant_count: roster.len(),
            ..AgentStatus::default()
        },
    }
}

/// Voice state of one participant that publishes audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceActivityEntry {
    pub identity: String,
    pub is_speaking: bool,
    /// Only present when the transport supplies a real level meter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_level: Option<f32>,
    pub is_agent: bool,
}

/// Identity-keyed voice activity across the whole room.
pub type VoiceActivity = BTreeMap<String, VoiceActivityEntry>;

/// Builds the voice activity map from the room-wide track list.
///
/// Non-audio tracks are ignored. A participant with several audio tracks
/// appears once; the local participant is included when its tracks are.
/// Remote participants take their speaking state from the roster, which the
/// transport refreshes more often than the track list.
pub fn derive_voice_activity(
    tracks: &[TrackRef],
    roster: &[Participant],
    agent_identity: Option<&str>,
) -> VoiceActivity {
    tracks
        .iter()
        .filter(|t| t.kind == TrackKind::Audio)
        .map(|t| {
            let live = (!t.is_local)
                .then(|| roster.iter().find(|p| p.identity == t.participant_identity))
                .flatten();
            let entry = VoiceActivityEntry {
                identity: t.participant_identity.clone(),
                is_speaking: live.map_or(t.is_speaking, |p| p.is_speaking),
                audio_level: live.and_then(|p| p.audio_level).or(t.audio_level),
                is_agent: agent_identity == Some(t.participant_identity.as_str()),
            };
            (t.participant_identity.clone(), entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify_agent;
    use crate::participant::{TrackPublication, TrackSource};

    fn audio_ref(identity: &str, speaking: bool) -> TrackRef {
        TrackRef {
            participant_identity: identity.to_string(),
            is_local: false,
            is_speaking: speaking,
            audio_level: None,
            kind: TrackKind::Audio,
            source: TrackSource::Microphone,
        }
    }

    #[test]
    fn test_no_agent_means_everything_false() {
        let roster = vec![
            Participant::new("alice").speaking(true),
            Participant::new("bob").with_track(TrackPublication::microphone("TR_1")),
        ];
        let status = derive_status(&roster, classify_agent(&roster), None);

        assert!(!status.is_connected);
        assert!(!status.is_speaking);
        assert!(!status.is_listening);
        assert_eq!(status.participant_count, 2);
        assert_eq!(status.agent_identity, None);
    }

    #[test]
    fn test_agent_with_microphone_is_listening() {
        let roster = vec![Participant::new("agent-7").with_track(TrackPublication::microphone("TR_a"))];
        let status = derive_status(&roster, classify_agent(&roster), None);

        assert_eq!(
            status,
            AgentStatus {
                is_connected: true,
                is_speaking: false,
                is_listening: true,
                participant_count: 1,
                agent_identity: Some("agent-7".to_string()),
            }
        );
    }

    #[test]
    fn test_listening_follows_track_set() {
        let mut agent = Participant::new("agent-1").with_track(TrackPublication::camera("TR_v"));
        let roster = vec![agent.clone()];
        assert!(!derive_status(&roster, Some(&roster[0]), None).is_listening);

        agent.tracks.push(TrackPublication::microphone("TR_a"));
        let roster = vec![agent.clone()];
        assert!(derive_status(&roster, Some(&roster[0]), None).is_listening);

        agent.tracks.retain(|t| t.kind != TrackKind::Audio);
        let roster = vec![agent];
        assert!(!derive_status(&roster, Some(&roster[0]), None).is_listening);
    }

    #[test]
    fn test_speaking_mirrors_agent_flag() {
        let roster = vec![
            Participant::new("human").speaking(true),
            Participant::new("agent-1").speaking(true),
        ];
        let status = derive_status(&roster, classify_agent(&roster), None);
        assert!(status.is_speaking);
        assert!(!status.is_listening);
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let json = serde_json::to_value(AgentStatus::default()).unwrap();
        assert_eq!(json["isConnected"], false);
        assert_eq!(json["participantCount"], 0);
        assert!(json.get("agentIdentity").is_none());
    }

    #[test]
    fn test_voice_activity_marks_agent_and_skips_video() {
        let mut video = audio_ref("carol", false);
        video.kind = TrackKind::Video;
        let mut local = audio_ref("me", true);
        local.is_local = true;
        local.audio_level = Some(0.4);

        let tracks = vec![audio_ref("agent-1", true), local, video];
        let activity = derive_voice_activity(&tracks, &[], Some("agent-1"));

        assert_eq!(activity.len(), 2);
        assert!(activity["agent-1"].is_agent);
        assert!(activity["agent-1"].is_speaking);
        assert!(!activity["me"].is_agent);
        assert_eq!(activity["me"].audio_level, Some(0.4));
        assert!(!activity.contains_key("carol"));
    }

    #[test]
    fn test_voice_activity_without_agent() {
        let tracks = vec![audio_ref("agent-1", false)];
        let activity = derive_voice_activity(&tracks, &[], None);
        assert!(!activity["agent-1"].is_agent);
    }

    #[test]
    fn test_track_list_decides_listening_once_known() {
        let agent = Participant::new("agent-1");
        let roster = vec![agent.clone()];

        assert!(!derive_status(&roster, Some(&agent), None).is_listening);
        let tracks = vec![audio_ref("agent-1", false)];
        assert!(derive_status(&roster, Some(&agent), Some(tracks.as_slice())).is_listening);

        // A stale roster publication does not outlive an unpublish.
        let stale = agent.with_track(TrackPublication::microphone("TR_a"));
        assert!(!derive_status(&roster, Some(&stale), Some(&[][..])).is_listening);

        let mut video = audio_ref("agent-1", false);
        video.kind = TrackKind::Video;
        assert!(!derive_status(&roster, Some(&stale), Some(&[video][..])).is_listening);
    }

    #[test]
    fn test_voice_activity_takes_speaking_from_roster() {
        let roster = vec![Participant::new("agent-1").speaking(true)];
        let mut local = audio_ref("me", true);
        local.is_local = true;
        let tracks = vec![audio_ref("agent-1", false), local, audio_ref("ghost", true)];

        let activity = derive_voice_activity(&tracks, &roster, Some("agent-1"));
        assert!(activity["agent-1"].is_speaking);
        assert!(activity["me"].is_speaking);
        assert!(activity["ghost"].is_speaking);

        let mut quiet = roster.clone();
        quiet[0].is_speaking = false;
        quiet[0].audio_level = Some(0.1);
        let activity = derive_voice_activity(&tracks, &quiet, Some("agent-1"));
        assert!(!activity["agent-1"].is_speaking);
        assert_eq!(activity["agent-1"].audio_level, Some(0.1));
    }
}
