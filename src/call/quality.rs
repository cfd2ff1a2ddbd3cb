//! Call quality monitor: normalizes client-reported transport metrics,
//! computes bounded 0–100 health scores, and relays them to the peer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::AppState;
use crate::ws::broadcast::send_to_user;
use crate::ws::protocol::{HandlerError, HandlerResult, ServerEvent};

/// Normalized audio transport metrics. Field names follow the client-side
/// WebRTC stats vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStats {
    pub packets_lost: f64,
    pub round_trip_time: f64,
    pub bitrate: f64,
}

/// Normalized video transport metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStats {
    pub packets_lost: f64,
    pub round_trip_time: f64,
    pub bitrate: f64,
    pub frame_rate: f64,
    pub width: f64,
    pub height: f64,
}

/// What the peer receives: normalized stats plus the three scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub audio: AudioStats,
    pub video: VideoStats,
    pub audio_score: u32,
    pub video_score: u32,
    pub overall_score: u32,
}

/// Missing or malformed numeric fields are treated as zero.
fn num(v: &Value, key: &str) -> f64 {
    v.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Normalize a raw client stats payload.
pub fn normalize(raw: &Value) -> (AudioStats, VideoStats) {
    let audio_raw = raw.get("audio").cloned().unwrap_or(Value::Null);
    let video_raw = raw.get("video").cloned().unwrap_or(Value::Null);
    let resolution = video_raw.get("resolution").cloned().unwrap_or(Value::Null);

    let audio = AudioStats {
        packets_lost: num(&audio_raw, "packetsLost"),
        round_trip_time: num(&audio_raw, "roundTripTime"),
        bitrate: num(&audio_raw, "bitrate"),
    };
    let video = VideoStats {
        packets_lost: num(&video_raw, "packetsLost"),
        round_trip_time: num(&video_raw, "roundTripTime"),
        bitrate: num(&video_raw, "bitrate"),
        frame_rate: num(&video_raw, "frameRate"),
        width: num(&resolution, "width"),
        height: num(&resolution, "height"),
    };
    (audio, video)
}

fn rtt_penalty(rtt_ms: f64) -> f64 {
    if rtt_ms > 300.0 {
        30.0
    } else if rtt_ms > 200.0 {
        20.0
    } else if rtt_ms > 100.0 {
        10.0
    } else {
        0.0
    }
}

pub fn audio_score(stats: &AudioStats) -> u32 {
    let mut score = 100.0;
    score -= 2.0 * stats.packets_lost;
    score -= rtt_penalty(stats.round_trip_time);
    if stats.bitrate < 8_000.0 {
        score -= 20.0;
    } else if stats.bitrate < 16_000.0 {
        score -= 10.0;
    }
    score.clamp(0.0, 100.0).round() as u32
}

pub fn video_score(stats: &VideoStats) -> u32 {
    let mut score = 100.0;
    score -= 2.0 * stats.packets_lost;
    score -= rtt_penalty(stats.round_trip_time);
    if stats.frame_rate < 10.0 {
        score -= 30.0;
    } else if stats.frame_rate < 15.0 {
        score -= 20.0;
    } else if stats.frame_rate < 24.0 {
        score -= 10.0;
    }
    let pixels = stats.width * stats.height;
    if pixels < 307_200.0 {
        score -= 20.0;
    } else if pixels < 921_600.0 {
        score -= 10.0;
    }
    score.clamp(0.0, 100.0).round() as u32
}

pub fn build_report(raw: &Value) -> QualityReport {
    let (audio, video) = normalize(raw);
    let audio_score = audio_score(&audio);
    let video_score = video_score(&video);
    let overall_score = ((audio_score + video_score) as f64 / 2.0).round() as u32;
    QualityReport {
        audio,
        video,
        audio_score,
        video_score,
        overall_score,
    }
}

/// Score a quality report and relay it to the other call participant.
/// Never echoed back to the reporter.
pub fn report_quality(
    state: &AppState,
    user_id: &str,
    room_id: &str,
    raw_stats: &Value,
) -> HandlerResult {
    let call = state
        .calls
        .by_room(room_id)
        .ok_or_else(|| HandlerError::Invalid("Unknown call room".to_string()))?;
    if !call.has_participant(user_id) {
        return Err(HandlerError::Invalid(
            "Not a participant of this call".to_string(),
        ));
    }

    let report = build_report(raw_stats);
    if let Some(peer) = call.other_participant(user_id) {
        send_to_user(
            &state.registry,
            peer,
            &ServerEvent::PeerNetworkQuality {
                room_id: room_id.to_string(),
                from: user_id.to_string(),
                report,
            },
        );
    }
    Ok(None)
}
