use serde::{Deserialize, Serialize};

/// `rotateY` value that mirrors the generated output horizontally.
pub const ROTATE_Y_MIRRORED: i32 = 2;
/// `rotateY` value for unmirrored output.
pub const ROTATE_Y_NONE: i32 = 0;

/// A single message on the signaling socket, one JSON object per frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum SignalingMessage {
    #[serde(rename = "offer")]
    Offer { sdp: String },
    #[serde(rename = "answer")]
    Answer { sdp: String },
    #[serde(rename = "ice-candidate")]
    IceCandidate { candidate: IceCandidate },
    #[serde(rename = "prompt")]
    Prompt { prompt: String },
    #[serde(rename = "switch_camera")]
    SwitchCamera {
        #[serde(rename = "rotateY")]
        rotate_y: i32,
    },
}

impl SignalingMessage {
    /// Every `type` tag this vocabulary understands.
    pub const TYPES: [&'static str; 5] = ["offer", "answer", "ice-candidate", "prompt", "switch_camera"];

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::Prompt { .. } => "prompt",
            Self::SwitchCamera { .. } => "switch_camera",
        }
    }

    #[must_use]
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::Prompt { prompt: text.into() }
    }

    #[must_use]
    pub const fn mirror(enabled: bool) -> Self {
        Self::SwitchCamera {
            rotate_y: if enabled { ROTATE_Y_MIRRORED } else { ROTATE_Y_NONE },
        }
    }
}

/// ICE candidate payload as exchanged over signaling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: u16,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: String,
}

impl IceCandidate {
    #[must_use]
    pub fn new(candidate: impl Into<String>, sdp_m_line_index: u16, sdp_mid: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_m_line_index,
            sdp_mid: sdp_mid.into(),
        }
    }
}
