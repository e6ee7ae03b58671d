use std::fmt;

pub const DEFAULT_BASE_URL: &str = "https://api3.decart.ai";
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Lifecycle of a realtime session as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    #[must_use]
    pub const fn is_in_session(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// A realtime model and the stream geometry it expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefinition {
    pub name: String,
    /// Signaling path appended to the base URL, e.g. `/v1/stream`.
    pub url_path: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

impl ModelDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, url_path: impl Into<String>, fps: u32, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            url_path: url_path.into(),
            fps,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealtimeModel {
    Mirage,
    LucyV2v720pRt,
}

impl RealtimeModel {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mirage => "mirage",
            Self::LucyV2v720pRt => "lucy_v2v_720p_rt",
        }
    }
}

pub struct Models;

impl Models {
    #[must_use]
    pub fn realtime(model: RealtimeModel) -> ModelDefinition {
        match model {
            RealtimeModel::Mirage | RealtimeModel::LucyV2v720pRt => {
                ModelDefinition::new(model.name(), "/v1/stream", 25, 1280, 704)
            }
        }
    }
}

/// Encoder limits applied to the local video sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConnectionConfig {
    pub min_bitrate: u32,
    pub max_bitrate: u32,
    pub max_framerate: u32,
    pub ice_servers: Vec<String>,
}

impl Default for PeerConnectionConfig {
    fn default() -> Self {
        Self {
            min_bitrate: 800_000,
            max_bitrate: 3_800_000,
            max_framerate: 30,
            ice_servers: vec![DEFAULT_STUN_SERVER.to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VideoCodec {
    #[default]
    Vp8,
    Vp9,
    H264,
    Av1,
}

impl VideoCodec {
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Vp8 => "video/VP8",
            Self::Vp9 => "video/VP9",
            Self::H264 => "video/H264",
            Self::Av1 => "video/AV1",
        }
    }

    /// Codec name as it appears in capability lists (the mime subtype).
    #[must_use]
    pub fn codec_name(self) -> &'static str {
        let mime = self.mime_type();
        mime.rsplit('/').next().unwrap_or(mime)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub enrich: bool,
}

impl Prompt {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            enrich: true,
        }
    }

    #[must_use]
    pub const fn enrich(mut self, enrich: bool) -> Self {
        self.enrich = enrich;
        self
    }
}

/// Model parameters pushed as soon as a session connects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelState {
    pub prompt: Option<Prompt>,
    pub mirror: bool,
}
