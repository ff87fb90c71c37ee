//! Capability probe
//!
//! Classifies the running engine from its user-agent string and decides
//! whether a container can be handed to the element directly. Pure, never
//! fails: anything ambiguous is treated as "not Apple".

use crate::{FileInfo, MediaItem, PlayerConfig};
use serde::{Deserialize, Serialize};

/// Tokens that mark a non-Safari browser on an Apple desktop
const NON_SAFARI_TOKENS: &[&str] = &["Chrome", "Chromium", "CriOS", "FxiOS", "Firefox", "Edg", "OPR"];

/// Engine capabilities relevant to source selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// The engine plays HLS manifests itself and should be given one
    pub prefer_native_hls: bool,
    /// WebKit on Apple platforms, with its narrow codec support
    pub is_apple_engine_family: bool,
}

impl Capabilities {
    /// Whether a container can be played without the HLS manifest
    pub fn is_natively_playable(&self, mime_type: Option<&str>, config: &PlayerConfig) -> bool {
        if !self.is_apple_engine_family {
            return true;
        }
        mime_type
            .map(|m| config.is_broadly_compatible(m))
            .unwrap_or(false)
    }
}

pub struct CapabilityProbe;

impl CapabilityProbe {
    /// Probe a user-agent string
    pub fn from_user_agent(user_agent: &str) -> Capabilities {
        let is_apple = Self::is_apple_engine_family(user_agent);
        Capabilities {
            prefer_native_hls: is_apple,
            is_apple_engine_family: is_apple,
        }
    }

    fn is_apple_engine_family(ua: &str) -> bool {
        if !ua.contains("AppleWebKit") {
            return false;
        }
        // Every browser on iOS/iPadOS runs on WebKit
        if ["iPhone", "iPad", "iPod"].iter().any(|d| ua.contains(d)) {
            return true;
        }
        ua.contains("Macintosh")
            && ua.contains("Safari")
            && !NON_SAFARI_TOKENS.iter().any(|t| ua.contains(t))
    }
}

/// Per-item facts derived from file info
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaProfile {
    pub has_video_stream: bool,
    pub is_audio_only: bool,
}

impl MediaProfile {
    pub fn from_file_info(item: &MediaItem, info: &FileInfo) -> Self {
        let has_video_stream = info.has_video_stream();
        Self {
            has_video_stream,
            is_audio_only: item.extras.is_audio || !has_video_stream,
        }
    }
}
