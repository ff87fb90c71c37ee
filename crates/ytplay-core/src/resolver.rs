//! Source resolver
//!
//! Turns a file-info response and the capability probe result into the
//! ordered source list, the declared text tracks and the initial playback
//! mode. Nothing is handed to the media element until this has finished.

use crate::{
    capability::{Capabilities, MediaProfile},
    endpoints::Endpoints,
    types::*,
    PlayerConfig, Result,
};
use serde::Serialize;
use tracing::debug;

/// Output of [`SourceResolver::resolve`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSources {
    pub sources: Vec<PlaybackSource>,
    pub tracks: Vec<TrackSpec>,
    pub profile: MediaProfile,
    pub initial_mode: PlaybackMode,
}

pub struct SourceResolver<'a> {
    config: &'a PlayerConfig,
    endpoints: Endpoints,
}

impl<'a> SourceResolver<'a> {
    pub fn new(config: &'a PlayerConfig) -> Self {
        Self {
            config,
            endpoints: Endpoints::new(config.base_url.clone()),
        }
    }

    pub fn resolve(
        &self,
        item: &MediaItem,
        info: &FileInfo,
        caps: &Capabilities,
    ) -> Result<ResolvedSources> {
        let mime_type = info.mimetype.as_deref().filter(|m| !m.is_empty());
        let profile = MediaProfile::from_file_info(item, info);

        let (source, initial_mode) = if caps.is_natively_playable(mime_type, self.config) {
            let source = PlaybackSource {
                url: self.endpoints.download(item)?,
                mime_type: mime_type.unwrap_or(DEFAULT_MIME_TYPE).to_string(),
                on_error: SourceErrorAction::FallbackToAdaptive,
            };
            (source, PlaybackMode::Direct)
        } else {
            let source = PlaybackSource {
                url: self.endpoints.playlist(item)?,
                mime_type: HLS_MIME_TYPE.to_string(),
                on_error: SourceErrorAction::Report,
            };
            (source, PlaybackMode::AdaptiveStreaming(AdaptiveOrigin::NativeManifest))
        };

        let tracks = info
            .sidecar
            .subtitle
            .iter()
            .map(|sidecar| {
                Ok(TrackSpec {
                    kind: TextTrackKind::Captions,
                    label: if sidecar.name.is_empty() {
                        sidecar.lang.clone()
                    } else {
                        sidecar.name.clone()
                    },
                    lang: sidecar.lang.clone(),
                    file_url: self.endpoints.subtitle(item, &sidecar.file)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            file = %item.filename,
            mime_type = %source.mime_type,
            mode = %initial_mode,
            tracks = tracks.len(),
            has_video = profile.has_video_stream,
            "Sources resolved"
        );

        Ok(ResolvedSources {
            sources: vec![source],
            tracks,
            profile,
            initial_mode,
        })
    }
}
