//! Poster capture
//!
//! Grabs one decoded frame, encodes it as JPEG and keeps it as the poster
//! and media session artwork. Runs at most once successfully per session.

use crate::{platform::MediaElement, session::SessionCell, Error, PosterState, Result, VideoFrame};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, ExtendedColorType};
use std::sync::Arc;
use tracing::debug;

pub const POSTER_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured(String),
    /// Already captured, in flight, no video or no decoded frame yet
    NotEligible,
    /// Grab or encode failed; a later trigger may retry
    Failed,
    /// The session was destroyed while the capture was in flight
    Discarded,
}

pub struct PosterCapture {
    quality: u8,
}

impl PosterCapture {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub async fn capture_once(&self, cell: &SessionCell, element: &Arc<dyn MediaElement>) -> CaptureOutcome {
        // eligibility and reservation happen without an await in between
        let reserved = cell.with(|s| {
            if s.is_destroyed()
                || *s.poster() != PosterState::Missing
                || !s.profile().has_video_stream
            {
                return false;
            }
            let (width, height) = element.video_dimensions();
            if width == 0 || height == 0 {
                return false;
            }
            s.poster_mut().begin().is_ok()
        });
        if !reserved {
            return CaptureOutcome::NotEligible;
        }

        let result = self.grab_and_encode(element).await;

        cell.with(|s| {
            if s.is_destroyed() {
                s.poster_mut().abandon();
                return CaptureOutcome::Discarded;
            }
            match result {
                Ok(data_url) => match s.poster_mut().complete(data_url.clone()) {
                    Ok(()) => {
                        s.set_thumbnail_url(data_url.clone());
                        debug!(bytes = data_url.len(), "Poster captured");
                        CaptureOutcome::Captured(data_url)
                    }
                    Err(e) => {
                        debug!(error = %e, "Poster state changed during capture");
                        CaptureOutcome::Failed
                    }
                },
                Err(e) => {
                    debug!(error = %e, "Poster capture failed");
                    s.poster_mut().abandon();
                    CaptureOutcome::Failed
                }
            }
        })
    }

    async fn grab_and_encode(&self, element: &Arc<dyn MediaElement>) -> Result<String> {
        let frame = element
            .capture_frame()
            .await
            .ok_or_else(|| Error::PosterCapture("no frame available".to_string()))?;
        let quality = self.quality;
        tokio::task::spawn_blocking(move || encode_data_url(&frame, quality))
            .await
            .map_err(|e| Error::PosterCapture(e.to_string()))?
    }
}

/// Encode an RGBA frame as a JPEG data URL
pub fn encode_data_url(frame: &VideoFrame, quality: u8) -> Result<String> {
    if frame.width == 0 || frame.height == 0 {
        return Err(Error::PosterCapture("zero-size frame".to_string()));
    }
    let expected = frame.width as usize * frame.height as usize * 4;
    if frame.rgba.len() != expected {
        return Err(Error::PosterCapture(format!(
            "frame buffer is {} bytes, expected {}",
            frame.rgba.len(),
            expected
        )));
    }

    // JPEG has no alpha channel
    let rgb: Vec<u8> = frame
        .rgba
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(|e| Error::PosterCapture(e.to_string()))?;

    Ok(format!("data:{};base64,{}", POSTER_MIME_TYPE, STANDARD.encode(&jpeg)))
}
