//! CLI command implementations

use crate::output::{self, OutputFormat};
use anyhow::{anyhow, bail, Context};
use indicatif::ProgressBar;
use m3u8_rs::Playlist;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use ytplay_core::{
    Capabilities, CapabilityProbe, Endpoints, FileInfoClient, HttpFileInfoClient, MediaItem,
    PlayerConfig, ResolvedSources, SourceResolver,
};

/// Load the config file if given, then apply the base URL override
pub fn load_config(path: Option<&Path>, base_url: Option<Url>) -> anyhow::Result<PlayerConfig> {
    let mut config = match path {
        Some(path) => PlayerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PlayerConfig::default(),
    };
    if let Some(base_url) = base_url {
        config.base_url = base_url;
    }
    config.validate()?;
    Ok(config)
}

fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[derive(Serialize)]
struct ResolveReport<'a> {
    file: String,
    user_agent: &'a str,
    capabilities: Capabilities,
    #[serde(flatten)]
    resolved: ResolvedSources,
}

/// Resolve sources for a stored file
pub async fn resolve(
    config: &PlayerConfig,
    user_agent: &str,
    item: &MediaItem,
    format: &str,
) -> anyhow::Result<()> {
    let client = HttpFileInfoClient::new(config.base_url.clone())?;

    let pb = spinner(format!("Fetching file info for {}", item.relative_path()));
    let info = client.file_info(item).await;
    pb.finish_and_clear();
    let info = info.with_context(|| format!("Cannot play {}", item.relative_path()))?;

    let capabilities = CapabilityProbe::from_user_agent(user_agent);
    let resolved = SourceResolver::new(config).resolve(item, &info, &capabilities)?;
    info!(mode = %resolved.initial_mode, sources = resolved.sources.len(), "Resolved");

    let report = ResolveReport {
        file: item.relative_path(),
        user_agent,
        capabilities,
        resolved,
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => output::print_json(&report)?,
        OutputFormat::Text => {
            output::heading(&format!("Playback plan: {}", report.file));
            output::field("Initial mode", report.resolved.initial_mode);
            output::field("Native HLS", output::flag(capabilities.prefer_native_hls));
            output::field("Video stream", output::flag(report.resolved.profile.has_video_stream));
            output::field("Audio only", output::flag(report.resolved.profile.is_audio_only));
            output::field("Server MIME type", info.mimetype.as_deref().unwrap_or("(none)"));

            output::heading("Sources");
            println!("{}", output::source_table(&report.resolved.sources));

            output::heading("Text tracks");
            if report.resolved.tracks.is_empty() {
                println!("  (none)");
            } else {
                println!("{}", output::track_table(&report.resolved.tracks));
            }
        }
    }

    Ok(())
}

/// Show capability probe output
pub fn probe_ua(user_agent: &str, format: &str) -> anyhow::Result<()> {
    let capabilities = CapabilityProbe::from_user_agent(user_agent);
    let config = PlayerConfig::default();

    match OutputFormat::from(format) {
        OutputFormat::Json => output::print_json(&capabilities)?,
        OutputFormat::Text => {
            output::heading("Capabilities");
            output::field("User agent", user_agent);
            output::field("Apple engine family", output::flag(capabilities.is_apple_engine_family));
            output::field("Prefer native HLS", output::flag(capabilities.prefer_native_hls));

            output::heading("Direct playback");
            for mime in ["video/mp4", "video/webm", "video/x-matroska", "audio/mpeg"] {
                output::field(mime, output::flag(capabilities.is_natively_playable(Some(mime), &config)));
            }
        }
    }

    Ok(())
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ManifestSummary {
    pub kind: &'static str,
    pub variants: Vec<VariantSummary>,
    pub segments: usize,
    pub target_duration: Option<f64>,
    pub total_duration: f64,
    pub ended: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct VariantSummary {
    pub bandwidth: u64,
    pub resolution: Option<String>,
    pub uri: String,
}

/// Summarize a parsed playlist
pub fn summarize(bytes: &[u8]) -> anyhow::Result<ManifestSummary> {
    let playlist = m3u8_rs::parse_playlist_res(bytes)
        .map_err(|e| anyhow!("Failed to parse playlist: {:?}", e))?;

    let summary = match playlist {
        Playlist::MasterPlaylist(master) => ManifestSummary {
            kind: "master",
            variants: master
                .variants
                .iter()
                .map(|v| VariantSummary {
                    bandwidth: v.bandwidth,
                    resolution: v.resolution.as_ref().map(|r| format!("{}x{}", r.width, r.height)),
                    uri: v.uri.clone(),
                })
                .collect(),
            segments: 0,
            target_duration: None,
            total_duration: 0.0,
            ended: false,
        },
        Playlist::MediaPlaylist(media) => ManifestSummary {
            kind: "media",
            variants: Vec::new(),
            segments: media.segments.len(),
            target_duration: Some(media.target_duration as f64),
            total_duration: media.segments.iter().map(|s| s.duration as f64).sum(),
            ended: media.end_list,
        },
    };
    Ok(summary)
}

/// Fetch and summarize the server-generated manifest
pub async fn manifest(config: &PlayerConfig, item: &MediaItem, format: &str) -> anyhow::Result<()> {
    let url = Endpoints::new(config.base_url.clone()).playlist(item)?;
    debug!(url = %url, "Fetching manifest");

    let pb = spinner(format!("Fetching {}", url));
    let response = reqwest::get(url.clone()).await;
    pb.finish_and_clear();
    let response = response.with_context(|| format!("Failed to fetch {}", url))?;

    let status = response.status();
    if !status.is_success() {
        bail!("Manifest request failed with HTTP {}", status.as_u16());
    }
    let bytes = response.bytes().await?;
    let summary = summarize(&bytes)?;

    match OutputFormat::from(format) {
        OutputFormat::Json => output::print_json(&summary)?,
        OutputFormat::Text => {
            output::heading(&format!("Manifest: {}", url));
            output::field("Kind", summary.kind);
            match summary.kind {
                "master" => {
                    output::field("Variants", summary.variants.len());
                    for v in &summary.variants {
                        println!(
                            "    {} bps {} {}",
                            v.bandwidth,
                            v.resolution.as_deref().unwrap_or("-"),
                            v.uri
                        );
                    }
                }
                _ => {
                    output::field("Segments", summary.segments);
                    if let Some(target) = summary.target_duration {
                        output::field("Target duration", format!("{:.0}s", target));
                    }
                    output::field("Total duration", format!("{:.1}s", summary.total_duration));
                    output::field("Complete", output::flag(summary.ended));
                }
            }
        }
    }

    Ok(())
}
