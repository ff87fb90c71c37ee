//! Output formatting for CLI

use console::style;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use ytplay_core::{PlaybackSource, TrackSpec};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

pub fn print_json<T: Serialize>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

pub fn heading(text: &str) {
    println!("\n{}", style(text).bold().cyan());
}

pub fn field(name: &str, value: impl std::fmt::Display) {
    println!("  {:<22} {}", style(format!("{}:", name)).dim(), value);
}

pub fn flag(value: bool) -> String {
    if value {
        style("yes").green().to_string()
    } else {
        style("no").red().to_string()
    }
}

#[derive(Tabled)]
struct SourceRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "MIME type")]
    mime_type: String,
    #[tabled(rename = "On error")]
    on_error: String,
    #[tabled(rename = "URL")]
    url: String,
}

#[derive(Tabled)]
struct TrackRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Lang")]
    lang: String,
    #[tabled(rename = "URL")]
    url: String,
}

pub fn source_table(sources: &[PlaybackSource]) -> String {
    let rows = sources.iter().enumerate().map(|(index, s)| SourceRow {
        index,
        mime_type: s.mime_type.clone(),
        on_error: format!("{:?}", s.on_error),
        url: s.url.to_string(),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn track_table(tracks: &[TrackSpec]) -> String {
    let rows = tracks.iter().enumerate().map(|(index, t)| TrackRow {
        index,
        kind: t.kind.to_string(),
        label: t.label.clone(),
        lang: t.lang.clone(),
        url: t.file_url.to_string(),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}
