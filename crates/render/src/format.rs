//! Display helpers for the listing page, also registered as [`upon`]
//! formatters (`filesize`, `icon`, and HTML escaping as the default).

use std::fmt::Write;
use time::UtcDateTime;
use time::macros::format_description;
use upon::{Engine, Value, fmt as upon_fmt};

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Human-readable size in 1024 steps, two decimals, capped at GB.
///
/// ```text
/// 0          → "0.00 B"
/// 1536       → "1.50 KB"
/// 5 TiB      → "5120.00 GB"
/// ```
pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", UNITS[unit])
}

/// Font Awesome icon class for a file, by extension.
pub fn icon_for(filename: &str) -> &'static str {
    let Some((_, extension)) = filename.rsplit_once('.') else {
        return "fa-file";
    };
    match extension.to_ascii_lowercase().as_str() {
        "pdf" => "fa-file-pdf",
        "doc" | "docx" => "fa-file-word",
        "xls" | "xlsx" => "fa-file-excel",
        "ppt" | "pptx" => "fa-file-powerpoint",
        "zip" | "rar" | "7z" | "tar" | "gz" => "fa-file-archive",
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" => "fa-file-image",
        "mp3" | "wav" | "ogg" | "flac" => "fa-file-audio",
        "mp4" | "avi" | "mov" | "wmv" | "mkv" => "fa-file-video",
        "txt" | "log" | "md" => "fa-file-alt",
        "html" | "htm" | "xml" | "json" | "js" | "css" => "fa-file-code",
        _ => "fa-file",
    }
}

/// `YYYY-MM-DD`, in UTC.
pub fn date(moment: UtcDateTime) -> String {
    moment
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| moment.date().to_string())
}

/// Escapes text for HTML element content and quoted attribute values.
pub fn escape_html(raw: impl AsRef<str>) -> String {
    raw.as_ref()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn escape_html_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
    match value {
        Value::String(text) => f.write_str(&escape_html(text))?,
        v => upon_fmt::default(f, v)?,
    };
    Ok(())
}

fn filesize_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
    match value {
        Value::Integer(bytes) if *bytes >= 0 => write!(f, "{}", human_size(bytes.unsigned_abs()))?,
        v => upon_fmt::default(f, v)?,
    };
    Ok(())
}

fn icon_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
    match value {
        Value::String(name) => write!(f, "{}", icon_for(name))?,
        _ => write!(f, "fa-file")?,
    };
    Ok(())
}

/// Registers the `filesize` and `icon` formatters and HTML-escapes
/// everything else.
pub(crate) fn configure(engine: &mut Engine<'_>) {
    engine.set_default_formatter(&escape_html_formatter);
    engine.add_formatter("filesize", filesize_formatter);
    engine.add_formatter("icon", icon_formatter);
}
