use serde::{Deserialize, Serialize};

/// How content is compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Text,
    Binary,
    Unsupported,
}

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "java", "js", "ts", "html", "css", "xml", "json", "yml", "yaml", "properties",
    "conf", "ini", "sql", "py", "c", "cpp", "h", "sh", "bat", "log", "csv",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "ico", "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    "zip", "tar", "gz", "rar", "7z", "exe", "dll", "so", "dylib", "mp3", "mp4", "avi", "mov", "wav",
];

/// Lowercased extension after the last dot. A name whose only dot is the
/// first character has no extension.
pub fn extension(filename: &str) -> Option<String> {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}

/// Classify content by file name, then by MIME type.
pub fn classify(filename: &str, mime_type: Option<&str>) -> DiffKind {
    if let Some(ext) = extension(filename) {
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            return DiffKind::Text;
        }
        if BINARY_EXTENSIONS.contains(&ext.as_str()) {
            return DiffKind::Binary;
        }
    }

    match mime_type.map(str::to_ascii_lowercase) {
        Some(m)
            if m.starts_with("text/")
                || m == "application/json"
                || m == "application/xml"
                || m == "application/javascript" =>
        {
            DiffKind::Text
        }
        Some(m)
            if m.starts_with("image/")
                || m.starts_with("video/")
                || m.starts_with("audio/")
                || m == "application/octet-stream" =>
        {
            DiffKind::Binary
        }
        _ => DiffKind::Unsupported,
    }
}

/// Classify by inspecting bytes: valid UTF-8 without NUL is text.
pub fn sniff(content: &[u8]) -> DiffKind {
    if !content.contains(&0) && std::str::from_utf8(content).is_ok() {
        DiffKind::Text
    } else {
        DiffKind::Binary
    }
}
