use std::path::Path;

/// The analysed kind of a module, detected from its file extension.
///
/// The kind selects the scanner that runs at load time and the default
/// content encoding when the module is inlined (binary content becomes a
/// base64 data URL, text content stays a UTF-8 string).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Resource,
    Binary,
    Text,
    Js,
    Json,
    Css,
    Html,
}

impl ModuleKind {
    /// Detect the kind from the lowercased file extension.
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Self::Resource;
        };
        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" | "inc" | "shtm" | "shtml" | "jsp" | "asp" | "php" | "aspx" | "tpl"
            | "template" => Self::Html,
            "xml" | "cshtml" | "vbhtml" | "txt" | "text" | "md" | "log" => Self::Text,
            "js" => Self::Js,
            "json" | "map" => Self::Json,
            "css" => Self::Css,
            _ => Self::Resource,
        }
    }

    /// Kinds whose content must be valid UTF-8.
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Text | Self::Js | Self::Json | Self::Css | Self::Html)
    }
}

/// MIME type for data-URI emission, looked up by extension.
pub fn mime_of(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return "application/octet-stream";
    };
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" | "map" => "application/json",
        "txt" | "text" | "log" | "md" => "text/plain",
        "xml" => "text/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::{mime_of, ModuleKind};

    #[test]
    fn detection() {
        let pass = [
            ("a.html", ModuleKind::Html),
            ("a.HTM", ModuleKind::Html),
            ("a.tpl", ModuleKind::Html),
            ("a.xml", ModuleKind::Text),
            ("a.md", ModuleKind::Text),
            ("a.js", ModuleKind::Js),
            ("a.json", ModuleKind::Json),
            ("a.js.map", ModuleKind::Json),
            ("a.css", ModuleKind::Css),
            ("a.png", ModuleKind::Resource),
            ("a", ModuleKind::Resource),
        ];
        for (name, expected) in pass {
            assert_eq!(ModuleKind::from_path(Path::new(name)), expected, "{name}");
        }
    }

    #[test]
    fn mime() {
        assert_eq!(mime_of(Path::new("icon.png")), "image/png");
        assert_eq!(mime_of(Path::new("a.bin")), "application/octet-stream");
        assert_eq!(mime_of(Path::new("a")), "application/octet-stream");
    }
}
