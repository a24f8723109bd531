//! Classification of a stored record into something the caller can serve.

use sharebin_core::{AppError, ShareItem, ShareKind};
use sharebin_storage::Storage;
use std::path::{Path, PathBuf};

/// How a file should be presented to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }

    /// Images display in the browser; everything else downloads.
    pub fn for_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            Disposition::Inline
        } else {
            Disposition::Attachment
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareDescriptor {
    File {
        /// Stored artifact name, also offered as the download name.
        name: String,
        path: PathBuf,
        mime: String,
        disposition: Disposition,
    },
    Text(String),
    Redirect(String),
}

/// Content type for a stored artifact, from its extension.
pub fn content_type_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        // Video and audio
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        // Documents
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" | "log" | "md" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        // Archives
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        "7z" => "application/x-7z-compressed",
        _ => "application/octet-stream",
    }
}

pub(crate) fn describe(item: ShareItem, storage: &dyn Storage) -> Result<ShareDescriptor, AppError> {
    match item.kind {
        ShareKind::File => {
            let path = storage.path_for(&item.content)?;
            let mime = content_type_for(&item.content).to_string();
            let disposition = Disposition::for_mime(&mime);
            Ok(ShareDescriptor::File {
                name: item.content,
                path,
                mime,
                disposition,
            })
        }
        ShareKind::Text => Ok(ShareDescriptor::Text(item.content)),
        ShareKind::Url => Ok(ShareDescriptor::Redirect(item.content)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("photo.PNG"), "image/png");
        assert_eq!(content_type_for("report.pdf"), "application/pdf");
        assert_eq!(content_type_for("notes_1.txt"), "text/plain");
        assert_eq!(content_type_for("archive.unknownext"), "application/octet-stream");
        assert_eq!(content_type_for("readme"), "application/octet-stream");
    }

    #[test]
    fn test_disposition_for_mime() {
        assert_eq!(Disposition::for_mime("image/png"), Disposition::Inline);
        assert_eq!(Disposition::for_mime("image/svg+xml"), Disposition::Inline);
        assert_eq!(Disposition::for_mime("application/pdf"), Disposition::Attachment);
        assert_eq!(Disposition::for_mime("text/plain"), Disposition::Attachment);
    }
}
