//! Media staging and upload classification.

use std::path::{Path, PathBuf};

use crate::{
    domain::{InboundMedia, MediaKind, MessageId},
    errors::Error,
    Result,
};

/// How a staged file goes back up to the destination chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadAs {
    Photo,
    /// Generic binary document named after the staged file. Video metadata
    /// (duration, dimensions, streaming) is not carried over.
    Document { file_name: String },
}

impl UploadAs {
    pub fn for_kind(kind: MediaKind, staged: &Path) -> Result<Self> {
        match kind {
            MediaKind::Photo => Ok(Self::Photo),
            MediaKind::Video | MediaKind::GenericDocument => {
                let file_name = staged
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| Error::InvalidPath {
                        path: staged.to_path_buf(),
                        reason: "staged media has no file name".to_string(),
                    })?;
                Ok(Self::Document { file_name })
            }
        }
    }
}

/// Everything the media sender needs for one upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMedia {
    pub path: PathBuf,
    pub caption: Option<String>,
    pub upload: UploadAs,
}

impl OutgoingMedia {
    pub fn new(path: &Path, caption: Option<&str>, kind: MediaKind) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            caption: caption.filter(|c| !c.is_empty()).map(str::to_string),
            upload: UploadAs::for_kind(kind, path)?,
        })
    }
}

/// A downloaded file that is removed when the guard drops.
#[derive(Debug)]
pub struct StagedMedia {
    path: PathBuf,
}

impl StagedMedia {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedMedia {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove staged media")
            }
        }
    }
}

/// Local file name for a staged download.
///
/// Keeps the original name when there is one (sanitized and made unique),
/// otherwise derives one from the media kind and source message id.
pub fn staged_file_name(media: &InboundMedia, source: MessageId, stamp: i64) -> String {
    if let Some(name) = media.file_name.as_deref().filter(|n| !n.trim().is_empty()) {
        return uniquify_filename(name, stamp, source.0);
    }
    let (prefix, ext) = match media.kind {
        MediaKind::Photo => ("photo", "jpg"),
        MediaKind::Video => ("video", "mp4"),
        MediaKind::GenericDocument => ("document", "bin"),
    };
    format!("{prefix}_{stamp}_{}.{ext}", source.0)
}

fn sanitize_filename(name: &str) -> String {
    // Path separators never survive, so the result stays inside the scratch dir.
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let mut out = String::with_capacity(base.len());
    for ch in base.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    let trimmed = out.trim_start_matches('.');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

fn uniquify_filename(name: &str, stamp: i64, n: i32) -> String {
    let base = sanitize_filename(name);
    if let Some((stem, ext)) = base.rsplit_once('.') {
        if !stem.is_empty() && !ext.is_empty() {
            return format!("{stem}_{stamp}_{n}.{ext}");
        }
    }
    format!("{base}_{stamp}_{n}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(kind: MediaKind, file_name: Option<&str>) -> InboundMedia {
        InboundMedia {
            kind,
            file_id: Some("f".to_string()),
            file_name: file_name.map(str::to_string),
        }
    }

    #[test]
    fn photos_upload_as_photos() {
        let up = UploadAs::for_kind(MediaKind::Photo, Path::new("tmp_media/a.jpg")).unwrap();
        assert_eq!(up, UploadAs::Photo);
    }

    #[test]
    fn videos_and_files_upload_as_named_documents() {
        for kind in [MediaKind::Video, MediaKind::GenericDocument] {
            let up = UploadAs::for_kind(kind, Path::new("tmp_media/clip_1_2.mp4")).unwrap();
            assert_eq!(
                up,
                UploadAs::Document {
                    file_name: "clip_1_2.mp4".to_string()
                }
            );
        }
    }

    #[test]
    fn document_without_file_name_is_rejected() {
        assert!(UploadAs::for_kind(MediaKind::GenericDocument, Path::new("/")).is_err());
    }

    #[test]
    fn empty_caption_is_dropped() {
        let out = OutgoingMedia::new(Path::new("a.jpg"), Some(""), MediaKind::Photo).unwrap();
        assert_eq!(out.caption, None);
        let out = OutgoingMedia::new(Path::new("a.jpg"), Some("hi"), MediaKind::Photo).unwrap();
        assert_eq!(out.caption.as_deref(), Some("hi"));
    }

    #[test]
    fn staged_names_keep_original_name_safely() {
        let m = media(MediaKind::GenericDocument, Some("../../etc/report final.pdf"));
        assert_eq!(
            staged_file_name(&m, MessageId(7), 1700),
            "report_final_1700_7.pdf"
        );

        let m = media(MediaKind::GenericDocument, Some(".."));
        assert_eq!(staged_file_name(&m, MessageId(7), 1700), "document_1700_7");
    }

    #[test]
    fn staged_names_fall_back_to_kind() {
        assert_eq!(
            staged_file_name(&media(MediaKind::Photo, None), MessageId(3), 10),
            "photo_10_3.jpg"
        );
        assert_eq!(
            staged_file_name(&media(MediaKind::Video, Some("  ")), MessageId(3), 10),
            "video_10_3.mp4"
        );
    }

    #[test]
    fn staged_media_is_removed_on_drop() {
        let path = std::env::temp_dir().join(format!("relay-staged-{}.bin", std::process::id()));
        std::fs::write(&path, b"x").unwrap();
        {
            let staged = StagedMedia::new(path.clone());
            assert!(staged.path().exists());
        }
        assert!(!path.exists());
    }
}
