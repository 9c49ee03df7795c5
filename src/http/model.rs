use std::path::Path;

use crate::error::{Result, SyncError};

/// A file picked for upload, already read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(Path::new(&file_name)).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                SyncError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid file name: {}", path.display()),
                ))
            })?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(file_name, bytes))
    }

    /// Read several files concurrently; fails on the first unreadable one.
    pub async fn read_all<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Self>> {
        futures::future::try_join_all(paths.iter().map(Self::from_path)).await
    }
}

/// One named part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub attachment: Attachment,
}

impl FilePart {
    pub fn single(attachment: Attachment) -> Vec<FilePart> {
        vec![FilePart {
            field: "file".to_string(),
            attachment,
        }]
    }

    /// `files[0]`, `files[1]`, ... as the document endpoint expects.
    pub fn indexed(attachments: Vec<Attachment>) -> Vec<FilePart> {
        attachments
            .into_iter()
            .enumerate()
            .map(|(idx, attachment)| FilePart {
                field: format!("files[{idx}]"),
                attachment,
            })
            .collect()
    }
}

pub fn content_type_for(file_path: &Path) -> &'static str {
    match file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "pdf" => "application/pdf",
        Some(ext) if ext == "csv" => "text/csv",
        Some(ext) if ext == "docx" => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some(ext) if ext == "xlsx" => {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        }
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_content_type_from_extension() {
        assert_eq!(Attachment::new("a.JPG", vec![]).content_type, "image/jpeg");
        assert_eq!(Attachment::new("quote.pdf", vec![]).content_type, "application/pdf");
        assert_eq!(
            Attachment::new("blob", vec![]).content_type,
            "application/octet-stream"
        );
    }

    #[test]
    fn indexed_parts_are_numbered() {
        let parts = FilePart::indexed(vec![
            Attachment::new("a.pdf", vec![1]),
            Attachment::new("b.pdf", vec![2]),
        ]);
        let fields: Vec<_> = parts.iter().map(|p| p.field.as_str()).collect();
        assert_eq!(fields, vec!["files[0]", "files[1]"]);
    }

    #[tokio::test]
    async fn reads_attachment_from_disk() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("avatar.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
        let attachment = Attachment::from_path(&path).await.unwrap();
        assert_eq!(attachment.file_name, "avatar.png");
        assert_eq!(attachment.content_type, "image/png");
        assert_eq!(attachment.bytes.len(), 4);
    }

    #[tokio::test]
    async fn read_all_keeps_order_and_fails_on_missing_file() {
        let td = tempfile::tempdir().unwrap();
        let a = td.path().join("a.pdf");
        let b = td.path().join("b.csv");
        std::fs::write(&a, b"%PDF").unwrap();
        std::fs::write(&b, b"x,y").unwrap();
        let files = Attachment::read_all(&[&a, &b]).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.csv"]);

        let missing = td.path().join("missing.pdf");
        assert!(Attachment::read_all(&[&a, &missing]).await.is_err());
    }
}
