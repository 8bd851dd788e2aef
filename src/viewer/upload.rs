use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ViewerConfig;
use crate::error::UploadError;

/// An image held in memory for the life of one viewer session.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub accepted: Vec<UploadedImage>,
    pub rejected: Vec<(String, UploadError)>,
}

/// Lowercased extension with its dot, e.g. ".jpg"; empty when there is none.
fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

pub fn validate_upload(name: &str, size: u64, config: &ViewerConfig) -> Result<(), UploadError> {
    let ext = extension_of(name);
    if !config.allowed_extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext)) {
        return Err(UploadError::DisallowedExtension(ext));
    }
    if size > config.max_file_size {
        return Err(UploadError::TooLarge { size, max: config.max_file_size });
    }
    Ok(())
}

/// Check every file on its own; one bad file never sinks the batch.
pub fn accept_batch(files: Vec<UploadedImage>, config: &ViewerConfig) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for file in files {
        match validate_upload(&file.name, file.size(), config) {
            Ok(()) => outcome.accepted.push(file),
            Err(e) => {
                log::warn!("Skipped {}: {}", file.name, e);
                outcome.rejected.push((file.name, e));
            }
        }
    }
    outcome
}

/// Like `accept_batch` for files on disk. Size is checked from metadata so
/// oversized files are never read.
pub fn load_batch(paths: &[PathBuf], config: &ViewerConfig) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let result = fs::metadata(path)
            .map_err(|e| UploadError::Unreadable(e.to_string()))
            .and_then(|meta| validate_upload(&name, meta.len(), config))
            .and_then(|_| fs::read(path).map_err(|e| UploadError::Unreadable(e.to_string())));

        match result {
            Ok(bytes) => outcome.accepted.push(UploadedImage::new(name, bytes)),
            Err(e) => {
                log::warn!("Skipped {}: {}", name, e);
                outcome.rejected.push((name, e));
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_allow_list_is_case_insensitive() {
        let config = ViewerConfig::default();
        assert!(validate_upload("holiday.JPG", 10, &config).is_ok());
        assert!(validate_upload("scan.bmp", 10, &config).is_ok());
        assert_eq!(
            validate_upload("notes.txt", 10, &config),
            Err(UploadError::DisallowedExtension(".txt".to_string()))
        );
        assert_eq!(validate_upload("README", 10, &config), Err(UploadError::DisallowedExtension(String::new())));
    }

    #[test]
    fn test_size_limit() {
        let config = ViewerConfig { max_file_size: 100, ..ViewerConfig::default() };
        assert!(validate_upload("a.png", 100, &config).is_ok());
        assert_eq!(validate_upload("a.png", 101, &config), Err(UploadError::TooLarge { size: 101, max: 100 }));
    }

    #[test]
    fn test_bad_file_does_not_reject_batch() {
        let config = ViewerConfig::default();
        let batch = vec![
            UploadedImage::new("one.png", vec![1]),
            UploadedImage::new("payload.exe", vec![2]),
            UploadedImage::new("two.jpeg", vec![3]),
        ];

        let outcome = accept_batch(batch, &config);

        let names: Vec<_> = outcome.accepted.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["one.png", "two.jpeg"]);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].0, "payload.exe");
    }

    #[test]
    fn test_load_batch_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        let big = dir.path().join("big.jpg");
        let wrong = dir.path().join("doc.pdf");
        fs::write(&good, b"png").unwrap();
        fs::write(&big, vec![0u8; 64]).unwrap();
        fs::write(&wrong, b"pdf").unwrap();
        let missing = dir.path().join("missing.png");

        let config = ViewerConfig { max_file_size: 32, ..ViewerConfig::default() };
        let outcome = load_batch(&[good, big, wrong, missing], &config);

        assert_eq!(outcome.accepted, vec![UploadedImage::new("good.png", b"png".to_vec())]);
        let reasons: Vec<_> = outcome.rejected.iter().map(|(n, e)| (n.as_str(), e.clone())).collect();
        assert!(matches!(reasons[0], ("big.jpg", UploadError::TooLarge { size: 64, max: 32 })));
        assert!(matches!(reasons[1], ("doc.pdf", UploadError::DisallowedExtension(_))));
        assert!(matches!(reasons[2], ("missing.png", UploadError::Unreadable(_))));
    }
}
