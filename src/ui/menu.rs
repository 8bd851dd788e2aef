use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Select};
use std::fs;
use std::path::{Path, PathBuf};

const VIDEO_EXTENSIONS: &[&str] = &["avi", "mp4", "mkv", "mov", "webm"];

/// Video files in `dir`, newest name last.
pub fn list_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut videos: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .collect();

    videos.sort();
    Ok(videos)
}

/// Ask which recording to extract from. `None` when there is nothing to pick.
pub fn pick_video(dir: &Path) -> Result<Option<PathBuf>> {
    let videos = list_videos(dir)?;
    if videos.is_empty() {
        eprintln!("❌ No video files in {}", dir.display());
        return Ok(None);
    }

    let names: Vec<String> = videos
        .iter()
        .map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default())
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("📼 Extract images from which video?")
        .default(names.len() - 1)
        .items(&names)
        .interact()?;

    Ok(videos.into_iter().nth(selection))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_videos_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["video_2.avi", "video_1.AVI", "notes.txt", "clip.mp4"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let names: Vec<_> = list_videos(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["clip.mp4", "video_1.AVI", "video_2.avi"]);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_videos(&dir.path().join("nope")).unwrap().is_empty());
    }
}
