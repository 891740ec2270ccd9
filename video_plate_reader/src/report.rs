use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::error::PlateError;
use crate::plate_detection::processor::PlateResult;

const VIDEO_EXTENSION: &str = "mp4";

pub fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(VIDEO_EXTENSION))
        .unwrap_or(false)
}

/// Regular `.mp4` files directly inside `dir`, sorted by file name.
pub fn list_videos(dir: &Path) -> Result<Vec<PathBuf>, PlateError> {
    let mut videos = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && is_supported_video(&path) {
            videos.push(path);
        }
    }
    videos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(videos)
}

/// Appends one record:
///
/// ```text
/// Video: 001.mp4
/// License Plate: KA01AB1234
///
/// ```
pub fn write_entry<W: Write>(
    out: &mut W,
    video: &str,
    result: &PlateResult,
) -> Result<(), PlateError> {
    writeln!(out, "Video: {}", video)?;
    writeln!(out, "License Plate: {}", result)?;
    writeln!(out)?;
    Ok(())
}

/// Empties the uploads folder and deletes the log file. Either may be missing.
pub fn clean(uploads: &Path, log_file: &Path) -> Result<(), PlateError> {
    if uploads.exists() {
        fs::remove_dir_all(uploads)?;
    }
    fs::create_dir_all(uploads)?;
    log::info!("recreated {}", uploads.display());

    if log_file.exists() {
        fs::remove_file(log_file)?;
        log::info!("removed {}", log_file.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_mp4_files_are_listed_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp4", "a.MP4", "notes.txt", "c.avi"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let names: Vec<String> = list_videos(dir.path())
            .unwrap()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.MP4", "b.mp4"]);
    }

    #[test]
    fn entries_use_none_for_missing_plates() {
        let mut out = Vec::new();
        write_entry(&mut out, "001.mp4", &PlateResult::Found("ABC123".into())).unwrap();
        write_entry(&mut out, "002.mp4", &PlateResult::NotFound).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Video: 001.mp4\nLicense Plate: ABC123\n\nVideo: 002.mp4\nLicense Plate: None\n\n"
        );
    }

    #[test]
    fn clean_recreates_uploads_and_drops_log() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        let log_file = dir.path().join("server.log");
        fs::create_dir(&uploads).unwrap();
        fs::write(uploads.join("001.mp4"), b"data").unwrap();
        fs::write(&log_file, b"log").unwrap();

        clean(&uploads, &log_file).unwrap();
        assert!(uploads.is_dir());
        assert_eq!(fs::read_dir(&uploads).unwrap().count(), 0);
        assert!(!log_file.exists());

        // Second run with nothing to remove.
        clean(&uploads, &log_file).unwrap();
    }
}
