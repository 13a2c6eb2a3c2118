//! Post-processing: prefix recordings with their size.

use log::{info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const MEGABYTE: f64 = 1024.0 * 1024.0;

/// `<size>MB_<name>`, size in MiB with one decimal.
pub fn annotated_name(file_name: &str, size_bytes: u64) -> String {
    format!("{:.1}MB_{}", size_bytes as f64 / MEGABYTE, file_name)
}

/// Whether `file_name` already carries a size prefix.
pub fn is_annotated(file_name: &str) -> bool {
    file_name
        .split_once("MB_")
        .is_some_and(|(size, _)| size.contains('.') && size.parse::<f64>().is_ok())
}

fn annotate_file(path: &Path, size_bytes: u64) -> io::Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "not a file name"))?;
    let target = path.with_file_name(annotated_name(name, size_bytes));
    fs::rename(path, &target)?;
    info!("Renamed {} -> {}", name, target.display());
    Ok(target)
}

/// Renames the given recordings; files that were never written are skipped.
pub fn annotate_recordings(paths: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let mut renamed = Vec::with_capacity(paths.len());
    for path in paths {
        match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => {
                renamed.push(annotate_file(path, metadata.len())?);
            }
            Ok(_) => warn!("Not a file, left as is: {}", path.display()),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    Ok(renamed)
}

/// Renames every `.mp4` file in `dir` not annotated yet; returns the new paths.
pub fn annotate_sizes(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut renamed = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !name.ends_with(".mp4") || is_annotated(name) {
            continue;
        }

        renamed.push(annotate_file(&entry.path(), metadata.len())?);
    }

    renamed.sort();
    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotated_name() {
        assert_eq!(annotated_name("capture_0.mp4", 0), "0.0MB_capture_0.mp4");
        assert_eq!(
            annotated_name("capture_1.mp4", 3 * 1024 * 1024 + 512 * 1024),
            "3.5MB_capture_1.mp4"
        );
    }

    #[test]
    fn test_annotate_sizes_renames_only_mp4_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("capture_0_20240101_120000.mp4"), vec![0u8; 1024 * 1024])
            .unwrap();
        fs::write(dir.path().join("notes.txt"), b"keep").unwrap();
        fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let renamed = annotate_sizes(dir.path()).unwrap();

        assert_eq!(
            renamed,
            vec![dir.path().join("1.0MB_capture_0_20240101_120000.mp4")]
        );
        assert!(renamed[0].exists());
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("nested.mp4").is_dir());
        assert!(!dir.path().join("capture_0_20240101_120000.mp4").exists());
    }

    #[test]
    fn test_is_annotated() {
        assert!(is_annotated("1.0MB_capture_0_20240101_120000.mp4"));
        assert!(is_annotated("12.5MB_run_capture_1.mp4"));
        assert!(!is_annotated("capture_0_20240101_120000.mp4"));
        assert!(!is_annotated("runMB_capture_0.mp4"));
        assert!(!is_annotated("3MB_capture_0.mp4"));
    }

    #[test]
    fn test_annotate_sizes_skips_annotated_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1.0MB_capture_0_20240101_120000.mp4"), b"old").unwrap();
        fs::write(dir.path().join("capture_0_20240102_120000.mp4"), b"").unwrap();

        let renamed = annotate_sizes(dir.path()).unwrap();

        assert_eq!(
            renamed,
            vec![dir.path().join("0.0MB_capture_0_20240102_120000.mp4")]
        );
        assert!(dir
            .path()
            .join("1.0MB_capture_0_20240101_120000.mp4")
            .exists());
    }

    #[test]
    fn test_annotate_recordings_touches_only_this_run() {
        let dir = tempfile::tempdir().unwrap();
        let earlier = dir.path().join("capture_0_20240101_120000.mp4");
        let current = dir.path().join("capture_0_20240102_120000.mp4");
        let never_written = dir.path().join("capture_1_20240102_120000.mp4");
        fs::write(&earlier, b"old").unwrap();
        fs::write(&current, vec![0u8; 2 * 1024 * 1024]).unwrap();

        let renamed = annotate_recordings(&[current, never_written]).unwrap();

        assert_eq!(
            renamed,
            vec![dir.path().join("2.0MB_capture_0_20240102_120000.mp4")]
        );
        assert!(earlier.exists());
    }

    #[test]
    fn test_annotate_missing_dir() {
        assert!(annotate_sizes(Path::new("/nonexistent/recordings")).is_err());
    }
}
