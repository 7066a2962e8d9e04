use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::shared::constants::{OUTPUT_FILE_EXTENSION, OUTPUT_FILE_PREFIX};
use crate::shared::encode_error::EncodeError;

/// The platform's video directory, or the working directory when there is none.
pub fn default_output_dir() -> PathBuf {
    dirs::video_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `dir/output_<unix-millis>.mp4`.
pub fn default_output_path(dir: &Path) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    dir.join(format!(
        "{OUTPUT_FILE_PREFIX}{millis}.{OUTPUT_FILE_EXTENSION}"
    ))
}

/// Creates the parent directory of `path` if needed and checks it accepts writes.
pub fn prepare_output_path(path: &Path) -> Result<(), EncodeError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| {
        EncodeError::resource(format!(
            "cannot create output directory {}: {e}",
            parent.display()
        ))
    })?;

    let metadata = fs::metadata(parent).map_err(|e| {
        EncodeError::resource(format!("cannot inspect {}: {e}", parent.display()))
    })?;
    if !metadata.is_dir() {
        return Err(EncodeError::resource(format!(
            "{} is not a directory",
            parent.display()
        )));
    }
    if metadata.permissions().readonly() {
        return Err(EncodeError::resource(format!(
            "output directory {} is read-only",
            parent.display()
        )));
    }
    if path.is_dir() {
        return Err(EncodeError::resource(format!(
            "output path {} is a directory",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::encode_error::ErrorKind;

    #[test]
    fn test_default_output_path_shape() {
        let path = default_output_path(Path::new("/videos"));
        assert_eq!(path.parent(), Some(Path::new("/videos")));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp4"));
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap();
        let millis = stem.strip_prefix("output_").unwrap();
        assert!(millis.parse::<u128>().unwrap() > 0);
    }

    #[test]
    fn test_prepare_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Movies").join("nested").join("out.mp4");
        prepare_output_path(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());
        assert!(!path.exists());
    }

    #[test]
    fn test_prepare_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let err = prepare_output_path(&blocker.join("out.mp4")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }

    #[test]
    fn test_prepare_rejects_directory_as_output() {
        let dir = tempfile::tempdir().unwrap();
        let err = prepare_output_path(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }

    #[test]
    fn test_bare_file_name_uses_working_directory() {
        assert!(prepare_output_path(Path::new("out.mp4")).is_ok());
    }
}
