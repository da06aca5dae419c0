use failure::Error;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Writes `contents` to `path` through a temporary file in the same directory,
/// so the target is either left alone or fully replaced.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Error> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.flush()?;
    set_readable(&file)?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_readable(file: &NamedTempFile) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;
    file.as_file()
        .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_readable(_file: &NamedTempFile) -> Result<(), Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn creates_and_replaces_target() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zz_generated.pricing.go");

        write_atomic(&path, b"package aws\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "package aws\n");

        write_atomic(&path, b"package pricing\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "package pricing\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn output_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prices.go");
        write_atomic(&path, b"package aws\n").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn missing_directory_fails_without_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("prices.go");
        assert!(write_atomic(&path, b"package aws\n").is_err());
        assert!(!path.exists());
    }
}
