//! Temporary locations for synthetic archives.

/// Creates a temporary directory with a prefix, removed on drop.
///
/// Archives written by [`crate::archive`] go in a subdirectory so a test can
/// hold several of them.
pub fn temp_archive_dir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temporary archive directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_archive_dir_with_prefix() {
        let dir = temp_archive_dir("era5_test_");
        assert!(dir.path().exists());
        assert!(dir.path().to_string_lossy().contains("era5_test_"));
    }

    #[test]
    fn test_temp_archive_dir_is_removed_on_drop() {
        let dir = temp_archive_dir("era5_drop_");
        let path = dir.path().to_path_buf();
        drop(dir);
        assert!(!path.exists());
    }
}
