use std::path::{Path, PathBuf};

/// Reduce an untrusted file name to `[A-Za-z0-9._-]`, dropping any directory part.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Fresh export directory for one run: `{root}/{video stem}-{uuid}`.
pub fn request_output_dir(root: &Path, video_path: &Path) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map(|s| sanitize_file_name(&s.to_string_lossy()))
        .unwrap_or_else(|| "video".to_string());
    root.join(format!("{}-{}", stem, uuid::Uuid::now_v7()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\videos\\my clip (1).mov"), "my_clip__1_.mov");
        assert_eq!(sanitize_file_name("..."), "upload");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn test_request_output_dirs_are_unique() {
        let root = Path::new("anomalies_output");
        let a = request_output_dir(root, Path::new("media/uploads/walk.mp4"));
        let b = request_output_dir(root, Path::new("media/uploads/walk.mp4"));
        assert_ne!(a, b);
        assert!(a.starts_with(root));
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("walk-"));
    }
}
