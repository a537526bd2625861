//! Static file-extension to MIME type table.

/// Content type used when the extension is unknown or missing.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Known extensions, lowercase, without the leading dot.
const TYPES: &[(&str, &str)] = &[
    ("7z", "application/x-7z-compressed"),
    ("bmp", "image/bmp"),
    ("bz2", "application/x-bzip2"),
    ("c", "text/plain"),
    ("cpp", "text/plain"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("diff", "text/x-diff"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("ear", "application/java-archive"),
    ("eml", "message/rfc822"),
    ("gif", "image/gif"),
    ("gz", "application/gzip"),
    ("h", "text/plain"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ico", "image/vnd.microsoft.icon"),
    ("jar", "application/java-archive"),
    ("java", "text/plain"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("log", "text/plain"),
    ("md", "text/markdown"),
    ("out", "text/plain"),
    ("patch", "text/x-diff"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("properties", "text/plain"),
    ("py", "text/plain"),
    ("rs", "text/plain"),
    ("rtf", "application/rtf"),
    ("sh", "application/x-sh"),
    ("svg", "image/svg+xml"),
    ("tar", "application/x-tar"),
    ("tgz", "application/gzip"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("toml", "text/plain"),
    ("txt", "text/plain"),
    ("war", "application/java-archive"),
    ("webp", "image/webp"),
    ("xls", "application/vnd.ms-excel"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("xml", "application/xml"),
    ("xz", "application/x-xz"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("zip", "application/zip"),
];

/// Look up the content type for a file name by its extension.
///
/// Matching is case-insensitive. Names without an extension, dotfiles
/// such as `.gitignore`, and unknown extensions map to
/// [`DEFAULT_CONTENT_TYPE`].
pub fn for_file_name(name: &str) -> &'static str {
    let ext = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => return DEFAULT_CONTENT_TYPE,
    };
    TYPES
        .binary_search_by(|(key, _)| (*key).cmp(ext.as_str()))
        .map(|idx| TYPES[idx].1)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted() {
        assert!(TYPES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_known_extensions() {
        assert_eq!(for_file_name("build.log"), "text/plain");
        assert_eq!(for_file_name("build.zip"), "application/zip");
        assert_eq!(for_file_name("report.PDF"), "application/pdf");
        assert_eq!(for_file_name("archive.tar.gz"), "application/gzip");
    }

    #[test]
    fn test_fallback() {
        assert_eq!(for_file_name("Makefile"), DEFAULT_CONTENT_TYPE);
        assert_eq!(for_file_name(".gitignore"), DEFAULT_CONTENT_TYPE);
        assert_eq!(for_file_name("data.unknownext"), DEFAULT_CONTENT_TYPE);
        assert_eq!(for_file_name("trailing."), DEFAULT_CONTENT_TYPE);
    }
}
