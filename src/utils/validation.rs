use anyhow::{Result, anyhow};

/// The only content type accepted for upload
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Separator between the timestamp and the sanitized name in stored names
pub const STORED_NAME_SEPARATOR: &str = "__";

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Only PDF documents are accepted. Parameters such as `; charset=` are ignored.
pub fn validate_mime_type(content_type: Option<&str>) -> Result<()> {
    let normalized = content_type
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    if normalized == PDF_MIME_TYPE {
        return Ok(());
    }

    Err(anyhow!(ValidationError {
        code: "INVALID_MIME_TYPE",
        message: "Only PDF files are allowed.".to_string(),
    }))
}

/// Replaces every run of characters outside `[A-Za-z0-9_.-]` with one `_`.
///
/// Path separators never survive, so the result is always a single path
/// component once it is prefixed by [`stored_name`].
pub fn sanitize_filename(filename: &str) -> String {
    let mut sanitized = String::with_capacity(filename.len());
    let mut in_run = false;

    for c in filename.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
            sanitized.push(c);
            in_run = false;
        } else if !in_run {
            sanitized.push('_');
            in_run = true;
        }
    }

    sanitized
}

/// On-disk name for an upload: `<unix millis>__<sanitized original name>`.
pub fn stored_name(timestamp_millis: i64, original_name: &str) -> String {
    format!(
        "{}{}{}",
        timestamp_millis,
        STORED_NAME_SEPARATOR,
        sanitize_filename(original_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_mime_type() {
        assert!(validate_mime_type(Some("application/pdf")).is_ok());
        assert!(validate_mime_type(Some("Application/PDF")).is_ok());
        assert!(validate_mime_type(Some("application/pdf; name=x.pdf")).is_ok());

        assert!(validate_mime_type(Some("text/plain")).is_err());
        assert!(validate_mime_type(Some("application/x-pdf")).is_err());
        assert!(validate_mime_type(None).is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report-2024_v1.pdf"), "report-2024_v1.pdf");
        assert_eq!(sanitize_filename("my file.pdf"), "my_file.pdf");
        assert_eq!(sanitize_filename("a  & b.pdf"), "a_b.pdf");
        assert_eq!(sanitize_filename("rapport d'activité.pdf"), "rapport_d_activit_.pdf");
        assert_eq!(sanitize_filename("测试.pdf"), "_.pdf");
        assert_eq!(sanitize_filename(""), "");

        // Path separators are flattened
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("..\\win\\x.pdf"), ".._win_x.pdf");
    }

    #[test]
    fn test_stored_name() {
        assert_eq!(
            stored_name(1714557600000, "Mission brief.pdf"),
            "1714557600000__Mission_brief.pdf"
        );
        assert!(!stored_name(1, "a/b.pdf").contains('/'));
    }
}
