//! Input validation and sanitizing for uploaded content.

/// Accept only strings without whitespace that start with `http://` or `https://`.
pub fn is_valid_url(url: &str) -> bool {
    let url = url.trim();
    if url.chars().any(char::is_whitespace) {
        return false;
    }
    match url.strip_prefix("https://").or_else(|| url.strip_prefix("http://")) {
        Some(rest) => !rest.is_empty(),
        None => false,
    }
}

/// Strip null bytes, trim, and HTML-escape angle brackets.
pub fn sanitize_text(content: &str) -> String {
    content
        .replace('\0', "")
        .trim()
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn is_filename_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

/// Reduce an uploaded filename to a safe flat name.
///
/// Directory components are dropped and the stem is lower-cased with illegal
/// runs collapsed to `-`. Falls back to `unnamed<ext>` when the stem is empty.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx + 1..]),
        _ => (name, ""),
    };

    let ext: String = ext
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    let ext = if ext.is_empty() {
        String::new()
    } else {
        format!(".{}", ext)
    };

    // Without an extension a dot in the stem would be read back as one.
    let keep_dots = !ext.is_empty();
    let mut base = String::with_capacity(stem.len());
    for c in stem.to_lowercase().chars() {
        let c = if is_filename_char(c) && (keep_dots || c != '.') {
            c
        } else {
            '-'
        };
        if c == '-' && base.ends_with('-') {
            continue;
        }
        base.push(c);
    }
    let base = base.trim_matches(|c| c == '-' || c == '.');

    if base.is_empty() {
        format!("unnamed{}", ext)
    } else {
        format!("{}{}", base, ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_url_validation() {
        assert!(is_valid_url("https://example.com/a?b=c"));
        assert!(is_valid_url("  http://example.com  "));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("https://exa mple.com"));
        assert!(!is_valid_url("example.com"));
        assert!(!is_valid_url("https://"));
        assert!(!is_valid_url("javascript:alert(1)"));
    }

    #[test]
    fn test_text_is_escaped_without_nulls() {
        assert_eq!(sanitize_text("<script>"), "&lt;script&gt;");
        assert_eq!(sanitize_text("\0 <b>hi</b>\0 \n"), "&lt;b&gt;hi&lt;/b&gt;");
    }

    #[test]
    fn test_filename_examples() {
        assert_eq!(sanitize_filename("Report Final.PDF"), "report-final.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\photo.JPG"), "photo.jpg");
        assert_eq!(sanitize_filename("???.txt"), "unnamed.txt");
        assert_eq!(sanitize_filename(".bashrc"), "bashrc");
        assert_eq!(sanitize_filename("archive.tar.gz"), "archive.tar.gz");
        assert_eq!(sanitize_filename(""), "unnamed");
        assert_eq!(sanitize_filename("a-.b.!"), "a-b");
    }

    #[test]
    fn test_non_ascii_filenames_keep_letters() {
        assert_eq!(sanitize_filename("résumé.pdf"), "résumé.pdf");
        assert_eq!(sanitize_filename("Été 2024.JPG"), "été-2024.jpg");
        assert_eq!(sanitize_filename("報告書.docx"), "報告書.docx");
        assert_eq!(sanitize_filename("notes.тхт"), "notes.тхт");
    }

    proptest! {
        #[test]
        fn sanitized_filename_is_flat_and_stable(input in "\\PC*") {
            let name = sanitize_filename(&input);
            prop_assert!(!name.is_empty());
            prop_assert!(!name.contains('/') && !name.contains('\\'));
            prop_assert!(name.chars().all(is_filename_char));
            prop_assert_eq!(sanitize_filename(&name), name);
        }

        #[test]
        fn non_ascii_filename_is_stable(input in "[a-zA-Zàéîõüßçñ日本語кириллица ._/-]{0,40}") {
            let name = sanitize_filename(&input);
            prop_assert!(name.chars().all(is_filename_char));
            prop_assert_eq!(sanitize_filename(&name), name);
        }
    }
}
