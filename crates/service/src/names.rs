//! Filename rules shared by the invoice store and the file-backed key-value store.

/// Characters allowed verbatim in stored names.
fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`, one `_` per
/// UTF-16 code unit so astral characters become `__`.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if is_allowed(c) {
            out.push(c);
        } else {
            out.extend(std::iter::repeat('_').take(c.len_utf16()));
        }
    }
    out
}

/// A name that can be joined onto a directory without leaving it.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && name.chars().all(is_allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_separators_and_spaces() {
        assert_eq!(sanitize_file_name("inv/../../etc"), "inv_.._.._etc");
        assert_eq!(sanitize_file_name("Invoice #12 (Ali).pdf"), "Invoice__12__Ali_.pdf");
        assert_eq!(sanitize_file_name("ok-name_1.pdf"), "ok-name_1.pdf");
        assert_eq!(sanitize_file_name("فاتورة.pdf"), "______.pdf");
        assert_eq!(sanitize_file_name("😀.pdf"), "__.pdf");
        assert_eq!(sanitize_file_name("a😀b é.pdf"), "a__b__.pdf");
    }

    #[test]
    fn safe_names_exclude_dot_entries() {
        assert!(is_safe_file_name("a.pdf"));
        assert!(is_safe_file_name("....pdf"));
        assert!(!is_safe_file_name(""));
        assert!(!is_safe_file_name("."));
        assert!(!is_safe_file_name(".."));
        assert!(!is_safe_file_name("../a.pdf"));
        assert!(!is_safe_file_name("a\\b.pdf"));
    }
}
