//! Line diffs between two revisions of a file

use owo_colors::OwoColorize;
use similar::{ChangeTag, TextDiff};

/// Check if content is binary (contains null bytes in first 8KB)
pub fn is_binary(content: &[u8]) -> bool {
    content.iter().take(8192).any(|&b| b == 0)
}

/// Diff between two versions of `path`. `None` stands for content that
/// was not kept (too large) or a side where the file did not exist.
pub fn render_diff(old: Option<&[u8]>, new: Option<&[u8]>, path: &str, context_lines: usize) -> String {
    match (old, new) {
        (Some(old), Some(new)) if is_binary(old) || is_binary(new) => {
            if old == new {
                String::new()
            } else {
                format!("    {}\n", format!("Binary file {} differs", path).dimmed())
            }
        }
        (Some(old), Some(new)) => generate_unified_diff(old, new, path, context_lines),
        (None, Some(new)) if !is_binary(new) => generate_unified_diff(b"", new, path, context_lines),
        (Some(old), None) if !is_binary(old) => generate_unified_diff(old, b"", path, context_lines),
        _ => format!("    {}\n", "(content not available)".dimmed()),
    }
}

/// Generate a unified diff with colored output
pub fn generate_unified_diff(
    old_content: &[u8],
    new_content: &[u8],
    path: &str,
    context_lines: usize,
) -> String {
    let old_text = String::from_utf8_lossy(old_content);
    let new_text = String::from_utf8_lossy(new_content);
    let diff = TextDiff::from_lines(&old_text, &new_text);

    let mut output = String::new();
    let mut unified = diff.unified_diff();
    unified.context_radius(context_lines);
    for (hunk_idx, hunk) in unified.iter_hunks().enumerate() {
        if hunk_idx == 0 {
            output.push_str(&format!("    {}\n", format!("--- a/{}", path).bold()));
            output.push_str(&format!("    {}\n", format!("+++ b/{}", path).bold()));
        } else {
            output.push('\n');
        }
        output.push_str(&format!("    {}\n", hunk.header().to_string().cyan()));

        for change in hunk.iter_changes() {
            let line: &str = change.value();
            match change.tag() {
                ChangeTag::Delete => output.push_str(&format!("    {}", format!("-{}", line).red())),
                ChangeTag::Insert => output.push_str(&format!("    {}", format!("+{}", line).green())),
                ChangeTag::Equal => output.push_str(&format!("    {}", format!(" {}", line).dimmed())),
            }
            if !line.ends_with('\n') {
                output.push('\n');
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_binary() {
        assert!(!is_binary(b"Hello, world!"));
        assert!(is_binary(b"Hello\x00world"));
    }

    #[test]
    fn test_unified_diff_shows_changed_lines() {
        let old = b"line 1\nline 2\nline 3\n";
        let new = b"line 1\nline 2 modified\nline 3\n";
        let diff = generate_unified_diff(old, new, "test.txt", 1);
        assert!(diff.contains("a/test.txt"));
        assert!(diff.contains("-line 2\n"));
        assert!(diff.contains("+line 2 modified"));
    }

    #[test]
    fn test_identical_content_has_no_hunks() {
        assert_eq!(generate_unified_diff(b"same\n", b"same\n", "f", 3), "");
    }

    #[test]
    fn test_render_diff_edge_cases() {
        assert!(render_diff(Some(&b"a\x00"[..]), Some(&b"b\x00"[..]), "bin", 3).contains("Binary file bin differs"));
        assert!(render_diff(None, None, "big", 3).contains("not available"));
        assert!(render_diff(None, Some(&b"new\n"[..]), "f", 3).contains("+new"));
    }
}
