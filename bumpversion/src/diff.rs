//! Unified diff rendering for the bump commands' log line.

use similar::TextDiff;

pub fn render_unified(before: &str, after: &str) -> String {
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header("Before", "After")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_single_line_change() {
        let diff = render_unified("tag: v1.0.0\n", "tag: v1.1.0\n");
        assert!(diff.contains("-tag: v1.0.0"));
        assert!(diff.contains("+tag: v1.1.0"));
    }

    #[test]
    fn identical_content_produces_no_hunks() {
        let diff = render_unified("same\n", "same\n");
        assert!(!diff.contains('@'));
    }
}
