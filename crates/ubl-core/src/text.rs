/// Replace every ASCII-case-insensitive occurrence of `needle` in `haystack`.
///
/// Matching folds ASCII case only, so byte offsets in the folded copy line up
/// with the original.
pub fn replace_ignore_ascii_case(haystack: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }

    let folded_haystack = haystack.to_ascii_lowercase();
    let folded_needle = needle.to_ascii_lowercase();

    let mut out = String::with_capacity(haystack.len());
    let mut cursor = 0;
    while let Some(found) = folded_haystack[cursor..].find(&folded_needle) {
        let start = cursor + found;
        out.push_str(&haystack[cursor..start]);
        out.push_str(replacement);
        cursor = start + needle.len();
    }
    out.push_str(&haystack[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_all_case_variants() {
        assert_eq!(
            replace_ignore_ascii_case("{{IGN}} and {{ign}} and {{Ign}}", "{{ign}}", "Notch"),
            "Notch and Notch and Notch"
        );
    }

    #[test]
    fn leaves_unmatched_text_alone() {
        assert_eq!(replace_ignore_ascii_case("Banned: pending", "{{reason}}", "x"), "Banned: pending");
    }

    #[test]
    fn non_ascii_text_around_matches() {
        assert_eq!(replace_ignore_ascii_case("§c{{REASON}} ✓", "{{reason}}", "Xray"), "§cXray ✓");
    }

    #[test]
    fn empty_needle_is_noop() {
        assert_eq!(replace_ignore_ascii_case("abc", "", "x"), "abc");
    }
}
