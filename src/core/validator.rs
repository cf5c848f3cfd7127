//! Pre-spawn screening of scan targets.
//!
//! Arguments are always handed to the child process as a discrete vector, so
//! this is a second line of defence rather than the only one.

const MAX_TARGET_CHARS: usize = 500;

const FORBIDDEN_CHARS: &[char] = &[';', '&', '|', '`', '$', '(', ')', '{', '}', '<', '>', '\\'];

pub fn validate(target: &str) -> bool {
    if target.is_empty() || target.chars().count() > MAX_TARGET_CHARS {
        return false;
    }
    !target.contains(FORBIDDEN_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("example.com")]
    #[case("192.168.1.1")]
    #[case("10.0.0.0/24")]
    #[case("https://example.com/path?q=1")]
    #[case("[::1]:8443")]
    fn test_accepts_plain_targets(#[case] target: &str) {
        assert!(validate(target));
    }

    #[rstest]
    #[case("")]
    #[case("example.com; rm -rf /")]
    #[case("a && b")]
    #[case("a | b")]
    #[case("`id`")]
    #[case("$(id)")]
    #[case("${HOME}")]
    #[case("<script>")]
    #[case("c:\\windows")]
    fn test_rejects_dangerous_targets(#[case] target: &str) {
        assert!(!validate(target));
    }

    #[test]
    fn test_length_limit_counts_characters() {
        assert!(validate(&"a".repeat(500)));
        assert!(!validate(&"a".repeat(501)));
        // 500 multi-byte characters are still within the limit
        assert!(validate(&"é".repeat(500)));
    }

    proptest! {
        #[test]
        fn prop_any_forbidden_char_is_rejected(
            prefix in "[a-z0-9.]{0,40}",
            idx in 0usize..FORBIDDEN_CHARS.len(),
            suffix in "[a-z0-9.]{0,40}",
        ) {
            let target = format!("{}{}{}", prefix, FORBIDDEN_CHARS[idx], suffix);
            prop_assert!(!validate(&target));
        }

        #[test]
        fn prop_hostnames_are_accepted(host in "[a-z][a-z0-9-]{0,30}(\\.[a-z]{2,6}){1,3}") {
            prop_assert!(validate(&host));
        }
    }
}
