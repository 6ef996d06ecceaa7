//! Hand identifier normalization
//!
//! Identifiers read off a screenshot often lose or mangle the categorical
//! prefix the text record carries (`RC`, `SG`, `#`, ...). Comparing the
//! prefix-free remainder lets those still match.

/// Known categorical prefixes, tried in order
const KNOWN_PREFIXES: &[&str] = &["HAND#", "#", "TM", "RC", "SG", "HD", "HH", "MT", "OM", "CO"];

/// Strip known categorical prefixes from a hand identifier
///
/// Prefixes are matched case-insensitively and stripped repeatedly, so the
/// result is a fixed point: `normalize(normalize(x)) == normalize(x)`.
/// A string made only of a prefix is left as is rather than emptied.
pub fn normalize(identifier: &str) -> &str {
    let mut current = identifier.trim();

    'strip: loop {
        for prefix in KNOWN_PREFIXES {
            if let Some(rest) = strip_prefix_ignore_case(current, prefix) {
                let rest = rest.trim_start();
                if rest.is_empty() {
                    break 'strip;
                }
                current = rest;
                continue 'strip;
            }
        }
        break;
    }

    current
}

/// Compare two identifiers after normalization, ignoring ASCII case
pub fn identifiers_match(a: &str, b: &str) -> bool {
    let (a, b) = (normalize(a), normalize(b));
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_single_prefix() {
        assert_eq!(normalize("RC100"), "100");
        assert_eq!(normalize("sg3344"), "3344");
        assert_eq!(normalize("#1234"), "1234");
    }

    #[test]
    fn test_unknown_prefix_unchanged() {
        assert_eq!(normalize("ZZ100"), "ZZ100");
        assert_eq!(normalize("100"), "100");
    }

    #[test]
    fn test_stacked_prefixes() {
        assert_eq!(normalize("#RC100"), "100");
        assert_eq!(normalize("Hand#RC 100"), "100");
    }

    #[test]
    fn test_prefix_only_is_not_emptied() {
        assert_eq!(normalize("RC"), "RC");
        assert_eq!(normalize("  #  "), "#");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "RC100", "#RC100", "rcsg77", "HD", "TM5512", " OM 9 ", "Hand#", "ZZ1", "CO#3", "",
            "RCRC", "ÅRC1",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_identifiers_match() {
        assert!(identifiers_match("RC100", "100"));
        assert!(identifiers_match("rc100", "RC100"));
        assert!(identifiers_match("#SG55", "sg55"));
        assert!(!identifiers_match("RC100", "RC101"));
        assert!(!identifiers_match("", ""));
    }
}
