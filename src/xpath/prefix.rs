//! Scanning XPath expressions for namespace prefixes.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

// A word followed by a single colon and a name character. Axes (`child::`)
// have a double colon and never match.
static PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+):[^\W:]").unwrap());

/// Prefixes with fixed meanings in XPath itself; never looked up in the
/// document.
const BUILTIN_PREFIXES: &[&str] = &["xml", "xmlns", "xs", "fn", "math", "map", "array"];

/// The distinct namespace prefixes an expression references, excluding the
/// built-in ones.
pub(crate) fn referenced_prefixes(xpath: &str) -> BTreeSet<String> {
    PREFIX_RE
        .captures_iter(xpath)
        .map(|captures| captures[1].to_string())
        .filter(|prefix| !BUILTIN_PREFIXES.contains(&prefix.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes(xpath: &str) -> Vec<String> {
        referenced_prefixes(xpath).into_iter().collect()
    }

    #[test]
    fn test_simple_prefix() {
        assert_eq!(prefixes("//ns:item"), vec!["ns"]);
    }

    #[test]
    fn test_no_prefixes() {
        assert!(prefixes("//item/child").is_empty());
    }

    #[test]
    fn test_multiple_distinct() {
        assert_eq!(prefixes("//a:x/b:y[a:z]"), vec!["a", "b"]);
    }

    #[test]
    fn test_axes_not_captured() {
        assert!(prefixes("child::item/descendant::other").is_empty());
    }

    #[test]
    fn test_builtins_skipped() {
        assert!(prefixes("xs:integer(@n) + fn:count(//x)").is_empty());
        assert_eq!(prefixes("//ns:a[xs:int(@v) > 1]"), vec!["ns"]);
    }

    #[test]
    fn test_prefix_in_attribute_test() {
        assert_eq!(prefixes("//*[@ns:id]"), vec!["ns"]);
    }
}
