use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":cite\[[^\]]+\]").expect("citation pattern is valid")
});

/// Removes inline citation markers (`:cite[...]`) from `text`.
///
/// Everything else is left untouched; the input is borrowed back when it
/// holds no marker.
#[inline]
pub fn strip_citations(text: &str) -> Cow<'_, str> {
    CITATION.replace_all(text, "")
}
