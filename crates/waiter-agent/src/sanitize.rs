//! Outbound text filter.

use std::borrow::Cow;

/// Markup characters the model sometimes emits that a text-to-speech engine
/// would read aloud or mispronounce.
const MARKUP: [char; 3] = ['*', '_', '`'];

/// Strips markdown emphasis and code markers from a fragment of speech.
///
/// Works per character, so markers split across streamed fragments are
/// removed as well.
pub fn sanitize(text: &str) -> Cow<'_, str> {
    if text.contains(MARKUP) {
        Cow::Owned(text.chars().filter(|c| !MARKUP.contains(c)).collect())
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_emphasis() {
        assert_eq!(sanitize("Our **Pad Thai** is _great_"), "Our Pad Thai is great");
        assert_eq!(sanitize("try `curry`"), "try curry");
    }

    #[test]
    fn split_markers_are_removed() {
        let joined: String = ["**Pad", " Thai*", "*!"].iter().map(|f| sanitize(f)).collect();
        assert_eq!(joined, "Pad Thai!");
    }

    #[test]
    fn plain_text_is_borrowed() {
        assert!(matches!(sanitize("Two curries, coming up."), Cow::Borrowed(_)));
    }
}
