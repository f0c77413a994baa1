/// What to write for an answer update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Printed<'a> {
    /// Nothing changed.
    Nothing,
    /// The answer extends what was shown; write only this suffix.
    Append(&'a str),
    /// The answer diverged from what was shown (citations were removed,
    /// the final text differs, ...); it has to be shown again in full.
    Replace(&'a str),
}

/// Tracks what has been written of a streamed answer, so that each
/// update only writes what is new.
#[derive(Clone, Debug, Default)]
pub struct AnswerPrinter {
    shown: String,
}

impl AnswerPrinter {
    /// Creates a printer with nothing shown yet.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns what has been shown so far.
    #[inline]
    pub fn shown(&self) -> &str {
        &self.shown
    }

    /// Records `text` as shown and returns what to write for it.
    pub fn update<'a>(&mut self, text: &'a str) -> Printed<'a> {
        if text == self.shown {
            return Printed::Nothing;
        }
        let printed = match text.strip_prefix(self.shown.as_str()) {
            Some(suffix) => Printed::Append(suffix),
            None => Printed::Replace(text),
        };
        self.shown.clear();
        self.shown.push_str(text);
        printed
    }
}
