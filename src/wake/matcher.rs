//! Wake phrase matching over finalized transcripts

/// Primary phrase plus the mis-hearings recognizers commonly produce for it
pub const DEFAULT_WAKE_PHRASES: &[&str] = &["santa", "sanya", "center", "centre"];

/// Case- and whitespace-insensitive substring matcher
#[derive(Debug, Clone)]
pub struct WakePhraseMatcher {
    /// Lowercased phrases with all whitespace removed
    phrases: Vec<String>,
}

impl WakePhraseMatcher {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| compact(&p.as_ref().to_lowercase()))
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    /// True if the transcript contains any wake phrase
    pub fn matches(&self, transcript: &str) -> bool {
        let compacted = compact(&transcript.to_lowercase());
        self.phrases.iter().any(|phrase| compacted.contains(phrase.as_str()))
    }
}

impl Default for WakePhraseMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_WAKE_PHRASES)
    }
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
