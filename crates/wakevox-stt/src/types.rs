//! Recognition events and the wake-word set.

/// Per-frame recognizer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Ongoing-utterance hypothesis; may change on the next frame.
    Partial(String),
    /// The model's endpointing closed the utterance.
    Final(String),
}

/// Ordered set of wake phrases.
///
/// Phrases are lowercased and deduplicated at construction — matching
/// never normalizes again. Immutable for the lifetime of one capture
/// session; rebuilt from configuration at every session start, so
/// configuration changes take effect on the next restart, not live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeWordSet {
    phrases: Vec<String>,
}

impl WakeWordSet {
    pub fn from_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for phrase in phrases {
            let normalized = phrase.as_ref().trim().to_lowercase();
            if !normalized.is_empty() && !out.contains(&normalized) {
                out.push(normalized);
            }
        }
        Self { phrases: out }
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Substring containment against every entry, in configured order;
    /// first match wins. Candidates arrive lowercase from the recognizer.
    pub fn matches(&self, candidate: &str) -> Option<&str> {
        self.phrases
            .iter()
            .find(|phrase| candidate.contains(phrase.as_str()))
            .map(String::as_str)
    }

    /// The restricted grammar handed to the recognizer: every wake phrase
    /// plus the unknown-word bucket so off-grammar speech is rejected
    /// instead of force-matched.
    pub fn grammar(&self) -> Vec<String> {
        let mut grammar = self.phrases.clone();
        grammar.push("[unk]".to_string());
        grammar
    }
}
