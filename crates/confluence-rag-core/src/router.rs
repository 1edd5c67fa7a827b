//! Keyword router for incoming questions.

/// Which handler a question should go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Architecture decision, ADR or meeting-minutes question.
    DecisionRag,
    Unknown,
}

const DECISION_CUES: &[&str] = &[
    "what did we decide",
    "decision",
    "adr",
    "minutes",
    "why did we choose",
];

/// Classify `question` by case-insensitive substring match.
pub fn route(question: &str) -> Route {
    let q = question.to_lowercase();
    if DECISION_CUES.iter().any(|cue| q.contains(cue)) {
        Route::DecisionRag
    } else {
        Route::Unknown
    }
}
