//! Closing-intent detection on caller utterances.

/// Phrases that end the conversation wherever they appear.
const FAREWELL_PHRASES: &[&str] = &[
    "that's all",
    "that is all",
    "that's it",
    "no more questions",
    "nothing else",
    "goodbye",
    "good bye",
    "bye bye",
];

/// Short refusals that only count when the assistant just asked whether the
/// caller needs anything more.
const BARE_REFUSALS: &[&str] = &["no", "nope", "no thanks", "no thank you", "not really"];

const FOLLOW_UP_CUES: &[&str] = &["anything else", "something else", "more questions"];

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace('’', "'")
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    format!(" {} ", haystack).contains(&format!(" {} ", phrase))
}

/// Returns `true` if the caller is closing the conversation.
///
/// `last_spoken` is everything the caller heard before answering, used to
/// interpret a bare "no".
pub fn is_farewell(utterance: &str, last_spoken: Option<&str>) -> bool {
    let said = normalize(utterance);
    if said.is_empty() {
        return false;
    }

    if FAREWELL_PHRASES
        .iter()
        .any(|phrase| contains_phrase(&said, phrase))
    {
        return true;
    }

    let asked_follow_up = last_spoken
        .map(normalize)
        .is_some_and(|reply| FOLLOW_UP_CUES.iter().any(|cue| reply.contains(cue)));

    asked_follow_up && BARE_REFUSALS.contains(&said.as_str())
}
