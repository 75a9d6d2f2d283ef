//! Keyword heuristic for how strongly an emotional record is expressed.
//!
//! Returns a value in `[0.0, 1.0]`.  Used to summarise committed emotional
//! patterns into a baseline, not to classify emotions.

const STRONG_WORDS: &[&str] = &[
    "furious", "devastated", "terrified", "ecstatic", "overwhelmed", "panicking",
    "panic", "hate", "love", "thrilled", "desperate", "heartbroken", "exhausted",
    "livid", "miserable", "elated",
];

const MODERATE_WORDS: &[&str] = &[
    "anxious", "stressed", "worried", "frustrated", "angry", "sad", "excited",
    "happy", "upset", "nervous", "scared", "annoyed", "lonely", "proud", "afraid",
    "curious", "glad", "disappointed", "confused",
];

const INTENSIFIERS: &[&str] = &[
    "very", "really", "extremely", "so", "incredibly", "totally", "deeply", "super",
];

const DAMPENERS: &[&str] = &["slightly", "somewhat", "bit", "little", "mildly", "kinda"];

/// Infer emotional intensity for `content` using keyword heuristics.
///
/// Intensifiers directly before an emotion word amplify it; dampeners in the
/// same 2-word lookback window soften it.  Exclamation marks and all-caps
/// words add a capped bonus.
pub fn infer_intensity(content: &str) -> f32 {
    let lower = content.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut score: f32 = 0.0;
    for (i, word) in words.iter().enumerate() {
        let base = if STRONG_WORDS.contains(word) {
            0.45
        } else if MODERATE_WORDS.contains(word) {
            0.25
        } else {
            continue;
        };

        let window = &words[i.saturating_sub(2)..i];
        let factor = if window.iter().any(|w| INTENSIFIERS.contains(w)) {
            1.5
        } else if window.iter().any(|w| DAMPENERS.contains(w)) {
            0.5
        } else {
            1.0
        };
        score += base * factor;
    }

    let exclamations = content.chars().filter(|&c| c == '!').count() as f32;
    score += (exclamations * 0.05).min(0.15);

    let mut caps_bonus: f32 = 0.0;
    for word in content.split_whitespace() {
        let alpha_only: String = word.chars().filter(|c| c.is_alphabetic()).collect();
        if alpha_only.len() >= 4 && alpha_only == alpha_only.to_uppercase() {
            caps_bonus += 0.10;
        }
    }
    score += caps_bonus.min(0.20);

    score.clamp(0.0, 1.0)
}
