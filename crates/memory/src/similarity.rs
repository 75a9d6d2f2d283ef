//! Pluggable rule deciding whether two records describe the same content.

use std::collections::HashSet;

use crate::schema::MemoryRecord;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have",
    "he", "her", "his", "i", "in", "is", "it", "its", "my", "of", "on", "or", "she", "so",
    "that", "the", "their", "they", "this", "to", "user", "was", "were", "with",
];

pub trait SimilarityPolicy: Send + Sync {
    /// Score in `[0, 1]`; higher means closer content.
    fn similarity(&self, a: &MemoryRecord, b: &MemoryRecord) -> f32;

    /// Whether `a` and `b` refer to the same underlying content.
    fn same_content(&self, a: &MemoryRecord, b: &MemoryRecord) -> bool;
}

/// Jaccard overlap of content tokens, or a shared evidence string within one domain.
#[derive(Debug, Clone, Copy)]
pub struct TokenOverlapPolicy {
    threshold: f32,
}

impl TokenOverlapPolicy {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl Default for TokenOverlapPolicy {
    fn default() -> Self {
        Self::new(0.6)
    }
}

impl SimilarityPolicy for TokenOverlapPolicy {
    fn similarity(&self, a: &MemoryRecord, b: &MemoryRecord) -> f32 {
        jaccard(&content_tokens(&a.content), &content_tokens(&b.content))
    }

    fn same_content(&self, a: &MemoryRecord, b: &MemoryRecord) -> bool {
        if a.fingerprint == b.fingerprint {
            return true;
        }
        // One quote often supports records in several domains.
        if a.domain == b.domain && shares_evidence(a, b) {
            return true;
        }
        let score = self.similarity(a, b);
        score > 0.0 && score >= self.threshold
    }
}

/// Lowercase alphanumeric tokens with stopwords removed.
pub fn content_tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

fn shares_evidence(a: &MemoryRecord, b: &MemoryRecord) -> bool {
    let left: HashSet<String> = a
        .evidence
        .iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    b.evidence
        .iter()
        .map(|e| e.trim().to_lowercase())
        .any(|e| left.contains(&e))
}
