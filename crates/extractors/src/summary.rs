//! Per-domain session summaries, insights and persona suggestions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use concord_memory::schema::truncate_str;

use crate::schema::{
    ConversationAnalysisOutput, DomainOutput, EmotionExtractionOutput, FactExtractionOutput,
    PreferenceExtractionOutput,
};

pub const DEFAULT_PERSONALITY: &str = "balanced";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSummary {
    pub session_summary: String,
    pub key_insights: Vec<String>,
    pub suggested_personality: String,
}

impl DomainOutput {
    pub fn summary(&self) -> DomainSummary {
        match self {
            Self::Factual(out) => factual_summary(out),
            Self::Emotional(out) => emotional_summary(out),
            Self::Preference(out) => preference_summary(out),
            Self::Analysis(out) => analysis_summary(out),
        }
    }
}

fn factual_summary(out: &FactExtractionOutput) -> DomainSummary {
    let session_summary = if out.extraction_notes.trim().is_empty() {
        "No factual information extracted".to_string()
    } else {
        format!("Factual information extracted: {}", out.extraction_notes.trim())
    };

    let mut insights = Vec::new();
    for fact in &out.facts {
        if fact.confidence > 0.7 {
            insights.push(format!(
                "High-confidence {}: {}...",
                fact.category,
                truncate_str(&fact.content, 50)
            ));
        } else if fact.confidence > 0.5 {
            insights.push(format!("Verified {} information found", fact.category));
        }
    }
    if insights.is_empty() {
        insights.push("No significant factual information detected".to_string());
    }

    let categories: Vec<String> = out.facts.iter().map(|f| f.category.to_lowercase()).collect();
    let professional = categories
        .iter()
        .filter(|c| matches!(c.as_str(), "professional" | "work" | "career" | "skills"))
        .count();
    let personal = categories
        .iter()
        .filter(|c| {
            matches!(
                c.as_str(),
                "personal_info" | "relationships" | "hobbies" | "goals"
            )
        })
        .count();
    let has = |name: &str| categories.iter().any(|c| c == name);

    let personality = if categories.is_empty() {
        DEFAULT_PERSONALITY
    } else if professional > personal {
        "professional"
    } else if has("goals") || has("achievements") {
        "supportive"
    } else if has("relationships") {
        "empathetic"
    } else if has("knowledge") {
        "analytical"
    } else {
        DEFAULT_PERSONALITY
    };

    DomainSummary {
        session_summary,
        key_insights: insights,
        suggested_personality: personality.to_string(),
    }
}

fn emotional_summary(out: &EmotionExtractionOutput) -> DomainSummary {
    let session_summary = if out.overall_mood.trim().is_empty() {
        "No emotional mood detected".to_string()
    } else {
        format!("Overall emotional state: {}", out.overall_mood.trim())
    };

    let mut insights = Vec::new();
    for pattern in &out.emotional_patterns {
        if pattern.intensity > 0.5 {
            insights.push(format!(
                "High {} detected (intensity: {:.2})",
                pattern.emotion, pattern.intensity
            ));
        }
        if !pattern.triggers.is_empty() {
            insights.push(format!(
                "{} triggered by: {}",
                capitalize(&pattern.emotion),
                pattern.triggers.join(", ")
            ));
        }
    }
    if insights.is_empty() {
        insights.push("No significant emotional patterns detected".to_string());
    }

    let emotions: Vec<String> = out
        .emotional_patterns
        .iter()
        .map(|p| p.emotion.to_lowercase())
        .collect();
    let any = |set: &[&str]| emotions.iter().any(|e| set.contains(&e.as_str()));

    let personality = if any(&["anxiety", "stress", "overwhelmed"]) {
        "calm_mentor"
    } else if any(&["sadness", "disappointment", "grief"]) {
        "empathetic"
    } else if any(&["anger", "frustration"]) {
        "therapist_style"
    } else if any(&["joy", "excitement", "happiness"]) {
        "witty_friend"
    } else if any(&["curiosity", "interest"]) {
        "analytical"
    } else {
        DEFAULT_PERSONALITY
    };

    DomainSummary {
        session_summary,
        key_insights: insights,
        suggested_personality: personality.to_string(),
    }
}

fn preference_summary(out: &PreferenceExtractionOutput) -> DomainSummary {
    let session_summary = if out.extraction_notes.trim().is_empty() {
        "No specific preferences detected".to_string()
    } else {
        format!("User preferences identified: {}", out.extraction_notes.trim())
    };

    let mut insights = Vec::new();
    let mut strong = Vec::new();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for pref in &out.preferences {
        *counts.entry(pref.category.as_str()).or_insert(0) += 1;
        if pref.intensity > 0.7 {
            strong.push(format!(
                "Strong {} preference: {}",
                pref.category, pref.preference_value
            ));
        } else if pref.intensity > 0.5 {
            insights.push(format!(
                "Moderate {} preference for {}",
                pref.category, pref.preference_value
            ));
        }
    }
    // Highest count wins; ties go to the alphabetically first category.
    let top = counts
        .iter()
        .fold(None::<(&str, usize)>, |best, (cat, n)| match best {
            Some((_, m)) if m >= *n => best,
            _ => Some((*cat, *n)),
        });
    if let Some((category, n)) = top {
        insights.push(format!("Primary focus on {category} preferences ({n} items)"));
    }
    insights.extend(strong.into_iter().take(3));
    if insights.is_empty() {
        insights.push("No significant preferences detected".to_string());
    }

    let categories: Vec<String> = out
        .preferences
        .iter()
        .map(|p| p.category.to_lowercase())
        .collect();
    let communication = out
        .preferences
        .iter()
        .filter(|p| p.category.eq_ignore_ascii_case("communication"))
        .map(|p| p.preference_value.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let mentions = |words: &[&str]| words.iter().any(|w| communication.contains(w));
    let has = |name: &str| categories.iter().any(|c| c == name);

    let personality = if has("communication") && mentions(&["casual", "friendly", "informal"]) {
        "witty_friend"
    } else if has("communication") && mentions(&["professional", "formal", "business"]) {
        "professional"
    } else if has("communication") && mentions(&["supportive", "caring", "understanding"]) {
        "empathetic"
    } else if has("learning") || has("technology") {
        "analytical"
    } else if has("entertainment") || has("hobbies") {
        "witty_friend"
    } else if has("work") {
        "professional"
    } else {
        DEFAULT_PERSONALITY
    };

    DomainSummary {
        session_summary,
        key_insights: insights,
        suggested_personality: personality.to_string(),
    }
}

fn analysis_summary(out: &ConversationAnalysisOutput) -> DomainSummary {
    let session_summary = if out.session_summary.trim().is_empty() {
        "No summary available".to_string()
    } else {
        out.session_summary.trim().to_string()
    };

    let suggested = out.suggested_personality.trim();
    let personality = if !suggested.is_empty() && suggested != DEFAULT_PERSONALITY {
        suggested.to_string()
    } else {
        let patterns = out.behavioral_patterns.join(" ").to_lowercase();
        if patterns.contains("analytical") {
            "analytical".to_string()
        } else if patterns.contains("emotional") {
            "empathetic".to_string()
        } else if patterns.contains("casual") {
            "witty_friend".to_string()
        } else {
            DEFAULT_PERSONALITY.to_string()
        }
    };

    DomainSummary {
        session_summary,
        key_insights: out.key_insights.clone(),
        suggested_personality: personality,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
