use concord_memory::AgentDomain;

const FACT_CATEGORIES: &[&str] = &[
    "personal_info",
    "professional",
    "goals",
    "experiences",
    "relationships",
    "knowledge",
];

const EMOTIONS: &[&str] = &[
    "joy",
    "excitement",
    "anxiety",
    "stress",
    "sadness",
    "frustration",
    "anger",
    "curiosity",
    "skepticism",
    "confusion",
];

const PREFERENCE_CATEGORIES: &[&str] = &[
    "communication",
    "pace_preference",
    "feedback_tolerance",
    "learning",
    "technology",
    "entertainment",
    "hobbies",
    "work",
];

/// Build the extraction prompt for one domain.
///
/// Each prompt carries role framing, the allowed categories, the
/// conversation, and the exact JSON shape expected back.
pub fn extraction_prompt(domain: AgentDomain, conversation: &str) -> String {
    let (framing, format) = match domain {
        AgentDomain::Factual => (
            format!(
                "You are the factual memory extractor.\n\
Extract concrete, verifiable facts the user states about themselves: background, work, \
goals, experiences, relationships and knowledge. Do not infer feelings or preferences.\n\
Categories: {}.\n\
Score confidence from evidence strength; quote the user's own words as evidence.",
                FACT_CATEGORIES.join(", ")
            ),
            r#"{"facts":[{"content":"...","category":"...","confidence":0.0,"evidence":["..."]}],"extraction_notes":"..."}"#,
        ),
        AgentDomain::Emotional => (
            format!(
                "You are the emotional pattern extractor.\n\
Identify the emotions the user expresses, how intense they are, and what triggers them. \
Do not record facts or preferences.\n\
Emotions: {}.\n\
Intensity and confidence are between 0 and 1; quote the user's words as evidence.",
                EMOTIONS.join(", ")
            ),
            r#"{"emotional_patterns":[{"emotion":"...","intensity":0.0,"triggers":["..."],"confidence":0.0,"evidence":["..."]}],"overall_mood":"..."}"#,
        ),
        AgentDomain::Preference => (
            format!(
                "You are the preference extractor.\n\
Capture how the user likes to communicate, learn and work, and what content they enjoy. \
Do not record facts or emotions.\n\
Categories: {}.\n\
Intensity says how strongly the preference is held; quote the user's words as evidence.",
                PREFERENCE_CATEGORIES.join(", ")
            ),
            r#"{"preferences":[{"category":"...","preference_value":"...","intensity":0.0,"confidence":0.0,"evidence":["..."]}],"extraction_notes":"..."}"#,
        ),
        AgentDomain::Analysis => (
            "You are the conversation analyst.\n\
Summarise the session, list the key insights, name recurring behavioral patterns, \
and suggest the assistant persona that would suit this user best \
(balanced, professional, supportive, empathetic, analytical, calm_mentor, witty_friend, therapist_style)."
                .to_string(),
            r#"{"session_summary":"...","key_insights":["..."],"suggested_personality":"balanced","behavioral_patterns":["..."]}"#,
        ),
    };

    format!(
        "{framing}\n\n=== CONVERSATION ===\n{conversation}\n\n\
Respond with a single JSON object and nothing else, shaped exactly like:\n{format}"
    )
}
