//! Keyword-based symptom counting for the severity trend.

/// Symptoms counted per utterance. Matching is a case-insensitive substring
/// test with no stemming or negation handling.
pub const SYMPTOM_KEYWORDS: [&str; 12] = [
    "fever",
    "cough",
    "pain",
    "headache",
    "fatigue",
    "vomiting",
    "nausea",
    "dizziness",
    "breath",
    "infection",
    "diarrhea",
    "cold",
];

/// Keywords found in `text`, in keyword order.
pub fn extract_symptoms(text: &str) -> Vec<&'static str> {
    let text = text.to_lowercase();
    SYMPTOM_KEYWORDS
        .iter()
        .copied()
        .filter(|keyword| text.contains(keyword))
        .collect()
}

/// Number of distinct keywords found in `text`.
pub fn severity(text: &str) -> u32 {
    extract_symptoms(text).len() as u32
}
