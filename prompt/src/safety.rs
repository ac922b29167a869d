//! Input sanitizer and emergency classifier.
//!
//! The sanitizer is a best-effort defensive filter against prompt-override
//! markers, not a security boundary; false negatives are accepted. It also
//! strips the literal `system:` marker case-insensitively, which can mangle
//! legitimate user text. Known over-broad behavior, kept deliberately.
//!
//! The emergency classifier runs before any backend is contacted. When it
//! triggers, the session manager must answer with the canned crisis text and
//! never invoke a provider for that turn.

use regex::Regex;

/// Hard cap applied to user input after marker stripping.
pub const MAX_INPUT_CHARS: usize = 4000;

const MEDICAL_EMERGENCY_KEYWORDS: &[&str] = &[
    "heart attack",
    "can't breathe",
    "difficulty breathing",
    "chest pain",
    "stroke",
    "severe bleeding",
    "unconscious",
    "seizure",
    "overdose",
    "anaphylaxis",
    "choking",
];

const MENTAL_HEALTH_KEYWORDS: &[&str] = &[
    "suicide",
    "kill myself",
    "end my life",
    "want to die",
    "self harm",
    "hurt myself",
    "cutting myself",
];

/// Which emergency family matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyKind {
    Medical,
    MentalHealth,
    Unknown,
}

/// Classification verdict for one user input.
#[derive(Debug, Clone)]
pub struct EmergencyCheck {
    pub is_emergency: bool,
    pub kind: Option<EmergencyKind>,
    pub matched_keywords: Vec<String>,
}

impl EmergencyCheck {
    fn clear() -> Self {
        Self {
            is_emergency: false,
            kind: None,
            matched_keywords: Vec::new(),
        }
    }
}

/// Strips known prompt-override markers, truncates to [`MAX_INPUT_CHARS`]
/// with an ellipsis, and trims whitespace. Idempotent for inputs that fit
/// within the cap after one pass.
pub fn sanitize_user_input(input: &str) -> String {
    let mut sanitized = input.to_string();

    for pattern in [r"(?i)system:", r"(?i)\[system\]", r"(?i)###[^\n]*instruction"] {
        if let Ok(re) = Regex::new(pattern) {
            sanitized = re.replace_all(&sanitized, "").into_owned();
        }
    }

    if sanitized.chars().count() > MAX_INPUT_CHARS {
        sanitized = sanitized.chars().take(MAX_INPUT_CHARS).collect::<String>() + "...";
    }

    sanitized.trim().to_string()
}

/// Case-insensitive substring scan against the two fixed keyword families.
/// Mental-health keywords are checked first and win when both families match,
/// because that classification routes to the more specific crisis resource.
pub fn detect_emergency(input: &str) -> EmergencyCheck {
    let lowercase = input.to_lowercase();

    let mental: Vec<String> = MENTAL_HEALTH_KEYWORDS
        .iter()
        .filter(|k| lowercase.contains(*k))
        .map(|k| (*k).to_string())
        .collect();
    if !mental.is_empty() {
        return EmergencyCheck {
            is_emergency: true,
            kind: Some(EmergencyKind::MentalHealth),
            matched_keywords: mental,
        };
    }

    let medical: Vec<String> = MEDICAL_EMERGENCY_KEYWORDS
        .iter()
        .filter(|k| lowercase.contains(*k))
        .map(|k| (*k).to_string())
        .collect();
    if !medical.is_empty() {
        return EmergencyCheck {
            is_emergency: true,
            kind: Some(EmergencyKind::Medical),
            matched_keywords: medical,
        };
    }

    EmergencyCheck::clear()
}

/// The fixed, backend-agnostic crisis-resource text used as the entire
/// assistant turn when an emergency is detected.
pub fn emergency_response(kind: EmergencyKind) -> &'static str {
    match kind {
        EmergencyKind::MentalHealth => {
            "⚠️ **I'm concerned about what you've shared.**\n\n\
             If you're having thoughts of suicide or self-harm, please reach out for help:\n\n\
             📞 **National Suicide Prevention Lifeline**: 988 (US)\n\
             📞 **Crisis Text Line**: Text HOME to 741741\n\
             📞 **International Association for Suicide Prevention**: https://www.iasp.info/resources/Crisis_Centres/\n\n\
             You don't have to face this alone. These services are free, confidential, and available 24/7.\n\n\
             I'm an AI and cannot provide crisis support, but trained counselors are ready to help you right now."
        }
        EmergencyKind::Medical => {
            "⚠️ **This sounds like a medical emergency.**\n\n\
             **Please call emergency services immediately:**\n\
             📞 **US**: 911\n\
             📞 **UK**: 999\n\
             📞 **EU**: 112\n\n\
             If someone is with you, ask them to help while you wait for emergency services.\n\n\
             I'm an AI assistant and cannot provide emergency medical care. Please seek immediate professional help."
        }
        EmergencyKind::Unknown => {
            "⚠️ If this is an emergency, please call your local emergency services immediately.\n\n\
             I'm an AI assistant and cannot provide emergency assistance."
        }
    }
}
