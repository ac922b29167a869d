//! The assembled per-turn context handed to providers, plus the lightweight
//! audit snapshot attached to committed user messages.

use serde::{Deserialize, Serialize};

use crate::health::{BiometricSample, HealthProfile};
use crate::types::ChatMessage;

/// Whether the user has active plans of each kind. Drives the plan-status
/// section of the assembled context.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PlanFlags {
    pub has_diet_plan: bool,
    pub has_exercise_plan: bool,
    pub has_supplement_plan: bool,
}

/// Everything a provider needs besides the user's message: the health
/// projection, the biometric window, plan flags, and bounded conversation
/// history. Rebuilt fresh for every turn; never cached across turns.
#[derive(Debug, Clone)]
pub struct LlmContext {
    pub health_profile: Option<HealthProfile>,
    /// Rolling window of daily aggregates, oldest first. Typically 7 entries.
    pub recent_biometrics: Vec<BiometricSample>,
    /// Plan presence, when known. `None` omits the plan-status section from
    /// the assembled prompt entirely.
    pub plans: Option<PlanFlags>,
    /// Prior conversation turns, oldest first. Providers include at most
    /// `max_history_messages` of these.
    pub conversation_history: Vec<ChatMessage>,
    pub max_history_messages: usize,
}

impl LlmContext {
    /// A context with no health data and no history. Produces the minimal
    /// system prompt: base instructions plus safety and style sections only.
    pub fn empty() -> Self {
        Self {
            health_profile: None,
            recent_biometrics: Vec::new(),
            plans: None,
            conversation_history: Vec::new(),
            max_history_messages: 10,
        }
    }

    /// The history slice providers actually send: the last
    /// `max_history_messages` entries, oldest first.
    pub fn bounded_history(&self) -> &[ChatMessage] {
        let len = self.conversation_history.len();
        let start = len.saturating_sub(self.max_history_messages);
        &self.conversation_history[start..]
    }
}

/// Denormalized health facts active at send time, stored with the user
/// message for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub recent_steps: Option<u64>,
    pub recent_sleep: Option<f64>,
    pub active_conditions: Vec<String>,
}
