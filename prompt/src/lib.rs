//! # Prompt
//!
//! Pure functions that turn structured health data into a bounded system
//! prompt, plus the defensive input filter and the emergency classifier that
//! runs before any backend is contacted.
//!
//! ## Modules
//!
//! - [`context`] – `build_system_prompt`: health context injection
//! - [`safety`] – `sanitize_user_input`, `detect_emergency`, `emergency_response`
//!
//! ## External interactions
//!
//! - **AI models**: `build_system_prompt` output is sent to LLM APIs as the
//!   system message.

pub mod context;
pub mod safety;

pub use context::{build_system_prompt, BASE_PROMPT, RESPONSE_GUIDELINES, SAFETY_BOUNDARIES};
pub use safety::{
    detect_emergency, emergency_response, sanitize_user_input, EmergencyCheck, EmergencyKind,
    MAX_INPUT_CHARS,
};
