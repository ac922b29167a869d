//! # assistant-core
//!
//! Core types and traits for the health assistant engine: conversation and
//! message models, safety flags, stream chunks, the assembled LLM context,
//! the provider error taxonomy, and tracing initialization.
//! Transport-agnostic; used by prompt, llm-providers, fallback-chain,
//! storage and chat-session.

pub mod context;
pub mod error;
pub mod health;
pub mod logger;
pub mod types;

pub use context::{ContextSnapshot, LlmContext, PlanFlags};
pub use error::{HealthReport, ProviderError};
pub use health::{
    Allergy, AllergySeverity, AllergyType, BaselineMetrics, BiometricSample, FitnessLevel,
    GoalPriority, HealthCondition, HealthGoal, HealthPreferences, HealthProfile, MobilityLevel,
    Medication, Severity,
};
pub use logger::init_tracing;
pub use types::{
    ChatMessage, ChunkStream, Conversation, FinishReason, Message, MessageRole, ProviderKind,
    SafetyAction, SafetyFlag, SafetyFlagKind, StreamChunk,
};
