//! Health domain types consumed by the context assembler: profile, conditions,
//! medications, allergies, goals, preferences, and daily biometric aggregates.
//!
//! These are read-only projections supplied by external collaborators (the
//! persistence API and the biometric data source); the engine never mutates
//! them and rebuilds the projection fresh for every turn.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCondition {
    pub name: String,
    pub category: String,
    pub severity: Severity,
    pub notes: Option<String>,
    pub is_managed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllergyType {
    Food,
    Drug,
    Environmental,
    Other,
}

impl AllergyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllergyType::Food => "food",
            AllergyType::Drug => "drug",
            AllergyType::Environmental => "environmental",
            AllergyType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllergySeverity {
    Mild,
    Moderate,
    Severe,
    Anaphylactic,
}

impl AllergySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllergySeverity::Mild => "mild",
            AllergySeverity::Moderate => "moderate",
            AllergySeverity::Severe => "severe",
            AllergySeverity::Anaphylactic => "anaphylactic",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allergy {
    pub allergen: String,
    pub allergy_type: AllergyType,
    pub severity: AllergySeverity,
    pub reactions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalPriority {
    Low,
    Medium,
    High,
}

impl GoalPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalPriority::Low => "low",
            GoalPriority::Medium => "medium",
            GoalPriority::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthGoal {
    pub title: String,
    pub description: Option<String>,
    pub priority: GoalPriority,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl FitnessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitnessLevel::Sedentary => "sedentary",
            FitnessLevel::Light => "light",
            FitnessLevel::Moderate => "moderate",
            FitnessLevel::Active => "active",
            FitnessLevel::VeryActive => "very active",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobilityLevel {
    Full,
    LimitedUpper,
    LimitedLower,
    Wheelchair,
    Bedridden,
}

impl MobilityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MobilityLevel::Full => "full",
            MobilityLevel::LimitedUpper => "limited upper body",
            MobilityLevel::LimitedLower => "limited lower body",
            MobilityLevel::Wheelchair => "wheelchair",
            MobilityLevel::Bedridden => "bedridden",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthPreferences {
    pub dietary_restrictions: Vec<String>,
    pub fitness_level: FitnessLevel,
    pub mobility_level: MobilityLevel,
    pub avoided_foods: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineMetrics {
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
}

/// The user's structured health profile, as supplied by the persistence
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthProfile {
    pub conditions: Vec<HealthCondition>,
    pub medications: Vec<Medication>,
    pub allergies: Vec<Allergy>,
    pub goals: Vec<HealthGoal>,
    pub preferences: Option<HealthPreferences>,
    pub baseline_metrics: Option<BaselineMetrics>,
}

impl HealthProfile {
    /// A profile with no data; every context section derived from it is omitted.
    pub fn empty() -> Self {
        Self {
            conditions: Vec::new(),
            medications: Vec::new(),
            allergies: Vec::new(),
            goals: Vec::new(),
            preferences: None,
            baseline_metrics: None,
        }
    }
}

/// One day of biometric aggregates from the external biometric collaborator.
/// Heart-rate fields are optional because wearables do not report them every day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiometricSample {
    pub date: NaiveDate,
    pub steps: u64,
    pub sleep_hours: f64,
    pub resting_heart_rate: Option<f64>,
    pub hrv: Option<f64>,
    pub exercise_minutes: u64,
}
