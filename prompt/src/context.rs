//! Context assembler: converts a health profile, a rolling biometric window,
//! and plan flags into the system prompt.
//!
//! Section order is deliberate: identity and clinical facts come before
//! behavioral data, which comes before meta-status, so the higher-stakes
//! facts are not the ones lost if a backend truncates a long context.
//! Sections with no underlying data are omitted entirely.

use std::fmt::Write as _;

use assistant_core::{BiometricSample, HealthProfile, LlmContext, PlanFlags};

/// Base behavioral instructions. Prepended unconditionally.
pub const BASE_PROMPT: &str = "You are a knowledgeable health and wellness assistant within the Health Optimizer app. Your role is to provide personalized guidance on diet, exercise, supplementation, and lifestyle based on the user's health profile.";

/// Fixed safety-boundary text. Appended unconditionally, after all data sections.
pub const SAFETY_BOUNDARIES: &str = "## Important Boundaries
- You are NOT a medical professional. Always recommend consulting healthcare providers for medical decisions.
- Do not diagnose conditions or prescribe medications.
- If the user mentions emergency symptoms (chest pain, difficulty breathing, severe bleeding, suicidal thoughts), immediately recommend they seek emergency medical care.
- Be cautious with supplement recommendations that may interact with the user's medications.
- Provide evidence-based information when possible.";

/// Fixed response-style guidance. Always the final section.
pub const RESPONSE_GUIDELINES: &str = "## Response Guidelines
- Be conversational but professional.
- Personalize responses based on the user's profile.
- When recommending exercises, consider the user's mobility level and conditions.
- When discussing diet, respect dietary restrictions and allergies.
- Provide actionable, specific advice rather than generic suggestions.
- Use metric units by default, but can convert if asked.
- Keep responses concise but thorough.";

/// Builds the full system prompt for one turn.
///
/// Order: base instructions, profile section (if any profile data), biometric
/// window section (if at least one sample), plan status (if plan flags are
/// known), safety boundaries, response guidelines. Deterministic for a given context; no headings are
/// emitted for empty sections.
pub fn build_system_prompt(ctx: &LlmContext) -> String {
    let mut prompt = String::from(BASE_PROMPT);

    if let Some(profile) = &ctx.health_profile {
        if let Some(section) = profile_section(profile) {
            prompt.push_str("\n\n");
            prompt.push_str(&section);
        }
    }

    if !ctx.recent_biometrics.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(&biometrics_section(&ctx.recent_biometrics));
    }

    if let Some(plans) = &ctx.plans {
        prompt.push_str("\n\n");
        prompt.push_str(&plans_section(plans));
    }

    prompt.push_str("\n\n");
    prompt.push_str(SAFETY_BOUNDARIES);

    prompt.push_str("\n\n");
    prompt.push_str(RESPONSE_GUIDELINES);

    prompt
}

/// Renders the profile section, or `None` when the profile carries no data at
/// all so the heading is omitted too.
fn profile_section(profile: &HealthProfile) -> Option<String> {
    let mut body = String::new();

    if let Some(metrics) = &profile.baseline_metrics {
        let mut lines = String::new();
        if let Some(age) = metrics.age {
            let _ = writeln!(lines, "- Age: {age} years");
        }
        if let Some(sex) = &metrics.sex {
            let _ = writeln!(lines, "- Sex: {sex}");
        }
        if let Some(height) = metrics.height_cm {
            let _ = writeln!(lines, "- Height: {height} cm");
        }
        if let Some(weight) = metrics.weight_kg {
            let _ = writeln!(lines, "- Weight: {weight} kg");
        }
        if !lines.is_empty() {
            body.push_str("### Basic Information:\n");
            body.push_str(&lines);
        }
    }

    if !profile.conditions.is_empty() {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str("### Health Conditions:\n");
        for condition in &profile.conditions {
            let _ = write!(
                body,
                "- {} ({} severity)",
                condition.name,
                condition.severity.as_str()
            );
            if let Some(notes) = &condition.notes {
                let _ = write!(body, ": {notes}");
            }
            if condition.is_managed {
                body.push_str(" [managed]");
            }
            body.push('\n');
        }
    }

    if !profile.medications.is_empty() {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str("### Current Medications:\n");
        for med in &profile.medications {
            let _ = write!(body, "- {} {} - {}", med.name, med.dosage, med.frequency);
            if let Some(purpose) = &med.purpose {
                let _ = write!(body, " (for {purpose})");
            }
            body.push('\n');
        }
    }

    if !profile.allergies.is_empty() {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str("### Allergies:\n");
        for allergy in &profile.allergies {
            let _ = write!(
                body,
                "- {} ({}, {})",
                allergy.allergen,
                allergy.allergy_type.as_str(),
                allergy.severity.as_str()
            );
            if !allergy.reactions.is_empty() {
                let _ = write!(body, " - reactions: {}", allergy.reactions.join(", "));
            }
            body.push('\n');
        }
    }

    let active_goals: Vec<_> = profile.goals.iter().filter(|g| g.is_active).collect();
    if !active_goals.is_empty() {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str("### Health Goals:\n");
        for goal in active_goals {
            let _ = write!(body, "- {} ({} priority)", goal.title, goal.priority.as_str());
            if let Some(description) = &goal.description {
                let _ = write!(body, ": {description}");
            }
            body.push('\n');
        }
    }

    if let Some(prefs) = &profile.preferences {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str("### Preferences:\n");
        if !prefs.dietary_restrictions.is_empty() {
            let _ = writeln!(
                body,
                "- Dietary restrictions: {}",
                prefs.dietary_restrictions.join(", ")
            );
        }
        let _ = writeln!(body, "- Fitness level: {}", prefs.fitness_level.as_str());
        let _ = writeln!(body, "- Mobility level: {}", prefs.mobility_level.as_str());
        if !prefs.avoided_foods.is_empty() {
            let _ = writeln!(body, "- Foods to avoid: {}", prefs.avoided_foods.join(", "));
        }
    }

    if body.is_empty() {
        None
    } else {
        Some(format!("## User Health Profile\n{body}"))
    }
}

/// Renders the rolling-window section. Caller guarantees at least one sample.
///
/// Resting heart rate and HRV are averaged only over samples that report
/// them; the line is omitted when no sample does. A 3-point trend label is
/// added when the window has three or more samples.
fn biometrics_section(samples: &[BiometricSample]) -> String {
    let count = samples.len();
    let avg_steps =
        (samples.iter().map(|s| s.steps).sum::<u64>() as f64 / count as f64).round() as u64;
    let avg_sleep = samples.iter().map(|s| s.sleep_hours).sum::<f64>() / count as f64;

    let hr_samples: Vec<f64> = samples.iter().filter_map(|s| s.resting_heart_rate).collect();
    let hrv_samples: Vec<f64> = samples.iter().filter_map(|s| s.hrv).collect();
    let total_exercise: u64 = samples.iter().map(|s| s.exercise_minutes).sum();

    let mut section = format!("## Recent Health Data (Last {count} Days)\n");
    let _ = writeln!(section, "- Average daily steps: {avg_steps}");
    let _ = writeln!(section, "- Average sleep: {avg_sleep:.1} hours");
    if !hr_samples.is_empty() {
        let avg_hr =
            (hr_samples.iter().sum::<f64>() / hr_samples.len() as f64).round() as u64;
        let _ = writeln!(section, "- Average resting heart rate: {avg_hr} bpm");
    }
    if !hrv_samples.is_empty() {
        let avg_hrv =
            (hrv_samples.iter().sum::<f64>() / hrv_samples.len() as f64).round() as u64;
        let _ = writeln!(section, "- Average HRV: {avg_hrv} ms");
    }
    let _ = writeln!(section, "- Total exercise time: {total_exercise} minutes");

    if count >= 3 {
        let recent = &samples[count - 3..];
        let trend = if recent[2].steps > recent[0].steps {
            "increasing"
        } else if recent[2].steps < recent[0].steps {
            "decreasing"
        } else {
            "stable"
        };
        section.push_str("\n### Recent Trends:\n");
        let _ = writeln!(section, "- Activity trend: {trend}");
    }

    section
}

fn plans_section(plans: &PlanFlags) -> String {
    let status = |active: bool| if active { "Active" } else { "Not set up" };
    let mut section = String::from("## Current Plans Status:\n");
    let _ = writeln!(section, "- Diet Plan: {}", status(plans.has_diet_plan));
    let _ = writeln!(section, "- Exercise Plan: {}", status(plans.has_exercise_plan));
    let _ = writeln!(
        section,
        "- Supplement Plan: {}",
        status(plans.has_supplement_plan)
    );

    if !plans.has_diet_plan || !plans.has_exercise_plan {
        section.push_str(
            "\nNote: The user may benefit from setting up missing plans. You can suggest they visit the Plans tab.",
        );
    }

    section
}
