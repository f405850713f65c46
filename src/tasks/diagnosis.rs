use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::orchestrator::{normalizer, AiTask, MalformedOutput, TaskKind};
use crate::prompts;
use crate::providers::{GenerationRequest, ImageData, ProviderClient};

/// How badly a dish failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Easily fixable.
    Minor,
    Moderate,
    /// Needs a restart.
    Major,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Minor => write!(f, "minor"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Major => write!(f, "major"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minor" => Ok(Severity::Minor),
            "moderate" => Ok(Severity::Moderate),
            "major" => Ok(Severity::Major),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Normalized diagnosis of a failed dish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub root_cause: String,
    pub explanation: String,
    pub tips: Vec<String>,
    pub severity: Severity,
    /// In `[0, 1]`.
    pub confidence: f64,
}

/// Answers from the cook that sharpen a diagnosis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heat_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DiagnosisContext {
    /// True when no question was answered.
    pub fn is_empty(&self) -> bool {
        [&self.heat_level, &self.timing, &self.modifications, &self.notes]
            .iter()
            .all(|v| v.as_deref().map_or(true, |s| s.trim().is_empty()))
    }

    /// Context block appended to diagnosis prompts; empty when nothing was answered.
    pub fn to_prompt_text(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut text = String::from("\n\nAdditional context from the cook:");
        let fields = [
            ("Heat level used", &self.heat_level),
            ("Timing", &self.timing),
            ("Modifications made", &self.modifications),
            ("Notes", &self.notes),
        ];
        for (label, value) in fields {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                text.push_str(&format!("\n- {}: {}", label, v));
            }
        }
        text
    }
}

/// Diagnosis of a photographed cooking failure.
///
/// Vision-capable providers get the photo when it could be loaded. Every other
/// provider, or every provider when the photo is missing, gets a context-only prompt.
pub struct FailureDiagnosisTask {
    context_text: String,
    image: Option<Arc<ImageData>>,
}

impl FailureDiagnosisTask {
    pub fn new(context: Option<&DiagnosisContext>, image: Option<Arc<ImageData>>) -> Self {
        Self {
            context_text: context.map(|c| c.to_prompt_text()).unwrap_or_default(),
            image,
        }
    }

    /// Static answer served when every provider failed.
    pub fn fallback_diagnosis() -> Diagnosis {
        Diagnosis {
            root_cause: "Analysis Unavailable".to_string(),
            explanation: "Our AI services are temporarily unavailable. Based on common failures: \
                          check your cooking temperature, timing, and ingredient proportions."
                .to_string(),
            tips: vec![
                "Ensure correct temperature, use a thermometer if possible".to_string(),
                "Follow timing guidelines closely on your next attempt".to_string(),
                "Check ingredient ratios, too much or too little of one ingredient causes most failures"
                    .to_string(),
            ],
            severity: Severity::Moderate,
            confidence: 0.3,
        }
    }
}

impl AiTask for FailureDiagnosisTask {
    type Output = Diagnosis;

    fn kind(&self) -> TaskKind {
        TaskKind::FailureDiagnosis
    }

    fn request_for(&self, provider: &dyn ProviderClient) -> Option<GenerationRequest> {
        let request = match (&self.image, provider.supports_vision()) {
            (Some(image), true) => GenerationRequest::text(
                prompts::diagnosis_with_image(&self.context_text),
                500,
                0.3,
            )
            .with_image(image.clone()),
            _ => GenerationRequest::text(
                prompts::diagnosis_from_context(&self.context_text),
                500,
                0.3,
            ),
        };
        Some(request)
    }

    fn normalize(&self, raw: &str) -> Result<Diagnosis, MalformedOutput> {
        normalizer::normalize_diagnosis(raw)
    }

    fn terminal(&self) -> Diagnosis {
        Self::fallback_diagnosis()
    }
}
