//! Candidate syntheses
//!
//! A candidate is one independently produced synthesis of a topic, tagged
//! with the provider and model that produced it.

use serde::{Deserialize, Serialize};

/// Where a candidate was generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Model ran on this device
    #[default]
    Local,
    /// Model ran behind a remote API
    Remote,
}

/// Provenance of a candidate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub provider_id: String,
    pub model_id: String,
    #[serde(default)]
    pub kind: ProviderKind,
}

impl ProviderInfo {
    pub fn new(provider_id: impl Into<String>, model_id: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            kind,
        }
    }
}

/// A framing of the topic and its counter-framing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub frame: String,
    pub reframe: String,
}

/// One proposed synthesis
///
/// # Example
///
/// ```
/// use quorum_domain::quorum::{GatheredCandidate, ProviderInfo, ProviderKind};
///
/// let candidate = GatheredCandidate::new(
///     "c-0",
///     "Both sides agree the bridge needs repair.",
///     ProviderInfo::new("local-llm", "llama-3-8b", ProviderKind::Local),
///     1_700_000_000_000,
/// )
/// .with_divergence_hints(["cost"]);
/// assert!(candidate.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatheredCandidate {
    pub candidate_id: String,
    #[serde(default)]
    pub critique_notes: Vec<String>,
    pub facts_summary: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub divergence_hints: Vec<String>,
    pub provider: ProviderInfo,
    pub created_at: u64,
}

impl GatheredCandidate {
    pub fn new(
        candidate_id: impl Into<String>,
        facts_summary: impl Into<String>,
        provider: ProviderInfo,
        created_at: u64,
    ) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            critique_notes: Vec::new(),
            facts_summary: facts_summary.into(),
            frames: Vec::new(),
            warnings: Vec::new(),
            divergence_hints: Vec::new(),
            provider,
            created_at,
        }
    }

    pub fn with_divergence_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.divergence_hints = hints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_frame(mut self, frame: impl Into<String>, reframe: impl Into<String>) -> Self {
        self.frames.push(Frame {
            frame: frame.into(),
            reframe: reframe.into(),
        });
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_critique_note(mut self, note: impl Into<String>) -> Self {
        self.critique_notes.push(note.into());
        self
    }

    /// Check the candidate's shape, returning a human-readable problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.candidate_id.trim().is_empty() {
            return Err("candidate_id must not be empty".to_string());
        }
        if self.facts_summary.trim().is_empty() {
            return Err("facts_summary must not be empty".to_string());
        }
        if self.provider.provider_id.trim().is_empty() {
            return Err("provider.provider_id must not be empty".to_string());
        }
        if self.provider.model_id.trim().is_empty() {
            return Err("provider.model_id must not be empty".to_string());
        }
        if let Some(frame) = self
            .frames
            .iter()
            .find(|f| f.frame.trim().is_empty() || f.reframe.trim().is_empty())
        {
            return Err(format!(
                "frames must have non-empty frame and reframe (got '{}' / '{}')",
                frame.frame, frame.reframe
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> GatheredCandidate {
        GatheredCandidate::new("c-0", "summary", ProviderInfo::new("p", "m", ProviderKind::Remote), 1)
    }

    #[test]
    fn test_validate() {
        assert!(candidate().validate().is_ok());

        let mut bad = candidate();
        bad.candidate_id = " ".to_string();
        assert!(bad.validate().unwrap_err().contains("candidate_id"));

        let mut bad = candidate();
        bad.provider.model_id.clear();
        assert!(bad.validate().unwrap_err().contains("model_id"));

        let bad = candidate().with_frame("", "reframe");
        assert!(bad.validate().unwrap_err().contains("frames"));
    }

    #[test]
    fn test_deserialize_minimal() {
        let parsed: GatheredCandidate = serde_json::from_value(serde_json::json!({
            "candidate_id": "c-1",
            "facts_summary": "s",
            "provider": {"provider_id": "p", "model_id": "m"},
            "created_at": 5
        }))
        .unwrap();
        assert!(parsed.divergence_hints.is_empty());
        assert_eq!(parsed.provider.kind, ProviderKind::Local);
    }
}
