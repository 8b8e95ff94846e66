use async_trait::async_trait;
use evidence_flow::{
    AnalysisResult, EvidenceError, TranscriptAnalyzer, parse_analysis_response,
};
use rig::completion::Prompt;
use rig::prelude::*;
use rig::providers::openrouter;
use tracing::{error, info};

const ANALYSIS_PREAMBLE: &str =
    "You are a medical domain expert. Follow the instructions and output JSON only.";

fn build_analysis_prompt(transcription: &str) -> String {
    format!(
        r#"The following is a transcription of a recorded conversation between a clinician and a patient or colleague.

        Extract:
        1. "learnings": what the clinician learned or should remember from the conversation
        2. "challenges": concrete problems the patient or end user faces
        3. "medicalTerms": words that look like mis-transcribed medical terms. For each one give
           "original" (exactly as transcribed) and "candidates" (1-5 plausible correct terms,
           most likely first)

        Respond with ONLY this JSON object:
        {{
          "learnings": ["..."],
          "challenges": ["..."],
          "medicalTerms": [{{ "original": "...", "candidates": ["...", "..."] }}]
        }}

        Use empty arrays when nothing applies. Write entries in the language of the transcription.

        Transcription:
        {}"#,
        transcription
    )
}

/// Analysis collaborator backed by an OpenRouter-hosted model
pub struct OpenRouterAnalyzer {
    api_key: String,
    model: String,
}

impl OpenRouterAnalyzer {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn agent(&self) -> rig::agent::Agent<openrouter::CompletionModel> {
        let client = openrouter::Client::new(&self.api_key);
        client
            .agent(&self.model)
            .preamble(ANALYSIS_PREAMBLE)
            .temperature(0.3)
            .build()
    }
}

#[async_trait]
impl TranscriptAnalyzer for OpenRouterAnalyzer {
    async fn analyze(&self, transcription: &str) -> evidence_flow::Result<AnalysisResult> {
        info!(model = %self.model, chars = transcription.chars().count(), "Analyzing transcription");

        let prompt = build_analysis_prompt(transcription);
        let response = self
            .agent()
            .prompt(prompt.as_str())
            .await
            .map_err(|e| {
                error!("Analysis request failed: {}", e);
                EvidenceError::AnalysisUnavailable(e.to_string())
            })?;

        let analysis = parse_analysis_response(&response)?;
        info!(
            learnings = analysis.learnings.len(),
            challenges = analysis.challenges.len(),
            medical_terms = analysis.medical_terms.len(),
            "Analysis completed"
        );
        Ok(analysis)
    }
}
