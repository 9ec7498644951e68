//! Patient Translation
//!
//! Renders a finalized report as a plain-language summary through the same
//! inference boundary used for image analysis (text only, JSON response).

use scan_review_core::PatientTranslation;
use scan_review_llm::{LlmProvider, LlmRequestOptions, Message};

use crate::services::analysis::response::strip_code_fences;
use crate::utils::error::{AppError, AppResult};

const SYSTEM_PROMPT: &str =
    "You are an empathetic medical communicator. You answer with valid JSON only.";

/// Build the translation prompt for a report.
pub fn build_translation_prompt(report: &str) -> String {
    format!(
        r#"Translate the following technical radiology report into a reassuring, easy-to-understand summary for a patient.
Use an 8th-grade reading level.

Input Report:
"{report}"

Return valid JSON only, matching this schema:
{{
  "summary": "A 2-3 paragraph narrative explaining the findings in plain English. Use medical terms like 'Endometrioma' but explain them simply within the flow.",
  "questions": ["3 specific follow-up questions the patient should ask their doctor based on these findings"],
  "resources": [{{"title": "Name of a relevant article or topic", "source": "Mayo Clinic/NIH/Endometriosis Foundation"}}]
}}"#,
        report = report.trim()
    )
}

/// Parse the model's translation response.
pub fn parse_translation(text: &str) -> AppResult<PatientTranslation> {
    let body = strip_code_fences(text);
    let translation: PatientTranslation = serde_json::from_str(body).map_err(|e| {
        AppError::Inference(scan_review_llm::LlmError::ParseError {
            message: format!("Malformed translation response: {}", e),
        })
    })?;
    if translation.summary.trim().is_empty() {
        return Err(AppError::Inference(scan_review_llm::LlmError::ParseError {
            message: "Translation summary is empty".to_string(),
        }));
    }
    Ok(translation)
}

/// Translate a finalized report for the patient.
pub async fn translate_report(
    provider: &dyn LlmProvider,
    report: &str,
) -> AppResult<PatientTranslation> {
    if !provider.config().has_api_key() {
        return Err(AppError::config(format!(
            "API key not configured for {}",
            provider.name()
        )));
    }
    if report.trim().is_empty() {
        return Err(AppError::validation("Report is empty"));
    }

    tracing::info!(provider = provider.name(), "requesting patient translation");
    let response = provider
        .send_message(
            vec![Message::user(build_translation_prompt(report))],
            Some(SYSTEM_PROMPT.to_string()),
            LlmRequestOptions::json(),
        )
        .await?;
    parse_translation(response.require_content()?)
}
