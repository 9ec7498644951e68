//! Analysis Prompts
//!
//! Prompt text sent with every image. The JSON schema embedded here is the
//! contract `response::parse_slice_response` enforces on the way back.

/// Stored in place of a blank clinical context.
pub const NO_CONTEXT: &str = "NA";

pub const SYSTEM_PROMPT: &str =
    "You are an expert radiologist specializing in endometriosis. You answer with valid JSON only.";

/// Normalise the clinical context captured at intake.
pub fn normalize_context(context: &str) -> String {
    let trimmed = context.trim();
    if trimmed.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        trimmed.to_string()
    }
}

fn context_for_prompt(context: &str) -> &str {
    let trimmed = context.trim();
    if trimmed.is_empty() || trimmed == NO_CONTEXT {
        "No history provided"
    } else {
        trimmed
    }
}

/// Build the per-image prompt.
pub fn build_slice_prompt(sequence_label: &str, clinical_context: &str) -> String {
    format!(
        r#"Analyze this image (Sequence: {label}) and the following clinical context: "{context}".

Step 1: Verify whether this is a pelvic MRI scan.
Step 2: If it IS a pelvic MRI, identify any potential abnormalities (e.g. endometriomas, adhesions, thickening, or deep infiltrating endometriosis).
Step 3: If it is NOT a pelvic MRI, describe what the image shows.

Return your response as valid JSON only, matching this schema:
{{
  "isValidModality": boolean,
  "modalityDescription": "Short description of the image content",
  "findings": [
    {{
      "title": "Short medical term (e.g. Ovarian Cyst)",
      "confidence": "High" | "Medium" | "Low",
      "description": "One sentence clinical observation.",
      "region": "Anatomical region (e.g. Left Ovary)"
    }}
  ]
}}"#,
        label = sequence_label,
        context = context_for_prompt(clinical_context),
    )
}
