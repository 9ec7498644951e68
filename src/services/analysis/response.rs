//! Inference Response Parsing
//!
//! Turns the model's per-image JSON into typed data. Anything that is not
//! JSON or violates the schema is an error, which aborts the run.

use serde::Deserialize;

use scan_review_core::{Confidence, CoreError, CoreResult, RawFinding};

/// Structured result for one image.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceAnalysis {
    #[serde(alias = "is_valid_modality", alias = "is_pelvic_mri")]
    pub is_valid_modality: bool,
    #[serde(default, alias = "modality_description", alias = "image_description")]
    pub modality_description: String,
    #[serde(default)]
    findings: Option<Vec<ReportedFinding>>,
}

/// A finding as the model reports it, before it is tied to an image.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportedFinding {
    pub title: String,
    pub confidence: Confidence,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "location")]
    pub region: String,
}

impl SliceAnalysis {
    pub fn findings(&self) -> &[ReportedFinding] {
        self.findings.as_deref().unwrap_or_default()
    }

    /// Attach the source image id to every reported finding.
    pub fn into_raw_findings(self, image_id: &str) -> Vec<RawFinding> {
        self.findings
            .unwrap_or_default()
            .into_iter()
            .map(|f| RawFinding::new(f.title, f.description, f.confidence, f.region, image_id))
            .collect()
    }
}

/// Remove markdown code fences. The opening and closing fence are stripped
/// independently, so a reply with only one of them still parses.
pub fn strip_code_fences(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        // drop the info string (```json)
        body = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches("json"),
        };
    }
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse the model's response text for one image.
pub fn parse_slice_response(text: &str) -> CoreResult<SliceAnalysis> {
    let body = strip_code_fences(text);
    if body.is_empty() {
        return Err(CoreError::parse("Empty response"));
    }
    serde_json::from_str(body)
        .map_err(|e| CoreError::parse(format!("Malformed analysis response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camel_case() {
        let analysis = parse_slice_response(
            r#"{"isValidModality": true, "modalityDescription": "Axial T2",
                "findings": [{"title": "Cyst", "confidence": "High",
                              "description": "Round lesion.", "region": "Left Ovary"}]}"#,
        )
        .unwrap();
        assert!(analysis.is_valid_modality);
        assert_eq!(analysis.modality_description, "Axial T2");
        assert_eq!(analysis.findings().len(), 1);
        assert_eq!(analysis.findings()[0].confidence, Confidence::High);
    }

    #[test]
    fn test_parse_legacy_keys() {
        let analysis = parse_slice_response(
            r#"{"is_pelvic_mri": true, "image_description": "Sagittal T2",
                "findings": [{"title": "Adhesion", "confidence": "low",
                              "description": "Tethering.", "location": "Pouch of Douglas"}]}"#,
        )
        .unwrap();
        let raws = analysis.into_raw_findings("img-7");
        assert_eq!(raws[0].region, "Pouch of Douglas");
        assert_eq!(raws[0].confidence, Confidence::Low);
        assert_eq!(raws[0].source_image_id, "img-7");
    }

    #[test]
    fn test_missing_or_null_findings_is_empty() {
        let analysis =
            parse_slice_response(r#"{"isValidModality": false, "modalityDescription": "Chest X-ray"}"#)
                .unwrap();
        assert!(analysis.findings().is_empty());

        let analysis = parse_slice_response(
            r#"{"isValidModality": true, "modalityDescription": "MRI", "findings": null}"#,
        )
        .unwrap();
        assert!(analysis.into_raw_findings("img-1").is_empty());
    }

    #[test]
    fn test_code_fences_stripped() {
        let text = "```json\n{\"isValidModality\": false, \"modalityDescription\": \"CT\"}\n```";
        assert!(!parse_slice_response(text).unwrap().is_valid_modality);
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn test_one_sided_fences_stripped() {
        let trailing = "{\"isValidModality\": true, \"modalityDescription\": \"MRI\"}\n```";
        assert!(parse_slice_response(trailing).unwrap().is_valid_modality);
        assert_eq!(strip_code_fences("```json\n{}"), "{}");
    }

    #[test]
    fn test_schema_violations_fail() {
        // not JSON
        assert!(parse_slice_response("I cannot help with that").is_err());
        // empty
        assert!(parse_slice_response("```json\n```").is_err());
        // missing validity flag
        assert!(parse_slice_response(r#"{"modalityDescription": "MRI"}"#).is_err());
        // unknown confidence
        assert!(parse_slice_response(
            r#"{"isValidModality": true, "findings": [{"title": "Cyst", "confidence": "Certain", "region": "Uterus"}]}"#
        )
        .is_err());
    }
}
