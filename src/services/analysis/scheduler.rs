//! Slice Analysis Scheduler
//!
//! Dispatches every image of a series to the inference boundary in fixed-size
//! batches. Calls within a batch are in flight together; batches run strictly
//! one after another. A single failed or malformed call aborts the whole run
//! and nothing gathered so far is returned.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use scan_review_core::{AnalysisMetadata, CanonicalFinding, ImageRef};
use scan_review_llm::{LlmProvider, LlmRequestOptions, Message};

use super::aggregator::FindingAggregator;
use super::prompt::{build_slice_prompt, normalize_context, SYSTEM_PROMPT};
use super::response::{parse_slice_response, SliceAnalysis};
use crate::models::image::ScanImage;
use crate::utils::error::{AppError, AppResult};

// ============================================================================
// Types
// ============================================================================

/// Configuration for an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Images dispatched concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    3
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Setup,
    Batch,
    Complete,
}

/// Progress update emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisProgress {
    pub stage: AnalysisStage,
    /// 0..=100
    pub percent: u8,
    /// Images processed so far
    pub processed: usize,
    pub total: usize,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub metadata: AnalysisMetadata,
    pub findings: Vec<CanonicalFinding>,
    /// The analysed images in upload order
    pub images: Vec<ImageRef>,
    pub valid_image_count: usize,
}

/// Percent reported after a batch: setup takes the first 10, finalization
/// the last 10.
pub fn batch_progress(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 90;
    }
    let ratio = processed.min(total) as f64 / total as f64;
    10 + (80.0 * ratio).round() as u8
}

// ============================================================================
// Scheduler
// ============================================================================

pub struct SliceAnalysisScheduler {
    provider: Arc<dyn LlmProvider>,
    config: AnalysisConfig,
}

impl SliceAnalysisScheduler {
    pub fn new(provider: Arc<dyn LlmProvider>, config: AnalysisConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse `images` in order and aggregate their findings.
    ///
    /// Fails with `Config` when no credential is configured and with
    /// `Validation` when `images` is empty, in both cases before any call.
    /// Any call failure yields `AnalysisAborted`.
    pub async fn run(
        &self,
        images: &[ScanImage],
        clinical_context: &str,
        progress: Option<&mpsc::Sender<AnalysisProgress>>,
    ) -> AppResult<AnalysisOutcome> {
        if !self.provider.config().has_api_key() {
            return Err(AppError::config(format!(
                "API key not configured for {}",
                self.provider.name()
            )));
        }
        if images.is_empty() {
            return Err(AppError::validation("Please upload at least one image"));
        }

        let total = images.len();
        let batch_size = self.config.batch_size.max(1);
        let context = normalize_context(clinical_context);

        tracing::info!(
            images = total,
            batch_size,
            provider = self.provider.name(),
            model = self.provider.model(),
            "starting analysis run"
        );
        report(progress, AnalysisStage::Setup, 5, 0, total).await;

        let mut aggregator = FindingAggregator::new();
        let mut valid_image_count = 0usize;
        let mut last_description = String::new();
        let mut processed = 0usize;

        for (batch, chunk) in images.chunks(batch_size).enumerate() {
            tracing::debug!(batch, size = chunk.len(), "dispatching batch");

            // join_all yields results in input order, so "first seen" below
            // is image order rather than completion order.
            let results = join_all(chunk.iter().map(|image| self.analyze_image(image, &context))).await;

            for (image, result) in chunk.iter().zip(results) {
                let analysis = result.map_err(|e| {
                    tracing::warn!(
                        batch,
                        image_id = %image.id,
                        label = %image.label,
                        error = %e,
                        "image analysis failed; aborting run"
                    );
                    AppError::analysis_aborted(format!("{}: {}", image.label, e))
                })?;

                tracing::debug!(
                    image_id = %image.id,
                    valid = analysis.is_valid_modality,
                    findings = analysis.findings().len(),
                    "image analysed"
                );

                last_description = analysis.modality_description.clone();
                if analysis.is_valid_modality {
                    valid_image_count += 1;
                    aggregator.extend(analysis.into_raw_findings(&image.id));
                }
            }

            processed += chunk.len();
            report(
                progress,
                AnalysisStage::Batch,
                batch_progress(processed, total),
                processed,
                total,
            )
            .await;
        }

        let image_order: Vec<String> = images.iter().map(|i| i.id.clone()).collect();
        let is_valid_modality = valid_image_count > 0;
        let (modality_description, findings) = if is_valid_modality {
            (
                format!("Multi-image scan series ({} images)", total),
                aggregator.finish(&image_order),
            )
        } else {
            let note = if last_description.trim().is_empty() {
                "Unknown".to_string()
            } else {
                last_description
            };
            (note, Vec::new())
        };

        tracing::info!(
            valid_images = valid_image_count,
            findings = findings.len(),
            "analysis run complete"
        );
        report(progress, AnalysisStage::Complete, 100, total, total).await;

        Ok(AnalysisOutcome {
            metadata: AnalysisMetadata {
                is_valid_modality,
                modality_description,
                generated_at: Utc::now(),
            },
            findings,
            images: images.iter().map(ScanImage::image_ref).collect(),
            valid_image_count,
        })
    }

    /// One inference call: encode, submit, parse.
    async fn analyze_image(&self, image: &ScanImage, context: &str) -> AppResult<SliceAnalysis> {
        let message = Message::user_with_image(
            image.mime_type.clone(),
            image.to_base64(),
            build_slice_prompt(&image.label, context),
        );
        let response = self
            .provider
            .send_message(
                vec![message],
                Some(SYSTEM_PROMPT.to_string()),
                LlmRequestOptions::json(),
            )
            .await?;
        let text = response.require_content()?;
        Ok(parse_slice_response(text)?)
    }
}

async fn report(
    progress: Option<&mpsc::Sender<AnalysisProgress>>,
    stage: AnalysisStage,
    percent: u8,
    processed: usize,
    total: usize,
) {
    if let Some(tx) = progress {
        // A closed receiver is not a reason to fail the run.
        let _ = tx
            .send(AnalysisProgress {
                stage,
                percent,
                processed,
                total,
            })
            .await;
    }
}
