//! Slice Analysis Integration Tests
//!
//! Runs the scheduler and aggregator against the scripted provider:
//! deduplication, confidence promotion, batching, progress and failure.

use tokio::sync::mpsc;

use scan_review::services::analysis::{
    batch_progress, AnalysisConfig, AnalysisProgress, AnalysisStage, SliceAnalysisScheduler,
};
use scan_review::AppError;
use scan_review_core::{Confidence, ReviewStatus};

use crate::support::{finding, images, scheduler, slice_json, MockVisionProvider};

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn test_duplicate_finding_collapses_across_images() {
    let cyst = finding("Cyst", "Medium", "Left Ovary", "Simple cyst.");
    let provider = MockVisionProvider::new()
        .reply("Image 1", slice_json(true, "T2", vec![cyst.clone()]))
        .reply(
            "Image 2",
            slice_json(
                true,
                "T2",
                vec![finding("Adhesion", "Low", "Pouch of Douglas", "Tethering.")],
            ),
        )
        .reply("Image 3", slice_json(true, "T2", vec![cyst]))
        .into_arc();

    let outcome = scheduler(&provider)
        .run(&images(3), "pelvic pain", None)
        .await
        .unwrap();

    assert_eq!(outcome.findings.len(), 2);
    let cyst = &outcome.findings[0];
    assert_eq!(cyst.id, "finding-1");
    assert_eq!(cyst.title, "Cyst");
    assert_eq!(cyst.source_image_ids, vec!["img-1", "img-3"]);
    assert_eq!(cyst.description, "Simple cyst. (Observed in images: 1, 3)");
    assert_eq!(cyst.review_status, ReviewStatus::Pending);

    let adhesion = &outcome.findings[1];
    assert_eq!(adhesion.id, "finding-2");
    assert_eq!(adhesion.description, "Tethering.");
}

#[tokio::test]
async fn test_grouping_ignores_case() {
    let provider = MockVisionProvider::new()
        .reply(
            "Image 1",
            slice_json(true, "T2", vec![finding("Cyst", "Low", "Left Ovary", "a")]),
        )
        .reply(
            "Image 2",
            slice_json(true, "T2", vec![finding("cyst", "Low", "LEFT OVARY", "b")]),
        )
        .into_arc();

    let outcome = scheduler(&provider).run(&images(2), "", None).await.unwrap();

    assert_eq!(outcome.findings.len(), 1);
    assert_eq!(outcome.findings[0].title, "Cyst");
    assert_eq!(outcome.findings[0].region, "Left Ovary");
}

#[tokio::test]
async fn test_max_confidence_wins_and_picks_best_image() {
    let provider = MockVisionProvider::new()
        .reply(
            "Image 1",
            slice_json(true, "T2", vec![finding("Cyst", "Low", "Left Ovary", "faint")]),
        )
        .reply(
            "Image 2",
            slice_json(true, "T2", vec![finding("Cyst", "High", "Left Ovary", "clear")]),
        )
        .reply(
            "Image 3",
            slice_json(true, "T2", vec![finding("Cyst", "Medium", "Left Ovary", "visible")]),
        )
        .into_arc();

    let outcome = scheduler(&provider).run(&images(3), "", None).await.unwrap();

    let cyst = &outcome.findings[0];
    assert_eq!(cyst.likelihood, Confidence::High);
    assert_eq!(cyst.best_image_id, "img-2");
    // description stays with the first observation
    assert!(cyst.description.starts_with("faint"));
    assert!(cyst.description.ends_with("(Observed in images: 1-3)"));
}

#[tokio::test]
async fn test_equal_confidence_keeps_earliest_image() {
    let cyst = finding("Cyst", "Medium", "Left Ovary", "x");
    let provider = MockVisionProvider::new()
        .reply("Image 2", slice_json(true, "T2", vec![cyst.clone()]))
        .reply("Image 5", slice_json(true, "T2", vec![cyst]))
        .delay(5)
        .into_arc();

    let outcome = scheduler(&provider).run(&images(5), "", None).await.unwrap();

    assert_eq!(outcome.findings[0].best_image_id, "img-2");
    assert_eq!(outcome.findings[0].source_image_ids, vec!["img-2", "img-5"]);
}

#[tokio::test]
async fn test_provenance_range_for_four_images() {
    let lesion = finding("Endometrioma", "Medium", "Right Ovary", "Hyperintense.");
    let mut provider = MockVisionProvider::new();
    for i in 1..=4 {
        provider = provider.reply(&format!("Image {}", i), slice_json(true, "T2", vec![lesion.clone()]));
    }
    let provider = provider.into_arc();

    let outcome = scheduler(&provider).run(&images(4), "", None).await.unwrap();

    assert_eq!(outcome.findings.len(), 1);
    assert_eq!(
        outcome.findings[0].description,
        "Hyperintense. (Observed in images: 1-4)"
    );
}

#[tokio::test]
async fn test_invalid_images_contribute_no_findings() {
    let provider = MockVisionProvider::new()
        .reply(
            "Image 1",
            slice_json(true, "T2", vec![finding("Cyst", "Low", "Left Ovary", "a")]),
        )
        .reply(
            "Image 2",
            slice_json(false, "Chest X-ray", vec![finding("Nodule", "High", "Lung", "b")]),
        )
        .into_arc();

    let outcome = scheduler(&provider).run(&images(2), "", None).await.unwrap();

    assert!(outcome.metadata.is_valid_modality);
    assert_eq!(outcome.valid_image_count, 1);
    assert_eq!(
        outcome.metadata.modality_description,
        "Multi-image scan series (2 images)"
    );
    assert_eq!(outcome.findings.len(), 1);
    assert_eq!(outcome.findings[0].title, "Cyst");
}

#[tokio::test]
async fn test_zero_valid_images() {
    let provider = MockVisionProvider::new()
        .reply("Image 1", slice_json(false, "Knee MRI", vec![]))
        .reply("Image 2", slice_json(false, "Chest X-ray", vec![]))
        .into_arc();

    let outcome = scheduler(&provider).run(&images(2), "", None).await.unwrap();

    assert!(!outcome.metadata.is_valid_modality);
    assert_eq!(outcome.metadata.modality_description, "Chest X-ray");
    assert!(outcome.findings.is_empty());
    assert_eq!(outcome.images.len(), 2);
}

#[tokio::test]
async fn test_fenced_response_is_accepted() {
    let body = format!(
        "```json\n{}\n```",
        slice_json(true, "T2", vec![finding("Cyst", "High", "Left Ovary", "a")])
    );
    let provider = MockVisionProvider::new().reply("Image 1", body).into_arc();

    let outcome = scheduler(&provider).run(&images(1), "", None).await.unwrap();
    assert_eq!(outcome.findings.len(), 1);
}

// ============================================================================
// Failure
// ============================================================================

#[tokio::test]
async fn test_one_failed_image_aborts_the_run() {
    let provider = MockVisionProvider::new()
        .reply(
            "Image 1",
            slice_json(true, "T2", vec![finding("Cyst", "High", "Left Ovary", "a")]),
        )
        .fail("Image 3")
        .into_arc();

    let result = scheduler(&provider).run(&images(5), "", None).await;

    match result {
        Err(AppError::AnalysisAborted { reason }) => assert!(reason.contains("Image 3")),
        other => panic!("expected AnalysisAborted, got {:?}", other.map(|o| o.findings)),
    }
    // the first batch completed, the second never started
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn test_malformed_response_aborts_the_run() {
    let provider = MockVisionProvider::new()
        .reply("Image 2", r#"{"isValidModality": true, "findings": [{"title": "Cyst", "confidence": "Certain", "region": "x"}]}"#)
        .into_arc();

    let result = scheduler(&provider).run(&images(2), "", None).await;
    assert!(matches!(result, Err(AppError::AnalysisAborted { .. })));
}

#[tokio::test]
async fn test_missing_credential_dispatches_nothing() {
    let provider = MockVisionProvider::new().without_key().into_arc();

    let result = scheduler(&provider).run(&images(3), "", None).await;

    assert!(matches!(result, Err(AppError::Config(_))));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_no_images_is_a_validation_error() {
    let provider = MockVisionProvider::new().into_arc();
    let result = scheduler(&provider).run(&[], "", None).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

// ============================================================================
// Batching & Progress
// ============================================================================

#[tokio::test]
async fn test_batches_are_bounded_and_ordered() {
    let provider = MockVisionProvider::new().delay(20).into_arc();
    let scheduler = SliceAnalysisScheduler::new(provider.clone(), AnalysisConfig::default());

    scheduler.run(&images(7), "", None).await.unwrap();

    assert_eq!(provider.max_in_flight(), 3);
    let calls = provider.calls();
    assert_eq!(calls.len(), 7);
    // batch boundaries: no image from a later batch finishes before an earlier batch
    let position = |label: &str| calls.iter().position(|c| c == label).unwrap();
    for first in ["Image 1", "Image 2", "Image 3"] {
        for later in ["Image 4", "Image 5", "Image 6", "Image 7"] {
            assert!(position(first) < position(later));
        }
    }
    assert_eq!(calls[6], "Image 7");
}

#[tokio::test]
async fn test_batch_size_one_is_sequential() {
    let provider = MockVisionProvider::new().delay(5).into_arc();
    let scheduler = SliceAnalysisScheduler::new(provider.clone(), AnalysisConfig { batch_size: 1 });

    scheduler.run(&images(3), "", None).await.unwrap();

    assert_eq!(provider.max_in_flight(), 1);
    assert_eq!(provider.calls(), vec!["Image 1", "Image 2", "Image 3"]);
}

#[tokio::test]
async fn test_progress_events() {
    let provider = MockVisionProvider::new().into_arc();
    let (tx, mut rx) = mpsc::channel::<AnalysisProgress>(32);

    scheduler(&provider)
        .run(&images(7), "", Some(&tx))
        .await
        .unwrap();
    drop(tx);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
    assert_eq!(
        percents,
        vec![
            5,
            batch_progress(3, 7),
            batch_progress(6, 7),
            batch_progress(7, 7),
            100
        ]
    );
    assert_eq!(events[0].stage, AnalysisStage::Setup);
    assert_eq!(events[1].stage, AnalysisStage::Batch);
    assert_eq!(events[4].stage, AnalysisStage::Complete);
    assert_eq!(events[2].processed, 6);
}

#[tokio::test]
async fn test_dropped_progress_receiver_does_not_fail() {
    let provider = MockVisionProvider::new().into_arc();
    let (tx, rx) = mpsc::channel::<AnalysisProgress>(1);
    drop(rx);

    let outcome = scheduler(&provider).run(&images(4), "", Some(&tx)).await;
    assert!(outcome.is_ok());
}
