//! Finding Aggregation
//!
//! Reduces the raw per-image findings of one analysis run into canonical
//! findings: one per distinct (region, title) pair, carrying the highest
//! confidence seen, the image it was seen on, and a provenance label naming
//! the images the finding appeared in.

use std::collections::HashMap;

use scan_review_core::{CanonicalFinding, Confidence, RawFinding, ReviewStatus};

/// Separator between the region and title halves of a group key (U+241F).
const KEY_SEPARATOR: char = '\u{241F}';

// ============================================================================
// Grouping
// ============================================================================

/// Group key: exact match after case folding, no fuzzy matching.
pub fn group_key(region: &str, title: &str) -> String {
    format!(
        "{}{}{}",
        region.to_lowercase(),
        KEY_SEPARATOR,
        title.to_lowercase()
    )
}

/// Running state of one (region, title) group.
#[derive(Debug, Clone)]
struct FindingGroup {
    title: String,
    region: String,
    /// First description observed; duplicates never overwrite it
    description: String,
    best_confidence: Confidence,
    best_image_id: String,
    /// Distinct image ids in first-seen order
    source_image_ids: Vec<String>,
}

impl FindingGroup {
    fn start(raw: RawFinding) -> Self {
        Self {
            title: raw.title,
            region: raw.region,
            description: raw.description,
            best_confidence: raw.confidence,
            best_image_id: raw.source_image_id.clone(),
            source_image_ids: vec![raw.source_image_id],
        }
    }

    fn merge(&mut self, raw: RawFinding) {
        // Ties keep the first-seen image.
        if raw.confidence > self.best_confidence {
            self.best_confidence = raw.confidence;
            self.best_image_id = raw.source_image_id.clone();
        }
        if !self.source_image_ids.contains(&raw.source_image_id) {
            self.source_image_ids.push(raw.source_image_id);
        }
    }
}

/// Accumulates raw findings in the order they are observed.
///
/// "First seen" is the push order, so callers that want deterministic
/// tie-breaking push findings in image order.
#[derive(Debug, Default)]
pub struct FindingAggregator {
    groups: Vec<FindingGroup>,
    index: HashMap<String, usize>,
}

impl FindingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one raw finding into its group, creating the group if needed.
    pub fn push(&mut self, raw: RawFinding) {
        let key = group_key(&raw.region, &raw.title);
        match self.index.get(&key) {
            Some(&position) => self.groups[position].merge(raw),
            None => {
                self.index.insert(key, self.groups.len());
                self.groups.push(FindingGroup::start(raw));
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = RawFinding>>(&mut self, raws: I) {
        for raw in raws {
            self.push(raw);
        }
    }

    /// Number of distinct groups so far
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Emit one canonical finding per group, in first-seen group order.
    ///
    /// `image_order` maps image ids to their 1-based display positions for
    /// the provenance label.
    pub fn finish(self, image_order: &[String]) -> Vec<CanonicalFinding> {
        self.groups
            .into_iter()
            .enumerate()
            .map(|(index, group)| {
                let mut description = group.description;
                if let Some(label) = provenance_label(&group.source_image_ids, image_order) {
                    description.push_str(&format!(" (Observed in images: {})", label));
                }
                CanonicalFinding {
                    id: format!("finding-{}", index + 1),
                    title: group.title,
                    region: group.region,
                    likelihood: group.best_confidence,
                    description,
                    coordinates: None,
                    review_status: ReviewStatus::Pending,
                    source_image_ids: group.source_image_ids,
                    best_image_id: group.best_image_id,
                }
            })
            .collect()
    }
}

/// Aggregate a whole run in one call.
pub fn aggregate<I>(raw_findings: I, image_order: &[String]) -> Vec<CanonicalFinding>
where
    I: IntoIterator<Item = RawFinding>,
{
    let mut aggregator = FindingAggregator::new();
    aggregator.extend(raw_findings);
    aggregator.finish(image_order)
}

// ============================================================================
// Provenance Labels
// ============================================================================

/// Render the images a finding was observed in.
///
/// Ids missing from `image_order` are dropped. One position yields no label,
/// two are listed (`"1, 3"`), three or more collapse to a range
/// (`"1-4"`) even when the positions are not contiguous.
pub fn provenance_label(source_image_ids: &[String], image_order: &[String]) -> Option<String> {
    let mut positions: Vec<usize> = source_image_ids
        .iter()
        .filter_map(|id| image_order.iter().position(|candidate| candidate == id))
        .map(|index| index + 1)
        .collect();
    positions.sort_unstable();
    positions.dedup();

    match positions.as_slice() {
        [] | [_] => None,
        [first, second] => Some(format!("{}, {}", first, second)),
        [first, .., last] => Some(format!("{}-{}", first, last)),
    }
}
