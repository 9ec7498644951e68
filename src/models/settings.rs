//! Settings Models
//!
//! Application configuration and settings data structures.

use serde::{Deserialize, Serialize};

use scan_review_core::ProxyConfig;
use scan_review_llm::{ProviderConfig, ProviderType};

use crate::services::analysis::AnalysisConfig;
use crate::services::workflow::WorkflowPolicy;

/// Largest batch the scheduler will dispatch concurrently
pub const MAX_BATCH_SIZE: usize = 16;

/// Application configuration stored in config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Inference provider
    #[serde(default = "default_provider")]
    pub provider: ProviderType,
    /// Model override; the provider default is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Endpoint override for self-hosted or proxied gateways
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Images analysed concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Per-call timeout enforced by the HTTP client
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Exam title printed in the report header
    #[serde(default = "default_exam_title")]
    pub exam_title: String,
    /// Reviewer used when a review request names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_reviewer: Option<String>,
    /// Require a completed peer review before finalization
    #[serde(default)]
    pub require_peer_review: bool,
    /// Outbound proxy for inference calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
}

fn default_provider() -> ProviderType {
    ProviderType::Gemini
}

fn default_batch_size() -> usize {
    3
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_exam_title() -> String {
    "MRI PELVIS FOR ENDOMETRIOSIS".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            batch_size: default_batch_size(),
            request_timeout_secs: default_request_timeout_secs(),
            exam_title: default_exam_title(),
            default_reviewer: None,
            require_peer_review: false,
            proxy: None,
        }
    }
}

/// Settings update request (partial update)
///
/// An empty string clears the optional text fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub provider: Option<ProviderType>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub batch_size: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub exam_title: Option<String>,
    pub default_reviewer: Option<String>,
    pub require_peer_review: Option<bool>,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub clear_proxy: bool,
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl AppConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(provider) = update.provider {
            if provider != self.provider {
                // a model name rarely carries across providers
                self.model = None;
            }
            self.provider = provider;
        }
        if let Some(model) = update.model {
            self.model = non_blank(model);
        }
        if let Some(base_url) = update.base_url {
            self.base_url = non_blank(base_url);
        }
        if let Some(batch_size) = update.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(timeout) = update.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        if let Some(title) = update.exam_title {
            self.exam_title = title;
        }
        if let Some(reviewer) = update.default_reviewer {
            self.default_reviewer = non_blank(reviewer);
        }
        if let Some(strict) = update.require_peer_review {
            self.require_peer_review = strict;
        }
        if update.clear_proxy {
            self.proxy = None;
        } else if let Some(proxy) = update.proxy {
            self.proxy = Some(proxy);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(format!(
                "Invalid batch_size: {}. Must be between 1 and {}",
                self.batch_size, MAX_BATCH_SIZE
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be at least 1 second".to_string());
        }

        if self.exam_title.trim().is_empty() {
            return Err("exam_title cannot be empty".to_string());
        }

        if let Some(proxy) = &self.proxy {
            if proxy.host.trim().is_empty() {
                return Err("proxy host cannot be empty".to_string());
            }
            if proxy.port == 0 {
                return Err("proxy port cannot be 0".to_string());
            }
        }

        Ok(())
    }

    /// The model name sent to the provider
    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Provider configuration for the inference boundary
    pub fn provider_config(&self, api_key: Option<String>) -> ProviderConfig {
        ProviderConfig {
            provider: self.provider,
            api_key,
            base_url: self.base_url.clone(),
            model: self.resolved_model(),
            timeout_secs: self.request_timeout_secs,
            proxy: self.proxy.clone(),
            ..Default::default()
        }
    }

    /// Scheduler settings derived from this configuration
    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            batch_size: self.batch_size,
            ..Default::default()
        }
    }

    /// Transition policy derived from this configuration
    pub fn workflow_policy(&self) -> WorkflowPolicy {
        WorkflowPolicy {
            require_peer_review: self.require_peer_review,
        }
    }
}
