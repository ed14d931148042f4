use std::fmt;

use prscope_core::{compute_review_hash, ChangedFile, PrscopeConfig, PrscopeError, ReviewResult};
use prscope_difflens::budget::prepare_filtered;
use prscope_difflens::filter::DiffFilter;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::llm::{create_provider, ChatProvider};
use crate::prompt::build_prompt;
use crate::render::{render_comment, render_fallback_comment};
use crate::schema::parse_review_text;

/// Why a run ended without calling the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptyReason {
    /// The pull request changed no files.
    NoFiles,
    /// Every changed file was noise or matched a skip pattern.
    AllFiltered,
}

impl EmptyReason {
    /// Summary shown in the nothing-to-review comment.
    pub fn summary(self) -> &'static str {
        match self {
            EmptyReason::NoFiles => "This PR has no reviewable file changes.",
            EmptyReason::AllFiltered => {
                "All changed files were filtered out (lockfiles, build artifacts, binaries). Nothing to review."
            }
        }
    }
}

/// Terminal state of a review run.
///
/// # Examples
///
/// ```
/// use prscope_review::pipeline::ReviewOutcome;
///
/// let outcome = ReviewOutcome::Fallback {
///     reason: "Model call failed: timeout".into(),
/// };
/// assert!(outcome.review().is_none());
/// assert!(outcome.render().contains("**Reason:** Model call failed: timeout"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReviewOutcome {
    /// Nothing was sent to the model.
    NothingToReview {
        reason: EmptyReason,
        result: ReviewResult,
    },
    /// The model answered with a valid review.
    Reviewed(ReviewResult),
    /// The model call failed or its answer did not validate.
    Fallback { reason: String },
}

impl ReviewOutcome {
    fn nothing_to_review(reason: EmptyReason) -> Self {
        ReviewOutcome::NothingToReview {
            reason,
            result: ReviewResult::empty(reason.summary()),
        }
    }

    /// The structured review, when there is one.
    pub fn review(&self) -> Option<&ReviewResult> {
        match self {
            ReviewOutcome::NothingToReview { result, .. } | ReviewOutcome::Reviewed(result) => {
                Some(result)
            }
            ReviewOutcome::Fallback { .. } => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ReviewOutcome::Fallback { .. })
    }

    /// The PR comment body for this outcome.
    pub fn render(&self) -> String {
        match self {
            ReviewOutcome::NothingToReview { result, .. } | ReviewOutcome::Reviewed(result) => {
                render_comment(result)
            }
            ReviewOutcome::Fallback { reason } => render_fallback_comment(reason),
        }
    }
}

/// Statistics about a review run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    /// Changed files handed to the pipeline.
    pub files_received: usize,
    /// Files whose diffs were sent to the model.
    pub files_selected: usize,
    /// Files dropped as noise or by a skip pattern.
    pub files_skipped: usize,
    /// Reviewable files dropped by the file limit.
    pub files_over_limit: usize,
    /// Patch bytes sent, truncation markers included.
    pub total_bytes: usize,
    /// Diffs cut to fit the per-file budget.
    pub truncated: usize,
    /// Model identifier used for the review.
    pub model: String,
    /// Fingerprint of the prompt diff and review settings; absent when the
    /// model was not called.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_hash: Option<String>,
}

/// Outcome plus statistics of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReport {
    pub outcome: ReviewOutcome,
    pub stats: ReviewStats,
}

impl ReviewReport {
    /// The rendered PR comment.
    pub fn comment(&self) -> String {
        self.outcome.render()
    }
}

/// Review orchestrator that drives the full review pipeline.
///
/// Filters and budgets the changed files, builds the prompt, makes a single
/// model call, and validates the answer. Every failure past input selection
/// becomes a [`ReviewOutcome::Fallback`], so a run always yields a comment.
/// That includes a provider that could not be built (for example a missing
/// API key): it only matters once there is something to send.
pub struct ReviewPipeline {
    provider: Result<Box<dyn ChatProvider>, PrscopeError>,
    config: PrscopeConfig,
    filter: DiffFilter,
}

impl ReviewPipeline {
    /// Create a pipeline; skip patterns come from `config`.
    pub fn new(provider: Box<dyn ChatProvider>, config: PrscopeConfig) -> Self {
        Self::with_provider(Ok(provider), config)
    }

    /// Create a pipeline whose provider is built from `config` by
    /// [`create_provider`]. A construction error is kept and reported as a
    /// fallback by [`ReviewPipeline::run`].
    pub fn from_config(config: PrscopeConfig) -> Self {
        let provider = create_provider(&config);
        if let Err(e) = &provider {
            debug!(error = %e, "provider unavailable");
        }
        Self::with_provider(provider, config)
    }

    fn with_provider(
        provider: Result<Box<dyn ChatProvider>, PrscopeError>,
        config: PrscopeConfig,
    ) -> Self {
        let filter = DiffFilter::from_config(&config);
        Self {
            provider,
            config,
            filter,
        }
    }

    /// Replace the file filter.
    pub fn with_filter(mut self, filter: DiffFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn config(&self) -> &PrscopeConfig {
        &self.config
    }

    /// Review `files` and produce the comment outcome.
    pub async fn run(&self, files: &[ChangedFile]) -> ReviewReport {
        let mut stats = ReviewStats {
            files_received: files.len(),
            model: match &self.provider {
                Ok(provider) => provider.model().to_string(),
                Err(_) => self.config.model.clone(),
            },
            ..ReviewStats::default()
        };

        if files.is_empty() {
            debug!("no changed files");
            return ReviewReport {
                outcome: ReviewOutcome::nothing_to_review(EmptyReason::NoFiles),
                stats,
            };
        }

        let prepared = prepare_filtered(
            &self.filter,
            files,
            self.config.max_files,
            self.config.max_diff_bytes,
        );
        stats.files_selected = prepared.len();
        stats.files_skipped = prepared.skipped.len();
        stats.files_over_limit = prepared.over_limit;
        stats.total_bytes = prepared.total_bytes;
        stats.truncated = prepared.truncated_count();

        for skipped in &prepared.skipped {
            debug!(file = %skipped.filename, reason = %skipped.reason, "skipped");
        }

        if prepared.is_empty() {
            debug!(skipped = stats.files_skipped, "all files filtered");
            return ReviewReport {
                outcome: ReviewOutcome::nothing_to_review(EmptyReason::AllFiltered),
                stats,
            };
        }

        info!(
            selected = stats.files_selected,
            skipped = stats.files_skipped,
            over_limit = stats.files_over_limit,
            bytes = stats.total_bytes,
            truncated = stats.truncated,
            "prepared diffs"
        );

        let messages = build_prompt(&prepared.diffs, self.config.profile);
        stats.review_hash = Some(compute_review_hash(&messages[1].content, &self.config));
        debug!(hash = ?stats.review_hash, "prompt built");

        let provider = match &self.provider {
            Ok(provider) => provider,
            Err(e) => {
                warn!(error = %e, "no model provider");
                return ReviewReport {
                    outcome: ReviewOutcome::Fallback {
                        reason: format!("Model call failed: {e}"),
                    },
                    stats,
                };
            }
        };

        let raw = match provider.chat(&messages).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "model call failed");
                return ReviewReport {
                    outcome: ReviewOutcome::Fallback {
                        reason: format!("Model call failed: {e}"),
                    },
                    stats,
                };
            }
        };
        debug!(bytes = raw.len(), "model responded");

        let outcome = match parse_review_text(&raw) {
            Ok(result) => {
                info!(
                    risk = %result.overall_risk,
                    findings = result.findings.len(),
                    "review validated"
                );
                ReviewOutcome::Reviewed(result)
            }
            Err(e) => {
                warn!(error = %e, "model response failed validation");
                ReviewOutcome::Fallback {
                    reason: format!("Schema validation failed: {e}"),
                }
            }
        };

        ReviewReport { outcome, stats }
    }
}

impl fmt::Display for ReviewReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Review Results")?;
        writeln!(f, "==============")?;
        writeln!(
            f,
            "Model: {} | Files: {}/{} (skipped: {}, over limit: {}) | Bytes: {} | Truncated: {}\n",
            self.stats.model,
            self.stats.files_selected,
            self.stats.files_received,
            self.stats.files_skipped,
            self.stats.files_over_limit,
            self.stats.total_bytes,
            self.stats.truncated,
        )?;

        let result = match &self.outcome {
            ReviewOutcome::Fallback { reason } => {
                return writeln!(f, "No structured review: {reason}");
            }
            ReviewOutcome::NothingToReview { result, .. } | ReviewOutcome::Reviewed(result) => {
                result
            }
        };

        writeln!(f, "Risk: {}", result.overall_risk)?;
        writeln!(f, "{}\n", result.summary)?;

        if result.findings.is_empty() {
            writeln!(f, "No issues found.")?;
        } else {
            for finding in &result.findings {
                writeln!(
                    f,
                    "[{}] {} {} ({:.0}%)",
                    finding.severity.as_str().to_uppercase(),
                    finding.location(),
                    finding.title,
                    finding.confidence * 100.0
                )?;
                writeln!(f, "  {}", finding.message)?;
                if !finding.suggestion.is_empty() {
                    writeln!(f, "  Suggestion: {}", finding.suggestion)?;
                }
                writeln!(f)?;
            }
        }

        for item in &result.praise {
            writeln!(f, "+ {item}")?;
        }
        Ok(())
    }
}
