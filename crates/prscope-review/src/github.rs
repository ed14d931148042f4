use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use prscope_core::{ChangedFile, FileStatus, Finding, PrscopeError, COMMENT_MARKER};
use prscope_difflens::parser::patches_by_path;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::render::render_inline_finding;

const API_BASE: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;

/// A pull request on GitHub.
///
/// # Examples
///
/// ```
/// use prscope_review::github::PullRequestRef;
///
/// let pr = PullRequestRef::parse("rust-lang/rust#12345").unwrap();
/// assert_eq!(pr.owner, "rust-lang");
/// assert_eq!(pr.repo, "rust");
/// assert_eq!(pr.number, 12345);
/// assert_eq!(pr.to_string(), "rust-lang/rust#12345");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    /// Parse `owner/repo#number`.
    ///
    /// # Errors
    ///
    /// Returns [`PrscopeError::Config`] if the format is invalid.
    pub fn parse(pr_ref: &str) -> Result<Self, PrscopeError> {
        let invalid = || {
            PrscopeError::Config(format!(
                "invalid PR reference '{pr_ref}', expected owner/repo#number"
            ))
        };
        let (owner_repo, number_str) = pr_ref.split_once('#').ok_or_else(invalid)?;
        let (owner, repo) = split_repository(owner_repo).ok_or_else(invalid)?;
        let number: u64 = number_str
            .parse()
            .map_err(|_| PrscopeError::Config(format!("invalid PR number: {number_str}")))?;
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }

    /// The pull request that triggered the current GitHub Actions run.
    ///
    /// Reads `GITHUB_REPOSITORY` and the event payload at `GITHUB_EVENT_PATH`.
    /// Returns `Ok(None)` outside Actions or for events that are not about a
    /// pull request.
    ///
    /// # Errors
    ///
    /// Returns an error if the event payload cannot be read or parsed.
    pub fn from_actions_env() -> Result<Option<Self>, PrscopeError> {
        let (Ok(repository), Ok(event_path)) = (
            std::env::var("GITHUB_REPOSITORY"),
            std::env::var("GITHUB_EVENT_PATH"),
        ) else {
            return Ok(None);
        };
        let path = Path::new(&event_path);
        if !path.exists() {
            return Err(PrscopeError::FileNotFound(path.to_path_buf()));
        }
        let event: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        Self::from_event(&repository, &event)
    }

    /// Build a reference from an Actions repository slug and event payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use prscope_review::github::PullRequestRef;
    ///
    /// let event = serde_json::json!({ "pull_request": { "number": 7 } });
    /// let pr = PullRequestRef::from_event("octocat/hello-world", &event).unwrap().unwrap();
    /// assert_eq!(pr.number, 7);
    ///
    /// let push = serde_json::json!({ "ref": "refs/heads/main" });
    /// assert!(PullRequestRef::from_event("octocat/hello-world", &push).unwrap().is_none());
    /// ```
    pub fn from_event(
        repository: &str,
        event: &serde_json::Value,
    ) -> Result<Option<Self>, PrscopeError> {
        let Some(number) = event
            .get("pull_request")
            .and_then(|pr| pr.get("number"))
            .and_then(|n| n.as_u64())
        else {
            return Ok(None);
        };
        let (owner, repo) = split_repository(repository).ok_or_else(|| {
            PrscopeError::Config(format!(
                "invalid GITHUB_REPOSITORY '{repository}', expected owner/repo"
            ))
        })?;
        Ok(Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        }))
    }

    fn route(&self, suffix: &str) -> String {
        format!("/repos/{}/{}{suffix}", self.owner, self.repo)
    }
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

fn split_repository(slug: &str) -> Option<(&str, &str)> {
    let (owner, repo) = slug.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner, repo))
}

/// What [`GitHubClient::upsert_comment`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Created(u64),
    Updated(u64),
}

#[derive(Serialize)]
struct PageQuery {
    per_page: u32,
    page: u32,
}

#[derive(Deserialize)]
struct IssueComment {
    id: u64,
    body: Option<String>,
    user: Option<CommentAuthor>,
}

#[derive(Deserialize)]
struct CommentAuthor {
    login: String,
}

/// GitHub client for reading PR files and writing the review comment.
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    token: String,
}

impl GitHubClient {
    /// Create a client from an explicit token or the `GITHUB_TOKEN` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`PrscopeError::Config`] if no token is available, or
    /// [`PrscopeError::GitHub`] if the client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use prscope_review::github::GitHubClient;
    ///
    /// let client = GitHubClient::new(Some("ghp_xxxx")).unwrap();
    /// ```
    pub fn new(token: Option<&str>) -> Result<Self, PrscopeError> {
        let token = match token {
            Some(t) => t.to_string(),
            None => std::env::var("GITHUB_TOKEN").map_err(|_| {
                PrscopeError::Config(
                    "GITHUB_TOKEN not set. Export a token that can read and comment on pull requests".into(),
                )
            })?,
        };

        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token.clone())
            .build()
            .map_err(|e| PrscopeError::GitHub(format!("failed to create GitHub client: {e}")))?;

        Ok(Self {
            octocrab,
            http: reqwest::Client::new(),
            token,
        })
    }

    /// List every changed file of a pull request.
    ///
    /// Pages through the files API 100 at a time. Files other than removals
    /// that come back without a patch are filled in from the PR's unified
    /// diff; if that also lacks them `patch` stays `None` and the budget stage
    /// substitutes its "patch unavailable" placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`PrscopeError::GitHub`] on API errors while listing files.
    pub async fn list_changed_files(
        &self,
        pr: &PullRequestRef,
    ) -> Result<Vec<ChangedFile>, PrscopeError> {
        let route = pr.route(&format!("/pulls/{}/files", pr.number));
        let mut files: Vec<ChangedFile> = Vec::new();
        let mut page = 1;

        loop {
            let query = PageQuery {
                per_page: PER_PAGE,
                page,
            };
            let batch: Vec<ChangedFile> = self
                .octocrab
                .get(&route, Some(&query))
                .await
                .map_err(|e| PrscopeError::GitHub(format!("failed to list PR files: {e}")))?;
            let len = batch.len();
            files.extend(batch);
            if len < PER_PAGE as usize {
                break;
            }
            page += 1;
        }
        debug!(pr = %pr, files = files.len(), "listed changed files");

        if files.iter().any(needs_backfill) {
            match self.get_pr_diff(pr).await {
                Ok(diff) => backfill_patches(&mut files, &patches_by_path(&diff)),
                Err(e) => warn!(error = %e, "could not fetch PR diff for missing patches"),
            }
        }

        Ok(files)
    }

    /// Fetch the unified diff for a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`PrscopeError::GitHub`] on network or API errors.
    pub async fn get_pr_diff(&self, pr: &PullRequestRef) -> Result<String, PrscopeError> {
        let url = format!("{API_BASE}{}", pr.route(&format!("/pulls/{}", pr.number)));

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github.v3.diff")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "prscope")
            .send()
            .await
            .map_err(|e| PrscopeError::GitHub(format!("failed to fetch PR diff: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PrscopeError::GitHub(format!("GitHub API error {status}: {body}")));
        }

        response
            .text()
            .await
            .map_err(|e| PrscopeError::GitHub(format!("failed to read diff response: {e}")))
    }

    /// Create the PRScope comment, or update the one posted on an earlier run.
    ///
    /// An earlier comment is one containing [`COMMENT_MARKER`] written by the
    /// authenticated user. When the user cannot be determined, any marked
    /// comment counts.
    ///
    /// # Errors
    ///
    /// Returns [`PrscopeError::GitHub`] on API errors.
    pub async fn upsert_comment(
        &self,
        pr: &PullRequestRef,
        body: &str,
    ) -> Result<CommentAction, PrscopeError> {
        let login = self.authenticated_login().await;
        let comments = self.list_issue_comments(pr).await?;
        let payload = serde_json::json!({ "body": body });

        if let Some(id) = find_marked_comment(&comments, login.as_deref()) {
            let _response: serde_json::Value = self
                .octocrab
                .patch(pr.route(&format!("/issues/comments/{id}")), Some(&payload))
                .await
                .map_err(|e| PrscopeError::GitHub(format!("failed to update comment: {e}")))?;
            return Ok(CommentAction::Updated(id));
        }

        let created: IssueComment = self
            .octocrab
            .post(pr.route(&format!("/issues/{}/comments", pr.number)), Some(&payload))
            .await
            .map_err(|e| PrscopeError::GitHub(format!("failed to create comment: {e}")))?;
        Ok(CommentAction::Created(created.id))
    }

    /// Post one review with a line comment for each finding that has a location.
    ///
    /// Returns how many line comments were posted; nothing is sent when no
    /// finding has a line.
    ///
    /// # Errors
    ///
    /// Returns [`PrscopeError::GitHub`] on API errors.
    pub async fn post_inline_findings(
        &self,
        pr: &PullRequestRef,
        findings: &[Finding],
    ) -> Result<usize, PrscopeError> {
        let comments = inline_comments(findings);
        if comments.is_empty() {
            return Ok(0);
        }
        let count = comments.len();

        let body = serde_json::json!({
            "event": "COMMENT",
            "body": "PRScope line comments",
            "comments": comments,
        });
        let _response: serde_json::Value = self
            .octocrab
            .post(pr.route(&format!("/pulls/{}/reviews", pr.number)), Some(&body))
            .await
            .map_err(|e| PrscopeError::GitHub(format!("failed to post review: {e}")))?;

        Ok(count)
    }

    async fn authenticated_login(&self) -> Option<String> {
        match self
            .octocrab
            .get::<CommentAuthor, _, ()>("/user", None::<&()>)
            .await
        {
            Ok(user) => Some(user.login),
            Err(e) => {
                debug!(error = %e, "could not resolve authenticated user");
                None
            }
        }
    }

    async fn list_issue_comments(
        &self,
        pr: &PullRequestRef,
    ) -> Result<Vec<IssueComment>, PrscopeError> {
        let route = pr.route(&format!("/issues/{}/comments", pr.number));
        let mut comments = Vec::new();
        let mut page = 1;
        loop {
            let query = PageQuery {
                per_page: PER_PAGE,
                page,
            };
            let batch: Vec<IssueComment> = self
                .octocrab
                .get(&route, Some(&query))
                .await
                .map_err(|e| PrscopeError::GitHub(format!("failed to list comments: {e}")))?;
            let len = batch.len();
            comments.extend(batch);
            if len < PER_PAGE as usize {
                break;
            }
            page += 1;
        }
        Ok(comments)
    }
}

fn needs_backfill(file: &ChangedFile) -> bool {
    file.patch.is_none() && file.status != FileStatus::Removed
}

fn backfill_patches(files: &mut [ChangedFile], patches: &HashMap<String, String>) {
    for file in files.iter_mut().filter(|f| needs_backfill(f)) {
        if let Some(patch) = patches.get(&file.filename) {
            debug!(file = %file.filename, "backfilled patch from PR diff");
            file.patch = Some(patch.clone());
        }
    }
}

fn find_marked_comment(comments: &[IssueComment], login: Option<&str>) -> Option<u64> {
    comments
        .iter()
        .find(|c| {
            let marked = c.body.as_deref().is_some_and(|b| b.contains(COMMENT_MARKER));
            let by_us = match login {
                Some(login) => c.user.as_ref().is_some_and(|u| u.login == login),
                None => true,
            };
            marked && by_us
        })
        .map(|c| c.id)
}

fn inline_comments(findings: &[Finding]) -> Vec<serde_json::Value> {
    findings
        .iter()
        .filter(|f| !f.file.is_empty())
        .filter_map(|f| {
            let line = f.line.filter(|l| *l > 0)?;
            Some(serde_json::json!({
                "path": f.file,
                "line": line,
                "side": "RIGHT",
                "body": render_inline_finding(f),
            }))
        })
        .collect()
}
