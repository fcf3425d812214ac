use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::models::pulls::{PullRequest, ReviewState};
use octocrab::params;
use octocrab::Octocrab;
use tracing::debug;

use super::errors::GitHubError;

/// The fields of a pull request the change workflow reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullSnapshot {
    pub number: u64,
    pub html_url: String,
    pub title: String,
    pub body: String,
    pub author_login: String,
    pub author_id: Option<u64>,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewVerdict {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRecord {
    pub reviewer: String,
    pub verdict: ReviewVerdict,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Code-host capability: repository-scoped pull request operations
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// `owner/name` of the repository
    fn repository(&self) -> &str;
    async fn pull_request(&self, number: u64) -> Result<PullSnapshot, GitHubError>;
    async fn reviews(&self, number: u64) -> Result<Vec<ReviewRecord>, GitHubError>;
    async fn add_label(&self, number: u64, label: &str) -> Result<(), GitHubError>;
    async fn remove_label(&self, number: u64, label: &str) -> Result<(), GitHubError>;
    async fn create_comment(&self, number: u64, body: &str) -> Result<(), GitHubError>;
    /// Closed pull requests against `base`, most recently updated first
    async fn recent_closed_pulls(&self, base: &str, limit: u8) -> Result<Vec<PullSnapshot>, GitHubError>;
}

#[derive(Debug)]
pub struct GitHubClient {
    octocrab: Octocrab,
    owner: String,
    repo: String,
    full_name: String,
}

impl GitHubClient {
    pub fn new(token: Option<&str>, repository: Option<&str>) -> Result<Self, GitHubError> {
        let token = token.filter(|t| !t.is_empty()).ok_or_else(|| {
            GitHubError::TokenNotFound("GITHUB_TOKEN not found in environment variables".to_string())
        })?;
        let (owner, repo) = Self::split_repository(repository)?;

        let octocrab = Octocrab::builder()
            .personal_token(token.to_string())
            .build()?;

        Ok(GitHubClient {
            octocrab,
            full_name: format!("{owner}/{repo}"),
            owner,
            repo,
        })
    }

    fn split_repository(repository: Option<&str>) -> Result<(String, String), GitHubError> {
        let repository = repository.filter(|r| !r.is_empty()).ok_or_else(|| {
            GitHubError::ConfigNotFound("GITHUB_REPOSITORY not found in environment variables".to_string())
        })?;
        match repository.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok((owner.to_string(), repo.to_string()))
            }
            _ => Err(GitHubError::ConfigNotFound(format!(
                "Repository '{repository}' is not in owner/name form"
            ))),
        }
    }
}

fn snapshot(pr: PullRequest) -> PullSnapshot {
    PullSnapshot {
        number: pr.number,
        html_url: pr.html_url.map(|url| url.to_string()).unwrap_or_default(),
        title: pr.title.unwrap_or_default(),
        body: pr.body.unwrap_or_default(),
        author_login: pr.user.as_ref().map(|u| u.login.clone()).unwrap_or_default(),
        author_id: pr.user.as_ref().map(|u| u.id.0),
        labels: pr
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|label| label.name)
            .collect(),
    }
}

fn verdict(state: Option<&ReviewState>) -> ReviewVerdict {
    match state {
        Some(ReviewState::Approved) => ReviewVerdict::Approved,
        Some(ReviewState::ChangesRequested) => ReviewVerdict::ChangesRequested,
        Some(ReviewState::Commented) => ReviewVerdict::Commented,
        Some(ReviewState::Dismissed) => ReviewVerdict::Dismissed,
        Some(ReviewState::Pending) => ReviewVerdict::Pending,
        _ => ReviewVerdict::Other,
    }
}

#[async_trait]
impl CodeHost for GitHubClient {
    fn repository(&self) -> &str {
        &self.full_name
    }

    async fn pull_request(&self, number: u64) -> Result<PullSnapshot, GitHubError> {
        let pr = self
            .octocrab
            .pulls(&self.owner, &self.repo)
            .get(number)
            .await?;
        Ok(snapshot(pr))
    }

    async fn reviews(&self, number: u64) -> Result<Vec<ReviewRecord>, GitHubError> {
        let page = self
            .octocrab
            .pulls(&self.owner, &self.repo)
            .list_reviews(number)
            .per_page(100)
            .send()
            .await?;

        Ok(page
            .items
            .into_iter()
            .filter_map(|review| {
                let reviewer = review.user.as_ref()?.login.clone();
                Some(ReviewRecord {
                    reviewer,
                    verdict: verdict(review.state.as_ref()),
                    submitted_at: review.submitted_at,
                })
            })
            .collect())
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<(), GitHubError> {
        self.octocrab
            .issues(&self.owner, &self.repo)
            .add_labels(number, &[label.to_string()])
            .await?;
        debug!(pr_number = number, label = %label, "Added label");
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<(), GitHubError> {
        self.octocrab
            .issues(&self.owner, &self.repo)
            .remove_label(number, label)
            .await?;
        debug!(pr_number = number, label = %label, "Removed label");
        Ok(())
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<(), GitHubError> {
        self.octocrab
            .issues(&self.owner, &self.repo)
            .create_comment(number, body)
            .await?;
        debug!(pr_number = number, "Created comment");
        Ok(())
    }

    async fn recent_closed_pulls(&self, base: &str, limit: u8) -> Result<Vec<PullSnapshot>, GitHubError> {
        let page = self
            .octocrab
            .pulls(&self.owner, &self.repo)
            .list()
            .state(params::State::Closed)
            .base(base)
            .sort(params::pulls::Sort::Updated)
            .direction(params::Direction::Descending)
            .per_page(limit)
            .send()
            .await?;

        Ok(page
            .items
            .into_iter()
            .take(usize::from(limit))
            .map(snapshot)
            .collect())
    }
}
