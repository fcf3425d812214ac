//! Pull request references as the change workflow sees them.
//!
//! A change is either tied to a real pull request, or to a release that was
//! published without one. Both answer the same questions (URL, title, author,
//! labels); label and comment operations on a release are no-ops.

use std::collections::HashSet;

use tracing::debug;

use super::client::{CodeHost, PullSnapshot, ReviewRecord, ReviewVerdict};
use super::errors::GitHubError;
use crate::status::IssueStatus;

/// Ticket label and status label found on a pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelScan {
    pub issue_label: Option<String>,
    pub issue_status: IssueStatus,
}

/// Find the ticket-key label (first prefix in `prefixes` wins) and the
/// status label (the last label naming a status wins)
pub fn scan_labels<S: AsRef<str>>(labels: &[String], prefixes: &[S]) -> LabelScan {
    let issue_label = prefixes.iter().find_map(|prefix| {
        let wanted = format!("{}-", prefix.as_ref());
        labels.iter().find(|label| label.starts_with(&wanted)).cloned()
    });

    let issue_status = labels
        .iter()
        .filter_map(|label| label.parse::<IssueStatus>().ok())
        .last()
        .unwrap_or(IssueStatus::Unknown);

    LabelScan {
        issue_label,
        issue_status,
    }
}

/// Reviewers whose most recent review is an approval, newest first.
/// `excluded` (the automation identity) never counts.
pub fn latest_approvals(reviews: &[ReviewRecord], excluded: &str) -> Vec<String> {
    let mut ordered: Vec<&ReviewRecord> = reviews
        .iter()
        .filter(|review| review.reviewer != excluded)
        .collect();
    // newest first; reviews without a timestamp sort last
    ordered.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

    let mut seen = HashSet::new();
    ordered
        .into_iter()
        .filter(|review| seen.insert(review.reviewer.clone()))
        .filter(|review| review.verdict == ReviewVerdict::Approved)
        .map(|review| review.reviewer.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealPr {
    snapshot: PullSnapshot,
    prefixes: Vec<String>,
    scan: LabelScan,
}

/// Placeholder for a release deployed without a pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePr {
    pub tag: String,
    pub html_url: String,
    pub author_login: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestRef {
    Real(RealPr),
    Release(ReleasePr),
}

impl RealPr {
    pub fn new(snapshot: PullSnapshot, prefixes: &[String]) -> Self {
        let scan = scan_labels(&snapshot.labels, prefixes);
        Self {
            snapshot,
            prefixes: prefixes.to_vec(),
            scan,
        }
    }

    fn rescan(&mut self) {
        self.scan = scan_labels(&self.snapshot.labels, &self.prefixes);
    }
}

impl ReleasePr {
    pub fn new(repository: &str, tag: &str, author_login: &str) -> Self {
        let tag = tag.trim_start_matches("refs/tags/").to_string();
        Self {
            html_url: format!("https://github.com/{repository}/releases/tag/{tag}"),
            tag,
            author_login: author_login.to_string(),
        }
    }
}

impl PullRequestRef {
    pub fn real(snapshot: PullSnapshot, prefixes: &[String]) -> Self {
        PullRequestRef::Real(RealPr::new(snapshot, prefixes))
    }

    pub fn release(repository: &str, tag: &str, author_login: &str) -> Self {
        PullRequestRef::Release(ReleasePr::new(repository, tag, author_login))
    }

    /// Fetch a pull request and, unless `skip_label_validation`, insist it
    /// carries a ticket label
    pub async fn fetch(
        host: &dyn CodeHost,
        number: u64,
        prefixes: &[String],
        skip_label_validation: bool,
    ) -> Result<Self, GitHubError> {
        let pr = RealPr::new(host.pull_request(number).await?, prefixes);
        if skip_label_validation {
            debug!(pr_number = number, "Skipping label validation");
        } else if pr.scan.issue_label.is_none() {
            return Err(GitHubError::MissingTicketLabel {
                pr_number: number,
                prefixes: prefixes.to_vec(),
            });
        }
        Ok(PullRequestRef::Real(pr))
    }

    pub fn number(&self) -> Option<u64> {
        match self {
            PullRequestRef::Real(pr) => Some(pr.snapshot.number),
            PullRequestRef::Release(_) => None,
        }
    }

    pub fn html_url(&self) -> &str {
        match self {
            PullRequestRef::Real(pr) => &pr.snapshot.html_url,
            PullRequestRef::Release(release) => &release.html_url,
        }
    }

    pub fn title(&self) -> String {
        match self {
            PullRequestRef::Real(pr) => pr.snapshot.title.clone(),
            PullRequestRef::Release(release) => format!("Release {}", release.tag),
        }
    }

    pub fn body(&self) -> String {
        match self {
            PullRequestRef::Real(pr) => pr.snapshot.body.clone(),
            PullRequestRef::Release(release) => {
                format!("Deployment of release {} [{}|{}]", release.tag, release.html_url, release.html_url)
            }
        }
    }

    pub fn author_login(&self) -> &str {
        match self {
            PullRequestRef::Real(pr) => &pr.snapshot.author_login,
            PullRequestRef::Release(release) => &release.author_login,
        }
    }

    pub fn issue_label(&self) -> Option<&str> {
        match self {
            PullRequestRef::Real(pr) => pr.scan.issue_label.as_deref(),
            PullRequestRef::Release(_) => None,
        }
    }

    /// Prefix of the ticket label, e.g. `ITSM` for `ITSM-101`
    pub fn issue_prefix(&self) -> Option<&str> {
        self.issue_label()
            .and_then(|label| label.split('-').next())
    }

    /// Status the labels currently reflect
    pub fn issue_status(&self) -> IssueStatus {
        match self {
            PullRequestRef::Real(pr) => pr.scan.issue_status,
            PullRequestRef::Release(_) => IssueStatus::Unknown,
        }
    }

    /// Short human description for logs, e.g. `PR #12` or `release v1.4.0`
    pub fn describe(&self) -> String {
        match self {
            PullRequestRef::Real(pr) => format!("PR #{}", pr.snapshot.number),
            PullRequestRef::Release(release) => format!("release {}", release.tag),
        }
    }

    /// First line of a change request description, in wiki markup
    pub fn reference_line(&self) -> String {
        let url = self.html_url();
        match self {
            PullRequestRef::Real(pr) => format!("Pull Request #{} [{url}|{url}]", pr.snapshot.number),
            PullRequestRef::Release(release) => format!("Release {} [{url}|{url}]", release.tag),
        }
    }

    /// Logins whose latest review approves, excluding `excluded`
    pub async fn approver_logins(&self, host: &dyn CodeHost, excluded: &str) -> Result<Vec<String>, GitHubError> {
        match self {
            PullRequestRef::Real(pr) => {
                let reviews = host.reviews(pr.snapshot.number).await?;
                Ok(latest_approvals(&reviews, excluded))
            }
            PullRequestRef::Release(_) => Ok(Vec::new()),
        }
    }

    pub async fn add_label(&mut self, host: &dyn CodeHost, label: &str) -> Result<(), GitHubError> {
        let PullRequestRef::Real(pr) = self else {
            debug!(label = %label, "Release has no pull request to label");
            return Ok(());
        };
        if label.is_empty() || pr.snapshot.labels.iter().any(|l| l == label) {
            return Ok(());
        }
        host.add_label(pr.snapshot.number, label).await?;
        pr.snapshot.labels.push(label.to_string());
        pr.rescan();
        Ok(())
    }

    pub async fn remove_label(&mut self, host: &dyn CodeHost, label: &str) -> Result<(), GitHubError> {
        let PullRequestRef::Real(pr) = self else {
            debug!(label = %label, "Release has no pull request to unlabel");
            return Ok(());
        };
        if !pr.snapshot.labels.iter().any(|l| l == label) {
            return Ok(());
        }
        host.remove_label(pr.snapshot.number, label).await?;
        pr.snapshot.labels.retain(|l| l != label);
        pr.rescan();
        Ok(())
    }

    /// Replace the status label the PR reflects with `status`
    pub async fn swap_status_label(&mut self, host: &dyn CodeHost, from: IssueStatus, to: IssueStatus) -> Result<(), GitHubError> {
        if from != IssueStatus::Unknown {
            self.remove_label(host, from.as_str()).await?;
        }
        self.add_label(host, to.as_str()).await
    }

    pub async fn create_comment(&self, host: &dyn CodeHost, text: &str) -> Result<(), GitHubError> {
        match self {
            PullRequestRef::Real(pr) => host.create_comment(pr.snapshot.number, text).await,
            PullRequestRef::Release(release) => {
                debug!(release = %release.tag, "Release has no pull request to comment on");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn prefixes() -> Vec<String> {
        vec!["ITSM".to_string(), "ITPOC".to_string()]
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn review(reviewer: &str, verdict: ReviewVerdict, at: i64) -> ReviewRecord {
        ReviewRecord {
            reviewer: reviewer.to_string(),
            verdict,
            submitted_at: Some(Utc.timestamp_opt(at, 0).unwrap()),
        }
    }

    #[test]
    fn test_scan_prefers_first_prefix() {
        let scan = scan_labels(&labels(&["ITPOC-9", "bug", "ITSM-101"]), &prefixes());
        assert_eq!(scan.issue_label.as_deref(), Some("ITSM-101"));

        let scan = scan_labels(&labels(&["ITPOC-9"]), &prefixes());
        assert_eq!(scan.issue_label.as_deref(), Some("ITPOC-9"));

        let scan = scan_labels(&labels(&["ITSMX-1", "enhancement"]), &prefixes());
        assert_eq!(scan.issue_label, None);
    }

    #[test]
    fn test_scan_status_last_wins() {
        let scan = scan_labels(
            &labels(&["Awaiting Implementation", "ITSM-5", "Implementing"]),
            &prefixes(),
        );
        assert_eq!(scan.issue_status, IssueStatus::Implementing);

        let scan = scan_labels(&labels(&["ITSM-5"]), &prefixes());
        assert_eq!(scan.issue_status, IssueStatus::Unknown);
    }

    #[test]
    fn test_latest_review_per_reviewer_wins() {
        let reviews = vec![
            review("r1", ReviewVerdict::Approved, 2),
            review("r1", ReviewVerdict::ChangesRequested, 3),
            review("r2", ReviewVerdict::Approved, 1),
        ];
        assert_eq!(latest_approvals(&reviews, "github-actions[bot]"), vec!["r2"]);
    }

    #[test]
    fn test_automation_identity_never_approves() {
        let reviews = vec![
            review("github-actions[bot]", ReviewVerdict::Approved, 5),
            review("r2", ReviewVerdict::Commented, 1),
            review("r2", ReviewVerdict::Approved, 4),
        ];
        assert_eq!(latest_approvals(&reviews, "github-actions[bot]"), vec!["r2"]);
    }

    #[test]
    fn test_release_placeholder() {
        let release = PullRequestRef::release("acme/payments", "refs/tags/v1.4.0", "deployer");
        assert_eq!(release.number(), None);
        assert_eq!(release.html_url(), "https://github.com/acme/payments/releases/tag/v1.4.0");
        assert_eq!(release.title(), "Release v1.4.0");
        assert_eq!(release.issue_label(), None);
        assert_eq!(release.issue_status(), IssueStatus::Unknown);
        assert_eq!(
            release.reference_line(),
            "Release v1.4.0 [https://github.com/acme/payments/releases/tag/v1.4.0|https://github.com/acme/payments/releases/tag/v1.4.0]"
        );
    }

    #[test]
    fn test_real_pr_accessors() {
        let pr = PullRequestRef::real(
            PullSnapshot {
                number: 12,
                html_url: "https://github.com/acme/payments/pull/12".to_string(),
                title: "Add refunds".to_string(),
                author_login: "dev".to_string(),
                labels: labels(&["ITSM-101", "Implementing"]),
                ..Default::default()
            },
            &prefixes(),
        );
        assert_eq!(pr.number(), Some(12));
        assert_eq!(pr.issue_prefix(), Some("ITSM"));
        assert_eq!(pr.issue_status(), IssueStatus::Implementing);
        assert_eq!(pr.describe(), "PR #12");
        assert_eq!(
            pr.reference_line(),
            "Pull Request #12 [https://github.com/acme/payments/pull/12|https://github.com/acme/payments/pull/12]"
        );
    }
}
