pub mod client;
pub mod errors;
pub mod outputs;
pub mod pulls;

pub use client::{CodeHost, GitHubClient, PullSnapshot, ReviewRecord, ReviewVerdict};
pub use errors::GitHubError;
pub use outputs::write_step_outputs;
pub use pulls::{latest_approvals, scan_labels, PullRequestRef};
