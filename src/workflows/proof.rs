//! Proof-of-success gathering for completed deployments.
//!
//! Each input line names a URL plus optional headers, curl style:
//! `[-H "Key: value"]... url`. Every URL is fetched; the first one that
//! answers becomes the attachment, and all of them are listed on the request.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::request::ChangeRequest;
use super::ChangeWorkflow;
use crate::errors::FlowError;
use crate::jira::TemporaryAttachment;

pub const PROOF_USAGE: &str = "Error: Invalid input format on PROOF_OF_SUCCESS. Usage (per line): [-H \"key: value\"]... url\n\
Examples:\n\
\x20 https://example.com/proof.json\n\
\x20 -H \"Authorization: Bearer token_value\" https://example.com/proof.json";

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true, disable_version_flag = true)]
struct ProofLineArgs {
    #[arg(short = 'H', long = "header")]
    header: Vec<String>,
    url: String,
}

/// One proof URL with the headers to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofSpec {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// Split a line into words the way a POSIX shell would, honouring single
/// quotes, double quotes and backslash escapes
fn split_words(line: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '\'' => break,
                        other => current.push(other),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '"' => break,
                        '\\' => match chars.next()? {
                            escaped @ ('"' | '\\' | '$' | '`') => current.push(escaped),
                            other => {
                                current.push('\\');
                                current.push(other);
                            }
                        },
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_word = true;
                current.push(chars.next()?);
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Some(words)
}

impl ProofSpec {
    fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }
}

impl FromStr for ProofSpec {
    type Err = FlowError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let usage = || FlowError::InvalidProofLine(PROOF_USAGE.to_string());
        let words = split_words(line).ok_or_else(usage)?;
        let args = ProofLineArgs::try_parse_from(words).map_err(|_| usage())?;

        let mut spec = ProofSpec {
            url: args.url,
            headers: vec![("Cache-Control".to_string(), "no-cache".to_string())],
        };
        for header in &args.header {
            let (name, value) = header.split_once(':').ok_or_else(usage)?;
            spec.set_header(name.trim(), value.trim());
        }
        Ok(spec)
    }
}

/// Parse every non-blank line; the first malformed line fails the batch
pub fn parse_proof_lines<S: AsRef<str>>(lines: &[S]) -> Result<Vec<ProofSpec>, FlowError> {
    let mut specs = Vec::new();
    for line in lines {
        let line: &str = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }
        specs.push(line.parse()?);
    }
    Ok(specs)
}

/// Attachment name for a fetched URL: its last path segment, or a
/// timestamped fallback
pub fn proof_filename(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("download-{}", Utc::now().timestamp()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedProof {
    pub url: String,
    pub content: Vec<u8>,
    pub content_type: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to fetch proof from {url}: {reason}")]
pub struct ProofFetchError {
    pub url: String,
    pub reason: String,
}

/// Capability to download one proof URL
#[async_trait]
pub trait ProofFetcher: Send + Sync {
    async fn fetch(&self, spec: &ProofSpec) -> Result<FetchedProof, ProofFetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpProofFetcher {
    http: reqwest::Client,
}

impl HttpProofFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FlowError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FlowError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ProofFetcher for HttpProofFetcher {
    async fn fetch(&self, spec: &ProofSpec) -> Result<FetchedProof, ProofFetchError> {
        let failed = |e: reqwest::Error| ProofFetchError {
            url: spec.url.clone(),
            reason: e.to_string(),
        };

        let mut request = self.http.get(&spec.url);
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(failed)?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let content = response.bytes().await.map_err(failed)?.to_vec();

        Ok(FetchedProof {
            url: spec.url.clone(),
            content,
            content_type,
            filename: proof_filename(&spec.url),
        })
    }
}

/// Result of fetching every proof URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofBundle {
    /// One wiki link per URL, reachable or not
    pub lines: Vec<String>,
    /// First successful download
    pub attachment: Option<FetchedProof>,
}

impl ProofBundle {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Fetch every spec in order, keeping the first success
pub async fn collect_proof(fetcher: &dyn ProofFetcher, specs: &[ProofSpec]) -> ProofBundle {
    let mut bundle = ProofBundle::default();
    for spec in specs {
        bundle.lines.push(format!("[{0}|{0}]", spec.url));
        debug!(url = %spec.url, headers = ?spec.headers, "Fetching proof of deployment");
        match fetcher.fetch(spec).await {
            Ok(fetched) => {
                if bundle.attachment.is_none() {
                    bundle.attachment = Some(fetched);
                }
            }
            Err(e) => warn!(url = %spec.url, "{e}"),
        }
    }
    bundle
}

impl ChangeWorkflow<'_> {
    /// Upload the bundle's attachment to the service desk. Fails when no
    /// proof URL was reachable.
    pub async fn stage_proof(&self, request: &ChangeRequest, bundle: &ProofBundle) -> Result<TemporaryAttachment, FlowError> {
        let Some(proof) = bundle.attachment.as_ref() else {
            return Err(FlowError::NoProofReachable {
                issue_key: request.key().to_string(),
            });
        };

        if self.dry_run().would(&[format!(
            "attach proof of deployment from {} to issue {} (content_type: {}, filename: {})",
            proof.url,
            request.key(),
            proof.content_type,
            proof.filename
        )]) {
            return Ok(TemporaryAttachment {
                temporary_attachment_id: "dry-run-id".to_string(),
                file_name: proof.filename.clone(),
            });
        }

        let attachment = self
            .tickets
            .upload_temporary_attachment(proof.content.clone(), &proof.content_type, &proof.filename)
            .await?;
        info!(issue_key = %request.key(), filename = %attachment.file_name, "Staged proof of deployment");
        Ok(attachment)
    }
}
