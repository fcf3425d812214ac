use thiserror::Error;

/// Failures talking to the Jira / Service Management REST APIs
#[derive(Debug, Error)]
pub enum JiraError {
    #[error("JSM credentials missing: {0}")]
    CredentialsMissing(String),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Jira returned HTTP {status} for {method} {url}: {body}")]
    Api {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("could not decode Jira response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("Service Desk with project name '{0}' not found")]
    ServiceDeskNotFound(String),

    #[error("Request Type '{request_type}' not found in Service Desk '{service_desk}'")]
    RequestTypeNotFound {
        request_type: String,
        service_desk: String,
    },
}

impl JiraError {
    /// The tracker answered 404 for the resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, JiraError::Api { status: 404, .. })
    }
}
