use chrono::{DateTime, Utc};
use reqwest::Url;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::FlowError;
use crate::jira::{IssueRecord, TicketClient};
use crate::status::IssueStatus;

/// Timestamp in the form the tracker's date-time fields accept
pub fn jira_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3f+0000").to_string()
}

/// A fetched change request plus the values derived from it
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRequest {
    record: IssueRecord,
    status: IssueStatus,
    browser_url: String,
}

fn browser_url(record: &IssueRecord) -> String {
    let Ok(url) = Url::parse(&record.self_url) else {
        return String::new();
    };
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{host}:{port}/browse/{}", url.scheme(), record.key),
        None => format!("{}://{host}/browse/{}", url.scheme(), record.key),
    }
}

impl ChangeRequest {
    pub fn from_record(record: IssueRecord) -> Self {
        let status = record
            .status_name()
            .map(IssueStatus::from_name)
            .unwrap_or(IssueStatus::Unknown);
        let browser_url = browser_url(&record);
        Self {
            record,
            status,
            browser_url,
        }
    }

    pub async fn fetch(tickets: &dyn TicketClient, key: &str) -> Result<Self, FlowError> {
        Ok(Self::from_record(tickets.get_issue(key).await?))
    }

    pub fn key(&self) -> &str {
        &self.record.key
    }

    pub fn status(&self) -> IssueStatus {
        self.status
    }

    /// Status exactly as the tracker names it
    pub fn status_name(&self) -> &str {
        self.record.status_name().unwrap_or_default()
    }

    pub fn browser_url(&self) -> &str {
        &self.browser_url
    }

    pub fn record(&self) -> &IssueRecord {
        &self.record
    }

    /// Value of a field by human name, e.g. `Proof_Of_Success`
    pub fn named_text<'r>(&'r self, tickets: &dyn TicketClient, name: &str) -> Option<&'r str> {
        let id = tickets.fields().lookup(name)?;
        self.record.text_field(id)
    }

    pub async fn refresh(&mut self, tickets: &dyn TicketClient) -> Result<(), FlowError> {
        let key = self.key().to_string();
        *self = Self::fetch(tickets, &key).await?;
        Ok(())
    }

    /// Set fields by human name. Unknown names fail before anything is sent.
    pub async fn update(&mut self, tickets: &dyn TicketClient, updates: &[(&str, Value)]) -> Result<(), FlowError> {
        let mut fields = Map::new();
        for (name, value) in updates {
            let id = tickets.fields().resolve(name, self.key())?;
            fields.insert(id.to_string(), value.clone());
        }
        debug!(issue_key = %self.key(), fields = ?fields.keys().collect::<Vec<_>>(), "Updating fields");

        tickets.update_fields(self.key(), fields.clone()).await?;
        self.record.fields.extend(fields);
        Ok(())
    }

    /// Append a line to a text field, newline-joined with its prior value
    pub async fn append(&mut self, tickets: &dyn TicketClient, name: &str, line: &str) -> Result<(), FlowError> {
        let value = match self.named_text(tickets, name) {
            Some(prior) if !prior.is_empty() => format!("{prior}\n{line}"),
            _ => line.to_string(),
        };
        self.update(tickets, &[(name, Value::String(value))]).await
    }

    /// Stamp a date-time field with `at`
    pub async fn stamp(&mut self, tickets: &dyn TicketClient, name: &str, at: DateTime<Utc>) -> Result<(), FlowError> {
        self.update(tickets, &[(name, Value::String(jira_timestamp(at)))])
            .await
    }
}
