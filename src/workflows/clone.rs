//! Cloning a template request into a new change request for a pull request.

use std::sync::OnceLock;

use chrono::{Duration, Utc};
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::request::ChangeRequest;
use super::transitions::TransitionForm;
use super::ChangeWorkflow;
use crate::errors::FlowError;
use crate::github::{write_step_outputs, PullRequestRef};
use crate::jira::FieldCatalog;
use crate::status::{IssueStatus, IssueTransition};

/// Identities resolved for the new request, as tracker account ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneOptions {
    pub reporter: Option<String>,
    pub author: Option<String>,
    pub assignee: Option<String>,
    pub approvers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CloneOutcome {
    Created(ChangeRequest),
    DryRun,
}

fn looks_like_uuid(text: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").ok()
        })
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

fn looks_like_date(text: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

/// Reduce a template field value to what the create endpoint accepts.
/// `None` means the field is left out of the clone.
pub fn parse_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(object) => {
            if let Some(id) = object.get("id") {
                return match id.as_str() {
                    Some(raw) if looks_like_uuid(raw) => Some(Value::String(raw.to_string())),
                    _ => Some(json!({ "id": id })),
                };
            }
            if let Some(request_type) = object.get("requestType") {
                return request_type.get("id").cloned();
            }
            if let Some(inner) = object.get("value") {
                return parse_value(inner);
            }
            Some(value.clone())
        }
        Value::Array(items) => {
            let parsed: Vec<Value> = items.iter().filter_map(parse_value).collect();
            if parsed.is_empty() {
                None
            } else {
                Some(Value::Array(parsed))
            }
        }
        Value::String(text) if looks_like_date(text) => None,
        other => Some(other.clone()),
    }
}

/// Description header tying the request to its pull request
pub fn description_header(pr: &PullRequestRef, author: Option<&str>, approvers: &[String], reviewed_by: &[String]) -> String {
    let mut lines = vec![pr.reference_line()];
    match author {
        Some(account_id) => lines.push(format!("  Author: [~accountid:{account_id}]")),
        None => lines.push(format!("  Author: {}", pr.author_login())),
    }
    if approvers.is_empty() {
        lines.push(format!("  Approved by: {}", reviewed_by.join(", ")));
    } else {
        for account_id in approvers {
            lines.push(format!("  Approved by: [~accountid:{account_id}]"));
        }
    }
    format!("{}\n----\n", lines.join("\n"))
}

/// Field payload for the new request: fixed fields first, then every
/// clone field the template holds a usable value for and the payload does
/// not already set
pub fn clone_payload(
    catalog: &FieldCatalog,
    template: &ChangeRequest,
    summary: &str,
    description: &str,
    reporter: Option<&str>,
) -> Result<Map<String, Value>, FlowError> {
    let record = template.record();
    let template_value = |field: &str, key: &str| {
        record
            .field(field)
            .and_then(|value| value.get(key))
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or_else(|| FlowError::InvalidTemplate {
                template_key: template.key().to_string(),
                reason: format!("no {field}.{key}"),
            })
    };

    let mut payload = Map::new();
    payload.insert("project".to_string(), json!({ "key": template_value("project", "key")? }));
    payload.insert("issuetype".to_string(), json!({ "id": template_value("issuetype", "id")? }));
    payload.insert("summary".to_string(), Value::String(summary.to_string()));
    payload.insert("description".to_string(), Value::String(description.to_string()));
    if let Some(account_id) = reporter {
        payload.insert("reporter".to_string(), json!({ "accountId": account_id }));
    }

    for field_id in catalog.clone_field_ids() {
        if payload.contains_key(field_id) {
            continue;
        }
        if let Some(value) = record.field(field_id).and_then(parse_value) {
            payload.insert(field_id.to_string(), value);
        }
    }
    Ok(payload)
}

impl ChangeWorkflow<'_> {
    fn preview_payload(&self, payload: &Map<String, Value>) {
        let catalog = self.tickets.fields();
        let mut keys: Vec<&String> = payload.keys().collect();
        keys.sort();
        info!("The following fields will be set:");
        for key in keys {
            info!(" - {} ({key}) = {}", catalog.display_name(key), payload[key.as_str()]);
        }
    }

    async fn assign_with_fallback(&self, key: &str, assignee: &str, me: &str) {
        let Err(e) = self.tickets.assign_issue(key, assignee).await else {
            return;
        };
        warn!(issue_key = %key, "Failed to assign issue {key} to {assignee}: {e}");
        if assignee == me {
            return;
        }
        warn!(issue_key = %key, "Assigning to the current user {me} instead");
        if let Err(e) = self.tickets.assign_issue(key, me).await {
            warn!(issue_key = %key, "Failed to assign issue {key} to the current user: {e}");
        }
    }

    /// Clone `template_key` into a new request for `pr`, then move it to
    /// Awaiting Implementation and label the pull request
    pub async fn clone_request_by_key(
        &self,
        template_key: &str,
        pr: &mut PullRequestRef,
        options: &CloneOptions,
    ) -> Result<CloneOutcome, FlowError> {
        let reviewed_by = if options.approvers.is_empty() {
            pr.approver_logins(self.host, &self.settings.bot_login).await?
        } else {
            Vec::new()
        };
        let header = description_header(pr, options.author.as_deref(), &options.approvers, &reviewed_by);

        let template = ChangeRequest::fetch(self.tickets, template_key).await?;
        debug!(template = ?template.record(), "Template request");

        let title = pr.title();
        let summary = if title.is_empty() {
            template.record().text_field("summary").unwrap_or_default().to_string()
        } else {
            title
        };
        let body = pr.body();
        let description = if body.is_empty() {
            template.record().text_field("description").unwrap_or_default().to_string()
        } else {
            body
        };

        let payload = clone_payload(
            self.tickets.fields(),
            &template,
            &summary,
            &format!("{header}\n{description}"),
            options.reporter.as_deref(),
        )?;
        if self.settings.debug || self.dry_run().is_enabled() {
            self.preview_payload(&payload);
        }

        let me = self.tickets.current_user().await?.account_id;
        let assignee = options.assignee.clone().unwrap_or_else(|| me.clone());
        let status = IssueStatus::AwaitingImplementation;
        if self.dry_run().would(&[
            format!("create a new request from {template_key}"),
            format!("assign the new request to {assignee} (me={me})"),
            "set Planned_Start and Planned_End for cloned issue".to_string(),
            format!("label {} with cloned key (e.g. {}-1234)", pr.describe(), self.tickets.project_key()),
            format!("transition cloned issue to '{status}'"),
            format!("comment on {} with cloned issue URL", pr.describe()),
            format!("add label '{status}' to {}", pr.describe()),
        ]) {
            self.write_outputs(&[("CREATED_ISSUE_KEY", "DRY_RUN")])?;
            return Ok(CloneOutcome::DryRun);
        }

        let created = self.tickets.create_issue(payload).await?;
        let key = created
            .key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| FlowError::MissingIssueKey {
                template_key: template_key.to_string(),
            })?;
        println!("{key}");
        self.write_outputs(&[("CREATED_ISSUE_KEY", key.as_str())])?;

        self.tickets.link_issues("Cloners", template_key, &key).await?;
        self.assign_with_fallback(&key, &assignee, &me).await;

        let mut request = ChangeRequest::fetch(self.tickets, &key).await?;
        let now = Utc::now();
        request.stamp(self.tickets, "Planned_Start", now).await?;
        request
            .stamp(self.tickets, "Planned_End", now + Duration::days(self.settings.planned_window_days))
            .await?;

        pr.add_label(self.host, &key).await?;
        self.transition_to(
            &mut request,
            &[IssueTransition::NormalChange, IssueTransition::StandardChange],
            status.as_str(),
            &TransitionForm::new(),
        )
        .await?;
        pr.create_comment(self.host, request.browser_url()).await?;
        pr.add_label(self.host, status.as_str()).await?;

        info!(issue_key = %key, template = %template_key, pr = %pr.describe(), "Created change request");
        Ok(CloneOutcome::Created(request))
    }

    pub(crate) fn write_outputs(&self, outputs: &[(&str, &str)]) -> Result<(), FlowError> {
        write_step_outputs(self.settings.output_file.as_deref(), outputs)?;
        Ok(())
    }
}
