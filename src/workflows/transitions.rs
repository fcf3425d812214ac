use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::request::ChangeRequest;
use super::ChangeWorkflow;
use crate::errors::FlowError;
use crate::jira::TransitionInfo;
use crate::status::{compact, compact_contains, IssueResolution, IssueStatus, IssueTransition};

/// Status guard: proceed only from an accepted status that is not already
/// one of the done statuses. Names compare after compaction.
pub fn should_proceed(current: &str, accepted: &[IssueStatus], already_done: &[IssueStatus]) -> bool {
    compact_contains(accepted, current) && !compact_contains(already_done, current)
}

/// Log-and-skip wrapper around [`should_proceed`]
pub fn attempt_transition(
    request: &ChangeRequest,
    accepted: &[IssueStatus],
    already_done: &[IssueStatus],
    target: &str,
) -> bool {
    let current = request.status_name();
    if !compact_contains(accepted, current) {
        info!(
            issue_key = %request.key(),
            status = %current,
            "Issue {} is not in an acceptable status to '{target}': {current}",
            request.key()
        );
        return false;
    }
    if compact_contains(already_done, current) {
        info!(
            issue_key = %request.key(),
            status = %current,
            "Issue {} is already in an acceptable status: {current}",
            request.key()
        );
        return false;
    }
    true
}

/// Values submitted on a transition screen, keyed by field display name
#[derive(Debug, Clone, Default)]
pub struct TransitionForm {
    resolution: Option<IssueResolution>,
    fields: Vec<(String, Value)>,
}

impl TransitionForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolution(mut self, resolution: IssueResolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn field(mut self, name: &str, value: Value) -> Self {
        self.fields.push((name.to_string(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.resolution.is_none() && self.fields.is_empty()
    }

    /// Map the form onto the transition's screen fields
    pub fn build(&self, transition: &TransitionInfo, issue_key: &str, target: &str) -> Result<Map<String, Value>, FlowError> {
        let mut submitted = Map::new();
        if self.is_empty() {
            return Ok(submitted);
        }
        let Some(screen) = transition.fields.as_ref() else {
            return Err(FlowError::MissingTransitionFields {
                issue_key: issue_key.to_string(),
                transition: transition.name.clone(),
                target: target.to_string(),
            });
        };

        for (field_id, field) in screen {
            let key = field.key.clone().unwrap_or_else(|| field_id.clone());
            let name = compact(&field.name);

            if name == "resolution" {
                if let Some(resolution) = self.resolution {
                    let wanted = compact(resolution.as_str());
                    let allowed = field
                        .allowed_values
                        .iter()
                        .find(|value| compact(value.label()) == wanted)
                        .ok_or_else(|| FlowError::ResolutionNotFound {
                            issue_key: issue_key.to_string(),
                            transition: transition.name.clone(),
                            resolution: resolution.to_string(),
                        })?;
                    submitted.insert(key, json!({ "id": allowed.id }));
                }
                continue;
            }

            if let Some((_, value)) = self.fields.iter().find(|(wanted, _)| compact(wanted) == name) {
                submitted.insert(key, value.clone());
            }
        }

        for (wanted, _) in &self.fields {
            if !screen.values().any(|field| compact(&field.name) == compact(wanted)) {
                debug!(issue_key = %issue_key, field = %wanted, "Field not on transition screen, ignored");
            }
        }
        Ok(submitted)
    }
}

impl ChangeWorkflow<'_> {
    async fn next_forward_transition(
        &self,
        request: &ChangeRequest,
        names: &[IssueTransition],
    ) -> Result<Option<TransitionInfo>, FlowError> {
        let transitions = self.tickets.list_transitions(request.key()).await?;
        debug!(
            issue_key = %request.key(),
            available = ?transitions.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "Available transitions"
        );
        Ok(transitions
            .into_iter()
            .find(|transition| compact_contains(names, &transition.name)))
    }

    /// Follow matching transitions until the tracker stops offering one.
    /// Returns the number of edges executed.
    pub async fn transition_to(
        &self,
        request: &mut ChangeRequest,
        names: &[IssueTransition],
        target: &str,
        form: &TransitionForm,
    ) -> Result<usize, FlowError> {
        let mut hops = 0;
        while let Some(transition) = self.next_forward_transition(request, names).await? {
            if hops == self.settings.max_transition_hops {
                return Err(FlowError::TransitionLoop {
                    issue_key: request.key().to_string(),
                    target: target.to_string(),
                    hops,
                });
            }

            let fields = form.build(&transition, request.key(), target)?;
            debug!(issue_key = %request.key(), transition = %transition.name, fields = ?fields, "Transition form");

            if self
                .dry_run()
                .would(&[format!("move issue {} to '{target}' state", request.key())])
            {
                return Ok(hops);
            }

            self.tickets
                .execute_transition(request.key(), &transition.id, fields)
                .await?;
            request.refresh(self.tickets).await?;
            hops += 1;
            info!(
                issue_key = %request.key(),
                transition = %transition.name,
                status = %request.status_name(),
                "Transitioned issue"
            );
        }
        Ok(hops)
    }
}
