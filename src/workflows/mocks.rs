// In-memory tracker, code host and proof fetcher for workflow tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::proof::{FetchedProof, ProofFetchError, ProofFetcher, ProofSpec};
use crate::github::{CodeHost, GitHubError, PullSnapshot, ReviewRecord};
use crate::jira::types::{AllowedValue, CreatedIssue, FieldDescriptor, TransitionField};
use crate::jira::{FieldCatalog, Identity, IssueRecord, JiraError, TemporaryAttachment, TicketClient, TransitionInfo};

pub const SITE: &str = "https://jira.example.com";
pub const UUID_VALUE: &str = "0b6a5c1e-1d2f-4e3a-9b8c-7d6e5f4a3b2c";

/// A workflow edge the fake tracker offers from `from`
#[derive(Debug, Clone)]
pub struct FakeEdge {
    pub from: String,
    pub to: String,
    pub info: TransitionInfo,
}

#[derive(Debug, Default)]
pub struct TicketState {
    pub issues: BTreeMap<String, IssueRecord>,
    pub edges: Vec<FakeEdge>,
    pub next_number: u64,
    pub fetched: Vec<String>,
    pub updates: Vec<(String, Map<String, Value>)>,
    /// (issue key, transition name, submitted fields)
    pub executed: Vec<(String, String, Map<String, Value>)>,
    pub created: Vec<Map<String, Value>>,
    pub links: Vec<(String, String, String)>,
    pub assignments: Vec<(String, String)>,
    pub comments: Vec<(String, String)>,
    pub uploads: Vec<(TemporaryAttachment, Vec<u8>)>,
    pub users: Vec<(String, Identity)>,
    pub assignable: HashSet<String>,
    pub reject_assignment: HashSet<String>,
    pub fail_transitions: HashSet<String>,
    pub omit_created_key: bool,
    attachment_clock: u32,
}

pub struct FakeTickets {
    catalog: FieldCatalog,
    project_key: String,
    me: Identity,
    pub state: Mutex<TicketState>,
}

fn descriptor(id: &str, name: &str) -> FieldDescriptor {
    FieldDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        untranslated_name: None,
    }
}

pub fn catalog() -> FieldCatalog {
    FieldCatalog::from_descriptors(&[
        descriptor("summary", "Summary"),
        descriptor("description", "Description"),
        descriptor("project", "Project"),
        descriptor("issuetype", "Issue Type"),
        descriptor("reporter", "Reporter"),
        descriptor("status", "Status"),
        descriptor("attachment", "Attachment"),
        descriptor("customfield_10010", "Request Type"),
        descriptor("customfield_10020", "Change type"),
        descriptor("customfield_10030", "Affected services"),
        descriptor("customfield_10040", "Components"),
        descriptor("customfield_10050", "Planned Start"),
        descriptor("customfield_10051", "Planned End"),
        descriptor("customfield_10060", "Actual Start"),
        descriptor("customfield_10061", "Actual End"),
        descriptor("customfield_10070", "Resolution Notes"),
        descriptor("customfield_10071", "Proof Of Success"),
        descriptor("customfield_10080", "Change window"),
        descriptor("customfield_10090", "Team"),
    ])
    .with_clone_fields(
        [
            "summary",
            "description",
            "customfield_10030",
            "customfield_10040",
            "customfield_10050",
            "customfield_10080",
        ],
        &[
            "requesttype".to_string(),
            "changetype".to_string(),
            "team".to_string(),
        ],
    )
}

fn resolution_field() -> TransitionField {
    let allowed = |id: &str, name: &str| AllowedValue {
        id: id.to_string(),
        name: Some(name.to_string()),
        value: None,
    };
    TransitionField {
        key: Some("resolution".to_string()),
        name: "Resolution".to_string(),
        required: true,
        allowed_values: vec![allowed("10", "Successful"), allowed("11", "Declined"), allowed("12", "Done")],
    }
}

pub fn edge(from: &str, name: &str, id: &str, to: &str, screen: &[&str]) -> FakeEdge {
    let fields = (!screen.is_empty()).then(|| {
        screen
            .iter()
            .map(|field| match *field {
                "resolution" => ("resolution".to_string(), resolution_field()),
                other => (
                    other.to_string(),
                    TransitionField {
                        key: Some(other.to_string()),
                        name: "Attachment".to_string(),
                        required: false,
                        allowed_values: Vec::new(),
                    },
                ),
            })
            .collect::<BTreeMap<_, _>>()
    });
    FakeEdge {
        from: from.to_string(),
        to: to.to_string(),
        info: TransitionInfo {
            id: id.to_string(),
            name: name.to_string(),
            fields,
        },
    }
}

pub fn standard_edges() -> Vec<FakeEdge> {
    vec![
        edge("Open", "Standard Change", "11", "Awaiting Implementation", &[]),
        edge("Awaiting Implementation", "Implement", "21", "Implementing", &[]),
        edge("Awaiting Implementation", "Mark as Canceled", "41", "Canceled", &["resolution"]),
        edge("Implementing", "Complete", "31", "Completed", &["resolution", "attachment"]),
    ]
}

pub fn record(key: &str, status: &str, mut fields: Map<String, Value>) -> IssueRecord {
    let id = key.rsplit('-').next().unwrap_or("0").to_string();
    fields.insert("status".to_string(), json!({ "name": status }));
    IssueRecord {
        self_url: format!("{SITE}/rest/api/2/issue/{id}"),
        id,
        key: key.to_string(),
        fields,
    }
}

pub fn template_fields() -> Map<String, Value> {
    json!({
        "summary": "Standard deploy template",
        "description": "Template body",
        "project": { "key": "ITSM", "id": "10000" },
        "issuetype": { "id": "10100", "name": "Change" },
        "customfield_10010": { "requestType": { "id": "55", "name": "Request a change" } },
        "customfield_10020": { "self": "https://jira.example.com/option/10001", "value": "Standard", "id": "10001" },
        "customfield_10030": { "id": UUID_VALUE },
        "customfield_10040": [],
        "customfield_10050": "2024-01-01T09:00:00.000+0000",
        "customfield_10080": "2024-01-02T09:00:00.000+0000",
        "customfield_10090": { "id": "77", "name": "Payments" },
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

fn not_found(key: &str) -> JiraError {
    JiraError::Api {
        method: "GET".to_string(),
        url: format!("{SITE}/rest/api/2/issue/{key}"),
        status: 404,
        body: "Issue does not exist or you do not have permission to see it.".to_string(),
    }
}

fn rejected(url: &str, body: &str) -> JiraError {
    JiraError::Api {
        method: "POST".to_string(),
        url: url.to_string(),
        status: 400,
        body: body.to_string(),
    }
}

impl FakeTickets {
    /// Tracker holding template ITSM-100 and the standard change workflow
    pub fn standard() -> Self {
        let mut state = TicketState {
            edges: standard_edges(),
            next_number: 101,
            ..Default::default()
        };
        state.issues.insert(
            "ITSM-100".to_string(),
            record("ITSM-100", "Awaiting Implementation", template_fields()),
        );
        Self {
            catalog: catalog(),
            project_key: "ITSM".to_string(),
            me: Identity {
                account_id: "acc-bot".to_string(),
                display_name: Some("Pipeline".to_string()),
                email_address: None,
            },
            state: Mutex::new(state),
        }
    }

    pub fn with_issue(self, key: &str, status: &str) -> Self {
        self.insert_issue(key, status, Map::new());
        self
    }

    pub fn insert_issue(&self, key: &str, status: &str, fields: Map<String, Value>) {
        self.state
            .lock()
            .unwrap()
            .issues
            .insert(key.to_string(), record(key, status, fields));
    }

    pub fn add_user(&self, email: &str, account_id: &str, assignable: bool) {
        let mut state = self.state.lock().unwrap();
        state.users.push((
            email.to_string(),
            Identity {
                account_id: account_id.to_string(),
                display_name: None,
                email_address: Some(email.to_string()),
            },
        ));
        if assignable {
            state.assignable.insert(account_id.to_string());
        }
    }

    pub fn issue(&self, key: &str) -> IssueRecord {
        self.state.lock().unwrap().issues[key].clone()
    }

    pub fn field(&self, key: &str, field_id: &str) -> Value {
        self.issue(key).fields.get(field_id).cloned().unwrap_or(Value::Null)
    }

    pub fn status(&self, key: &str) -> String {
        self.issue(key).status_name().unwrap_or_default().to_string()
    }

    pub fn executed_names(&self, key: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .executed
            .iter()
            .filter(|(issue, _, _)| issue == key)
            .map(|(_, name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl TicketClient for FakeTickets {
    fn fields(&self) -> &FieldCatalog {
        &self.catalog
    }

    fn project_key(&self) -> &str {
        &self.project_key
    }

    async fn get_issue(&self, key: &str) -> Result<IssueRecord, JiraError> {
        let mut state = self.state.lock().unwrap();
        state.fetched.push(key.to_string());
        state.issues.get(key).cloned().ok_or_else(|| not_found(key))
    }

    async fn update_fields(&self, key: &str, fields: Map<String, Value>) -> Result<(), JiraError> {
        let mut state = self.state.lock().unwrap();
        let issue = state.issues.get_mut(key).ok_or_else(|| not_found(key))?;
        issue.fields.extend(fields.clone());
        state.updates.push((key.to_string(), fields));
        Ok(())
    }

    async fn list_transitions(&self, key: &str) -> Result<Vec<TransitionInfo>, JiraError> {
        let state = self.state.lock().unwrap();
        let issue = state.issues.get(key).ok_or_else(|| not_found(key))?;
        let status = issue.status_name().unwrap_or_default();
        Ok(state
            .edges
            .iter()
            .filter(|edge| edge.from == status)
            .map(|edge| edge.info.clone())
            .collect())
    }

    async fn execute_transition(&self, key: &str, transition_id: &str, fields: Map<String, Value>) -> Result<(), JiraError> {
        let mut state = self.state.lock().unwrap();
        let url = format!("{SITE}/rest/api/2/issue/{key}/transitions");
        if state.fail_transitions.contains(key) {
            return Err(rejected(&url, "Workflow is locked"));
        }
        let status = state
            .issues
            .get(key)
            .ok_or_else(|| not_found(key))?
            .status_name()
            .unwrap_or_default()
            .to_string();
        let edge = state
            .edges
            .iter()
            .find(|edge| edge.from == status && edge.info.id == transition_id)
            .cloned()
            .ok_or_else(|| rejected(&url, "Transition is not valid"))?;

        let mut added = Vec::new();
        if let Some(ids) = fields.get("attachment").and_then(Value::as_array) {
            for id in ids.iter().filter_map(Value::as_str) {
                if let Some((upload, _)) = state.uploads.iter().find(|(u, _)| u.temporary_attachment_id == id) {
                    added.push(upload.file_name.clone());
                }
            }
        }
        for filename in added {
            state.attachment_clock += 1;
            let created = format!("2024-05-01T10:{:02}:00.000+0000", state.attachment_clock);
            let issue = state.issues.get_mut(key).ok_or_else(|| not_found(key))?;
            let mut attachments = issue
                .fields
                .get("attachment")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            attachments.push(json!({ "filename": filename, "created": created }));
            issue.fields.insert("attachment".to_string(), Value::Array(attachments));
        }

        let issue = state.issues.get_mut(key).ok_or_else(|| not_found(key))?;
        issue.fields.insert("status".to_string(), json!({ "name": edge.to }));
        state.executed.push((key.to_string(), edge.info.name.clone(), fields));
        Ok(())
    }

    async fn create_issue(&self, fields: Map<String, Value>) -> Result<CreatedIssue, JiraError> {
        let mut state = self.state.lock().unwrap();
        let key = format!("{}-{}", self.project_key, state.next_number);
        state.next_number += 1;
        state.created.push(fields.clone());
        let issue = record(&key, "Open", fields);
        let created = CreatedIssue {
            id: Some(issue.id.clone()),
            key: (!state.omit_created_key).then(|| key.clone()),
            self_url: Some(issue.self_url.clone()),
        };
        state.issues.insert(key, issue);
        Ok(created)
    }

    async fn link_issues(&self, link_type: &str, outward_key: &str, inward_key: &str) -> Result<(), JiraError> {
        self.state.lock().unwrap().links.push((
            link_type.to_string(),
            outward_key.to_string(),
            inward_key.to_string(),
        ));
        Ok(())
    }

    async fn assign_issue(&self, key: &str, account_id: &str) -> Result<(), JiraError> {
        let mut state = self.state.lock().unwrap();
        state.assignments.push((key.to_string(), account_id.to_string()));
        if state.reject_assignment.contains(account_id) {
            return Err(rejected(&format!("{SITE}/rest/api/2/issue/{key}/assignee"), "User cannot be assigned"));
        }
        Ok(())
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<(), JiraError> {
        self.state
            .lock()
            .unwrap()
            .comments
            .push((key.to_string(), body.to_string()));
        Ok(())
    }

    async fn upload_temporary_attachment(
        &self,
        content: Vec<u8>,
        _content_type: &str,
        filename: &str,
    ) -> Result<TemporaryAttachment, JiraError> {
        let mut state = self.state.lock().unwrap();
        let attachment = TemporaryAttachment {
            temporary_attachment_id: format!("temp-{}", state.uploads.len() + 1),
            file_name: filename.to_string(),
        };
        state.uploads.push((attachment.clone(), content));
        Ok(attachment)
    }

    async fn search_users(&self, query: &str) -> Result<Vec<Identity>, JiraError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .iter()
            .filter(|(email, _)| email == query)
            .map(|(_, identity)| identity.clone())
            .collect())
    }

    async fn search_assignable_users(&self, query: &str, project_key: &str) -> Result<Vec<Identity>, JiraError> {
        if project_key != self.project_key {
            return Ok(Vec::new());
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .filter(|(email, identity)| email == query && state.assignable.contains(&identity.account_id))
            .map(|(_, identity)| identity.clone())
            .collect())
    }

    async fn current_user(&self) -> Result<Identity, JiraError> {
        Ok(self.me.clone())
    }
}

#[derive(Debug, Default)]
pub struct HostState {
    pub pulls: BTreeMap<u64, PullSnapshot>,
    pub reviews: HashMap<u64, Vec<ReviewRecord>>,
    /// Closed pull request numbers, most recently updated first
    pub closed: Vec<u64>,
    pub comments: Vec<(u64, String)>,
    pub removed: Vec<(u64, String)>,
}

#[derive(Default)]
pub struct FakeHost {
    pub state: Mutex<HostState>,
}

pub fn pull(number: u64, labels: &[&str]) -> PullSnapshot {
    PullSnapshot {
        number,
        html_url: format!("https://github.com/acme/payments/pull/{number}"),
        title: format!("Change #{number}"),
        body: format!("Body of #{number}"),
        author_login: "dev".to_string(),
        author_id: Some(1),
        labels: labels.iter().map(|l| l.to_string()).collect(),
    }
}

impl FakeHost {
    pub fn with_pull(self, snapshot: PullSnapshot) -> Self {
        self.state.lock().unwrap().pulls.insert(snapshot.number, snapshot);
        self
    }

    pub fn labels(&self, number: u64) -> Vec<String> {
        self.state.lock().unwrap().pulls[&number].labels.clone()
    }

    fn missing(number: u64) -> GitHubError {
        GitHubError::ConfigNotFound(format!("pull request #{number} not found"))
    }
}

#[async_trait]
impl CodeHost for FakeHost {
    fn repository(&self) -> &str {
        "acme/payments"
    }

    async fn pull_request(&self, number: u64) -> Result<PullSnapshot, GitHubError> {
        self.state
            .lock()
            .unwrap()
            .pulls
            .get(&number)
            .cloned()
            .ok_or_else(|| Self::missing(number))
    }

    async fn reviews(&self, number: u64) -> Result<Vec<ReviewRecord>, GitHubError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .reviews
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<(), GitHubError> {
        let mut state = self.state.lock().unwrap();
        let pull = state.pulls.get_mut(&number).ok_or_else(|| Self::missing(number))?;
        if !pull.labels.iter().any(|l| l == label) {
            pull.labels.push(label.to_string());
        }
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<(), GitHubError> {
        let mut state = self.state.lock().unwrap();
        let pull = state.pulls.get_mut(&number).ok_or_else(|| Self::missing(number))?;
        pull.labels.retain(|l| l != label);
        state.removed.push((number, label.to_string()));
        Ok(())
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<(), GitHubError> {
        self.state
            .lock()
            .unwrap()
            .comments
            .push((number, body.to_string()));
        Ok(())
    }

    async fn recent_closed_pulls(&self, _base: &str, limit: u8) -> Result<Vec<PullSnapshot>, GitHubError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .closed
            .iter()
            .filter_map(|number| state.pulls.get(number).cloned())
            .take(usize::from(limit))
            .collect())
    }
}

/// Serves canned bodies; URLs without one fail
#[derive(Default)]
pub struct FakeFetcher {
    pub bodies: HashMap<String, Vec<u8>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn serving(urls: &[(&str, &str)]) -> Self {
        Self {
            bodies: urls
                .iter()
                .map(|(url, body)| (url.to_string(), body.as_bytes().to_vec()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ProofFetcher for FakeFetcher {
    async fn fetch(&self, spec: &ProofSpec) -> Result<FetchedProof, ProofFetchError> {
        self.calls.lock().unwrap().push(spec.url.clone());
        match self.bodies.get(&spec.url) {
            Some(body) => Ok(FetchedProof {
                url: spec.url.clone(),
                content: body.clone(),
                content_type: "application/json".to_string(),
                filename: super::proof::proof_filename(&spec.url),
            }),
            None => Err(ProofFetchError {
                url: spec.url.clone(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}
