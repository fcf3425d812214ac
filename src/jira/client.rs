use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::errors::JiraError;
use super::fields::FieldCatalog;
use super::types::{
    CreatedIssue, FieldDescriptor, Identity, IssueRecord, PagedValues, RequestType,
    RequestTypeFields, ServiceDesk, TemporaryAttachment, TransitionInfo,
};

/// Ticket tracker capability consumed by the workflow engine.
///
/// Implemented by [`JiraClient`] against the live REST API and by in-memory
/// fakes in tests.
#[async_trait]
pub trait TicketClient: Send + Sync {
    /// Field-name catalog discovered when the client was built
    fn fields(&self) -> &FieldCatalog;
    /// Key of the service-desk project requests are created in
    fn project_key(&self) -> &str;

    async fn get_issue(&self, key: &str) -> Result<IssueRecord, JiraError>;
    async fn update_fields(&self, key: &str, fields: Map<String, Value>) -> Result<(), JiraError>;
    async fn list_transitions(&self, key: &str) -> Result<Vec<TransitionInfo>, JiraError>;
    async fn execute_transition(
        &self,
        key: &str,
        transition_id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), JiraError>;
    async fn create_issue(&self, fields: Map<String, Value>) -> Result<CreatedIssue, JiraError>;
    /// Link two issues; `outward_key` is the source of the relationship
    async fn link_issues(&self, link_type: &str, outward_key: &str, inward_key: &str) -> Result<(), JiraError>;
    async fn assign_issue(&self, key: &str, account_id: &str) -> Result<(), JiraError>;
    async fn add_comment(&self, key: &str, body: &str) -> Result<(), JiraError>;
    async fn upload_temporary_attachment(
        &self,
        content: Vec<u8>,
        content_type: &str,
        filename: &str,
    ) -> Result<TemporaryAttachment, JiraError>;
    async fn search_users(&self, query: &str) -> Result<Vec<Identity>, JiraError>;
    async fn search_assignable_users(&self, query: &str, project_key: &str) -> Result<Vec<Identity>, JiraError>;
    async fn current_user(&self) -> Result<Identity, JiraError>;
}

/// Everything needed to reach one Jira site and its change service desk
#[derive(Debug, Clone)]
pub struct JiraConnection {
    pub base_url: String,
    pub user: String,
    pub token: String,
    /// Substring of the service desk's project name, e.g. `ITSM`
    pub project_name: String,
    /// Exact request type name, e.g. `Request a change`
    pub request_type: String,
    /// Fields hidden on the portal that a clone must still carry
    pub forced_clone_fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    token: String,
    service_desk_id: String,
    project_key: String,
    request_type_id: String,
    fields: FieldCatalog,
}

#[derive(Deserialize)]
struct TransitionsEnvelope {
    #[serde(default)]
    transitions: Vec<TransitionInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemporaryAttachments {
    #[serde(default)]
    temporary_attachments: Vec<TemporaryAttachment>,
}

const BODY_EXCERPT_LIMIT: usize = 500;

impl JiraClient {
    /// Connect and discover the field catalog, service desk and request type
    pub async fn connect(connection: &JiraConnection) -> Result<Self, JiraError> {
        if connection.user.is_empty() || connection.token.is_empty() {
            return Err(JiraError::CredentialsMissing(
                "JSM_USER and JSM_TOKEN are required.".to_string(),
            ));
        }

        let mut client = Self {
            http: reqwest::Client::new(),
            base_url: connection.base_url.trim_end_matches('/').to_string(),
            user: connection.user.clone(),
            token: connection.token.clone(),
            service_desk_id: String::new(),
            project_key: String::new(),
            request_type_id: String::new(),
            fields: FieldCatalog::default(),
        };

        let descriptors: Vec<FieldDescriptor> = client.get_json("rest/api/2/field", &[]).await?;

        let desks: PagedValues<ServiceDesk> = client
            .get_json("rest/servicedeskapi/servicedesk", &[])
            .await?;
        let desk = desks
            .values
            .into_iter()
            .find(|desk| desk.project_name.contains(&connection.project_name))
            .ok_or_else(|| JiraError::ServiceDeskNotFound(connection.project_name.clone()))?;

        let request_types: PagedValues<RequestType> = client
            .get_json(
                &format!("rest/servicedeskapi/servicedesk/{}/requesttype", desk.id),
                &[],
            )
            .await?;
        let request_type = request_types
            .values
            .into_iter()
            .find(|rt| rt.name == connection.request_type)
            .ok_or_else(|| JiraError::RequestTypeNotFound {
                request_type: connection.request_type.clone(),
                service_desk: desk.project_name.clone(),
            })?;

        let screen: RequestTypeFields = client
            .get_json(
                &format!(
                    "rest/servicedeskapi/servicedesk/{}/requesttype/{}/field",
                    desk.id, request_type.id
                ),
                &[],
            )
            .await?;

        client.fields = FieldCatalog::from_descriptors(&descriptors).with_clone_fields(
            screen.request_type_fields.iter().map(|f| f.field_id.as_str()),
            &connection.forced_clone_fields,
        );
        debug!(
            service_desk = %desk.id,
            project_key = %desk.project_key,
            request_type = %request_type.id,
            "Discovered change service desk"
        );
        client.service_desk_id = desk.id;
        client.project_key = desk.project_key;
        client.request_type_id = request_type.id;
        Ok(client)
    }

    pub fn service_desk_id(&self) -> &str {
        &self.service_desk_id
    }

    pub fn request_type_id(&self) -> &str {
        &self.request_type_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> (String, RequestBuilder) {
        let url = self.url(path);
        let builder = self
            .http
            .request(method, &url)
            .basic_auth(&self.user, Some(&self.token))
            .header("Accept", "application/json");
        (url, builder)
    }

    async fn send(&self, method: Method, url: String, builder: RequestBuilder) -> Result<String, JiraError> {
        debug!(method = %method, url = %url, "Jira request");
        let response = builder.send().await.map_err(|source| JiraError::Transport {
            url: url.clone(),
            source,
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|source| JiraError::Transport {
            url: url.clone(),
            source,
        })?;
        if !status.is_success() {
            return Err(JiraError::Api {
                method: method.to_string(),
                url,
                status: status.as_u16(),
                body: text.chars().take(BODY_EXCERPT_LIMIT).collect(),
            });
        }
        Ok(text)
    }

    fn decode<T: DeserializeOwned>(url: &str, text: &str) -> Result<T, JiraError> {
        serde_json::from_str(text).map_err(|e| JiraError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, JiraError> {
        let (url, builder) = self.request(Method::GET, path);
        let text = self.send(Method::GET, url.clone(), builder.query(query)).await?;
        Self::decode(&url, &text)
    }

    async fn send_json(&self, method: Method, path: &str, body: &Value) -> Result<String, JiraError> {
        let (url, builder) = self.request(method.clone(), path);
        self.send(method, url, builder.json(body)).await
    }
}

#[async_trait]
impl TicketClient for JiraClient {
    fn fields(&self) -> &FieldCatalog {
        &self.fields
    }

    fn project_key(&self) -> &str {
        &self.project_key
    }

    async fn get_issue(&self, key: &str) -> Result<IssueRecord, JiraError> {
        self.get_json(&format!("rest/api/2/issue/{key}"), &[]).await
    }

    async fn update_fields(&self, key: &str, fields: Map<String, Value>) -> Result<(), JiraError> {
        self.send_json(
            Method::PUT,
            &format!("rest/api/2/issue/{key}"),
            &json!({ "fields": fields }),
        )
        .await?;
        Ok(())
    }

    async fn list_transitions(&self, key: &str) -> Result<Vec<TransitionInfo>, JiraError> {
        let envelope: TransitionsEnvelope = self
            .get_json(
                &format!("rest/api/2/issue/{key}/transitions"),
                &[("expand", "transitions.fields")],
            )
            .await?;
        Ok(envelope.transitions)
    }

    async fn execute_transition(
        &self,
        key: &str,
        transition_id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), JiraError> {
        let mut body = json!({ "transition": { "id": transition_id } });
        if !fields.is_empty() {
            body["fields"] = Value::Object(fields);
        }
        self.send_json(Method::POST, &format!("rest/api/2/issue/{key}/transitions"), &body)
            .await?;
        Ok(())
    }

    async fn create_issue(&self, fields: Map<String, Value>) -> Result<CreatedIssue, JiraError> {
        let path = "rest/api/2/issue";
        let text = self
            .send_json(Method::POST, path, &json!({ "fields": fields }))
            .await?;
        Self::decode(&self.url(path), &text)
    }

    async fn link_issues(&self, link_type: &str, outward_key: &str, inward_key: &str) -> Result<(), JiraError> {
        let body = json!({
            "type": { "name": link_type },
            "outwardIssue": { "key": outward_key },
            "inwardIssue": { "key": inward_key },
        });
        self.send_json(Method::POST, "rest/api/2/issueLink", &body).await?;
        Ok(())
    }

    async fn assign_issue(&self, key: &str, account_id: &str) -> Result<(), JiraError> {
        self.send_json(
            Method::PUT,
            &format!("rest/api/2/issue/{key}/assignee"),
            &json!({ "accountId": account_id }),
        )
        .await?;
        Ok(())
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<(), JiraError> {
        self.send_json(
            Method::POST,
            &format!("rest/api/2/issue/{key}/comment"),
            &json!({ "body": body }),
        )
        .await?;
        Ok(())
    }

    async fn upload_temporary_attachment(
        &self,
        content: Vec<u8>,
        content_type: &str,
        filename: &str,
    ) -> Result<TemporaryAttachment, JiraError> {
        let path = format!(
            "rest/servicedeskapi/servicedesk/{}/attachTemporaryFile",
            self.service_desk_id
        );
        let (url, builder) = self.request(Method::POST, &path);
        let part = reqwest::multipart::Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str(content_type)
            .map_err(|source| JiraError::Transport {
                url: url.clone(),
                source,
            })?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let builder = builder
            .header("X-Atlassian-Token", "no-check")
            .header("X-ExperimentalApi", "opt-in")
            .multipart(form);

        let text = self.send(Method::POST, url.clone(), builder).await?;
        let reply: TemporaryAttachments = Self::decode(&url, &text)?;
        let attachment = reply
            .temporary_attachments
            .into_iter()
            .next()
            .ok_or_else(|| JiraError::Decode {
                url,
                reason: "no temporaryAttachments in reply".to_string(),
            })?;
        debug!(attachment_id = %attachment.temporary_attachment_id, "Added temporary attachment");
        Ok(attachment)
    }

    async fn search_users(&self, query: &str) -> Result<Vec<Identity>, JiraError> {
        self.get_json("rest/api/2/user/search", &[("query", query)]).await
    }

    async fn search_assignable_users(&self, query: &str, project_key: &str) -> Result<Vec<Identity>, JiraError> {
        self.get_json(
            "rest/api/2/user/assignable/search",
            &[("query", query), ("project", project_key)],
        )
        .await
    }

    async fn current_user(&self) -> Result<Identity, JiraError> {
        self.get_json("rest/api/2/myself", &[]).await
    }
}
