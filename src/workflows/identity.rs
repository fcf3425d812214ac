use tracing::{debug, info};

use super::clone::CloneOptions;
use super::ChangeWorkflow;
use crate::errors::FlowError;
use crate::jira::Identity;

impl ChangeWorkflow<'_> {
    /// First tracker account matching `email`
    pub async fn find_account(&self, email: &str) -> Result<Option<Identity>, FlowError> {
        Ok(self.tickets.search_users(email).await?.into_iter().next())
    }

    /// First account matching `email` that can be assigned requests in the
    /// service-desk project
    pub async fn find_assignable(&self, email: &str) -> Result<Option<Identity>, FlowError> {
        Ok(self
            .tickets
            .search_assignable_users(email, self.tickets.project_key())
            .await?
            .into_iter()
            .next())
    }

    /// Resolve pipeline emails to account ids for a clone. Misses are logged
    /// and the identity is left out.
    pub async fn resolve_clone_identities(
        &self,
        actor_email: Option<&str>,
        author_email: Option<&str>,
        approver_emails: &[String],
    ) -> Result<CloneOptions, FlowError> {
        let mut options = CloneOptions::default();

        if let Some(email) = actor_email {
            match self.find_account(email).await? {
                Some(account) => options.reporter = Some(account.account_id),
                None => debug!("PR actor email '{email}' not found in JSM users"),
            }
        }

        if let Some(email) = author_email {
            match self.find_account(email).await? {
                Some(account) => {
                    options.author = Some(account.account_id);
                    match self.find_assignable(email).await? {
                        Some(assignable) => options.assignee = Some(assignable.account_id),
                        None => info!(
                            "NOTE: PR author email '{email}' cannot be assigned issues in project {}",
                            self.tickets.project_key()
                        ),
                    }
                }
                None => debug!("PR author email '{email}' not found in JSM users"),
            }
        }

        for email in approver_emails {
            match self.find_account(email).await? {
                Some(account) => options.approvers.push(account.account_id),
                None => debug!("PR approver email '{email}' not found in JSM users"),
            }
        }
        Ok(options)
    }

    /// Check that `email` is a known account assignable in the project
    pub async fn can_be_assigned(&self, email: &str) -> Result<Identity, FlowError> {
        if self.find_account(email).await?.is_none() {
            return Err(FlowError::IdentityNotFound {
                email: email.to_string(),
            });
        }
        self.find_assignable(email)
            .await?
            .ok_or_else(|| FlowError::NotAssignable {
                email: email.to_string(),
                project_key: self.tickets.project_key().to_string(),
            })
    }
}
