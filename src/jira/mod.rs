pub mod client;
pub mod errors;
pub mod fields;
pub mod types;

pub use client::{JiraClient, JiraConnection, TicketClient};
pub use errors::JiraError;
pub use fields::{FieldCatalog, UnknownFieldError};
pub use types::{Identity, IssueRecord, TemporaryAttachment, TransitionInfo};
