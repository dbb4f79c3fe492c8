//! Shared data models.

use serde::Serialize;

use crate::directory::{DirectoryPayload, DirectoryRecord};

/// User entry of the `/users` listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl From<&DirectoryRecord> for UserSummary {
    fn from(record: &DirectoryRecord) -> Self {
        Self {
            name: record.display_name().map(String::from),
            email: record
                .user_principal_name()
                .or_else(|| record.mail())
                .map(String::from),
        }
    }
}

/// `/users` response payload.
#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserSummary>,
    /// Link to the next page when the directory paged the listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

impl From<&DirectoryPayload> for UsersResponse {
    fn from(payload: &DirectoryPayload) -> Self {
        Self {
            users: payload.records().iter().map(UserSummary::from).collect(),
            next_link: payload.next_link().map(String::from),
        }
    }
}

/// Plain message payload.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
