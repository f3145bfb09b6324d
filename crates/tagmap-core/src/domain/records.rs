use crate::domain::ids::{AccountId, TagId};
use serde::{Deserialize, Serialize};

/// Remote email account as returned by the lookup query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    #[serde(rename = "from_email")]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: TagId,
    pub name: String,
}

impl AccountRecord {
    pub fn new(id: i64, email: impl Into<String>) -> Self {
        Self {
            id: AccountId(id),
            email: email.into(),
        }
    }
}

impl TagRecord {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: TagId(id),
            name: name.into(),
        }
    }
}
