//! Wire shapes of lookup rows before nulls are filtered out.

use serde::Deserialize;
use tagmap_core::{AccountId, AccountRecord, TagId, TagRecord};

use crate::{RemoteError, Result};

/// Ids come back as numbers from GraphQL and sometimes as strings elsewhere.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn to_i64(&self) -> Result<i64> {
        match self {
            RawId::Number(value) => Ok(*value),
            RawId::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| RemoteError::Parse(format!("invalid id {text:?}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAccount {
    pub id: Option<RawId>,
    pub from_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTag {
    pub id: Option<RawId>,
    pub name: Option<String>,
}

/// Drops rows with a null id or a null/blank email, keeping remote order.
pub fn collect_accounts(raw: Vec<RawAccount>) -> Result<Vec<AccountRecord>> {
    let mut out = Vec::with_capacity(raw.len());
    for row in raw {
        let (Some(id), Some(email)) = (row.id, row.from_email) else {
            continue;
        };
        if email.trim().is_empty() {
            continue;
        }
        out.push(AccountRecord {
            id: AccountId(id.to_i64()?),
            email,
        });
    }
    Ok(out)
}

pub fn collect_tags(raw: Vec<RawTag>) -> Result<Vec<TagRecord>> {
    let mut out = Vec::with_capacity(raw.len());
    for row in raw {
        let (Some(id), Some(name)) = (row.id, row.name) else {
            continue;
        };
        if name.trim().is_empty() {
            continue;
        }
        out.push(TagRecord {
            id: TagId(id.to_i64()?),
            name,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{collect_accounts, collect_tags, RawAccount, RawTag};

    #[test]
    fn discards_rows_with_missing_fields() {
        let raw: Vec<RawAccount> = serde_json::from_str(
            r#"[
                {"id": 1, "from_email": "a@x.com"},
                {"id": null, "from_email": "b@x.com"},
                {"id": 3, "from_email": ""},
                {"id": 4},
                {"id": "5", "from_email": "e@x.com"}
            ]"#,
        )
        .expect("json");
        let accounts = collect_accounts(raw).expect("collect");
        let ids: Vec<i64> = accounts.iter().map(|account| account.id.get()).collect();
        assert_eq!(ids, vec![1, 5]);
    }

    #[test]
    fn rejects_non_numeric_ids() {
        let raw: Vec<RawTag> =
            serde_json::from_str(r#"[{"id": "abc", "name": "VIP"}]"#).expect("json");
        assert!(collect_tags(raw).is_err());
    }
}
