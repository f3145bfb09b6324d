use serde::de::DeserializeOwned;
use serde::Deserialize;
use tagmap_core::{AccountRecord, TagRecord};

use crate::records::{collect_accounts, collect_tags, RawAccount, RawTag};
use crate::{RemoteError, Result};

pub const ACCOUNTS_QUERY: &str = "query { email_accounts { id from_email } }";
pub const TAGS_QUERY: &str = "query { tags { id name } }";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AccountsData {
    email_accounts: Vec<RawAccount>,
}

#[derive(Debug, Deserialize)]
struct TagsData {
    tags: Vec<RawTag>,
}

fn unwrap_envelope<T: DeserializeOwned>(body: &str) -> Result<T> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|err| RemoteError::Parse(err.to_string()))?;
    if !envelope.errors.is_empty() {
        let messages: Vec<String> = envelope
            .errors
            .into_iter()
            .map(|entry| entry.message)
            .collect();
        return Err(RemoteError::Graphql(messages.join("; ")));
    }
    envelope
        .data
        .ok_or_else(|| RemoteError::Graphql("response has no data".to_string()))
}

pub fn parse_accounts_response(body: &str) -> Result<Vec<AccountRecord>> {
    let data: AccountsData = unwrap_envelope(body)?;
    collect_accounts(data.email_accounts)
}

pub fn parse_tags_response(body: &str) -> Result<Vec<TagRecord>> {
    let data: TagsData = unwrap_envelope(body)?;
    collect_tags(data.tags)
}

#[cfg(feature = "http")]
mod imp {
    use super::{parse_accounts_response, parse_tags_response, ACCOUNTS_QUERY, TAGS_QUERY};
    use crate::client::{build_client, read_success_body, HttpSettings};
    use crate::source::LookupSource;
    use crate::Result;
    use reqwest::blocking::Client;
    use tagmap_core::{AccountRecord, TagRecord};
    use tracing::debug;
    use url::Url;

    pub struct GraphqlSource {
        client: Client,
        url: Url,
        bearer: String,
    }

    impl GraphqlSource {
        pub fn new(url: &str, bearer: String, settings: &HttpSettings) -> Result<Self> {
            Ok(Self {
                client: build_client(settings)?,
                url: Url::parse(url)?,
                bearer,
            })
        }

        fn query(&self, query: &str) -> Result<String> {
            debug!(url = %self.url, query, "graphql lookup");
            let response = self
                .client
                .post(self.url.clone())
                .bearer_auth(&self.bearer)
                .json(&serde_json::json!({ "query": query }))
                .send()?;
            read_success_body("graphql", response)
        }
    }

    impl LookupSource for GraphqlSource {
        fn source_name(&self) -> &'static str {
            "graphql"
        }

        fn fetch_accounts(&self) -> Result<Vec<AccountRecord>> {
            parse_accounts_response(&self.query(ACCOUNTS_QUERY)?)
        }

        fn fetch_tags(&self) -> Result<Vec<TagRecord>> {
            parse_tags_response(&self.query(TAGS_QUERY)?)
        }
    }
}

#[cfg(not(feature = "http"))]
mod imp {
    use crate::client::{unavailable, HttpSettings};
    use crate::source::LookupSource;
    use crate::Result;
    use tagmap_core::{AccountRecord, TagRecord};

    pub struct GraphqlSource {
        _private: (),
    }

    impl GraphqlSource {
        pub fn new(_url: &str, _bearer: String, _settings: &HttpSettings) -> Result<Self> {
            unavailable()
        }
    }

    impl LookupSource for GraphqlSource {
        fn source_name(&self) -> &'static str {
            "graphql"
        }

        fn fetch_accounts(&self) -> Result<Vec<AccountRecord>> {
            unavailable()
        }

        fn fetch_tags(&self) -> Result<Vec<TagRecord>> {
            unavailable()
        }
    }
}

pub use imp::GraphqlSource;
