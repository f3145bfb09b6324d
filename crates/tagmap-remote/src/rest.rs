//! REST fallback for the lookup tables, authenticated with the API key.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::records::{RawAccount, RawTag};
use crate::{RemoteError, Result};

pub const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 1_000;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Items(Vec<T>),
    Wrapped { data: Vec<T> },
}

fn parse_list<T: DeserializeOwned>(body: &str) -> Result<Vec<T>> {
    let parsed: ListBody<T> = serde_json::from_str(body)
        .map_err(|err| RemoteError::Parse(format!("unexpected list response: {err}")))?;
    Ok(match parsed {
        ListBody::Items(items) | ListBody::Wrapped { data: items } => items,
    })
}

pub fn parse_accounts_page(body: &str) -> Result<Vec<RawAccount>> {
    parse_list(body)
}

pub fn parse_tags_list(body: &str) -> Result<Vec<RawTag>> {
    parse_list(body)
}

#[cfg(feature = "http")]
mod imp {
    use super::{parse_accounts_page, parse_tags_list, MAX_PAGES, PAGE_SIZE};
    use crate::client::{build_client, read_success_body, HttpSettings};
    use crate::records::{collect_accounts, collect_tags};
    use crate::source::LookupSource;
    use crate::{RemoteError, Result};
    use reqwest::blocking::Client;
    use tagmap_core::{AccountRecord, TagRecord};
    use tracing::debug;
    use url::Url;

    pub struct RestSource {
        client: Client,
        accounts_url: Url,
        tags_url: Url,
        api_key: String,
    }

    impl RestSource {
        pub fn new(
            accounts_url: &str,
            tags_url: &str,
            api_key: String,
            settings: &HttpSettings,
        ) -> Result<Self> {
            Ok(Self {
                client: build_client(settings)?,
                accounts_url: Url::parse(accounts_url)?,
                tags_url: Url::parse(tags_url)?,
                api_key,
            })
        }

        fn get(&self, endpoint: &'static str, base: &Url, page: Option<usize>) -> Result<String> {
            let mut url = base.clone();
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("api_key", &self.api_key);
                if let Some(page) = page {
                    query.append_pair("offset", &(page * PAGE_SIZE).to_string());
                    query.append_pair("limit", &PAGE_SIZE.to_string());
                }
            }
            debug!(endpoint, ?page, "rest lookup");
            let response = self
                .client
                .get(url)
                .send()
                .map_err(|err| RemoteError::Http(err.without_url()))?;
            read_success_body(endpoint, response)
        }
    }

    impl LookupSource for RestSource {
        fn source_name(&self) -> &'static str {
            "rest"
        }

        fn fetch_accounts(&self) -> Result<Vec<AccountRecord>> {
            let mut raw = Vec::new();
            for page in 0..MAX_PAGES {
                let body = self.get("rest accounts", &self.accounts_url, Some(page))?;
                let rows = parse_accounts_page(&body)?;
                let done = rows.len() < PAGE_SIZE;
                raw.extend(rows);
                if done {
                    return collect_accounts(raw);
                }
            }
            Err(RemoteError::Parse(format!(
                "account listing did not end after {MAX_PAGES} pages"
            )))
        }

        fn fetch_tags(&self) -> Result<Vec<TagRecord>> {
            let body = self.get("rest tags", &self.tags_url, None)?;
            collect_tags(parse_tags_list(&body)?)
        }
    }
}

#[cfg(not(feature = "http"))]
mod imp {
    use crate::client::{unavailable, HttpSettings};
    use crate::source::LookupSource;
    use crate::Result;
    use tagmap_core::{AccountRecord, TagRecord};

    pub struct RestSource {
        _private: (),
    }

    impl RestSource {
        pub fn new(
            _accounts_url: &str,
            _tags_url: &str,
            _api_key: String,
            _settings: &HttpSettings,
        ) -> Result<Self> {
            unavailable()
        }
    }

    impl LookupSource for RestSource {
        fn source_name(&self) -> &'static str {
            "rest"
        }

        fn fetch_accounts(&self) -> Result<Vec<AccountRecord>> {
            unavailable()
        }

        fn fetch_tags(&self) -> Result<Vec<TagRecord>> {
            unavailable()
        }
    }
}

pub use imp::RestSource;
