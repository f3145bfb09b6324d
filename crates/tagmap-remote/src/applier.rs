use serde::Serialize;
use tagmap_core::{AccountId, TagId};

/// Body of the tag-mapping call. Always exactly one tag.
#[derive(Debug, Serialize)]
pub struct TagMappingRequest<'a> {
    pub email_account_ids: &'a [AccountId],
    pub tag_ids: [TagId; 1],
}

impl<'a> TagMappingRequest<'a> {
    pub fn new(tag_id: TagId, account_ids: &'a [AccountId]) -> Self {
        Self {
            email_account_ids: account_ids,
            tag_ids: [tag_id],
        }
    }
}

#[cfg(feature = "http")]
mod imp {
    use super::TagMappingRequest;
    use crate::client::{build_client, failure_message, HttpSettings};
    use reqwest::blocking::Client;
    use tagmap_core::{AccountId, ApplyFailure, TagApplier, TagId};
    use tracing::{debug, warn};
    use url::Url;

    pub struct HttpTagApplier {
        client: Client,
        url: Url,
    }

    impl HttpTagApplier {
        pub fn new(
            tag_mapping_url: &str,
            api_key: &str,
            settings: &HttpSettings,
        ) -> crate::Result<Self> {
            let mut url = Url::parse(tag_mapping_url)?;
            url.query_pairs_mut().append_pair("api_key", api_key);
            Ok(Self {
                client: build_client(settings)?,
                url,
            })
        }
    }

    impl TagApplier for HttpTagApplier {
        fn apply_tag(
            &self,
            tag_id: TagId,
            account_ids: &[AccountId],
        ) -> Result<(), ApplyFailure> {
            debug!(%tag_id, size = account_ids.len(), "applying tag batch");
            let response = self
                .client
                .post(self.url.clone())
                .json(&TagMappingRequest::new(tag_id, account_ids))
                .send()
                .map_err(|err| ApplyFailure::new(err.without_url().to_string()))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            let message = match response.text() {
                Ok(body) => failure_message(status.as_u16(), &body),
                Err(err) => format!("HTTP {}: {}", status.as_u16(), err.without_url()),
            };
            warn!(
                %tag_id,
                status = status.as_u16(),
                error = %message,
                "tag batch rejected"
            );
            Err(ApplyFailure::new(message))
        }
    }
}

#[cfg(not(feature = "http"))]
mod imp {
    use crate::client::{unavailable, HttpSettings};
    use tagmap_core::{AccountId, ApplyFailure, TagApplier, TagId};

    pub struct HttpTagApplier {
        _private: (),
    }

    impl HttpTagApplier {
        pub fn new(
            _tag_mapping_url: &str,
            _api_key: &str,
            _settings: &HttpSettings,
        ) -> crate::Result<Self> {
            unavailable()
        }
    }

    impl TagApplier for HttpTagApplier {
        fn apply_tag(
            &self,
            _tag_id: TagId,
            _account_ids: &[AccountId],
        ) -> Result<(), ApplyFailure> {
            Err(ApplyFailure::new("remote calls require the http feature"))
        }
    }
}

pub use imp::HttpTagApplier;

#[cfg(test)]
mod tests {
    use super::TagMappingRequest;
    use tagmap_core::{AccountId, TagId};

    #[test]
    fn request_body_matches_tag_mapping_shape() {
        let ids = [AccountId(1), AccountId(2)];
        let body = serde_json::to_value(TagMappingRequest::new(TagId(9), &ids)).expect("json");
        assert_eq!(
            body,
            serde_json::json!({ "email_account_ids": [1, 2], "tag_ids": [9] })
        );
    }

    #[cfg(feature = "http")]
    mod live {
        use super::super::HttpTagApplier;
        use crate::client::HttpSettings;
        use std::io::{Read, Write};
        use std::net::{TcpListener, TcpStream};
        use std::thread::{self, JoinHandle};
        use tagmap_core::{AccountId, TagApplier, TagId};

        fn read_request(stream: &mut TcpStream) -> String {
            let mut data = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let read = stream.read(&mut buf).expect("read request");
                if read == 0 {
                    break;
                }
                data.extend_from_slice(&buf[..read]);
                let text = String::from_utf8_lossy(&data).into_owned();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if data.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            String::from_utf8_lossy(&data).into_owned()
        }

        fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            let addr = listener.local_addr().expect("addr");
            let handle = thread::spawn(move || {
                let (mut stream, _) = listener.accept().expect("accept");
                let request = read_request(&mut stream);
                stream.write_all(response.as_bytes()).expect("write response");
                request
            });
            (format!("http://{addr}/tag-mapping"), handle)
        }

        fn applier(url: &str) -> HttpTagApplier {
            HttpTagApplier::new(url, "k", &HttpSettings::default()).expect("applier")
        }

        #[test]
        fn sends_api_key_and_body() {
            let (url, server) =
                serve_once("HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}");
            applier(&url)
                .apply_tag(TagId(9), &[AccountId(1), AccountId(2)])
                .expect("applied");

            let request = server.join().expect("server");
            assert!(request.starts_with("POST /tag-mapping?api_key=k "));
            assert!(request.contains(r#"{"email_account_ids":[1,2],"tag_ids":[9]}"#));
        }

        #[test]
        fn empty_rejection_reports_status() {
            let (url, server) = serve_once(
                "HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
            let err = applier(&url)
                .apply_tag(TagId(9), &[AccountId(1)])
                .unwrap_err();
            server.join().expect("server");
            assert_eq!(err.message, "HTTP 401");
        }

        #[test]
        fn rejection_message_comes_from_body() {
            let (url, server) = serve_once(
                "HTTP/1.1 400 Bad Request\r\nContent-Type: application/json\r\nContent-Length: 27\r\nConnection: close\r\n\r\n{\"message\":\"Tag not found\"}",
            );
            let err = applier(&url)
                .apply_tag(TagId(9), &[AccountId(1)])
                .unwrap_err();
            server.join().expect("server");
            assert_eq!(err.message, "Tag not found");
        }
    }
}
