//! Gmail REST client.

use base64::Engine;
use base64::alphabet::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{BearerToken, MessageSource, ServiceError, ServiceResult, check_status};
use crate::model::{Header, Message, MessageRef, Part};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me/";

/// Largest page the list endpoint accepts.
const MAX_PAGE_SIZE: u32 = 500;

/// Attachment data is base64url; Gmail is inconsistent about padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Message source backed by the Gmail API.
#[derive(Debug, Clone)]
pub struct GmailClient {
    http: Client,
    base_url: Url,
    token: BearerToken,
}

impl GmailClient {
    /// Creates a client that authorizes every request with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in API URL fails to parse.
    pub fn new(token: BearerToken) -> ServiceResult<Self> {
        Self::with_base_url(token, GMAIL_API_BASE)
    }

    /// Creates a client against a different API root (ending in `/`).
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL.
    pub fn with_base_url(
        token: BearerToken,
        base_url: impl AsRef<str>,
    ) -> ServiceResult<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| ServiceError::Decode(format!("invalid Gmail API URL: {e}")))?;
        Ok(Self {
            http: Client::new(),
            base_url,
            token,
        })
    }

    fn endpoint(&self, path: &str) -> ServiceResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ServiceError::Decode(format!("invalid endpoint {path}: {e}")))
    }
}

impl MessageSource for GmailClient {
    async fn list_messages(&self, query: &str, max_results: u32) -> ServiceResult<Vec<MessageRef>> {
        let max = max_results as usize;
        let mut refs = Vec::new();
        let mut page_token: Option<String> = None;

        while refs.len() < max {
            let remaining = u32::try_from(max - refs.len()).unwrap_or(MAX_PAGE_SIZE);
            let page_size = remaining.min(MAX_PAGE_SIZE).to_string();

            let mut url = self.endpoint("messages")?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs
                    .append_pair("q", query)
                    .append_pair("maxResults", &page_size);
                if let Some(token) = &page_token {
                    pairs.append_pair("pageToken", token);
                }
            }

            debug!("Listing messages: {query}");
            let response = self
                .http
                .get(url)
                .bearer_auth(self.token.get())
                .send()
                .await?;
            let page: ListResponse = check_status(response).await?.json().await?;

            refs.extend(
                page.messages
                    .into_iter()
                    .map(|m| MessageRef { id: m.id }),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        refs.truncate(max);
        Ok(refs)
    }

    async fn get_message(&self, id: &str) -> ServiceResult<Message> {
        let mut url = self.endpoint(&format!("messages/{id}"))?;
        url.query_pairs_mut().append_pair("format", "full");

        debug!("Fetching message {id}");
        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.get())
            .send()
            .await?;
        let raw: RawMessage = check_status(response).await?.json().await?;
        Ok(raw.into())
    }

    async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> ServiceResult<Vec<u8>> {
        let url = self.endpoint(&format!(
            "messages/{message_id}/attachments/{attachment_id}"
        ))?;

        debug!("Fetching attachment {attachment_id} of {message_id}");
        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.get())
            .send()
            .await?;
        let body: AttachmentBody = check_status(response).await?.json().await?;
        decode_attachment_data(&body.data)
    }
}

/// Decodes base64url attachment data, with or without padding.
///
/// # Errors
///
/// Returns [`ServiceError::Decode`] if the data is not valid base64url.
pub fn decode_attachment_data(data: &str) -> ServiceResult<Vec<u8>> {
    URL_SAFE_LENIENT
        .decode(data.trim())
        .map_err(|e| ServiceError::Decode(format!("attachment data: {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<RawMessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    id: String,
    #[serde(default)]
    label_ids: Vec<String>,
    #[serde(default)]
    internal_date: Option<String>,
    #[serde(default)]
    payload: Option<RawPart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    headers: Vec<RawHeader>,
    #[serde(default)]
    body: Option<RawBody>,
    #[serde(default)]
    parts: Vec<RawPart>,
}

#[derive(Debug, Deserialize)]
struct RawHeader {
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBody {
    attachment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttachmentBody {
    data: String,
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        let mut payload = raw.payload.unwrap_or_default();
        let headers = std::mem::take(&mut payload.headers)
            .into_iter()
            .map(|h| Header::new(h.name, h.value))
            .collect();

        Self {
            id: raw.id,
            // Gmail sends the epoch-ms value as a string
            internal_date: raw
                .internal_date
                .and_then(|d| d.parse().ok())
                .unwrap_or_default(),
            labels: raw.label_ids,
            headers,
            payload: payload.into(),
        }
    }
}

impl From<RawPart> for Part {
    fn from(raw: RawPart) -> Self {
        let filename = raw.filename.filter(|f| !f.is_empty());
        if raw.parts.is_empty() {
            Self::Leaf {
                mime_type: raw.mime_type,
                filename,
                attachment_id: raw.body.and_then(|b| b.attachment_id),
            }
        } else {
            Self::Internal {
                mime_type: raw.mime_type,
                filename,
                children: raw.parts.into_iter().map(Into::into).collect(),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::extract::find_attachments;

    const MESSAGE_JSON: &str = r#"{
        "id": "18e4a",
        "threadId": "18e4a",
        "labelIds": ["INBOX", "STARRED"],
        "internalDate": "1710504000000",
        "payload": {
            "partId": "",
            "mimeType": "multipart/mixed",
            "filename": "",
            "headers": [
                {"name": "Subject", "value": "Invoice"},
                {"name": "From", "value": "Jane Doe <Jane.Doe@Example.com>"}
            ],
            "body": {"size": 0},
            "parts": [
                {
                    "partId": "0",
                    "mimeType": "multipart/alternative",
                    "filename": "",
                    "body": {"size": 0},
                    "parts": [
                        {"partId": "0.0", "mimeType": "text/plain", "filename": "", "body": {"size": 12, "data": "SGVsbG8gd29ybGQh"}},
                        {"partId": "0.1", "mimeType": "text/html", "filename": "", "body": {"size": 30, "data": "PGI-"}}
                    ]
                },
                {
                    "partId": "1",
                    "mimeType": "application/pdf",
                    "filename": "invoice.pdf",
                    "body": {"attachmentId": "ANGjdJ8", "size": 1024}
                }
            ]
        }
    }"#;

    #[test]
    fn test_message_mapping() {
        let raw: RawMessage = serde_json::from_str(MESSAGE_JSON).unwrap();
        let message: Message = raw.into();

        assert_eq!(message.id, "18e4a");
        assert_eq!(message.internal_date, 1_710_504_000_000);
        assert!(message.is_starred());
        assert_eq!(message.sender_address(), "jane.doe@example.com");

        let found = find_attachments(&message.payload);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "invoice.pdf");
        assert_eq!(found[0].attachment_id, "ANGjdJ8");
    }

    #[test]
    fn test_sparse_message() {
        let raw: RawMessage = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        let message: Message = raw.into();
        assert_eq!(message.internal_date, 0);
        assert!(message.labels.is_empty());
        assert!(find_attachments(&message.payload).is_empty());
    }

    #[test]
    fn test_list_response() {
        let page: ListResponse = serde_json::from_str(
            r#"{"messages": [{"id": "a", "threadId": "a"}], "nextPageToken": "p2", "resultSizeEstimate": 1}"#,
        )
        .unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.next_page_token.as_deref(), Some("p2"));

        let empty: ListResponse = serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(empty.messages.is_empty());
    }

    #[test]
    fn test_decode_attachment_data() {
        // "hello?>" encodes with '-' / '_' in the url-safe alphabet
        assert_eq!(decode_attachment_data("aGVsbG8_Pg==").unwrap(), b"hello?>");
        assert_eq!(decode_attachment_data("aGVsbG8_Pg").unwrap(), b"hello?>");
        assert!(decode_attachment_data("not base64!").is_err());
    }

    /// Answers `requests` GETs with an empty message list and returns the
    /// `Authorization` header of each.
    async fn serve_empty_lists(
        requests: usize,
    ) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let base = format!("http://{}/", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..requests {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&chunk[..n]);
                }
                let head = String::from_utf8_lossy(&head).to_string();
                let auth = head
                    .lines()
                    .find_map(|l| {
                        l.split_once(':')
                            .filter(|(k, _)| k.eq_ignore_ascii_case("authorization"))
                            .map(|(_, v)| v.trim().to_string())
                    })
                    .unwrap_or_default();
                seen.push(auth);

                let body = r#"{"resultSizeEstimate": 0}"#;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
            seen
        });

        (base, server)
    }

    #[tokio::test]
    async fn test_requests_use_current_token() {
        let (base, server) = serve_empty_lists(2).await;
        let token = BearerToken::new("first");
        let client = GmailClient::with_base_url(token.clone(), base).unwrap();

        assert!(client.list_messages("has:attachment", 10).await.unwrap().is_empty());
        token.set("refreshed");
        assert!(client.list_messages("has:attachment", 10).await.unwrap().is_empty());

        assert_eq!(
            server.await.unwrap(),
            ["Bearer first", "Bearer refreshed"]
        );
    }
}
