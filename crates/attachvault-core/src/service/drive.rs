//! Google Drive REST client.

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::{BearerToken, FileStore, ServiceError, ServiceResult, check_status};
use crate::ledger::Fingerprint;
use crate::model::{FileId, FolderId};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3/";
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3/";

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// MIME type used for every uploaded attachment.
pub const UPLOAD_MIME_TYPE: &str = "application/octet-stream";

/// File store backed by the Drive API.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: Client,
    api_url: Url,
    upload_url: Url,
    token: BearerToken,
}

impl DriveClient {
    /// Creates a client that authorizes every request with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in API URLs fail to parse.
    pub fn new(token: BearerToken) -> ServiceResult<Self> {
        Self::with_base_urls(token, DRIVE_API_BASE, DRIVE_UPLOAD_BASE)
    }

    /// Creates a client against different API roots (each ending in `/`).
    ///
    /// # Errors
    ///
    /// Returns an error if either URL is invalid.
    pub fn with_base_urls(
        token: BearerToken,
        api_url: impl AsRef<str>,
        upload_url: impl AsRef<str>,
    ) -> ServiceResult<Self> {
        let parse = |s: &str| {
            Url::parse(s).map_err(|e| ServiceError::Decode(format!("invalid Drive API URL: {e}")))
        };
        Ok(Self {
            http: Client::new(),
            api_url: parse(api_url.as_ref())?,
            upload_url: parse(upload_url.as_ref())?,
            token,
        })
    }

    fn files_url(base: &Url) -> ServiceResult<Url> {
        base.join("files")
            .map_err(|e| ServiceError::Decode(format!("invalid files endpoint: {e}")))
    }
}

impl FileStore for DriveClient {
    async fn list_folders(
        &self,
        name: &str,
        parent: Option<&FolderId>,
    ) -> ServiceResult<Vec<FolderId>> {
        let mut url = Self::files_url(&self.api_url)?;
        url.query_pairs_mut()
            .append_pair("q", &folder_query(name, parent))
            .append_pair("spaces", "drive")
            .append_pair("fields", "files(id)")
            .append_pair("pageSize", "1");

        debug!("Looking up folder {name}");
        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.get())
            .send()
            .await?;
        let list: FileList = check_status(response).await?.json().await?;
        Ok(list.files.into_iter().map(|f| FolderId(f.id)).collect())
    }

    async fn create_folder(&self, name: &str, parent: Option<&FolderId>) -> ServiceResult<FolderId> {
        let mut url = Self::files_url(&self.api_url)?;
        url.query_pairs_mut().append_pair("fields", "id");

        let mut metadata = json!({ "name": name, "mimeType": FOLDER_MIME_TYPE });
        if let Some(parent) = parent {
            metadata["parents"] = json!([parent.0]);
        }

        debug!("Creating folder {name}");
        let response = self
            .http
            .post(url)
            .bearer_auth(self.token.get())
            .json(&metadata)
            .send()
            .await?;
        let file: FileRef = check_status(response).await?.json().await?;
        Ok(FolderId(file.id))
    }

    async fn create_file(&self, name: &str, parent: &FolderId, data: &[u8]) -> ServiceResult<FileId> {
        let mut url = Self::files_url(&self.upload_url)?;
        url.query_pairs_mut()
            .append_pair("uploadType", "multipart")
            .append_pair("fields", "id");

        let metadata = json!({ "name": name, "parents": [parent.0] });
        let boundary = format!("attachvault-{}", &Fingerprint::of(data).as_str()[..32]);
        let body = multipart_related(&boundary, &metadata.to_string(), data);

        debug!("Uploading {name} ({} bytes)", data.len());
        let response = self
            .http
            .post(url)
            .bearer_auth(self.token.get())
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;
        let file: FileRef = check_status(response).await?.json().await?;
        Ok(FileId(file.id))
    }
}

/// Drive search query for a non-trashed folder with an exact name.
fn folder_query(name: &str, parent: Option<&FolderId>) -> String {
    let mut query = format!(
        "name='{}' and mimeType='{FOLDER_MIME_TYPE}' and trashed=false",
        escape_query_value(name)
    );
    if let Some(parent) = parent {
        query.push_str(&format!(" and '{}' in parents", escape_query_value(&parent.0)));
    }
    query
}

fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Builds a `multipart/related` body: JSON metadata, then the raw content.
fn multipart_related(boundary: &str, metadata: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: {UPLOAD_MIME_TYPE}\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    id: String,
}
