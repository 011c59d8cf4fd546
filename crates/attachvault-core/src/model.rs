//! Message, part tree and destination types.

use std::fmt;

/// Label the message source puts on starred messages.
pub const STARRED_LABEL: &str = "STARRED";

/// Identifier of a folder in the file store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderId(pub String);

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an uploaded file in the file store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileId(pub String);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a message returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    /// Opaque message identifier.
    pub id: String,
}

/// A single message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Field name, as sent (case is not normalized).
    pub name: String,
    /// Raw field value.
    pub value: String,
}

impl Header {
    /// Create a header.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A fully fetched message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Opaque message identifier.
    pub id: String,
    /// Arrival time in epoch milliseconds.
    pub internal_date: i64,
    /// Classification labels.
    pub labels: Vec<String>,
    /// Top-level headers.
    pub headers: Vec<Header>,
    /// Root of the part tree.
    pub payload: Part,
}

impl Message {
    /// Whether the message carries the starred label.
    #[must_use]
    pub fn is_starred(&self) -> bool {
        self.labels.iter().any(|l| l == STARRED_LABEL)
    }

    /// Value of the first header whose name matches case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Sender address from the `From` header, lower-cased.
    ///
    /// `"Jane Doe <Jane.Doe@Example.com>"` becomes `jane.doe@example.com`.
    /// A missing header yields an empty string.
    #[must_use]
    pub fn sender_address(&self) -> String {
        self.header("from")
            .map(sender_address)
            .unwrap_or_default()
    }
}

/// Extracts the bare address from a `From` field value.
#[must_use]
pub fn sender_address(field: &str) -> String {
    field
        .rsplit('<')
        .next()
        .unwrap_or_default()
        .replace('>', "")
        .trim()
        .to_lowercase()
}

/// A node in a message's part tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Multipart container.
    Internal {
        /// MIME type of the container (e.g. `multipart/mixed`).
        mime_type: String,
        /// Filename, if the source supplied one. Never makes the node a candidate.
        filename: Option<String>,
        /// Child parts, in order.
        children: Vec<Part>,
    },
    /// Single body part.
    Leaf {
        /// MIME type of the body.
        mime_type: String,
        /// Filename, if any.
        filename: Option<String>,
        /// Reference for fetching the body separately, if any.
        attachment_id: Option<String>,
    },
}

impl Part {
    /// Build a leaf part.
    #[must_use]
    pub fn leaf(
        mime_type: impl Into<String>,
        filename: Option<&str>,
        attachment_id: Option<&str>,
    ) -> Self {
        Self::Leaf {
            mime_type: mime_type.into(),
            filename: filename.map(str::to_string),
            attachment_id: attachment_id.map(str::to_string),
        }
    }

    /// Build a container part without a filename.
    #[must_use]
    pub fn internal(mime_type: impl Into<String>, children: Vec<Self>) -> Self {
        Self::Internal {
            mime_type: mime_type.into(),
            filename: None,
            children,
        }
    }

    /// The attachment this part carries, if it is a candidate.
    ///
    /// Only leaves with both a non-empty filename and an attachment
    /// reference qualify.
    #[must_use]
    pub fn as_attachment(&self) -> Option<AttachmentPart<'_>> {
        match self {
            Self::Leaf {
                mime_type,
                filename: Some(filename),
                attachment_id: Some(attachment_id),
            } if !filename.is_empty() && !attachment_id.is_empty() => Some(AttachmentPart {
                filename,
                mime_type,
                attachment_id,
            }),
            _ => None,
        }
    }
}

/// Borrowed view of an attachment candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentPart<'a> {
    /// Filename as sent.
    pub filename: &'a str,
    /// MIME type as sent.
    pub mime_type: &'a str,
    /// Reference for fetching the bytes.
    pub attachment_id: &'a str,
}

/// Ordered folder names from the configured base downwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderPath(Vec<String>);

impl FolderPath {
    /// A path containing only the base folder.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self(vec![base.into()])
    }

    /// Extends the path by one segment.
    #[must_use]
    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.0.push(name.into());
        self
    }

    /// Segments from the base downwards.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}
