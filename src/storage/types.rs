//! Node metadata as reported by the storage provider.

use serde::{Deserialize, Serialize};

use super::attributes::decode_name;

/// Node type code used by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum NodeKind {
    /// Regular file (code 0).
    File,
    /// Folder (code 1).
    Folder,
    /// Provider-internal node such as the root, inbox or rubbish bin.
    Other(i64),
}

impl From<i64> for NodeKind {
    fn from(code: i64) -> Self {
        match code {
            0 => NodeKind::File,
            1 => NodeKind::Folder,
            other => NodeKind::Other(other),
        }
    }
}

impl From<NodeKind> for i64 {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::File => 0,
            NodeKind::Folder => 1,
            NodeKind::Other(code) => code,
        }
    }
}

impl NodeKind {
    /// Label used in listings, or `None` for provider-internal nodes.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            NodeKind::File => Some("File"),
            NodeKind::Folder => Some("Folder"),
            NodeKind::Other(_) => None,
        }
    }
}

/// Node attributes: either already decoded or an encoded blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeAttributes {
    /// Encoded attribute blob, see [`decode_name`].
    Encoded(String),
    /// Structured attributes with a plain name field.
    Structured {
        #[serde(default)]
        n: Option<String>,
    },
}

impl Default for NodeAttributes {
    fn default() -> Self {
        NodeAttributes::Structured { n: None }
    }
}

/// Cached metadata for one remote node.
///
/// The identifier is not part of the record; it is the key under which the
/// record is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Name attributes.
    #[serde(rename = "a", default)]
    pub attributes: NodeAttributes,
    /// Size in bytes, when the provider reports one.
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Node type.
    #[serde(rename = "t")]
    pub kind: NodeKind,
}

impl FileRecord {
    /// Create a file record with a plain name.
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            attributes: NodeAttributes::Structured {
                n: Some(name.into()),
            },
            size: Some(size),
            kind: NodeKind::File,
        }
    }

    /// Create a folder record with a plain name.
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            attributes: NodeAttributes::Structured {
                n: Some(name.into()),
            },
            size: None,
            kind: NodeKind::Folder,
        }
    }

    /// Resolve the display name from the structured field or the encoded blob.
    ///
    /// Empty names count as absent.
    pub fn display_name(&self) -> Option<String> {
        let name = match &self.attributes {
            NodeAttributes::Structured { n } => n.clone(),
            NodeAttributes::Encoded(blob) => decode_name(blob),
        };
        name.filter(|n| !n.is_empty())
    }

    /// Whether the node is a file or folder visible to API clients.
    pub fn is_listable(&self) -> bool {
        self.kind.label().is_some()
    }
}

/// Result of an upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Nodes created by the upload.
    #[serde(rename = "f", default)]
    pub nodes: Vec<UploadedNode>,
}

impl UploadResponse {
    /// Handle of the first created node.
    pub fn first_handle(&self) -> Option<&str> {
        self.nodes.first().map(|node| node.handle.as_str())
    }
}

/// A node created by an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedNode {
    /// Identifier of the new node.
    #[serde(rename = "h")]
    pub handle: String,
}

/// Used and total storage space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSpace {
    pub used: u64,
    pub total: u64,
}
