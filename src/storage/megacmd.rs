//! MEGA storage client driven through the MEGAcmd command-line tools.
//!
//! Requires MEGAcmd to be installed (https://mega.nz/cmd). The tools keep
//! their own session in the background server, so a login survives process
//! restarts until `mega-logout` is run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tokio::sync::Mutex;

use super::types::{FileRecord, NodeAttributes, NodeKind, StorageSpace, UploadResponse, UploadedNode};
use super::{RemoteStorage, StorageError};
use crate::config::MegaConfig;

/// Remote folder that deleted nodes are moved into.
const RUBBISH_BIN: &str = "//bin";

/// MEGA account accessed through MEGAcmd.
pub struct MegaCmdStorage {
    email: String,
    command_dir: Option<PathBuf>,
    /// Held across an upload and the listings that identify its handle.
    upload_lock: Mutex<()>,
}

impl MegaCmdStorage {
    fn new(email: String, command_dir: Option<PathBuf>) -> Self {
        Self {
            email,
            command_dir,
            upload_lock: Mutex::new(()),
        }
    }

    /// Log in to the configured account.
    ///
    /// An existing MEGAcmd session for the same e-mail is reused; a session
    /// for a different account is logged out first.
    pub async fn login(config: &MegaConfig) -> Result<Self, StorageError> {
        let storage = Self::new(
            config.email.clone(),
            config.command_dir.as_ref().map(PathBuf::from),
        );
        let password = SecretString::from(config.password.clone());

        if let Ok(whoami) = storage.run("mega-whoami", &[]).await {
            if whoami.contains(&storage.email) {
                tracing::info!(email = %storage.email, "Reusing existing MEGAcmd session");
                return Ok(storage);
            }
            tracing::info!("MEGAcmd session belongs to another account, logging out");
            let _ = storage.run("mega-logout", &[]).await;
        }

        storage
            .run("mega-login", &[storage.email.as_str(), password.expose_secret()])
            .await?;
        tracing::info!(email = %storage.email, "Logged in to MEGA");

        Ok(storage)
    }

    fn program(&self, command: &str) -> PathBuf {
        match &self.command_dir {
            Some(dir) => dir.join(command),
            None => PathBuf::from(command),
        }
    }

    /// Run a MEGAcmd tool and return its standard output.
    async fn run(&self, command: &str, args: &[&str]) -> Result<String, StorageError> {
        // Arguments may contain the account password; log the tool name only.
        tracing::debug!(command, "Running MEGAcmd");

        let output = Command::new(self.program(command))
            .args(args)
            .output()
            .await
            .map_err(|source| StorageError::Spawn {
                command: command.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(StorageError::Failed {
                command: command.to_string(),
                message,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn list_root(&self) -> Result<HashMap<String, FileRecord>, StorageError> {
        let output = self.run("mega-ls", &["-l", "--show-handles", "/"]).await?;
        Ok(parse_listing(&output))
    }

    async fn used_and_total(&self) -> Result<(u64, u64), StorageError> {
        let output = self.run("mega-df", &[]).await?;
        parse_df(&output)
    }
}

#[async_trait]
impl RemoteStorage for MegaCmdStorage {
    async fn list(&self) -> Result<HashMap<String, FileRecord>, StorageError> {
        let output = self.run("mega-ls", &["-lr", "--show-handles", "/"]).await?;
        let records = parse_listing(&output);
        tracing::debug!(count = records.len(), "Listed remote nodes");
        Ok(records)
    }

    async fn upload(&self, path: &Path) -> Result<UploadResponse, StorageError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StorageError::Parse(format!("no file name in {}", path.display())))?;
        let local = path.to_string_lossy();

        // MEGAcmd does not print the new handle, so diff the root folder.
        let _guard = self.upload_lock.lock().await;
        let before = self.list_root().await?;
        self.run("mega-put", &[&*local, "/"]).await?;
        let after = self.list_root().await?;

        let nodes = uploaded_nodes(&before, &after, &name);
        if nodes.len() > 1 {
            tracing::warn!(file = %name, count = nodes.len(), "Several new nodes match the upload");
        }

        Ok(UploadResponse { nodes })
    }

    async fn download(
        &self,
        id: &str,
        record: &FileRecord,
        dest_dir: &Path,
    ) -> Result<PathBuf, StorageError> {
        let remote = format!("H:{id}");
        let dest = dest_dir.to_string_lossy();
        self.run("mega-get", &[remote.as_str(), &*dest]).await?;

        let name = record
            .display_name()
            .ok_or_else(|| StorageError::Parse(format!("node {id} has no name")))?;
        let local = dest_dir.join(&name);
        if !tokio::fs::try_exists(&local).await? {
            return Err(StorageError::Parse(format!(
                "mega-get did not produce {name} for {id}"
            )));
        }

        Ok(local)
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let remote = format!("H:{id}");
        self.run("mega-mv", &[remote.as_str(), RUBBISH_BIN]).await?;
        Ok(())
    }

    async fn get_user(&self) -> Result<serde_json::Value, StorageError> {
        let output = self.run("mega-whoami", &["-l"]).await?;
        Ok(parse_whoami(&output))
    }

    async fn get_quota(&self) -> Result<u64, StorageError> {
        let (_, total) = self.used_and_total().await?;
        Ok(total / 1024 / 1024)
    }

    async fn get_storage_space(&self) -> Result<StorageSpace, StorageError> {
        let (used, total) = self.used_and_total().await?;
        Ok(StorageSpace {
            used: used / 1024,
            total: total / 1024,
        })
    }
}

/// Parse `mega-ls -l --show-handles` output.
///
/// Node lines look like
/// `-ep---    1      12345 15Mar2024 10:00:00 report.pdf <H:AbCdEfGh>`.
/// The name is everything between the time column and the last handle
/// token, kept byte for byte. Header lines and folder banners of recursive
/// listings carry no handle and are skipped.
pub fn parse_listing(output: &str) -> HashMap<String, FileRecord> {
    let mut records = HashMap::new();

    for line in output.lines() {
        let line = line.trim_end_matches('\r');
        let spans = token_spans(line);
        let token = |i: usize| &line[spans[i].0..spans[i].1];

        // FLAGS VERS SIZE DATE TIME NAME.. HANDLE
        if spans.len() < 7 || token(0) == "FLAGS" {
            continue;
        }
        let Some(handle_index) = (6..spans.len()).rev().find(|&i| parse_handle(token(i)).is_some())
        else {
            continue;
        };
        let Some(handle) = parse_handle(token(handle_index)) else {
            continue;
        };

        let between = &line[spans[4].1..spans[handle_index].0];
        let name = between.strip_prefix(' ').unwrap_or(between);
        let name = name.strip_suffix(' ').unwrap_or(name);
        if name.is_empty() {
            continue;
        }

        let kind = match token(0).chars().next() {
            Some('d') => NodeKind::Folder,
            Some('-') => NodeKind::File,
            _ => NodeKind::Other(-1),
        };

        records.insert(
            handle.to_string(),
            FileRecord {
                attributes: NodeAttributes::Structured {
                    n: Some(name.to_string()),
                },
                size: token(2).parse().ok(),
                kind,
            },
        );
    }

    records
}

/// Byte ranges of the whitespace-separated tokens of a line.
fn token_spans(line: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;

    for (i, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, line.len()));
    }

    spans
}

/// Extract the handle from a `<H:xxxx>` token.
fn parse_handle(token: &str) -> Option<&str> {
    token
        .strip_prefix("<H:")?
        .strip_suffix('>')
        .filter(|h| !h.is_empty())
}

/// Nodes present in `after` but not in `before` that carry the uploaded
/// name, ordered by handle.
fn uploaded_nodes(
    before: &HashMap<String, FileRecord>,
    after: &HashMap<String, FileRecord>,
    name: &str,
) -> Vec<UploadedNode> {
    let mut handles: Vec<&String> = after
        .iter()
        .filter(|(handle, record)| {
            !before.contains_key(*handle) && record.display_name().as_deref() == Some(name)
        })
        .map(|(handle, _)| handle)
        .collect();
    handles.sort();

    handles
        .into_iter()
        .map(|handle| UploadedNode {
            handle: handle.clone(),
        })
        .collect()
}

/// Parse the `USED STORAGE:` line of `mega-df` into used and total bytes.
pub fn parse_df(output: &str) -> Result<(u64, u64), StorageError> {
    let line = output
        .lines()
        .find_map(|line| line.trim().strip_prefix("USED STORAGE:"))
        .ok_or_else(|| StorageError::Parse("mega-df output has no USED STORAGE line".into()))?;

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let used = tokens
        .first()
        .and_then(|t| t.parse::<u64>().ok())
        .ok_or_else(|| StorageError::Parse(format!("invalid used storage: {line}")))?;
    let total = tokens
        .iter()
        .position(|t| *t == "of")
        .and_then(|i| tokens.get(i + 1))
        .and_then(|t| t.parse::<u64>().ok())
        .ok_or_else(|| StorageError::Parse(format!("invalid total storage: {line}")))?;

    Ok((used, total))
}

/// Parse `mega-whoami -l` `key: value` lines into a JSON object.
pub fn parse_whoami(output: &str) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                map.insert(
                    key.to_string(),
                    serde_json::Value::String(value.trim().to_string()),
                );
            }
        }
    }
    serde_json::Value::Object(map)
}
