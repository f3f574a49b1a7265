//! Durable backend: append-only journals of committed transactions, one
//! segment file per tenant.
//!
//! Each committed transaction with at least one write becomes one JSON line
//! ([`JournalEntry`]) in its tenant's segment, `<dir>/<key>.jsonl`. The line
//! is written, and fsynced when `sync` is on, before the tenant's in-memory
//! tables change, so a commit that returned `Ok` survives a crash. A segment
//! is only ever appended to under its own tenant's transaction, so one
//! tenant's fsync never delays another tenant's commit.
//!
//! On open every segment is replayed line by line. A final line without its
//! newline is a write torn by a crash; it was never acknowledged, so it is
//! dropped and the segment truncated to the last complete line. An
//! unreadable complete line, or an entry filed under another tenant's
//! segment, is reported as [`StorageError::Corrupt`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use notary_core::{HoldingIdentity, SecureHash, StateDetails, StateRef};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::record::{JournalEntry, TransactionDetails};
use crate::tenant::{TenantRegistry, TenantTransaction};
use crate::traits::BackingStore;

const SEGMENT_EXTENSION: &str = "jsonl";

/// A tenant's writer, opened on its first commit when no segment exists yet.
type SegmentSlot = Arc<AsyncMutex<Option<JournalWriter>>>;

/// Journal-backed store. Isolation is the same per-tenant single writer as
/// [`InMemoryBackingStore`](crate::InMemoryBackingStore).
pub struct JournalBackingStore {
    registry: TenantRegistry,
    segments: Mutex<HashMap<HoldingIdentity, SegmentSlot>>,
    dir: PathBuf,
    sync: bool,
}

struct JournalWriter {
    file: File,
    /// Length of the segment up to the last complete line.
    len: u64,
}

impl JournalWriter {
    async fn create(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        let len = file.metadata().await?.len();
        Ok(JournalWriter { file, len })
    }

    async fn append(&mut self, line: &[u8], sync: bool) -> Result<(), StorageError> {
        let written = async {
            self.file.write_all(line).await?;
            self.file.flush().await?;
            if sync {
                self.file.sync_data().await?;
            }
            Ok::<(), std::io::Error>(())
        }
        .await;

        match written {
            Ok(()) => {
                self.len += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                // Cut off whatever part of the line made it to disk so the
                // next append starts on a clean line.
                if let Err(truncate_err) = self.file.set_len(self.len).await {
                    warn!(error = %truncate_err, "failed to truncate journal segment after write error");
                }
                Err(e.into())
            }
        }
    }
}

/// File name of a tenant's segment: the lowercase hex SHA-256 of its
/// X.500 name and group id.
fn segment_file_name(holding_identity: &HoldingIdentity) -> String {
    let key = SecureHash::sha256(format!(
        "{}\n{}",
        holding_identity.x500_name, holding_identity.group_id
    ));
    format!("{}.{}", key.to_hex().to_lowercase(), SEGMENT_EXTENSION)
}

/// Outcome of scanning one segment.
struct Replay {
    entries: Vec<JournalEntry>,
    valid_len: u64,
}

fn scan(segment: &str, contents: &[u8]) -> Result<Replay, StorageError> {
    let corrupt = |line: usize, reason: String| StorageError::Corrupt {
        segment: segment.to_string(),
        line,
        reason,
    };
    let mut entries = Vec::new();
    let mut offset = 0usize;
    let mut line_no = 0usize;

    while offset < contents.len() {
        let rest = &contents[offset..];
        let Some(end) = rest.iter().position(|b| *b == b'\n') else {
            break;
        };
        line_no += 1;
        let line = &rest[..end];
        offset += end + 1;

        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let entry = serde_json::from_slice::<JournalEntry>(line)
            .map_err(|e| corrupt(line_no, e.to_string()))?;
        if segment_file_name(&entry.holding_identity) != segment {
            return Err(corrupt(
                line_no,
                format!("entry for {} in another tenant's segment", entry.holding_identity),
            ));
        }
        entries.push(entry);
    }

    Ok(Replay {
        entries,
        valid_len: offset as u64,
    })
}

impl JournalBackingStore {
    /// Open (or create) the journal directory `dir` and replay every segment.
    pub async fn open(dir: impl Into<PathBuf>, sync: bool) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let registry = TenantRegistry::default();
        let mut segments = HashMap::new();
        let mut entries = 0usize;

        let mut listing = tokio::fs::read_dir(&dir).await?;
        while let Some(item) = listing.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SEGMENT_EXTENSION) {
                continue;
            }
            let Some(segment) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                continue;
            };

            let contents = tokio::fs::read(&path).await?;
            let replay = scan(&segment, &contents)?;
            for entry in &replay.entries {
                registry.apply(entry).await?;
            }
            entries += replay.entries.len();

            let file = OpenOptions::new().append(true).open(&path).await?;
            if replay.valid_len < contents.len() as u64 {
                warn!(
                    segment = %path.display(),
                    discarded_bytes = contents.len() as u64 - replay.valid_len,
                    "discarding torn journal tail"
                );
                file.set_len(replay.valid_len).await?;
            }
            if let Some(first) = replay.entries.first() {
                let writer = JournalWriter {
                    file,
                    len: replay.valid_len,
                };
                segments.insert(
                    first.holding_identity.clone(),
                    Arc::new(AsyncMutex::new(Some(writer))),
                );
            }
        }

        info!(
            dir = %dir.display(),
            entries,
            tenants = registry.tenant_count(),
            "journal replayed"
        );

        Ok(JournalBackingStore {
            registry,
            segments: Mutex::new(segments),
            dir,
            sync,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `holding_identity`'s entries are appended. The file exists
    /// once the tenant has committed a write.
    pub fn segment_path(&self, holding_identity: &HoldingIdentity) -> PathBuf {
        self.dir.join(segment_file_name(holding_identity))
    }

    fn segment(&self, holding_identity: &HoldingIdentity) -> Result<SegmentSlot, StorageError> {
        let mut segments = self
            .segments
            .lock()
            .map_err(|_| StorageError::Backend("journal segment map lock poisoned".to_string()))?;
        Ok(segments.entry(holding_identity.clone()).or_default().clone())
    }
}

#[async_trait]
impl BackingStore for JournalBackingStore {
    type Transaction = TenantTransaction;

    async fn begin_transaction(
        &self,
        holding_identity: &HoldingIdentity,
    ) -> Result<TenantTransaction, StorageError> {
        self.registry.begin(holding_identity).await
    }

    async fn commit_transaction(&self, txn: TenantTransaction) -> Result<(), StorageError> {
        let (mut tables, entry) = txn.into_parts();
        if entry.is_empty() {
            return Ok(());
        }

        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let segment = self.segment(&entry.holding_identity)?;
        let mut slot = segment.lock().await;
        if slot.is_none() {
            *slot = Some(JournalWriter::create(&self.segment_path(&entry.holding_identity)).await?);
        }
        if let Some(writer) = slot.as_mut() {
            writer.append(&line, self.sync).await?;
        }
        drop(slot);

        debug!(
            holding_identity = %entry.holding_identity.short_hash(),
            created = entry.created.len(),
            consumed = entry.consumed.len(),
            transactions = entry.transactions.len(),
            bytes = line.len(),
            "journal entry committed"
        );
        tables.apply(&entry);
        Ok(())
    }

    async fn abort_transaction(&self, txn: TenantTransaction) -> Result<(), StorageError> {
        drop(txn);
        Ok(())
    }

    async fn get_state_details_for_update(
        &self,
        txn: &mut TenantTransaction,
        refs: &[StateRef],
    ) -> Result<HashMap<StateRef, StateDetails>, StorageError> {
        Ok(txn.state_details(refs))
    }

    async fn get_transaction_details_for_update(
        &self,
        txn: &mut TenantTransaction,
        tx_ids: &[SecureHash],
    ) -> Result<HashMap<SecureHash, TransactionDetails>, StorageError> {
        Ok(txn.transaction_details(tx_ids))
    }

    async fn create_unconsumed_states(
        &self,
        txn: &mut TenantTransaction,
        refs: &[StateRef],
    ) -> Result<(), StorageError> {
        txn.create_unconsumed(refs)
    }

    async fn consume_states(
        &self,
        txn: &mut TenantTransaction,
        consuming_tx_id: &SecureHash,
        refs: &[StateRef],
    ) -> Result<(), StorageError> {
        txn.consume(consuming_tx_id, refs)
    }

    async fn commit_transactions(
        &self,
        txn: &mut TenantTransaction,
        records: Vec<TransactionDetails>,
    ) -> Result<(), StorageError> {
        txn.record(records)
    }

    async fn get_state_details(
        &self,
        holding_identity: &HoldingIdentity,
        refs: &[StateRef],
    ) -> Result<HashMap<StateRef, StateDetails>, StorageError> {
        self.registry
            .read(holding_identity, |tables| tables.state_details(refs))
            .await
    }

    async fn get_transaction_details(
        &self,
        holding_identity: &HoldingIdentity,
        tx_ids: &[SecureHash],
    ) -> Result<HashMap<SecureHash, TransactionDetails>, StorageError> {
        self.registry
            .read(holding_identity, |tables| tables.transaction_details(tx_ids))
            .await
    }
}
