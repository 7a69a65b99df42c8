//! services/api/src/adapters/json_store.rs
//!
//! This module contains the account store adapter, the concrete implementation
//! of the `AccountStore` port from the `core` crate. Accounts live in memory and
//! are written to a single pretty-printed JSON document after every mutation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use image_enhancer_core::domain::{Account, NewAccount, Technique, UsageRecord};
use image_enhancer_core::ports::{AccountStore, PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A file-backed adapter that implements the `AccountStore` port.
///
/// The mutex is held across read-modify-write-persist, so concurrent sessions
/// can never lose each other's updates.
pub struct JsonAccountStore {
    path: PathBuf,
    accounts: Mutex<HashMap<String, Account>>,
}

impl JsonAccountStore {
    /// Opens the store at `path`. A missing document yields an empty store; a
    /// document that exists but cannot be parsed is a `PortError::Storage`.
    pub async fn open(path: impl Into<PathBuf>) -> PortResult<Self> {
        let path = path.into();
        let accounts = load(&path).await?;
        info!("Loaded {} account(s) from {}", accounts.len(), path.display());
        Ok(Self {
            path,
            accounts: Mutex::new(accounts),
        })
    }

    /// Like `open`, but an unreadable document is renamed to `<file>.corrupt`
    /// and the store starts empty instead of failing.
    pub async fn open_or_recover(path: impl Into<PathBuf>) -> PortResult<Self> {
        let path = path.into();
        match load(&path).await {
            Ok(accounts) => Ok(Self {
                path,
                accounts: Mutex::new(accounts),
            }),
            Err(PortError::Storage(reason)) => {
                let mut aside = path.clone().into_os_string();
                aside.push(".corrupt");
                let aside = PathBuf::from(aside);
                warn!(
                    "Account document {} is unreadable ({}); moving it to {} and starting empty",
                    path.display(),
                    reason,
                    aside.display()
                );
                tokio::fs::rename(&path, &aside)
                    .await
                    .map_err(|e| PortError::Storage(format!("failed to move aside: {}", e)))?;
                Ok(Self {
                    path,
                    accounts: Mutex::new(HashMap::new()),
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

//=========================================================================================
// Persisted Document Records
//=========================================================================================

/// One account as it appears in the document; the email is the map key.
#[derive(Serialize, Deserialize)]
struct AccountRecord {
    first_name: String,
    last_name: String,
    date_of_birth: NaiveDate,
    password_hash: String,
    join_date: NaiveDate,
    enhancement_count: u64,
    enhancement_types: BTreeSet<Technique>,
    enhancement_history: Vec<UsageRecordEntry>,
}

#[derive(Serialize, Deserialize)]
struct UsageRecordEntry {
    technique: Technique,
    timestamp: DateTime<Utc>,
    source_filename: String,
}

impl AccountRecord {
    fn from_domain(account: &Account) -> Self {
        Self {
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            date_of_birth: account.date_of_birth,
            password_hash: account.password_hash.clone(),
            join_date: account.join_date,
            enhancement_count: account.enhancement_count,
            enhancement_types: account.enhancement_types.clone(),
            enhancement_history: account
                .enhancement_history
                .iter()
                .map(|r| UsageRecordEntry {
                    technique: r.technique,
                    timestamp: r.timestamp,
                    source_filename: r.source_filename.clone(),
                })
                .collect(),
        }
    }

    /// The history is authoritative: the count and the type set are rebuilt
    /// from it, whatever the document says.
    fn to_domain(self, email: String) -> Account {
        let enhancement_history: Vec<UsageRecord> = self
            .enhancement_history
            .into_iter()
            .map(|e| UsageRecord {
                technique: e.technique,
                timestamp: e.timestamp,
                source_filename: e.source_filename,
            })
            .collect();
        let enhancement_count = enhancement_history.len() as u64;
        let enhancement_types: BTreeSet<Technique> =
            enhancement_history.iter().map(|r| r.technique).collect();

        if enhancement_count != self.enhancement_count || enhancement_types != self.enhancement_types {
            warn!(
                "Usage summary of {} disagrees with its history; rebuilt from {} record(s)",
                email, enhancement_count
            );
        }

        Account {
            email,
            first_name: self.first_name,
            last_name: self.last_name,
            date_of_birth: self.date_of_birth,
            password_hash: self.password_hash,
            join_date: self.join_date,
            enhancement_count,
            enhancement_types,
            enhancement_history,
        }
    }
}

//=========================================================================================
// Load & Save
//=========================================================================================

async fn load(path: &Path) -> PortResult<HashMap<String, Account>> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => {
            return Err(PortError::Storage(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let document: BTreeMap<String, AccountRecord> = serde_json::from_slice(&raw)
        .map_err(|e| PortError::Storage(format!("malformed {}: {}", path.display(), e)))?;

    Ok(document
        .into_iter()
        .map(|(email, record)| {
            let account = record.to_domain(email.clone());
            (email, account)
        })
        .collect())
}

/// Serializes the full mapping and replaces the document via a temp file and
/// rename, so a crash mid-write never leaves a truncated document behind.
async fn save(path: &Path, accounts: &HashMap<String, Account>) -> PortResult<()> {
    let document: BTreeMap<&str, AccountRecord> = accounts
        .iter()
        .map(|(email, account)| (email.as_str(), AccountRecord::from_domain(account)))
        .collect();
    let payload = serde_json::to_vec_pretty(&document)
        .map_err(|e| PortError::Storage(format!("failed to encode accounts: {}", e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PortError::Storage(format!("failed to prepare directory: {}", e)))?;
    }

    let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    tokio::fs::write(&temp_path, payload)
        .await
        .map_err(|e| PortError::Storage(format!("failed to write accounts: {}", e)))?;

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(PortError::Storage(format!("failed to replace accounts: {}", e)));
    }
    Ok(())
}

//=========================================================================================
// `AccountStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountStore for JsonAccountStore {
    async fn register(&self, new_account: NewAccount) -> PortResult<bool> {
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&new_account.email) {
            return Ok(false);
        }

        let email = new_account.email.clone();
        let account = Account::new(new_account, Utc::now().date_naive());
        accounts.insert(email.clone(), account);

        if let Err(e) = save(&self.path, &accounts).await {
            accounts.remove(&email);
            return Err(e);
        }
        Ok(true)
    }

    async fn get_account(&self, email: &str) -> PortResult<Account> {
        self.accounts
            .lock()
            .await
            .get(email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Account {} not found", email)))
    }

    async fn record_enhancement(
        &self,
        email: &str,
        technique: Technique,
        source_filename: &str,
    ) -> PortResult<Account> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .get_mut(email)
            .ok_or_else(|| PortError::NotFound(format!("Account {} not found", email)))?;

        let previous = account.clone();
        account.record_usage(technique, source_filename, Utc::now());
        let updated = account.clone();

        if let Err(e) = save(&self.path, &accounts).await {
            accounts.insert(email.to_string(), previous);
            return Err(e);
        }
        Ok(updated)
    }
}
