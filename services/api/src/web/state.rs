//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-session state machine.

use crate::config::Config;
use chrono::{DateTime, Duration, Utc};
use image::RgbImage;
use image_enhancer_core::domain::{Account, ExportFormat, Technique, View};
use image_enhancer_core::ports::{AccountStore, ImageCodec, ImageEnhancer, PortError, PortResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Recorded as the source of an enhancement when the upload carried no file name.
pub const UNKNOWN_FILENAME: &str = "unknown";

//=========================================================================================
// AppState (Shared Across All Sessions)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub enhancer: Arc<dyn ImageEnhancer>,
    pub codec: Arc<dyn ImageCodec>,
    pub sessions: Arc<SessionRegistry>,
    pub config: Arc<Config>,
}

//=========================================================================================
// SessionState (Specific to One Logged-in Visitor)
//=========================================================================================

/// The encoded enhanced image, ready to be returned as a download.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: &'static str,
}

/// Transient state of one visitor. Image buffers are owned here and never shared
/// between sessions; the account itself lives in the account store.
#[derive(Debug, Default)]
pub struct SessionState {
    current_user: Option<String>,
    original_image: Option<RgbImage>,
    enhanced_image: Option<RgbImage>,
    source_filename: Option<String>,
    active_view: View,
}

impl SessionState {
    /// An anonymous session.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    pub fn active_view(&self) -> View {
        self.active_view
    }

    pub fn original_image(&self) -> Option<&RgbImage> {
        self.original_image.as_ref()
    }

    pub fn enhanced_image(&self) -> Option<&RgbImage> {
        self.enhanced_image.as_ref()
    }

    pub fn source_filename(&self) -> Option<&str> {
        self.source_filename.as_deref()
    }

    /// Marks the session as belonging to `email`, which has already been authenticated.
    pub fn login(&mut self, email: &str) {
        self.current_user = Some(email.to_string());
        self.active_view = View::Enhancement;
    }

    /// Returns to the anonymous state, dropping the user and both image buffers.
    pub fn logout(&mut self) {
        *self = Self::default();
    }

    fn require_user(&self) -> PortResult<&str> {
        self.current_user.as_deref().ok_or(PortError::Unauthorized)
    }

    pub fn switch_view(&mut self, view: View) -> PortResult<()> {
        self.require_user()?;
        self.active_view = view;
        Ok(())
    }

    /// Decodes an upload into the original buffer and clears any previous result.
    /// On a decode failure the session is left exactly as it was.
    pub fn upload(
        &mut self,
        codec: &dyn ImageCodec,
        file_name: Option<String>,
        data: &[u8],
    ) -> PortResult<&RgbImage> {
        self.require_user()?;
        let decoded = codec.decode(data)?;
        self.enhanced_image = None;
        self.source_filename = file_name.filter(|name| !name.trim().is_empty());
        Ok(self.original_image.insert(decoded))
    }

    /// Runs `technique` on the original image, records the usage against the
    /// current account and stores the result. Nothing changes if either step fails.
    ///
    /// The transform runs on the blocking thread pool, off the async workers.
    pub async fn apply(
        &mut self,
        enhancer: Arc<dyn ImageEnhancer>,
        accounts: &dyn AccountStore,
        technique: Technique,
    ) -> PortResult<Account> {
        let email = self.require_user()?.to_string();
        let original = self
            .original_image
            .clone()
            .ok_or_else(|| PortError::Validation("Upload an image first".to_string()))?;

        let enhanced =
            tokio::task::spawn_blocking(move || enhancer.enhance(technique, &original))
                .await
                .map_err(|e| PortError::Enhancement(format!("Transform task panicked: {}", e)))?
                .map_err(|e| match e {
                    PortError::UnsupportedFormat(msg) => PortError::UnsupportedFormat(msg),
                    other => PortError::Enhancement(other.to_string()),
                })?;

        let filename = self.source_filename.as_deref().unwrap_or(UNKNOWN_FILENAME);
        let account = accounts
            .record_enhancement(&email, technique, filename)
            .await?;

        info!(
            "Applied {} for {} (total {})",
            technique.id(),
            email,
            account.enhancement_count
        );
        self.enhanced_image = Some(enhanced);
        Ok(account)
    }

    /// Encodes the enhanced image for download.
    pub fn download(&self, codec: &dyn ImageCodec, format: ExportFormat) -> PortResult<Download> {
        self.require_user()?;
        let enhanced = self
            .enhanced_image
            .as_ref()
            .ok_or_else(|| PortError::Validation("Apply an enhancement first".to_string()))?;
        Ok(Download {
            bytes: codec.encode(enhanced, format)?,
            file_name: format.file_name(),
            mime_type: format.mime_type(),
        })
    }
}

//=========================================================================================
// SessionRegistry
//=========================================================================================

pub type SessionHandle = Arc<Mutex<SessionState>>;

struct SessionEntry {
    handle: SessionHandle,
    last_seen: DateTime<Utc>,
}

/// In-memory map of session token to session. Each entry expires after `ttl`
/// without activity.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores `state` under a fresh random token and returns the token.
    /// Sessions idle past the TTL are dropped on the way.
    pub async fn create(&self, state: SessionState) -> String {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let entry = SessionEntry {
            handle: Arc::new(Mutex::new(state)),
            last_seen: now,
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now - entry.last_seen <= self.ttl);
        let swept = before - sessions.len();
        if swept > 0 {
            debug!("Dropped {} expired session(s)", swept);
        }
        sessions.insert(token.clone(), entry);
        token
    }

    /// Looks up a live session and refreshes its expiry. Expired sessions are
    /// removed on access.
    pub async fn get(&self, token: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        let expired = match sessions.get_mut(token) {
            None => return None,
            Some(entry) if now - entry.last_seen > self.ttl => true,
            Some(entry) => {
                entry.last_seen = now;
                return Some(entry.handle.clone());
            }
        };
        if expired {
            sessions.remove(token);
        }
        None
    }

    pub async fn remove(&self, token: &str) -> Option<SessionHandle> {
        self.sessions
            .write()
            .await
            .remove(token)
            .map(|entry| entry.handle)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
