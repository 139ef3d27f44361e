use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use super::layout::{self, META_FILE};
use super::model::{Session, SessionSummary, SessionType};
use crate::error::SessionError;
use crate::sanitize::is_safe_token;

const MAX_ID_ATTEMPTS: usize = 5;

/// Directory-per-session persistence. Each session is one directory holding
/// `meta.json` plus its images.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a session. Pure path computation; the id is validated
    /// so it can never escape the root.
    pub fn session_dir(&self, session_id: &str) -> Result<PathBuf, SessionError> {
        if !is_safe_token(session_id) {
            return Err(SessionError::InvalidId {
                id: session_id.to_string(),
            });
        }
        Ok(self.root.join(session_id))
    }

    /// Creates a new session of the given type with its directory skeleton
    /// and an initial `meta.json`.
    pub async fn create(&self, session_type: SessionType) -> Result<Session, SessionError> {
        create_dir_all(&self.root).await?;

        let mut attempt = 0;
        let (session_id, dir) = loop {
            attempt += 1;
            let id = new_session_id();
            let dir = self.root.join(&id);
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => break (id, dir),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < MAX_ID_ATTEMPTS => {
                    log::debug!("Session id {} already taken, retrying", id);
                }
                Err(e) => {
                    return Err(SessionError::CreateDirectory {
                        path: dir,
                        source: e,
                    })
                }
            }
        };

        for sub in layout::skeleton(session_type) {
            create_dir_all(&dir.join(sub)).await?;
        }

        let session = Session::new(session_id, session_type);
        self.write_meta(&session).await?;

        log::info!("Created {} session {}", session_type, session.session_id);
        Ok(session)
    }

    /// Persists the session, stamping `updated_at`. Last write wins.
    pub async fn save(&self, session: &mut Session) -> Result<(), SessionError> {
        session.updated_at = Utc::now();
        self.write_meta(session).await
    }

    pub async fn load(&self, session_id: &str) -> Result<Session, SessionError> {
        let path = self.session_dir(session_id)?.join(META_FILE);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound {
                    id: session_id.to_string(),
                })
            }
            Err(e) => return Err(SessionError::ReadMetadata { path, source: e }),
        };
        parse_session(&content).map_err(|e| SessionError::ParseMetadata { path, source: e })
    }

    /// Lists sessions, newest first. Directories without a readable
    /// `meta.json` are skipped.
    pub async fn list(
        &self,
        filter: Option<SessionType>,
    ) -> Result<Vec<SessionSummary>, SessionError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SessionError::ReadMetadata {
                    path: self.root.clone(),
                    source: e,
                })
            }
        };

        let mut summaries = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Stopped listing sessions early: {}", e);
                    break;
                }
            };

            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let id = entry.file_name().to_string_lossy().to_string();
            match self.load(&id).await {
                Ok(session) => {
                    if filter.map_or(true, |t| t == session.session_type()) {
                        summaries.push(session.summary());
                    }
                }
                Err(e) => log::debug!("Skipping session directory {}: {}", id, e),
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    /// Removes the session directory and everything in it. Deleting a
    /// session that does not exist is not an error.
    pub async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        let dir = self.session_dir(session_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                log::info!("Deleted session {}", session_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::RemoveDirectory {
                path: dir,
                source: e,
            }),
        }
    }

    async fn write_meta(&self, session: &Session) -> Result<(), SessionError> {
        let dir = self.session_dir(&session.session_id)?;
        create_dir_all(&dir).await?;

        let json = serde_json::to_string_pretty(session).map_err(SessionError::Serialize)?;
        let path = dir.join(META_FILE);
        let tmp = dir.join(format!("{}.tmp", META_FILE));

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| SessionError::WriteMetadata {
                path: tmp.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| SessionError::WriteMetadata { path, source: e })
    }
}

/// Millisecond timestamp plus six random hex characters.
fn new_session_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..6])
}

/// Parses a session document. Documents written before typed sessions
/// existed carry no `type` and are detail sessions.
fn parse_session(content: &str) -> Result<Session, serde_json::Error> {
    let mut value: serde_json::Value = serde_json::from_str(content)?;
    if let Some(obj) = value.as_object_mut() {
        obj.entry("type")
            .or_insert_with(|| serde_json::Value::String(SessionType::Detail.as_str().into()));
    }
    serde_json::from_value(value)
}

async fn create_dir_all(path: &Path) -> Result<(), SessionError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| SessionError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::model::{ReferenceItem, SessionStatus};
    use tempfile::TempDir;

    #[test]
    fn test_session_id_shape() {
        let id = new_session_id();
        let (millis, suffix) = id.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 6);
        assert!(is_safe_token(&id));
    }

    #[tokio::test]
    async fn test_create_builds_skeleton() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path());

        let session = store.create(SessionType::Detail).await.unwrap();
        let dir = store.session_dir(&session.session_id).unwrap();

        assert!(dir.join(META_FILE).exists());
        for sub in layout::skeleton(SessionType::Detail) {
            assert!(dir.join(sub).is_dir(), "missing {}", sub);
        }
        assert_eq!(session.status, SessionStatus::Uploading);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path());

        let mut session = store.create(SessionType::Retouch).await.unwrap();
        let state = session.swap_mut(SessionType::Retouch).unwrap();
        state.subject_refs.push(ReferenceItem {
            index: 0,
            name: "shot.png".into(),
            path: "input/retouch/model-ref-01.png".into(),
        });
        state.notes = "keep the background".into();
        store.save(&mut session).await.unwrap();

        let loaded = store.load(&session.session_id).await.unwrap();
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path());

        let result = store.load("1700000000000-abcdef").await;
        assert!(matches!(result, Err(SessionError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_traversal_ids_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path());

        assert!(matches!(
            store.load("../etc").await,
            Err(SessionError::InvalidId { .. })
        ));
        assert!(matches!(
            store.delete("a/b").await,
            Err(SessionError::InvalidId { .. })
        ));
    }

    #[tokio::test]
    async fn test_legacy_document_without_type_is_detail() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path());
        let dir = temp_dir.path().join("1600000000000-a1b2c3");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(META_FILE),
            r#"{
                "sessionId": "1600000000000-a1b2c3",
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-01T00:00:00Z",
                "status": "step1_done",
                "additionalNotes": "slim fit"
            }"#,
        )
        .unwrap();

        let session = store.load("1600000000000-a1b2c3").await.unwrap();
        assert_eq!(session.session_type(), SessionType::Detail);
        assert_eq!(session.status, SessionStatus::Step1Done);
        assert_eq!(session.detail().unwrap().additional_notes, "slim fit");
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_skips_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path());

        let first = store.create(SessionType::Detail).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create(SessionType::Retouch).await.unwrap();

        let corrupt = temp_dir.path().join("broken");
        std::fs::create_dir_all(&corrupt).unwrap();
        std::fs::write(corrupt.join(META_FILE), "{ nope").unwrap();
        std::fs::write(temp_dir.path().join("stray.txt"), "x").unwrap();

        let all = store.list(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].session_id, second.session_id);
        assert_eq!(all[1].session_id, first.session_id);

        let retouch = store.list(Some(SessionType::Retouch)).await.unwrap();
        assert_eq!(retouch.len(), 1);
        assert_eq!(retouch[0].session_type, SessionType::Retouch);
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path().join("absent"));
        assert!(store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_tree() {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::new(temp_dir.path());

        let session = store.create(SessionType::ClothingDetail).await.unwrap();
        let dir = store.session_dir(&session.session_id).unwrap();
        assert!(dir.exists());

        store.delete(&session.session_id).await.unwrap();
        assert!(!dir.exists());
        assert!(matches!(
            store.load(&session.session_id).await,
            Err(SessionError::NotFound { .. })
        ));

        // second delete is a no-op
        store.delete(&session.session_id).await.unwrap();
    }
}
