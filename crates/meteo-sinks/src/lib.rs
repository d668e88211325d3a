use anyhow::Result;
pub mod layers;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use layers::{LayerRegistry, SyncStats};

use meteo_store::{PersistedState, STATE_VERSION};
use std::fs::{create_dir_all, rename, write};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const STATE_FILE: &str = "state.json";

/// Durable home for the persisted store state
#[async_trait::async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn save(&mut self, state: &PersistedState) -> Result<()>;

    /// Most recently saved state, or `None` if nothing was saved yet
    async fn load(&mut self) -> Result<Option<PersistedState>>;
}

/// Keeps the state as a single JSON document in a directory
///
/// Saves go through a temporary file and a rename, so a crash mid-write
/// leaves the previous snapshot intact.
pub struct FsSnapshotSink {
    dir: PathBuf,
    file: PathBuf,
}

impl FsSnapshotSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        create_dir_all(&dir)?;
        let file = dir.join(STATE_FILE);
        Ok(Self { dir, file })
    }

    pub fn path(&self) -> &Path {
        &self.file
    }
}

#[async_trait::async_trait]
impl SnapshotSink for FsSnapshotSink {
    async fn save(&mut self, state: &PersistedState) -> Result<()> {
        let json = state.to_json()?;
        let tmp = self.dir.join(format!("{STATE_FILE}.tmp"));
        write(&tmp, json)?;
        rename(&tmp, &self.file)?;
        debug!(path = %self.file.display(), polygons = state.polygons.len(), "snapshot saved");
        Ok(())
    }

    async fn load(&mut self) -> Result<Option<PersistedState>> {
        let json = match std::fs::read_to_string(&self.file) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state = PersistedState::from_json(&json)?;
        if state.version != STATE_VERSION {
            warn!(version = %state.version, "snapshot written by a different layout version");
        }
        Ok(Some(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteo_core::{Coordinate, DataSource, PolygonId, PolygonRecord, TimeSelection};

    fn state() -> PersistedState {
        let record = PolygonRecord::create(
            PolygonId::new("abc123"),
            vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(1.0, 0.0),
                Coordinate::new(1.0, 1.0),
            ],
            DataSource::default(),
        )
        .unwrap();
        let mut state = PersistedState::default();
        state.polygons.insert(record.id.clone(), record);
        state.active_polygon_id = Some(PolygonId::new("abc123"));
        state.timeline = Some(TimeSelection::default());
        state
    }

    #[tokio::test]
    async fn missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSnapshotSink::new(dir.path().join("nested")).unwrap();
        assert!(sink.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saves_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSnapshotSink::new(dir.path()).unwrap();
        sink.save(&state()).await.unwrap();

        assert!(dir.path().join(STATE_FILE).exists());
        assert!(!dir.path().join("state.json.tmp").exists());

        let mut reopened = FsSnapshotSink::new(dir.path()).unwrap();
        assert_eq!(reopened.load().await.unwrap(), Some(state()));
    }

    #[tokio::test]
    async fn later_save_replaces_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSnapshotSink::new(dir.path()).unwrap();
        sink.save(&state()).await.unwrap();
        sink.save(&PersistedState::default()).await.unwrap();

        let loaded = sink.load().await.unwrap().unwrap();
        assert!(loaded.polygons.is_empty());
        assert!(loaded.active_polygon_id.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSnapshotSink::new(dir.path()).unwrap();
        std::fs::write(sink.path(), "{not json").unwrap();
        assert!(sink.load().await.is_err());
    }
}
