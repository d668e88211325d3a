use anyhow::{anyhow, Result};
use meteo_core::{PolygonId, PolygonRecord, TimeSelection};
use meteo_store::PersistedState;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard};

use crate::SnapshotSink;

/// One row per polygon plus a small key/value table for the rest
pub struct SqliteSnapshotSink {
    conn: Mutex<Connection>,
}

impl SqliteSnapshotSink {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS polygons (
                id TEXT PRIMARY KEY,
                json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }
}

fn meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |r| {
            r.get(0)
        })
        .optional()?)
}

#[async_trait::async_trait]
impl SnapshotSink for SqliteSnapshotSink {
    async fn save(&mut self, state: &PersistedState) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM polygons", [])?;
        tx.execute("DELETE FROM meta", [])?;
        for (id, record) in &state.polygons {
            tx.execute(
                "INSERT INTO polygons (id, json) VALUES (?1, ?2)",
                params![id.as_str(), serde_json::to_string(record)?],
            )?;
        }
        tx.execute(
            "INSERT INTO meta (key, value) VALUES ('version', ?1)",
            params![state.version],
        )?;
        if !state.order.is_empty() {
            tx.execute(
                "INSERT INTO meta (key, value) VALUES ('order', ?1)",
                params![serde_json::to_string(&state.order)?],
            )?;
        }
        if let Some(active) = &state.active_polygon_id {
            tx.execute(
                "INSERT INTO meta (key, value) VALUES ('active', ?1)",
                params![active.as_str()],
            )?;
        }
        if let Some(timeline) = &state.timeline {
            tx.execute(
                "INSERT INTO meta (key, value) VALUES ('timeline', ?1)",
                params![serde_json::to_string(timeline)?],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn load(&mut self) -> Result<Option<PersistedState>> {
        let conn = self.conn()?;
        let Some(version) = meta(&conn, "version")? else {
            return Ok(None);
        };

        let mut stmt = conn.prepare("SELECT id, json FROM polygons")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
        let mut state = PersistedState {
            version,
            ..PersistedState::default()
        };
        for row in rows {
            let (id, json) = row?;
            let record: PolygonRecord = serde_json::from_str(&json)?;
            state.polygons.insert(PolygonId::new(id), record);
        }
        state.order = meta(&conn, "order")?
            .map(|json| serde_json::from_str::<Vec<PolygonId>>(&json))
            .transpose()?
            .unwrap_or_default();
        state.active_polygon_id = meta(&conn, "active")?.map(PolygonId::new);
        state.timeline = meta(&conn, "timeline")?
            .map(|json| serde_json::from_str::<TimeSelection>(&json))
            .transpose()?;
        Ok(Some(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteo_core::{Coordinate, DataSource};

    fn record(id: &str) -> PolygonRecord {
        PolygonRecord::create(
            PolygonId::new(id),
            vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(1.0, 0.0),
                Coordinate::new(1.0, 1.0),
            ],
            DataSource::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn one_row_per_polygon() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SqliteSnapshotSink::new(dir.path().join("meteo.db")).unwrap();
        assert!(sink.load().await.unwrap().is_none());

        let mut state = PersistedState::default();
        for id in ["b", "a"] {
            state.polygons.insert(PolygonId::new(id), record(id));
            state.order.push(PolygonId::new(id));
        }
        state.active_polygon_id = Some(PolygonId::new("b"));
        state.timeline = Some(TimeSelection::default());
        sink.save(&state).await.unwrap();

        let count: i64 = sink
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM polygons", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(sink.load().await.unwrap(), Some(state.clone()));

        state.polygons.remove(&PolygonId::new("a"));
        state.order.retain(|id| id.as_str() != "a");
        state.active_polygon_id = None;
        sink.save(&state).await.unwrap();
        assert_eq!(sink.load().await.unwrap(), Some(state));
    }
}
