//! `SQLite` implementation of the persistence gateway.

use crate::{EntityStore, StoreResult};
use chrono::{DateTime, Utc};
use doorsync_core::{
    AccessCredential, AccessWindow, CredentialGrant, CredentialKind, Doorlock, Gateway,
    GatewayId, GatewayLog, LockId, LockStatus, LogKind, NewGatewayLog, Principal, PrincipalKind,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

const LOCK_COLUMNS: &str =
    "id, gateway_id, area_id, description, status, status_time, last_command_id";

/// `SQLite`-backed entity store.
///
/// A single connection guarded by a mutex; row-level effects of each
/// statement are atomic, which is all the coordination core relies on.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database file.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or initialized.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Create an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be created.
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_schema(&self) -> StoreResult<()> {
        self.conn().execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS gateways (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                area_id INTEGER NOT NULL DEFAULT 0,
                last_seen INTEGER
            );

            CREATE TABLE IF NOT EXISTS doorlocks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                gateway_id TEXT NOT NULL REFERENCES gateways(id) ON DELETE CASCADE,
                area_id INTEGER NOT NULL DEFAULT 0,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'locked',
                status_time INTEGER,
                last_command_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_doorlocks_gateway ON doorlocks(gateway_id);

            CREATE TABLE IF NOT EXISTS credentials (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                principal_kind TEXT NOT NULL,
                principal_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                secret TEXT NOT NULL,
                starts_at INTEGER,
                ends_at INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_credentials_principal
                ON credentials(principal_kind, principal_id);

            CREATE TABLE IF NOT EXISTS schedulers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL DEFAULT '',
                starts_at INTEGER NOT NULL,
                ends_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS scheduler_members (
                scheduler_id INTEGER NOT NULL REFERENCES schedulers(id) ON DELETE CASCADE,
                principal_kind TEXT NOT NULL,
                principal_id INTEGER NOT NULL,
                PRIMARY KEY (scheduler_id, principal_kind, principal_id)
            );

            CREATE TABLE IF NOT EXISTS scheduler_locks (
                scheduler_id INTEGER NOT NULL REFERENCES schedulers(id) ON DELETE CASCADE,
                lock_id INTEGER NOT NULL REFERENCES doorlocks(id) ON DELETE CASCADE,
                PRIMARY KEY (scheduler_id, lock_id)
            );

            -- Append-only audit trail; rows are never updated.
            CREATE TABLE IF NOT EXISTS gateway_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                gateway_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_gateway_logs_gateway
                ON gateway_logs(gateway_id, created_at);
            ",
        )?;

        Ok(())
    }

    /// Insert or update a gateway. An update keeps the stored last-seen
    /// stamp; connectivity is owned by the telemetry ingestor.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub fn upsert_gateway(&self, gateway: &Gateway) -> StoreResult<()> {
        self.conn().execute(
            r"
            INSERT INTO gateways (id, name, area_id, last_seen)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name, area_id = excluded.area_id
            ",
            (
                gateway.id.as_str(),
                &gateway.name,
                gateway.area_id,
                gateway.last_seen.map(to_millis),
            ),
        )?;
        Ok(())
    }

    /// Delete a gateway; its locks cascade with it.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub fn delete_gateway(&self, id: &GatewayId) -> StoreResult<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM gateways WHERE id = ?1", [id.as_str()])?;
        Ok(deleted > 0)
    }

    /// Create a doorlock owned by `gateway_id`, initially locked.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub fn add_doorlock(
        &self,
        gateway_id: &GatewayId,
        area_id: i64,
        description: &str,
    ) -> StoreResult<LockId> {
        let conn = self.conn();
        conn.execute(
            r"
            INSERT INTO doorlocks (gateway_id, area_id, description)
            VALUES (?1, ?2, ?3)
            ",
            (gateway_id.as_str(), area_id, description),
        )?;
        Ok(LockId(conn.last_insert_rowid()))
    }

    /// Create a credential for a principal.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub fn add_credential(&self, credential: &AccessCredential) -> StoreResult<i64> {
        let conn = self.conn();
        conn.execute(
            r"
            INSERT INTO credentials (principal_kind, principal_id, kind, secret, starts_at, ends_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            (
                credential.principal.kind.as_str(),
                credential.principal.id,
                credential.kind.as_str(),
                &credential.secret,
                credential.starts_at.map(to_millis),
                credential.ends_at.map(to_millis),
            ),
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Create a schedule window.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub fn add_scheduler(
        &self,
        name: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO schedulers (name, starts_at, ends_at) VALUES (?1, ?2, ?3)",
            (name, to_millis(starts_at), to_millis(ends_at)),
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Put a principal on a schedule.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub fn add_scheduler_member(
        &self,
        scheduler_id: i64,
        principal: &Principal,
    ) -> StoreResult<()> {
        self.conn().execute(
            r"
            INSERT OR IGNORE INTO scheduler_members (scheduler_id, principal_kind, principal_id)
            VALUES (?1, ?2, ?3)
            ",
            (scheduler_id, principal.kind.as_str(), principal.id),
        )?;
        Ok(())
    }

    /// Put a lock on a schedule.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub fn add_scheduler_lock(&self, scheduler_id: i64, lock_id: LockId) -> StoreResult<()> {
        self.conn().execute(
            r"
            INSERT OR IGNORE INTO scheduler_locks (scheduler_id, lock_id)
            VALUES (?1, ?2)
            ",
            (scheduler_id, lock_id.0),
        )?;
        Ok(())
    }

    /// Audit rows for one gateway in ingestion order.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn list_logs_for_gateway(&self, gateway_id: &str) -> StoreResult<Vec<GatewayLog>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r"
            SELECT id, gateway_id, kind, payload, created_at
            FROM gateway_logs
            WHERE gateway_id = ?1
            ORDER BY id ASC
            ",
        )?;
        let logs = stmt
            .query_map([gateway_id], log_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }
}

impl EntityStore for SqliteStore {
    fn get_gateway(&self, id: &GatewayId) -> StoreResult<Option<Gateway>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, area_id, last_seen FROM gateways WHERE id = ?1")?;
        let gateway = stmt
            .query_row([id.as_str()], gateway_from_row)
            .optional()?;
        Ok(gateway)
    }

    fn get_doorlock(&self, id: LockId) -> StoreResult<Option<Doorlock>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("SELECT {LOCK_COLUMNS} FROM doorlocks WHERE id = ?1"))?;
        let lock = stmt.query_row([id.0], lock_from_row).optional()?;
        Ok(lock)
    }

    fn list_locks_for_gateway(&self, id: &GatewayId) -> StoreResult<Vec<Doorlock>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LOCK_COLUMNS} FROM doorlocks WHERE gateway_id = ?1 ORDER BY id ASC"
        ))?;
        let locks = stmt
            .query_map([id.as_str()], lock_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(locks)
    }

    fn list_authorized_locks(&self, principal: &Principal) -> StoreResult<Vec<Doorlock>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r"
            SELECT DISTINCT d.id, d.gateway_id, d.area_id, d.description,
                            d.status, d.status_time, d.last_command_id
            FROM doorlocks d
            JOIN scheduler_locks sl ON sl.lock_id = d.id
            JOIN scheduler_members sm ON sm.scheduler_id = sl.scheduler_id
            WHERE sm.principal_kind = ?1 AND sm.principal_id = ?2
            ORDER BY d.id ASC
            ",
        )?;
        let locks = stmt
            .query_map((principal.kind.as_str(), principal.id), lock_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(locks)
    }

    fn list_locks_for_scheduler(&self, scheduler_id: i64) -> StoreResult<Vec<Doorlock>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r"
            SELECT d.id, d.gateway_id, d.area_id, d.description,
                   d.status, d.status_time, d.last_command_id
            FROM doorlocks d
            JOIN scheduler_locks sl ON sl.lock_id = d.id
            WHERE sl.scheduler_id = ?1
            ORDER BY d.id ASC
            ",
        )?;
        let locks = stmt
            .query_map([scheduler_id], lock_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(locks)
    }

    fn list_credentials_for_lock(&self, id: LockId) -> StoreResult<Vec<CredentialGrant>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r"
            SELECT c.id, c.principal_kind, c.principal_id, c.kind, c.secret,
                   c.starts_at, c.ends_at, s.starts_at, s.ends_at
            FROM credentials c
            JOIN scheduler_members sm
                ON sm.principal_kind = c.principal_kind AND sm.principal_id = c.principal_id
            JOIN scheduler_locks sl ON sl.scheduler_id = sm.scheduler_id
            JOIN schedulers s ON s.id = sm.scheduler_id
            WHERE sl.lock_id = ?1
            ORDER BY c.id ASC, s.starts_at ASC
            ",
        )?;

        let rows = stmt
            .query_map([id.0], grant_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // Group consecutive rows of one credential, clipping each schedule
        // window by the credential's own validity bounds.
        let mut grants: Vec<CredentialGrant> = Vec::new();
        for row in rows {
            let window = clip_window(row.window, row.valid_from, row.valid_until);
            match grants.last_mut() {
                Some(last) if last.credential_id == row.grant.credential_id => {
                    if let Some(window) = window {
                        last.windows.push(window);
                    }
                }
                _ => {
                    let mut grant = row.grant;
                    grant.windows.extend(window);
                    grants.push(grant);
                }
            }
        }
        Ok(grants)
    }

    fn update_doorlock_status(
        &self,
        id: LockId,
        status: LockStatus,
        event_time: DateTime<Utc>,
        command_id: Option<Uuid>,
    ) -> StoreResult<bool> {
        let updated = self.conn().execute(
            r"
            UPDATE doorlocks
            SET status = ?2,
                status_time = ?3,
                last_command_id = COALESCE(?4, last_command_id)
            WHERE id = ?1 AND (status_time IS NULL OR status_time <= ?3)
            ",
            (
                id.0,
                status.as_str(),
                to_millis(event_time),
                command_id.map(|c| c.to_string()),
            ),
        )?;
        Ok(updated > 0)
    }

    fn update_gateway_last_seen(&self, id: &GatewayId, time: DateTime<Utc>) -> StoreResult<()> {
        self.conn().execute(
            r"
            UPDATE gateways
            SET last_seen = ?2
            WHERE id = ?1 AND (last_seen IS NULL OR last_seen <= ?2)
            ",
            (id.as_str(), to_millis(time)),
        )?;
        Ok(())
    }

    fn append_gateway_log(&self, entry: &NewGatewayLog) -> StoreResult<i64> {
        let conn = self.conn();
        conn.execute(
            r"
            INSERT INTO gateway_logs (gateway_id, kind, payload, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
            (
                &entry.gateway_id,
                entry.kind.as_str(),
                &entry.payload,
                to_millis(Utc::now()),
            ),
        )?;
        Ok(conn.last_insert_rowid())
    }
}

fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

fn from_millis(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn invalid_text(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn gateway_from_row(row: &Row) -> rusqlite::Result<Gateway> {
    let id: String = row.get(0)?;
    let last_seen: Option<i64> = row.get(3)?;
    Ok(Gateway {
        id: GatewayId::new(&id).map_err(|e| invalid_text(0, e.to_string()))?,
        name: row.get(1)?,
        area_id: row.get(2)?,
        last_seen: last_seen.map(|ms| from_millis(3, ms)).transpose()?,
    })
}

fn lock_from_row(row: &Row) -> rusqlite::Result<Doorlock> {
    let gateway_id: String = row.get(1)?;
    let status: String = row.get(4)?;
    let status_time: Option<i64> = row.get(5)?;
    let last_command_id: Option<String> = row.get(6)?;
    Ok(Doorlock {
        id: LockId(row.get(0)?),
        gateway_id: GatewayId::new(&gateway_id).map_err(|e| invalid_text(1, e.to_string()))?,
        area_id: row.get(2)?,
        description: row.get(3)?,
        status: LockStatus::parse(&status)
            .ok_or_else(|| invalid_text(4, format!("unknown lock status: {status}")))?,
        status_time: status_time.map(|ms| from_millis(5, ms)).transpose()?,
        last_command_id: last_command_id
            .map(|s| Uuid::parse_str(&s).map_err(|e| invalid_text(6, e.to_string())))
            .transpose()?,
    })
}

fn log_from_row(row: &Row) -> rusqlite::Result<GatewayLog> {
    let kind: String = row.get(2)?;
    let created_at: i64 = row.get(4)?;
    Ok(GatewayLog {
        id: row.get(0)?,
        gateway_id: row.get(1)?,
        kind: kind
            .parse::<LogKind>()
            .map_err(|e| invalid_text(2, e.to_string()))?,
        payload: row.get(3)?,
        created_at: from_millis(4, created_at)?,
    })
}

struct GrantRow {
    grant: CredentialGrant,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    window: AccessWindow,
}

fn grant_row(row: &Row) -> rusqlite::Result<GrantRow> {
    let principal_kind: String = row.get(1)?;
    let kind: String = row.get(3)?;
    let valid_from: Option<i64> = row.get(5)?;
    let valid_until: Option<i64> = row.get(6)?;
    Ok(GrantRow {
        grant: CredentialGrant {
            credential_id: row.get(0)?,
            principal: Principal {
                kind: PrincipalKind::parse(&principal_kind)
                    .ok_or_else(|| invalid_text(1, format!("unknown principal kind: {principal_kind}")))?,
                id: row.get(2)?,
            },
            kind: CredentialKind::parse(&kind)
                .ok_or_else(|| invalid_text(3, format!("unknown credential kind: {kind}")))?,
            secret: row.get(4)?,
            windows: Vec::new(),
        },
        valid_from: valid_from.map(|ms| from_millis(5, ms)).transpose()?,
        valid_until: valid_until.map(|ms| from_millis(6, ms)).transpose()?,
        window: AccessWindow {
            starts_at: from_millis(7, row.get(7)?)?,
            ends_at: from_millis(8, row.get(8)?)?,
        },
    })
}

fn clip_window(
    window: AccessWindow,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
) -> Option<AccessWindow> {
    let starts_at = valid_from.map_or(window.starts_at, |v| v.max(window.starts_at));
    let ends_at = valid_until.map_or(window.ends_at, |v| v.min(window.ends_at));
    (starts_at < ends_at).then_some(AccessWindow { starts_at, ends_at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use doorsync_core::LogKind;

    fn gw(id: &str) -> GatewayId {
        GatewayId::new(id).unwrap()
    }

    // Storage keeps millisecond precision; tests compare stored times.
    fn now_ms() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap()
    }

    fn seed_gateway(store: &SqliteStore, id: &str) -> GatewayId {
        let gateway = Gateway {
            id: gw(id),
            name: format!("{id} gateway"),
            area_id: 1,
            last_seen: None,
        };
        store.upsert_gateway(&gateway).unwrap();
        gateway.id
    }

    #[test]
    fn open_creates_schema_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doorsync.db");
        let store = SqliteStore::open(&path).unwrap();
        seed_gateway(&store, "gw-1");
        assert!(store.get_gateway(&gw("gw-1")).unwrap().is_some());
        // Reopening finds the existing data.
        drop(store);
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.get_gateway(&gw("gw-1")).unwrap().is_some());
    }

    #[test]
    fn status_update_is_monotonic_by_event_time() {
        let store = SqliteStore::in_memory().unwrap();
        let gateway = seed_gateway(&store, "gw-1");
        let lock = store.add_doorlock(&gateway, 1, "front door").unwrap();
        let t = now_ms();

        assert!(store
            .update_doorlock_status(lock, LockStatus::Unlocked, t, None)
            .unwrap());

        // An older report never overwrites the stored status.
        let stale = store
            .update_doorlock_status(lock, LockStatus::Locked, t - Duration::seconds(1), None)
            .unwrap();
        assert!(!stale);

        let current = store.get_doorlock(lock).unwrap().unwrap();
        assert_eq!(current.status, LockStatus::Unlocked);
        assert_eq!(current.status_time, Some(t));

        // A newer report applies.
        assert!(store
            .update_doorlock_status(lock, LockStatus::Locked, t + Duration::seconds(1), None)
            .unwrap());
        let current = store.get_doorlock(lock).unwrap().unwrap();
        assert_eq!(current.status, LockStatus::Locked);
    }

    #[test]
    fn status_update_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();
        let gateway = seed_gateway(&store, "gw-1");
        let lock = store.add_doorlock(&gateway, 1, "front door").unwrap();
        let t = now_ms();

        assert!(store
            .update_doorlock_status(lock, LockStatus::Unlocked, t, None)
            .unwrap());
        let first = store.get_doorlock(lock).unwrap().unwrap();

        // Redelivery of the same event leaves the row identical.
        assert!(store
            .update_doorlock_status(lock, LockStatus::Unlocked, t, None)
            .unwrap());
        let second = store.get_doorlock(lock).unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn status_update_records_acknowledged_command() {
        let store = SqliteStore::in_memory().unwrap();
        let gateway = seed_gateway(&store, "gw-1");
        let lock = store.add_doorlock(&gateway, 1, "front door").unwrap();
        let command = Uuid::new_v4();
        let t = now_ms();

        store
            .update_doorlock_status(lock, LockStatus::Locked, t, Some(command))
            .unwrap();
        assert_eq!(
            store.get_doorlock(lock).unwrap().unwrap().last_command_id,
            Some(command)
        );

        // A report without an echo keeps the previous acknowledgement.
        store
            .update_doorlock_status(lock, LockStatus::Unlocked, t + Duration::seconds(1), None)
            .unwrap();
        assert_eq!(
            store.get_doorlock(lock).unwrap().unwrap().last_command_id,
            Some(command)
        );
    }

    #[test]
    fn last_seen_never_goes_backwards() {
        let store = SqliteStore::in_memory().unwrap();
        let gateway = seed_gateway(&store, "gw-1");
        let t = now_ms();

        store.update_gateway_last_seen(&gateway, t).unwrap();
        store
            .update_gateway_last_seen(&gateway, t - Duration::seconds(30))
            .unwrap();

        let stored = store.get_gateway(&gateway).unwrap().unwrap();
        assert_eq!(stored.last_seen, Some(t));
    }

    #[test]
    fn gateway_logs_append_in_order() {
        let store = SqliteStore::in_memory().unwrap();

        let first = store
            .append_gateway_log(&NewGatewayLog::new("gw-1", LogKind::Heartbeat, b"{}"))
            .unwrap();
        let second = store
            .append_gateway_log(&NewGatewayLog::new(
                "gw-1",
                LogKind::DecodeFailure,
                b"garbage",
            ))
            .unwrap();
        assert!(second > first);

        let logs = store.list_logs_for_gateway("gw-1").unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].kind, LogKind::Heartbeat);
        assert_eq!(logs[1].kind, LogKind::DecodeFailure);
        assert_eq!(logs[1].payload, b"garbage");
    }

    #[test]
    fn authorized_locks_are_deduplicated_across_schedules() {
        let store = SqliteStore::in_memory().unwrap();
        let gateway = seed_gateway(&store, "gw-1");
        let lock = store.add_doorlock(&gateway, 1, "lab door").unwrap();
        let principal = Principal::student(3);
        let now = now_ms();

        for name in ["weekday", "weekend"] {
            let schedule = store
                .add_scheduler(name, now, now + Duration::hours(8))
                .unwrap();
            store.add_scheduler_member(schedule, &principal).unwrap();
            store.add_scheduler_lock(schedule, lock).unwrap();
        }

        let locks = store.list_authorized_locks(&principal).unwrap();
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].id, lock);

        assert!(store
            .list_authorized_locks(&Principal::student(99))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn credentials_for_lock_join_windows() {
        let store = SqliteStore::in_memory().unwrap();
        let gateway = seed_gateway(&store, "gw-1");
        let lock = store.add_doorlock(&gateway, 1, "lab door").unwrap();
        let principal = Principal::employee(7);
        let now = now_ms();

        let schedule = store
            .add_scheduler("day shift", now, now + Duration::hours(8))
            .unwrap();
        store.add_scheduler_member(schedule, &principal).unwrap();
        store.add_scheduler_lock(schedule, lock).unwrap();

        store
            .add_credential(&AccessCredential {
                id: 0,
                principal,
                kind: CredentialKind::Keypad,
                secret: "4831".to_string(),
                starts_at: None,
                ends_at: None,
            })
            .unwrap();

        let grants = store.list_credentials_for_lock(lock).unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].principal, principal);
        assert_eq!(grants[0].secret, "4831");
        assert_eq!(grants[0].windows.len(), 1);
        assert_eq!(grants[0].windows[0].starts_at, now);

        // Principals without schedule membership contribute nothing.
        store
            .add_credential(&AccessCredential {
                id: 0,
                principal: Principal::student(50),
                kind: CredentialKind::Rfid,
                secret: "FFFF".to_string(),
                starts_at: None,
                ends_at: None,
            })
            .unwrap();
        assert_eq!(store.list_credentials_for_lock(lock).unwrap().len(), 1);
    }

    #[test]
    fn credential_validity_clips_schedule_windows() {
        let store = SqliteStore::in_memory().unwrap();
        let gateway = seed_gateway(&store, "gw-1");
        let lock = store.add_doorlock(&gateway, 1, "lab door").unwrap();
        let principal = Principal::employee(7);
        let now = now_ms();

        let schedule = store
            .add_scheduler("day shift", now, now + Duration::hours(8))
            .unwrap();
        store.add_scheduler_member(schedule, &principal).unwrap();
        store.add_scheduler_lock(schedule, lock).unwrap();

        // Credential becomes valid two hours into the schedule window.
        store
            .add_credential(&AccessCredential {
                id: 0,
                principal,
                kind: CredentialKind::Rfid,
                secret: "0A0B".to_string(),
                starts_at: Some(now + Duration::hours(2)),
                ends_at: None,
            })
            .unwrap();
        // Credential expired before the window opens: no usable grant window.
        store
            .add_credential(&AccessCredential {
                id: 0,
                principal,
                kind: CredentialKind::Keypad,
                secret: "1111".to_string(),
                starts_at: None,
                ends_at: Some(now - Duration::hours(1)),
            })
            .unwrap();

        let grants = store.list_credentials_for_lock(lock).unwrap();
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0].windows.len(), 1);
        assert_eq!(grants[0].windows[0].starts_at, now + Duration::hours(2));
        assert!(grants[1].windows.is_empty());
    }

    #[test]
    fn deleting_a_gateway_cascades_to_its_locks() {
        let store = SqliteStore::in_memory().unwrap();
        let gateway = seed_gateway(&store, "gw-1");
        let lock = store.add_doorlock(&gateway, 1, "front door").unwrap();

        assert!(store.delete_gateway(&gateway).unwrap());
        assert!(store.get_doorlock(lock).unwrap().is_none());
        assert!(store.list_locks_for_gateway(&gateway).unwrap().is_empty());
    }

    #[test]
    fn locks_for_scheduler() {
        let store = SqliteStore::in_memory().unwrap();
        let gateway = seed_gateway(&store, "gw-1");
        let a = store.add_doorlock(&gateway, 1, "door a").unwrap();
        let b = store.add_doorlock(&gateway, 1, "door b").unwrap();
        store.add_doorlock(&gateway, 1, "door c").unwrap();
        let now = now_ms();

        let schedule = store
            .add_scheduler("night", now, now + Duration::hours(8))
            .unwrap();
        store.add_scheduler_lock(schedule, a).unwrap();
        store.add_scheduler_lock(schedule, b).unwrap();

        let locks = store.list_locks_for_scheduler(schedule).unwrap();
        assert_eq!(
            locks.iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![a, b]
        );
    }
}
