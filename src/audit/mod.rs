//! Vault history in `<data_dir>/audit.db` (SQLite).
//!
//! Each lock transition and record mutation appends one row: the
//! [`AuditEvent`], the site and account it touched, and a short detail
//! such as the list of changed fields.  Secrets, passphrases and
//! envelopes never reach this file.
//!
//! Site and account names stay here after the record itself is deleted.
//! [`AuditLog::prune`] drops everything older than a cutoff.
//!
//! The log is best effort.  If the database can't be opened or written,
//! vault operations carry on without it.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};

use crate::errors::{Result, VaultError};

/// Something that happened to the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    /// Master passphrase set on a new vault.
    Init,
    Unlock,
    UnlockFailed,
    Lock,
    Add,
    Update,
    Delete,
    /// Passphrase change, completed or rejected (see details).
    ChangePassphrase,
    /// A corrupt vault file was set aside, or an interrupted passphrase
    /// change was completed.
    Recover,
}

impl AuditEvent {
    const ALL: [AuditEvent; 9] = [
        Self::Init,
        Self::Unlock,
        Self::UnlockFailed,
        Self::Lock,
        Self::Add,
        Self::Update,
        Self::Delete,
        Self::ChangePassphrase,
        Self::Recover,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Unlock => "unlock",
            Self::UnlockFailed => "unlock-failed",
            Self::Lock => "lock",
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::ChangePassphrase => "change-passphrase",
            Self::Recover => "recover",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == s)
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the audit log.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub site: Option<String>,
    pub account: Option<String>,
    pub details: Option<String>,
}

pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `<data_dir>/audit.db`.
    ///
    /// Returns `None` if the database can't be opened.
    pub fn open(data_dir: &Path) -> Option<Self> {
        let db_path = Self::db_path(data_dir);
        let conn = Connection::open(&db_path).ok()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&db_path, std::fs::Permissions::from_mode(0o600));
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS vault_events (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                at        TEXT NOT NULL,
                event     TEXT NOT NULL,
                site      TEXT,
                account   TEXT,
                details   TEXT
            );
            CREATE INDEX IF NOT EXISTS vault_events_at ON vault_events (at);",
        )
        .ok()?;

        Some(Self { conn })
    }

    /// Append an event.  Failures are dropped.
    pub fn record(
        &self,
        event: AuditEvent,
        site: Option<&str>,
        account: Option<&str>,
        details: Option<&str>,
    ) {
        let _ = self.conn.execute(
            "INSERT INTO vault_events (at, event, site, account, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![stamp(Utc::now()), event.as_str(), site, account, details],
        );
    }

    /// Up to `limit` events, newest first, optionally only those at or
    /// after `since`.
    pub fn entries(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<AuditEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, at, event, site, account, details
                 FROM vault_events
                 WHERE ?1 IS NULL OR at >= ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(audit_err)?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![since.map(stamp), limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .map_err(audit_err)?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, at, event, site, account, details) = row.map_err(audit_err)?;
            let event = AuditEvent::parse(&event)
                .ok_or_else(|| VaultError::AuditError(format!("unknown event '{event}' in row {id}")))?;
            let timestamp = DateTime::parse_from_rfc3339(&at)
                .map_err(|e| VaultError::AuditError(format!("bad timestamp in row {id}: {e}")))?
                .with_timezone(&Utc);

            entries.push(AuditEntry {
                id,
                timestamp,
                event,
                site,
                account,
                details,
            });
        }
        Ok(entries)
    }

    /// Delete every event recorded before `cutoff`; returns how many went.
    pub fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.conn
            .execute("DELETE FROM vault_events WHERE at < ?1", params![stamp(cutoff)])
            .map_err(audit_err)
    }

    pub fn db_path(data_dir: &Path) -> PathBuf {
        data_dir.join("audit.db")
    }
}

/// Fixed-width UTC timestamps, so text order is time order.
fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn audit_err(e: rusqlite::Error) -> VaultError {
    VaultError::AuditError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn open_log() -> (TempDir, AuditLog) {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::open(dir.path()).expect("open audit log");
        (dir, log)
    }

    #[test]
    fn open_creates_database() {
        let (dir, _log) = open_log();
        assert!(dir.path().join("audit.db").exists());
    }

    #[test]
    fn open_returns_none_on_bad_path() {
        assert!(AuditLog::open(Path::new("/nonexistent/path/that/does/not/exist")).is_none());
    }

    #[test]
    fn entries_are_newest_first_with_record_identity() {
        let (_dir, log) = open_log();
        log.record(AuditEvent::Add, Some("github.com"), Some("me"), None);
        log.record(AuditEvent::Update, Some("github.com"), Some("me"), Some("secret"));
        log.record(AuditEvent::Lock, None, None, None);

        let entries = log.entries(10, None).unwrap();
        let events: Vec<_> = entries.iter().map(|e| e.event).collect();
        assert_eq!(events, [AuditEvent::Lock, AuditEvent::Update, AuditEvent::Add]);
        assert_eq!(entries[1].details.as_deref(), Some("secret"));
        assert_eq!(entries[2].site.as_deref(), Some("github.com"));
        assert_eq!(entries[2].account.as_deref(), Some("me"));
        assert_eq!(log.entries(2, None).unwrap().len(), 2);
    }

    #[test]
    fn since_filters_older_events() {
        let (_dir, log) = open_log();
        log.record(AuditEvent::Unlock, None, None, None);

        let past = Utc::now() - Duration::hours(1);
        assert_eq!(log.entries(10, Some(past)).unwrap().len(), 1);

        let future = Utc::now() + Duration::hours(1);
        assert!(log.entries(10, Some(future)).unwrap().is_empty());
    }

    #[test]
    fn prune_drops_only_older_events() {
        let (_dir, log) = open_log();
        log.record(AuditEvent::Delete, Some("old.com"), Some("me"), None);

        assert_eq!(log.prune(Utc::now() - Duration::hours(1)).unwrap(), 0);
        assert_eq!(log.prune(Utc::now() + Duration::hours(1)).unwrap(), 1);
        assert!(log.entries(10, None).unwrap().is_empty());
    }

    #[test]
    fn unknown_event_is_reported() {
        let (_dir, log) = open_log();
        log.conn
            .execute(
                "INSERT INTO vault_events (at, event) VALUES (?1, 'export')",
                params![stamp(Utc::now())],
            )
            .unwrap();
        assert!(matches!(log.entries(10, None), Err(VaultError::AuditError(_))));
    }

    #[test]
    fn event_names_round_trip() {
        for event in AuditEvent::ALL {
            assert_eq!(AuditEvent::parse(event.as_str()), Some(event));
        }
    }

    #[cfg(unix)]
    #[test]
    fn audit_db_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, _log) = open_log();
        let perms = std::fs::metadata(dir.path().join("audit.db"))
            .unwrap()
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }
}
