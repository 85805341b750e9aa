//! [`SqliteLedger`]: the SQLite implementation of [`LedgerService`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use muster_core::{
  enrollment::{EnrollmentRecord, EnrollmentStatus},
  service::{Conflict, EntryStatus, LedgerService, RecordAck, TimeMark, TimeRecord},
  time::TimeEntry,
};

use crate::{
  encode::{
    ENTRY_COLUMNS, RawEnrollment, RawEntry, decode_uuid, encode_dt, encode_naive, encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Muster ledger backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteLedger {
  conn: tokio_rusqlite::Connection,
}

impl SqliteLedger {
  /// Open (or create) a ledger at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %path.display(), "opened ledger database");
    Ok(store)
  }

  /// Open an in-memory ledger.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert a new open entry, or acknowledge the existing one when the
  /// record names an id that is already stored.
  async fn open_entry(&self, record: TimeRecord) -> Result<RecordAck> {
    let entry_id      = record.entry_id.unwrap_or_else(Uuid::new_v4);
    let id_str        = encode_uuid(entry_id);
    let subject_id    = record.subject_id;
    let started_at    = encode_naive(record.at);
    let offset_hours  = record.tz_offset_hours;
    let actor_id      = record.actor_id;
    let actor_name    = record.actor_name;
    let note          = record.note;
    let recorded_at   = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing: Option<bool> = tx
          .query_row(
            "SELECT ended_at IS NULL FROM time_entries WHERE entry_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?;
        if let Some(open) = existing {
          let status = if open { EntryStatus::Open } else { EntryStatus::Closed };
          return Ok(Ok(RecordAck { id: entry_id, status }));
        }

        let busy: bool = tx.query_row(
          "SELECT EXISTS (
             SELECT 1 FROM time_entries WHERE subject_id = ?1 AND ended_at IS NULL
           )",
          rusqlite::params![subject_id],
          |row| row.get(0),
        )?;
        if busy {
          return Ok(Err(Conflict::AlreadyOpen));
        }

        tx.execute(
          "INSERT INTO time_entries (
             entry_id, subject_id, started_at, start_offset_hours,
             recorded_by, recorded_by_name, note, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str,
            subject_id,
            started_at,
            offset_hours,
            actor_id,
            actor_name,
            note,
            recorded_at,
          ],
        )?;
        tx.commit()?;
        Ok(Ok(RecordAck { id: entry_id, status: EntryStatus::Open }))
      })
      .await?
      .map_err(Error::Conflict)
  }

  /// Close the named entry, or the subject's open entry when none is named.
  async fn close_entry(&self, record: TimeRecord) -> Result<RecordAck> {
    let id_str       = record.entry_id.map(encode_uuid);
    let subject_id   = record.subject_id;
    let ended_at     = encode_naive(record.at);
    let offset_hours = record.tz_offset_hours;
    let actor_id     = record.actor_id;
    let actor_name   = record.actor_name;
    let note         = record.note;

    let closed: String = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let target: Option<String> = match id_str {
          Some(id) => tx
            .query_row(
              "SELECT entry_id FROM time_entries
               WHERE entry_id = ?1 AND subject_id = ?2 AND ended_at IS NULL",
              rusqlite::params![id, subject_id],
              |row| row.get(0),
            )
            .optional()?,
          None => tx
            .query_row(
              "SELECT entry_id FROM time_entries WHERE subject_id = ?1 AND ended_at IS NULL",
              rusqlite::params![subject_id],
              |row| row.get(0),
            )
            .optional()?,
        };
        let Some(id) = target else {
          return Ok(Err(Conflict::NoOpenEntry));
        };

        tx.execute(
          "UPDATE time_entries
           SET ended_at = ?2, end_offset_hours = ?3, closed_by = ?4, closed_by_name = ?5,
               note = COALESCE(?6, note)
           WHERE entry_id = ?1 AND ended_at IS NULL",
          rusqlite::params![id, ended_at, offset_hours, actor_id, actor_name, note],
        )?;
        tx.commit()?;
        Ok(Ok(id))
      })
      .await?
      .map_err(Error::Conflict)?;

    Ok(RecordAck { id: decode_uuid(&closed)?, status: EntryStatus::Closed })
  }
}

// ─── LedgerService impl ──────────────────────────────────────────────────────

impl LedgerService for SqliteLedger {
  type Error = Error;

  // ── Time entries ──────────────────────────────────────────────────────────

  async fn record_time(&self, record: TimeRecord) -> Result<RecordAck> {
    match record.mark {
      TimeMark::Start => self.open_entry(record).await,
      TimeMark::End => self.close_entry(record).await,
    }
  }

  async fn query_open_entry<'a>(&'a self, subject_id: &'a str) -> Result<Option<TimeEntry>> {
    let subject_id = subject_id.to_owned();

    let raw: Option<RawEntry> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ENTRY_COLUMNS} FROM time_entries
                 WHERE subject_id = ?1 AND ended_at IS NULL"
              ),
              rusqlite::params![subject_id],
              RawEntry::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEntry::into_entry).transpose()
  }

  async fn query_entries<'a>(&'a self, subject_id: &'a str) -> Result<Vec<TimeEntry>> {
    let subject_id = subject_id.to_owned();

    let raws: Vec<RawEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ENTRY_COLUMNS} FROM time_entries WHERE subject_id = ?1 ORDER BY started_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![subject_id], RawEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntry::into_entry).collect()
  }

  // ── Enrollment ────────────────────────────────────────────────────────────

  async fn enroll_activity<'a>(
    &'a self,
    activity_id: &'a str,
    subject_id: &'a str,
  ) -> Result<EnrollmentStatus> {
    let activity_id = activity_id.to_owned();
    let subject_id = subject_id.to_owned();
    let now = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO enrollments (activity_id, subject_id, status, registered_at)
           VALUES (?1, ?2, -1, ?3)",
          rusqlite::params![activity_id, subject_id, now],
        )?)
      })
      .await?;

    if inserted == 0 {
      return Err(Error::Conflict(Conflict::AlreadyRegistered));
    }
    Ok(EnrollmentStatus::Registered)
  }

  async fn check_in_activity<'a>(
    &'a self,
    activity_id: &'a str,
    subject_id: &'a str,
  ) -> Result<EnrollmentStatus> {
    let activity_id = activity_id.to_owned();
    let subject_id = subject_id.to_owned();
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let status: Option<i64> = tx
          .query_row(
            "SELECT status FROM enrollments WHERE activity_id = ?1 AND subject_id = ?2",
            rusqlite::params![activity_id, subject_id],
            |row| row.get(0),
          )
          .optional()?;

        match status {
          None => return Ok(Err(Conflict::NotRegistered)),
          Some(1) => return Ok(Err(Conflict::AlreadyCheckedIn)),
          Some(_) => {}
        }

        tx.execute(
          "UPDATE enrollments SET status = 1, checked_in_at = ?3
           WHERE activity_id = ?1 AND subject_id = ?2 AND status = -1",
          rusqlite::params![activity_id, subject_id, now],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?
      .map_err(Error::Conflict)?;

    Ok(EnrollmentStatus::CheckedIn)
  }

  async fn query_enrollment<'a>(
    &'a self,
    activity_id: &'a str,
    subject_id: &'a str,
  ) -> Result<EnrollmentRecord> {
    let (a, s) = (activity_id.to_owned(), subject_id.to_owned());

    let raw: Option<RawEnrollment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT activity_id, subject_id, status, registered_at, checked_in_at
               FROM enrollments WHERE activity_id = ?1 AND subject_id = ?2",
              rusqlite::params![a, s],
              |row| {
                Ok(RawEnrollment {
                  activity_id:   row.get(0)?,
                  subject_id:    row.get(1)?,
                  status:        row.get(2)?,
                  registered_at: row.get(3)?,
                  checked_in_at: row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      Some(raw) => raw.into_record(),
      None => Ok(EnrollmentRecord::not_registered(activity_id, subject_id)),
    }
  }
}
