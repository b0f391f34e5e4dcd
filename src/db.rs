//! Database module
//!
//! Persists sessions, their append-only turn log, symptom trends, patient
//! visit history and risk profiles.

mod schema;

pub use schema::*;

use crate::model::{PatientProfile, PatientVisit};
use crate::session::{SessionRecord, TurnEntry};
use crate::state_machine::Intake;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt JSON column: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Database lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    // ==================== Session Operations ====================

    /// Create the session row with a fresh intake
    pub fn create_session(&self, record: &SessionRecord) -> DbResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let profile = record.profile.as_ref().map(serde_json::to_string).transpose()?;
        let state = serde_json::to_string(&Intake::new())?;

        conn.execute(
            "INSERT INTO sessions (id, started_at, profile, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                record.session_id,
                record.started_at.to_rfc3339(),
                profile,
                state,
                now
            ],
        )?;
        Ok(())
    }

    /// Get session header by ID
    pub fn get_session(&self, id: &str) -> DbResult<SessionRow> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                "SELECT id, started_at, profile, state, created_at, updated_at
                 FROM sessions WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => DbError::SessionNotFound(id.to_string()),
                other => DbError::Sqlite(other),
            })?;

        let (id, started_at, profile, state, created_at, updated_at) = raw;
        Ok(SessionRow {
            id,
            started_at: parse_datetime(&started_at),
            profile: profile.as_deref().map(parse_profile).transpose()?,
            state: serde_json::from_str(&state)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }

    /// Session header plus its full turn log
    pub fn get_session_record(&self, id: &str) -> DbResult<SessionRecord> {
        let session = self.get_session(id)?;
        let entries = self.get_entries(id)?;
        Ok(SessionRecord {
            session_id: session.id,
            started_at: session.started_at,
            profile: session.profile,
            entries,
        })
    }

    /// Overwrite the persisted intake snapshot
    pub fn update_session_state(&self, id: &str, intake: &Intake) -> DbResult<()> {
        let conn = self.conn()?;
        let state = serde_json::to_string(intake)?;
        let updated = conn.execute(
            "UPDATE sessions SET state = ?1, updated_at = ?2 WHERE id = ?3",
            params![state, Utc::now().to_rfc3339(), id],
        )?;
        if updated == 0 {
            return Err(DbError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    // ==================== Entry Operations ====================

    /// Append a turn to the session log, returning its sequence ID
    pub fn append_entry(&self, session_id: &str, entry: &TurnEntry) -> DbResult<i64> {
        let conn = self.conn()?;

        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM sessions WHERE id = ?1", params![session_id], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(DbError::SessionNotFound(session_id.to_string()));
        }

        // Get next sequence ID
        let sequence_id: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence_id), 0) + 1 FROM session_entries WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;

        let extracted = entry
            .extracted_symptoms
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let triage = entry.triage_result.as_ref().map(serde_json::to_string).transpose()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO session_entries
                (session_id, sequence_id, timestamp, user_input, system_output, extracted_symptoms, triage_result, reasoning)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session_id,
                sequence_id,
                entry.timestamp.to_rfc3339(),
                entry.user_input,
                entry.system_output,
                extracted,
                triage,
                entry.reasoning,
            ],
        )?;

        conn.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
            params![now, session_id],
        )?;

        Ok(sequence_id)
    }

    /// Get entries for a session, oldest first
    pub fn get_entries(&self, session_id: &str) -> DbResult<Vec<TurnEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, user_input, system_output, extracted_symptoms, triage_result, reasoning
             FROM session_entries WHERE session_id = ?1 ORDER BY sequence_id ASC",
        )?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(timestamp, user_input, system_output, extracted, triage, reasoning)| -> DbResult<TurnEntry> {
                Ok(TurnEntry {
                    timestamp: parse_datetime(&timestamp),
                    user_input,
                    system_output,
                    extracted_symptoms: extracted.as_deref().map(serde_json::from_str).transpose()?,
                    triage_result: triage.as_deref().map(serde_json::from_str).transpose()?,
                    reasoning,
                })
            })
            .collect()
    }

    // ==================== Trend Operations ====================

    /// Bump the counter of every given symptom by one
    pub fn increment_symptoms(&self, symptoms: &[String]) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for symptom in symptoms {
            let symptom = symptom.trim().to_lowercase();
            if symptom.is_empty() {
                continue;
            }
            tx.execute(
                "INSERT INTO symptom_counts (symptom, count) VALUES (?1, 1)
                 ON CONFLICT(symptom) DO UPDATE SET count = count + 1",
                params![symptom],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// All symptom counters, most frequent first
    pub fn symptom_trends(&self) -> DbResult<Vec<SymptomTrend>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT symptom, count FROM symptom_counts ORDER BY count DESC, symptom ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SymptomTrend {
                symptom: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== Patient Operations ====================

    /// Record one completed intake against the patient's history
    pub fn record_visit(&self, visit: &PatientVisit) -> DbResult<()> {
        let key = visit.patient_key();
        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO patients (patient_key, name, age, sex, visits, first_seen, last_seen)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
             ON CONFLICT(patient_key) DO UPDATE SET visits = visits + 1, last_seen = ?5",
            params![key, visit.name.trim(), visit.age.trim(), visit.sex.trim(), now],
        )?;

        for symptom in &visit.symptoms {
            tx.execute(
                "INSERT INTO patient_symptoms (patient_key, symptom, count) VALUES (?1, ?2, 1)
                 ON CONFLICT(patient_key, symptom) DO UPDATE SET count = count + 1",
                params![key, symptom],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Every known patient with their three most common symptoms
    pub fn patient_summaries(&self) -> DbResult<Vec<PatientSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT patient_key, name, age, sex, visits, first_seen, last_seen
             FROM patients ORDER BY last_seen DESC, patient_key ASC",
        )?;
        let patients = stmt
            .query_map([], |row| {
                Ok(PatientSummary {
                    patient_key: row.get(0)?,
                    name: row.get(1)?,
                    age: row.get(2)?,
                    sex: row.get(3)?,
                    visits: row.get(4)?,
                    first_seen: parse_datetime(&row.get::<_, String>(5)?),
                    last_seen: parse_datetime(&row.get::<_, String>(6)?),
                    top_symptoms: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut top = conn.prepare(
            "SELECT symptom FROM patient_symptoms WHERE patient_key = ?1
             ORDER BY count DESC, symptom ASC LIMIT 3",
        )?;
        patients
            .into_iter()
            .map(|mut patient| -> DbResult<PatientSummary> {
                patient.top_symptoms = top
                    .query_map(params![patient.patient_key], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(patient)
            })
            .collect()
    }

    // ==================== Profile Operations ====================

    pub fn upsert_profile(&self, user_id: &str, profile: &PatientProfile) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO profiles (user_id, profile, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET profile = ?2, updated_at = ?3",
            params![user_id, serde_json::to_string(profile)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, user_id: &str) -> DbResult<Option<PatientProfile>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT profile FROM profiles WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        raw.as_deref().map(parse_profile).transpose()
    }
}

/// Profiles are parsed leniently: missing or malformed fields take defaults
fn parse_profile(s: &str) -> DbResult<PatientProfile> {
    let value: serde_json::Value = serde_json::from_str(s)?;
    Ok(PatientProfile::from_json(&value))
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
