use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::config::AppConfig;
use crate::dates::{date_key, parse_date_key};
use crate::model::{Subtask, Task, TaskPatch, Transaction, TransactionKind};
use crate::store::RecordStore;

const TASK_COLUMNS: &str = "id, text, created, completed, important, due, note, photo, apartment, \
     subtasks, owner, decomposing, completed_at";

const SCHEMA_KEY: &str = "schema_version";
const SCHEMA_VERSION: &str = "1";

/// SQLite-backed document store. One row per record; subtasks live in a JSON column.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn initialize(config: &AppConfig) -> Result<Self> {
        let conn = Connection::open(config.db_path()).with_context(|| {
            format!("Failed to open database at {}", config.db_path().display())
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to configure SQLite WAL mode")?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.apply_migrations()?;
        db.set_meta(SCHEMA_KEY, SCHEMA_VERSION)?;
        Ok(db)
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT);
             CREATE TABLE IF NOT EXISTS tasks (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                text TEXT NOT NULL,
                created TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                important INTEGER NOT NULL DEFAULT 0,
                due TEXT,
                note TEXT,
                photo TEXT,
                apartment TEXT,
                subtasks TEXT NOT NULL DEFAULT '[]',
                owner TEXT NOT NULL,
                decomposing INTEGER NOT NULL DEFAULT 0,
                completed_at TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_tasks_owner ON tasks(owner);
             CREATE TABLE IF NOT EXISTS transactions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                photo TEXT,
                recorded_by TEXT NOT NULL
             );
            ",
        )?;
        Ok(())
    }

    fn write_task(conn: &Connection, task: &Task) -> Result<()> {
        let subtasks_json = serde_json::to_string(&task.subtasks)?;
        conn.execute(
            "UPDATE tasks SET
                text = :text,
                created = :created,
                completed = :completed,
                important = :important,
                due = :due,
                note = :note,
                photo = :photo,
                apartment = :apartment,
                subtasks = :subtasks,
                owner = :owner,
                decomposing = :decomposing,
                completed_at = :completed_at
             WHERE id = :id",
            named_params![
                ":text": &task.text,
                ":created": date_key(task.created),
                ":completed": task.completed,
                ":important": task.important,
                ":due": task.due.map(date_key),
                ":note": task.note.as_deref(),
                ":photo": task.photo.as_deref(),
                ":apartment": task.apartment.as_deref(),
                ":subtasks": subtasks_json,
                ":owner": &task.owner,
                ":decomposing": task.decomposing,
                ":completed_at": task.completed_at.map(|dt| dt.to_rfc3339()),
                ":id": &task.id,
            ],
        )?;
        Ok(())
    }

    fn fetch_task_locked(conn: &Connection, id: &str) -> Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? LIMIT 1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(map_task(row)?)),
            None => Ok(None),
        }
    }
}

impl RecordStore for Database {
    fn tasks(&self, owner: Option<&str>) -> Result<Vec<Task>> {
        let conn = self.conn.lock();
        let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks");
        if owner.is_some() {
            sql.push_str(" WHERE owner = :owner");
        }
        sql.push_str(" ORDER BY seq ASC");

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = match owner {
            Some(owner) => stmt.query(named_params![":owner": owner])?,
            None => stmt.query([])?,
        };
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(map_task(row)?);
        }
        Ok(tasks)
    }

    fn task(&self, id: &str) -> Result<Option<Task>> {
        let conn = self.conn.lock();
        Self::fetch_task_locked(&conn, id)
    }

    fn insert_task(&self, task: &Task) -> Result<()> {
        let subtasks_json = serde_json::to_string(&task.subtasks)?;
        self.conn.lock().execute(
            "INSERT INTO tasks (
                id, text, created, completed, important, due, note, photo, apartment,
                subtasks, owner, decomposing, completed_at
            ) VALUES (
                :id, :text, :created, :completed, :important, :due, :note, :photo, :apartment,
                :subtasks, :owner, :decomposing, :completed_at
            )",
            named_params![
                ":id": &task.id,
                ":text": &task.text,
                ":created": date_key(task.created),
                ":completed": task.completed,
                ":important": task.important,
                ":due": task.due.map(date_key),
                ":note": task.note.as_deref(),
                ":photo": task.photo.as_deref(),
                ":apartment": task.apartment.as_deref(),
                ":subtasks": subtasks_json,
                ":owner": &task.owner,
                ":decomposing": task.decomposing,
                ":completed_at": task.completed_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Option<Task>> {
        let conn = self.conn.lock();
        let Some(mut task) = Self::fetch_task_locked(&conn, id)? else {
            return Ok(None);
        };
        patch.apply_to(&mut task);
        Self::write_task(&conn, &task)?;
        Ok(Some(task))
    }

    fn delete_task(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn
            .lock()
            .execute("DELETE FROM tasks WHERE id = :id", named_params![":id": id])?;
        Ok(affected > 0)
    }

    fn transactions(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, kind, amount, description, recorded_at, photo, recorded_by \
             FROM transactions ORDER BY seq ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(map_transaction(row)?);
        }
        Ok(entries)
    }

    fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO transactions (id, kind, amount, description, recorded_at, photo, recorded_by)
             VALUES (:id, :kind, :amount, :description, :recorded_at, :photo, :recorded_by)",
            named_params![
                ":id": &transaction.id,
                ":kind": transaction.kind.as_str(),
                ":amount": transaction.amount,
                ":description": &transaction.description,
                ":recorded_at": transaction.recorded_at.to_rfc3339(),
                ":photo": transaction.photo.as_deref(),
                ":recorded_by": &transaction.recorded_by,
            ],
        )?;
        Ok(())
    }

    fn delete_transaction(&self, id: &str) -> Result<bool> {
        let affected = self.conn.lock().execute(
            "DELETE FROM transactions WHERE id = :id",
            named_params![":id": id],
        )?;
        Ok(affected > 0)
    }
}

impl Database {
    /// Value stored under `key` in the meta table.
    pub fn meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?",
                [key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO meta (key, value) VALUES (:key, :value)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            named_params![":key": key, ":value": value],
        )?;
        Ok(())
    }
}

fn map_task(row: &Row<'_>) -> Result<Task> {
    let id: String = row.get(0)?;
    let subtasks = parse_subtasks(&id, row.get::<_, Option<String>>(9)?)?;
    Ok(Task {
        id,
        text: row.get(1)?,
        created: parse_date_key(&row.get::<_, String>(2)?)?,
        completed: row.get(3)?,
        important: row.get(4)?,
        due: parse_optional_date(row.get::<_, Option<String>>(5)?)?,
        note: row.get(6)?,
        photo: row.get(7)?,
        apartment: row.get(8)?,
        subtasks,
        owner: row.get(10)?,
        decomposing: row.get(11)?,
        completed_at: parse_datetime(row.get::<_, Option<String>>(12)?),
    })
}

fn map_transaction(row: &Row<'_>) -> Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        kind: row.get::<_, String>(1)?.parse::<TransactionKind>()?,
        amount: row.get(2)?,
        description: row.get(3)?,
        recorded_at: parse_datetime_required(row.get::<_, String>(4)?)?,
        photo: row.get(5)?,
        recorded_by: row.get(6)?,
    })
}

fn parse_subtasks(task_id: &str, raw: Option<String>) -> Result<Vec<Subtask>> {
    match raw.filter(|s| !s.trim().is_empty()) {
        Some(json) => serde_json::from_str(&json)
            .with_context(|| format!("Invalid subtasks JSON for task {}", task_id)),
        None => Ok(Vec::new()),
    }
}

fn parse_optional_date(raw: Option<String>) -> Result<Option<NaiveDate>> {
    raw.filter(|s| !s.is_empty())
        .map(|s| parse_date_key(&s))
        .transpose()
}

fn parse_datetime(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_datetime_required(raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("Failed to parse timestamp '{}': {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewTask, NewTransaction};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn temp_config() -> (AppConfig, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let data_dir = dir.path().to_path_buf();
        std::fs::create_dir_all(&data_dir).expect("create data dir");
        let config = AppConfig::from_data_dir(data_dir).expect("config");
        (config, dir)
    }

    fn seed(owner: &str, text: &str) -> Task {
        let mut task = NewTask {
            text: text.into(),
            owner: owner.into(),
            due: NaiveDate::from_ymd_opt(2024, 1, 10),
            apartment: Some("Attic".into()),
            subtasks: vec![Subtask::new("first"), Subtask::new("second")],
            ..NewTask::default()
        }
        .into_task(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        task.note = Some("bring ladder".into());
        task
    }

    #[test]
    fn insert_and_fetch_roundtrip() {
        let (config, _dir) = temp_config();
        let db = Database::initialize(&config).expect("initialize db");

        let task = seed("ana", "Clean gutters");
        db.insert_task(&task).expect("insert");

        let fetched = db.task(&task.id).expect("fetch").expect("task exists");
        assert_eq!(fetched, task);
    }

    #[test]
    fn tasks_filter_by_owner_and_keep_insertion_order() {
        let db = Database::in_memory().expect("db");
        for (owner, text) in [("ana", "a"), ("luca", "b"), ("ana", "c")] {
            db.insert_task(&seed(owner, text)).expect("insert");
        }

        let texts: Vec<String> = db
            .tasks(Some("ana"))
            .expect("tasks")
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["a", "c"]);
        assert_eq!(db.tasks(None).expect("all").len(), 3);
    }

    #[test]
    fn update_applies_patch_and_persists() {
        let db = Database::in_memory().expect("db");
        let task = seed("ana", "Replace washer");
        db.insert_task(&task).expect("insert");

        let mut subtasks = task.subtasks.clone();
        subtasks[0].completed = true;
        let patch = TaskPatch {
            important: Some(true),
            due: Some(None),
            subtasks: Some(subtasks),
            ..TaskPatch::default()
        };
        let updated = db
            .update_task(&task.id, &patch)
            .expect("update")
            .expect("task exists");
        assert!(updated.important);
        assert!(updated.due.is_none());

        let reloaded = db.task(&task.id).expect("fetch").expect("task");
        assert_eq!(reloaded, updated);
        assert!(reloaded.subtasks[0].completed);
        assert_eq!(reloaded.note.as_deref(), Some("bring ladder"));
    }

    #[test]
    fn corrupt_subtasks_column_is_an_error_and_survives_updates() {
        let db = Database::in_memory().expect("db");
        let task = seed("ana", "Fix shutter");
        db.insert_task(&task).expect("insert");
        db.conn
            .lock()
            .execute(
                "UPDATE tasks SET subtasks = 'not json' WHERE id = ?",
                [&task.id],
            )
            .expect("corrupt row");

        let err = db.task(&task.id).expect_err("corrupt subtasks must not load");
        assert!(format!("{:#}", err).contains("Invalid subtasks JSON"));

        let patch = TaskPatch {
            important: Some(true),
            ..TaskPatch::default()
        };
        assert!(db.update_task(&task.id, &patch).is_err());
        let raw: String = db
            .conn
            .lock()
            .query_row("SELECT subtasks FROM tasks WHERE id = ?", [&task.id], |row| {
                row.get(0)
            })
            .expect("raw column");
        assert_eq!(raw, "not json");
    }

    #[test]
    fn update_and_delete_unknown_ids_are_noops() {
        let db = Database::in_memory().expect("db");
        assert!(db
            .update_task("missing", &TaskPatch::default())
            .expect("update")
            .is_none());
        assert!(!db.delete_task("missing").expect("delete"));
    }

    #[test]
    fn delete_removes_task() {
        let db = Database::in_memory().expect("db");
        let task = seed("mia", "Sweep stairs");
        db.insert_task(&task).expect("insert");
        assert!(db.delete_task(&task.id).expect("delete"));
        assert!(db.task(&task.id).expect("fetch").is_none());
    }

    #[test]
    fn transactions_roundtrip_and_delete() {
        let db = Database::in_memory().expect("db");
        let entry = NewTransaction {
            kind: TransactionKind::Expense,
            amount: 42.5,
            description: "Boiler service".into(),
            photo: Some("file:///receipt.jpg".into()),
            recorded_by: "admin".into(),
        }
        .into_transaction(Utc::now());
        db.insert_transaction(&entry).expect("insert");

        let entries = db.transactions().expect("list");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, TransactionKind::Expense);
        assert_eq!(entries[0].amount, 42.5);
        assert_eq!(entries[0].photo.as_deref(), Some("file:///receipt.jpg"));

        assert!(db.delete_transaction(&entry.id).expect("delete"));
        assert!(db.transactions().expect("list").is_empty());
    }

    #[test]
    fn meta_upserts() {
        let db = Database::in_memory().expect("db");
        assert_eq!(db.meta(SCHEMA_KEY).expect("meta").as_deref(), Some(SCHEMA_VERSION));
        assert!(db.meta("imported_at").expect("meta").is_none());
        db.set_meta("imported_at", "1").expect("set");
        db.set_meta("imported_at", "2").expect("set");
        assert_eq!(db.meta("imported_at").expect("meta").as_deref(), Some("2"));
    }
}
