use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("rollbook.sqlite3");
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    // Local mirror of the external roster directory. Only the directory
    // boundary methods write here; the core treats it as read-only and must
    // keep working when a roster id has no row.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_groups(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            name TEXT NOT NULL,
            period_count INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_class_groups_course ON class_groups(course_id)",
        [],
    )?;

    // `slot` preserves the submitted order of the weekly meeting pattern.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_group_schedules(
            class_group_id TEXT NOT NULL,
            slot INTEGER NOT NULL,
            day TEXT NOT NULL,
            period INTEGER NOT NULL,
            PRIMARY KEY(class_group_id, slot),
            FOREIGN KEY(class_group_id) REFERENCES class_groups(id)
        )",
        [],
    )?;

    // Member ids are owned by the external directory, so no FK to students.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_group_members(
            class_group_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            PRIMARY KEY(class_group_id, student_id),
            FOREIGN KEY(class_group_id) REFERENCES class_groups(id)
        )",
        [],
    )?;

    // One row per (class group, date) that has ever been saved. Kept apart
    // from the entry rows so "recorded with zero entries" stays
    // distinguishable from "never recorded".
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_days(
            class_group_id TEXT NOT NULL,
            date TEXT NOT NULL,
            saved_at TEXT NOT NULL,
            PRIMARY KEY(class_group_id, date),
            FOREIGN KEY(class_group_id) REFERENCES class_groups(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_entries(
            class_group_id TEXT NOT NULL,
            date TEXT NOT NULL,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY(class_group_id, date, student_id),
            FOREIGN KEY(class_group_id) REFERENCES class_groups(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_entries_key
         ON attendance_entries(class_group_id, date)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
pub fn open_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}
