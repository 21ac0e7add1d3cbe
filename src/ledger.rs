use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::error::CoreResult;
use crate::model::{AttendanceEntry, AttendanceStatus};

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Recorded statuses for one (class group, date). Empty when nothing has
/// been saved under the key; use [`exists_for_date`] to tell that apart
/// from a recorded-but-empty day.
pub fn load_for_date(
    conn: &Connection,
    class_group_id: &str,
    date: NaiveDate,
) -> CoreResult<BTreeMap<String, AttendanceStatus>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, status FROM attendance_entries
         WHERE class_group_id = ? AND date = ?",
    )?;
    let rows = stmt
        .query_map((class_group_id, date_key(date)), |r| {
            let student_id: String = r.get(0)?;
            let status_raw: String = r.get(1)?;
            let status = AttendanceStatus::from_str(&status_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Text,
                    format!("unknown attendance status: {status_raw}").into(),
                )
            })?;
            Ok((student_id, status))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().collect())
}

/// True iff a save has ever succeeded for the key. Drives the "recorded"
/// indicator only, never a business rule.
pub fn exists_for_date(
    conn: &Connection,
    class_group_id: &str,
    date: NaiveDate,
) -> CoreResult<bool> {
    let row = conn
        .query_row(
            "SELECT 1 FROM attendance_days WHERE class_group_id = ? AND date = ?",
            (class_group_id, date_key(date)),
            |r| r.get::<_, i64>(0),
        )
        .optional()?;
    Ok(row.is_some())
}

/// Full replace of whatever was stored under the key. The caller is
/// responsible for defaulting; `entries` must already carry every roster
/// member it wants recorded. Returns the number of rows written.
pub fn save(
    conn: &Connection,
    class_group_id: &str,
    date: NaiveDate,
    entries: &[AttendanceEntry],
) -> CoreResult<usize> {
    // Last occurrence wins if a student id repeats in the submission.
    let mut resolved: BTreeMap<&str, AttendanceStatus> = BTreeMap::new();
    for entry in entries {
        resolved.insert(entry.student_id.as_str(), entry.status);
    }

    let key = date_key(date);
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM attendance_entries WHERE class_group_id = ? AND date = ?",
        (class_group_id, &key),
    )?;
    for (student_id, status) in &resolved {
        tx.execute(
            "INSERT INTO attendance_entries(class_group_id, date, student_id, status)
             VALUES(?, ?, ?, ?)",
            (class_group_id, &key, student_id, status.as_str()),
        )?;
    }
    tx.execute(
        "INSERT INTO attendance_days(class_group_id, date, saved_at)
         VALUES(?, ?, ?)
         ON CONFLICT(class_group_id, date) DO UPDATE SET
           saved_at = excluded.saved_at",
        (class_group_id, &key, Utc::now().to_rfc3339()),
    )?;
    tx.commit()?;

    Ok(resolved.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::{ClassGroupInput, ScheduleSlotInput};
    use crate::store;
    use uuid::Uuid;

    fn seed_group(conn: &Connection) -> String {
        let course_id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO courses(id, name) VALUES(?, ?)",
            (&course_id, "수학 1"),
        )
        .expect("insert course");
        let input = ClassGroupInput {
            name: "1반".to_string(),
            period_count: Some("1".to_string()),
            schedules: vec![ScheduleSlotInput {
                day: Some("월".to_string()),
                period: Some("3".to_string()),
            }],
            student_ids: vec!["s1".to_string(), "s2".to_string()],
        };
        store::create_class_group(conn, &course_id, &input)
            .expect("create group")
            .id
    }

    fn entry(student_id: &str, status: AttendanceStatus) -> AttendanceEntry {
        AttendanceEntry {
            student_id: student_id.to_string(),
            status,
        }
    }

    fn march(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn load_returns_exactly_what_was_saved() {
        let conn = db::open_test_db();
        let group_id = seed_group(&conn);
        let date = march(4);

        let saved = save(
            &conn,
            &group_id,
            date,
            &[
                entry("s1", AttendanceStatus::Late),
                entry("s2", AttendanceStatus::Present),
            ],
        )
        .expect("save");
        assert_eq!(saved, 2);

        let loaded = load_for_date(&conn, &group_id, date).expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("s1"), Some(&AttendanceStatus::Late));
        assert_eq!(loaded.get("s2"), Some(&AttendanceStatus::Present));
    }

    #[test]
    fn save_overwrites_instead_of_merging() {
        let conn = db::open_test_db();
        let group_id = seed_group(&conn);
        let date = march(4);

        save(
            &conn,
            &group_id,
            date,
            &[
                entry("s1", AttendanceStatus::Late),
                entry("s2", AttendanceStatus::SickLeave),
            ],
        )
        .expect("first save");
        save(
            &conn,
            &group_id,
            date,
            &[entry("s2", AttendanceStatus::Present)],
        )
        .expect("second save");

        let loaded = load_for_date(&conn, &group_id, date).expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("s1"), None);
        assert_eq!(loaded.get("s2"), Some(&AttendanceStatus::Present));
    }

    #[test]
    fn repeated_identical_saves_are_idempotent() {
        let conn = db::open_test_db();
        let group_id = seed_group(&conn);
        let date = march(4);
        let entries = [
            entry("s1", AttendanceStatus::ApprovedAbsence),
            entry("s2", AttendanceStatus::Present),
        ];

        save(&conn, &group_id, date, &entries).expect("first save");
        let first = load_for_date(&conn, &group_id, date).expect("load");
        save(&conn, &group_id, date, &entries).expect("second save");
        let second = load_for_date(&conn, &group_id, date).expect("load");
        assert_eq!(first, second);
    }

    #[test]
    fn recorded_marker_is_distinct_from_entries() {
        let conn = db::open_test_db();
        let group_id = seed_group(&conn);
        let date = march(4);

        assert!(!exists_for_date(&conn, &group_id, date).expect("exists"));
        assert!(load_for_date(&conn, &group_id, date)
            .expect("load")
            .is_empty());

        // A save with zero entries still records the day.
        let saved = save(&conn, &group_id, date, &[]).expect("save");
        assert_eq!(saved, 0);
        assert!(exists_for_date(&conn, &group_id, date).expect("exists"));
        assert!(load_for_date(&conn, &group_id, date)
            .expect("load")
            .is_empty());

        // Other dates stay unrecorded.
        assert!(!exists_for_date(&conn, &group_id, march(5)).expect("exists"));
    }

    #[test]
    fn duplicate_student_in_submission_keeps_last_status() {
        let conn = db::open_test_db();
        let group_id = seed_group(&conn);
        let date = march(4);

        save(
            &conn,
            &group_id,
            date,
            &[
                entry("s1", AttendanceStatus::Late),
                entry("s1", AttendanceStatus::Excused),
            ],
        )
        .expect("save");

        let loaded = load_for_date(&conn, &group_id, date).expect("load");
        assert_eq!(loaded.get("s1"), Some(&AttendanceStatus::Excused));
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn keys_are_scoped_per_group_and_date() {
        let conn = db::open_test_db();
        let g1 = seed_group(&conn);
        let g2 = seed_group(&conn);
        let date = march(4);

        save(&conn, &g1, date, &[entry("s1", AttendanceStatus::Late)]).expect("save g1");
        assert!(load_for_date(&conn, &g2, date).expect("load").is_empty());
        assert!(!exists_for_date(&conn, &g2, date).expect("exists"));
    }
}
