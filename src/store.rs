use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::model::{ClassDay, ClassGroup, ClassGroupInput, ScheduleSlot};

struct ValidatedGroup {
    name: String,
    period_count: u32,
    schedules: Vec<ScheduleSlot>,
    student_ids: Vec<String>,
}

// Submission rules, checked in order; the first failure wins and nothing is
// written. A stored row can therefore never have period_count disagreeing
// with its schedule rows.
fn validate(input: &ClassGroupInput) -> CoreResult<ValidatedGroup> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(CoreError::validation("name", "name must not be empty"));
    }

    let raw_count = input.period_count.as_deref().map(str::trim).unwrap_or("");
    let period_count: u32 = match raw_count.parse() {
        Ok(n) if n > 0 => n,
        _ => {
            return Err(CoreError::validation(
                "periodCount",
                "periodCount must be a positive integer",
            ))
        }
    };

    if input.schedules.len() != period_count as usize {
        return Err(CoreError::validation(
            "schedules",
            format!(
                "expected {} schedule entries, got {}",
                period_count,
                input.schedules.len()
            ),
        ));
    }

    let mut schedules = Vec::with_capacity(input.schedules.len());
    for (idx, slot) in input.schedules.iter().enumerate() {
        let raw_day = slot.day.as_deref().map(str::trim).unwrap_or("");
        if raw_day.is_empty() {
            return Err(CoreError::validation(
                "schedules",
                format!("schedule entry {} is missing a day", idx + 1),
            ));
        }
        let Some(day) = ClassDay::from_label(raw_day) else {
            return Err(CoreError::validation(
                "schedules",
                format!("schedule entry {} has an unknown day", idx + 1),
            ));
        };

        let raw_period = slot.period.as_deref().map(str::trim).unwrap_or("");
        if raw_period.is_empty() {
            return Err(CoreError::validation(
                "schedules",
                format!("schedule entry {} is missing a period", idx + 1),
            ));
        }
        let period: u8 = match raw_period.parse() {
            Ok(p) if (1..=10).contains(&p) => p,
            _ => {
                return Err(CoreError::validation(
                    "schedules",
                    format!("schedule entry {} period must be between 1 and 10", idx + 1),
                ))
            }
        };

        schedules.push(ScheduleSlot { day, period });
    }

    if input.student_ids.is_empty() {
        return Err(CoreError::validation(
            "studentIds",
            "at least one student is required",
        ));
    }
    let mut seen = HashSet::new();
    let mut student_ids = Vec::with_capacity(input.student_ids.len());
    for raw in &input.student_ids {
        let id = raw.trim();
        if id.is_empty() {
            return Err(CoreError::validation(
                "studentIds",
                "student ids must not be empty",
            ));
        }
        if !seen.insert(id.to_string()) {
            return Err(CoreError::validation(
                "studentIds",
                format!("duplicate student id: {}", id),
            ));
        }
        student_ids.push(id.to_string());
    }

    Ok(ValidatedGroup {
        name,
        period_count,
        schedules,
        student_ids,
    })
}

pub fn course_exists(conn: &Connection, course_id: &str) -> CoreResult<bool> {
    let row = conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?;
    Ok(row.is_some())
}

fn insert_details(conn: &Connection, class_group_id: &str, v: &ValidatedGroup) -> CoreResult<()> {
    for (slot, entry) in v.schedules.iter().enumerate() {
        conn.execute(
            "INSERT INTO class_group_schedules(class_group_id, slot, day, period)
             VALUES(?, ?, ?, ?)",
            (class_group_id, slot as i64, entry.day.label(), entry.period),
        )?;
    }
    for student_id in &v.student_ids {
        conn.execute(
            "INSERT INTO class_group_members(class_group_id, student_id) VALUES(?, ?)",
            (class_group_id, student_id),
        )?;
    }
    Ok(())
}

pub fn create_class_group(
    conn: &Connection,
    course_id: &str,
    input: &ClassGroupInput,
) -> CoreResult<ClassGroup> {
    if !course_exists(conn, course_id)? {
        return Err(CoreError::NotFound("course"));
    }
    let v = validate(input)?;

    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO class_groups(id, course_id, name, period_count, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (&id, course_id, &v.name, v.period_count, &created_at),
    )?;
    insert_details(&tx, &id, &v)?;
    tx.commit()?;

    Ok(ClassGroup {
        id,
        course_id: course_id.to_string(),
        name: v.name,
        period_count: v.period_count,
        schedules: v.schedules,
        student_ids: v.student_ids,
        created_at,
    })
}

/// Replaces `schedules` and `student_ids` wholesale; the submission must
/// carry the complete desired sets, not a delta.
pub fn update_class_group(
    conn: &Connection,
    class_group_id: &str,
    input: &ClassGroupInput,
) -> CoreResult<ClassGroup> {
    let existing = conn
        .query_row(
            "SELECT course_id, created_at FROM class_groups WHERE id = ?",
            [class_group_id],
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
        )
        .optional()?;
    let Some((course_id, created_at)) = existing else {
        return Err(CoreError::NotFound("class group"));
    };
    let v = validate(input)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE class_groups SET name = ?, period_count = ? WHERE id = ?",
        (&v.name, v.period_count, class_group_id),
    )?;
    tx.execute(
        "DELETE FROM class_group_schedules WHERE class_group_id = ?",
        [class_group_id],
    )?;
    tx.execute(
        "DELETE FROM class_group_members WHERE class_group_id = ?",
        [class_group_id],
    )?;
    insert_details(&tx, class_group_id, &v)?;
    tx.commit()?;

    Ok(ClassGroup {
        id: class_group_id.to_string(),
        course_id,
        name: v.name,
        period_count: v.period_count,
        schedules: v.schedules,
        student_ids: v.student_ids,
        created_at,
    })
}

fn load_schedules(conn: &Connection, class_group_id: &str) -> CoreResult<Vec<ScheduleSlot>> {
    let mut stmt = conn.prepare(
        "SELECT day, period FROM class_group_schedules
         WHERE class_group_id = ? ORDER BY slot",
    )?;
    let schedules = stmt
        .query_map([class_group_id], |r| {
            let day_raw: String = r.get(0)?;
            let period: i64 = r.get(1)?;
            // Stored rows only ever come from validate(); anything else is
            // corruption, not something to guess around.
            let day = ClassDay::from_label(&day_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("unknown class day: {day_raw}").into(),
                )
            })?;
            Ok(ScheduleSlot {
                day,
                period: period as u8,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(schedules)
}

fn load_members(conn: &Connection, class_group_id: &str) -> CoreResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT student_id FROM class_group_members
         WHERE class_group_id = ? ORDER BY rowid",
    )?;
    let ids = stmt
        .query_map([class_group_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub fn get_class_group(conn: &Connection, class_group_id: &str) -> CoreResult<ClassGroup> {
    let row = conn
        .query_row(
            "SELECT id, course_id, name, period_count, created_at
             FROM class_groups WHERE id = ?",
            [class_group_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)?,
                    r.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;
    let Some((id, course_id, name, period_count, created_at)) = row else {
        return Err(CoreError::NotFound("class group"));
    };

    let schedules = load_schedules(conn, &id)?;
    let student_ids = load_members(conn, &id)?;
    Ok(ClassGroup {
        id,
        course_id,
        name,
        period_count: period_count as u32,
        schedules,
        student_ids,
        created_at,
    })
}

/// Most recently created first; rowid breaks timestamp ties.
pub fn list_class_groups(conn: &Connection, course_id: &str) -> CoreResult<Vec<ClassGroup>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM class_groups
         WHERE course_id = ?
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let ids = stmt
        .query_map([course_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut groups = Vec::with_capacity(ids.len());
    for id in ids {
        groups.push(get_class_group(conn, &id)?);
    }
    Ok(groups)
}
