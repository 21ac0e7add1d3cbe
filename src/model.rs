use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Weekday a class group can meet on. Weekends have no wire label and can
/// never appear in a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassDay {
    #[serde(rename = "월")]
    Mon,
    #[serde(rename = "화")]
    Tue,
    #[serde(rename = "수")]
    Wed,
    #[serde(rename = "목")]
    Thu,
    #[serde(rename = "금")]
    Fri,
}

impl ClassDay {
    pub fn label(self) -> &'static str {
        match self {
            ClassDay::Mon => "월",
            ClassDay::Tue => "화",
            ClassDay::Wed => "수",
            ClassDay::Thu => "목",
            ClassDay::Fri => "금",
        }
    }

    pub fn from_label(label: &str) -> Option<ClassDay> {
        match label.trim() {
            "월" => Some(ClassDay::Mon),
            "화" => Some(ClassDay::Tue),
            "수" => Some(ClassDay::Wed),
            "목" => Some(ClassDay::Thu),
            "금" => Some(ClassDay::Fri),
            _ => None,
        }
    }
}

/// Per-student attendance status for one class-group day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    SickLeave,
    ApprovedAbsence,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::SickLeave => "sick_leave",
            AttendanceStatus::ApprovedAbsence => "approved_absence",
            AttendanceStatus::Excused => "excused",
        }
    }

    pub fn from_str(s: &str) -> Option<AttendanceStatus> {
        match s {
            "present" => Some(AttendanceStatus::Present),
            "late" => Some(AttendanceStatus::Late),
            "sick_leave" => Some(AttendanceStatus::SickLeave),
            "approved_absence" => Some(AttendanceStatus::ApprovedAbsence),
            "excused" => Some(AttendanceStatus::Excused),
            _ => None,
        }
    }
}

/// One weekly meeting slot of a class group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleSlot {
    pub day: ClassDay,
    pub period: u8,
}

/// A validated, persisted class group. `schedules` keeps the submitted
/// order; `student_ids` keeps submitted order and is duplicate-free.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub id: String,
    pub course_id: String,
    pub name: String,
    pub period_count: u32,
    pub schedules: Vec<ScheduleSlot>,
    pub student_ids: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub student_id: String,
    pub status: AttendanceStatus,
}

// Clients historically sent periodCount and period as free text; accept
// either a JSON string or a number and validate later in the store.
fn de_free_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(serde::de::Error::custom("expected string or number")),
    }
}

/// Raw (unvalidated) schedule entry as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlotInput {
    #[serde(default, deserialize_with = "de_free_text")]
    pub day: Option<String>,
    #[serde(default, deserialize_with = "de_free_text")]
    pub period: Option<String>,
}

/// Raw class-group submission; the store owns all semantic validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroupInput {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_free_text")]
    pub period_count: Option<String>,
    #[serde(default)]
    pub schedules: Vec<ScheduleSlotInput>,
    #[serde(default)]
    pub student_ids: Vec<String>,
}

pub fn parse_wire_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_day_round_trips_through_wire_labels() {
        for day in [
            ClassDay::Mon,
            ClassDay::Tue,
            ClassDay::Wed,
            ClassDay::Thu,
            ClassDay::Fri,
        ] {
            assert_eq!(ClassDay::from_label(day.label()), Some(day));
        }
        assert_eq!(ClassDay::from_label("토"), None);
        assert_eq!(ClassDay::from_label(""), None);
    }

    #[test]
    fn status_strings_match_wire_serialization() {
        for status in [
            AttendanceStatus::Present,
            AttendanceStatus::Late,
            AttendanceStatus::SickLeave,
            AttendanceStatus::ApprovedAbsence,
            AttendanceStatus::Excused,
        ] {
            let wire = serde_json::to_value(status).unwrap();
            assert_eq!(wire, serde_json::json!(status.as_str()));
            assert_eq!(AttendanceStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn input_accepts_numeric_and_text_period_count() {
        let from_text: ClassGroupInput =
            serde_json::from_value(serde_json::json!({ "periodCount": "2" })).unwrap();
        assert_eq!(from_text.period_count.as_deref(), Some("2"));

        let from_number: ClassGroupInput =
            serde_json::from_value(serde_json::json!({ "periodCount": 2 })).unwrap();
        assert_eq!(from_number.period_count.as_deref(), Some("2"));
    }

    #[test]
    fn wire_date_parses_calendar_days_only() {
        assert_eq!(
            parse_wire_date("2024-03-04"),
            NaiveDate::from_ymd_opt(2024, 3, 4)
        );
        assert_eq!(parse_wire_date("2024-13-01"), None);
        assert_eq!(parse_wire_date("today"), None);
    }
}
