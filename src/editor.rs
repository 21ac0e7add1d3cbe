use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::error::{CoreError, CoreResult};
use crate::ledger;
use crate::model::{AttendanceEntry, AttendanceStatus, ClassGroup};
use crate::schedule;
use crate::store;

/// Unsaved per-student choices for one class group on the selected date.
/// `overrides` never holds `Present`; an absent key means present.
#[derive(Debug, Default)]
struct Draft {
    overrides: HashMap<String, AttendanceStatus>,
    saved: bool,
    in_flight: bool,
}

pub struct GroupPanel {
    pub group: ClassGroup,
    /// Whether the group meets on the selected date. With no date selected
    /// every group counts as matching, but none is editable.
    pub meets: bool,
    draft: Option<Draft>,
}

impl GroupPanel {
    pub fn editable(&self) -> bool {
        self.draft.is_some()
    }

    pub fn saved(&self) -> bool {
        self.draft.as_ref().map(|d| d.saved).unwrap_or(false)
    }

    pub fn in_flight(&self) -> bool {
        self.draft.as_ref().map(|d| d.in_flight).unwrap_or(false)
    }

    /// Effective status of a roster member and whether it is an explicit
    /// override. None when the panel is not editable.
    pub fn status_of(&self, student_id: &str) -> Option<(AttendanceStatus, bool)> {
        self.draft
            .as_ref()
            .map(|draft| match draft.overrides.get(student_id) {
                Some(status) => (*status, true),
                None => (AttendanceStatus::Present, false),
            })
    }
}

/// Everything a save needs, captured while the group is marked in flight.
/// The caller runs the ledger write between [`EditorSession::begin_commit`]
/// and [`EditorSession::finish_commit`]; the in-flight flag is what lets the
/// UI disable the save affordance for exactly this group meanwhile.
pub struct PendingCommit {
    pub class_group_id: String,
    pub date: NaiveDate,
    overrides: HashMap<String, AttendanceStatus>,
}

impl PendingCommit {
    /// Effective sheet over the group's current roster; anyone without an
    /// explicit override is present.
    pub fn resolve(&self, roster: &[String]) -> Vec<AttendanceEntry> {
        roster
            .iter()
            .map(|student_id| AttendanceEntry {
                student_id: student_id.clone(),
                status: self
                    .overrides
                    .get(student_id)
                    .copied()
                    .unwrap_or(AttendanceStatus::Present),
            })
            .collect()
    }
}

/// In-progress attendance edits for one course. Dropping the session (or
/// replacing it by opening another date) discards every unsaved choice;
/// nothing is persisted outside commit.
pub struct EditorSession {
    pub course_id: String,
    pub date: Option<NaiveDate>,
    panels: Vec<GroupPanel>,
}

impl EditorSession {
    pub fn open(
        conn: &Connection,
        course_id: &str,
        date: Option<NaiveDate>,
    ) -> CoreResult<EditorSession> {
        let groups = store::list_class_groups(conn, course_id)?;
        let mut panels = Vec::with_capacity(groups.len());
        for group in groups {
            let meets = match date {
                Some(d) => schedule::meets_on(&group.schedules, d),
                None => true,
            };
            let draft = match date {
                Some(d) if meets => Some(load_draft(conn, &group, d)?),
                _ => None,
            };
            panels.push(GroupPanel {
                group,
                meets,
                draft,
            });
        }
        Ok(EditorSession {
            course_id: course_id.to_string(),
            date,
            panels,
        })
    }

    pub fn panels(&self) -> &[GroupPanel] {
        &self.panels
    }

    pub fn panel(&self, class_group_id: &str) -> Option<&GroupPanel> {
        self.panels.iter().find(|p| p.group.id == class_group_id)
    }

    fn panel_mut(&mut self, class_group_id: &str) -> CoreResult<&mut GroupPanel> {
        self.panels
            .iter_mut()
            .find(|p| p.group.id == class_group_id)
            .ok_or(CoreError::NotFound("class group"))
    }

    /// Applies one radio/secondary-control choice. Picking `present` (or
    /// clearing the secondary control) removes the override so the student
    /// falls back to the default.
    pub fn set_status(
        &mut self,
        class_group_id: &str,
        student_id: &str,
        status: Option<AttendanceStatus>,
    ) -> CoreResult<()> {
        if self.date.is_none() {
            return Err(CoreError::validation("date", "no date is selected"));
        }
        let panel = self.panel_mut(class_group_id)?;
        if !panel.group.student_ids.iter().any(|s| s == student_id) {
            return Err(CoreError::validation(
                "studentId",
                "student is not on the class group roster",
            ));
        }
        let Some(draft) = panel.draft.as_mut() else {
            return Err(CoreError::validation(
                "classGroupId",
                "class group does not meet on the selected date",
            ));
        };
        match status {
            None | Some(AttendanceStatus::Present) => {
                draft.overrides.remove(student_id);
            }
            Some(status) => {
                draft.overrides.insert(student_id.to_string(), status);
            }
        }
        Ok(())
    }

    /// Marks the group's save as in flight and hands back what the save
    /// needs. Rejected while a previous save for the same group has not
    /// settled; other groups stay independently committable.
    pub fn begin_commit(&mut self, class_group_id: &str) -> CoreResult<PendingCommit> {
        let Some(date) = self.date else {
            return Err(CoreError::validation("date", "no date is selected"));
        };
        let panel = self.panel_mut(class_group_id)?;
        let Some(draft) = panel.draft.as_mut() else {
            return Err(CoreError::validation(
                "classGroupId",
                "class group does not meet on the selected date",
            ));
        };
        if draft.in_flight {
            return Err(CoreError::SaveInFlight);
        }
        draft.in_flight = true;
        Ok(PendingCommit {
            class_group_id: class_group_id.to_string(),
            date,
            overrides: draft.overrides.clone(),
        })
    }

    /// Settles an in-flight save. Success flips the display-only saved
    /// flag; failure keeps the draft untouched so the user can resubmit.
    pub fn finish_commit(&mut self, class_group_id: &str, success: bool) {
        if let Some(panel) = self
            .panels
            .iter_mut()
            .find(|p| p.group.id == class_group_id)
        {
            if let Some(draft) = panel.draft.as_mut() {
                draft.in_flight = false;
                if success {
                    draft.saved = true;
                }
            }
        }
    }

    /// Commits the draft against the ledger: the group's current roster,
    /// present by default, written as a full replace for the date.
    pub fn commit(&mut self, conn: &Connection, class_group_id: &str) -> CoreResult<usize> {
        let pending = self.begin_commit(class_group_id)?;
        let result = store::get_class_group(conn, &pending.class_group_id).and_then(|group| {
            let entries = pending.resolve(&group.student_ids);
            ledger::save(conn, &pending.class_group_id, pending.date, &entries)
        });
        self.finish_commit(class_group_id, result.is_ok());
        result
    }
}

fn load_draft(conn: &Connection, group: &ClassGroup, date: NaiveDate) -> CoreResult<Draft> {
    let recorded = ledger::load_for_date(conn, &group.id, date)?;
    // Present is the default, so only non-present statuses become overrides.
    let overrides = recorded
        .into_iter()
        .filter(|(_, status)| *status != AttendanceStatus::Present)
        .collect();
    Ok(Draft {
        overrides,
        saved: ledger::exists_for_date(conn, &group.id, date)?,
        in_flight: false,
    })
}
