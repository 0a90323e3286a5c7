//! In-memory data model for the desktop app: master records shared by
//! everyone (courses, announcements, assignments) and private per-user
//! records (grades, attendance, assignment statuses). Nothing here is
//! persisted; dropping the store is the "restart" of the desktop app.

use std::collections::HashMap;

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{hash_password, role_for_username, verify_password, Role};
use crate::calc::{self, CourseGrades, GpaReport};

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("username already exists")]
    DuplicateUsername,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unknown user")]
    UnknownUser,
    #[error("only teachers may modify shared records")]
    Forbidden,
    #[error("course code {0} already exists")]
    DuplicateCourseCode(String),
    #[error("course not found")]
    UnknownCourse,
    #[error("announcement not found")]
    UnknownAnnouncement,
    #[error("assignment not found")]
    UnknownAssignment,
    #[error("attendance record not found")]
    UnknownAttendance,
    #[error("grade record not found")]
    UnknownGrade,
    #[error("attendance for {0} already recorded")]
    DuplicateAttendance(NaiveDate),
    #[error("invalid grade '{0}'")]
    InvalidGrade(String),
    #[error("weight must be a positive number")]
    InvalidWeight,
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

#[derive(Debug, Clone)]
pub struct Course {
    pub id: String,
    pub code: String,
    pub name: String,
    pub professor: String,
    pub room: String,
    pub time_slot: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Announcement {
    pub id: String,
    pub course_id: Option<String>,
    pub title: String,
    pub content: String,
    pub posted_on: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignmentStatus {
    #[default]
    ToDo,
    InProgress,
    Done,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::ToDo => "todo",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Done => "done",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: String,
    pub date: NaiveDate,
    pub present: bool,
}

#[derive(Debug, Clone)]
pub struct GradeRecord {
    pub id: String,
    pub title: String,
    pub letter: String,
    pub weight: f64,
}

#[derive(Debug, Default)]
struct UserData {
    /// Keyed by course id, like every other private collection.
    attendance: HashMap<String, Vec<AttendanceRecord>>,
    grades: HashMap<String, Vec<GradeRecord>>,
    assignment_status: HashMap<String, AssignmentStatus>,
}

#[derive(Debug)]
struct UserAccount {
    password_hash: String,
    role: Role,
    data: UserData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseAttendance {
    pub course_id: String,
    pub code: String,
    pub present: usize,
    pub total: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentView {
    pub id: String,
    pub course_code: String,
    pub title: String,
    pub due_date: NaiveDate,
    pub status: AssignmentStatus,
    pub overdue: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardSummary {
    pub course_count: usize,
    pub assignment_count: usize,
    pub overdue: usize,
    pub pending: usize,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    courses: Vec<Course>,
    announcements: Vec<Announcement>,
    assignments: Vec<Assignment>,
    users: HashMap<String, UserAccount>,
}

fn require_filled(value: &str, field: &'static str) -> Result<String, SessionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SessionError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore::default()
    }

    // --- accounts ---

    pub fn register(&mut self, username: &str, password: &str) -> Result<Role, SessionError> {
        let username = require_filled(username, "username")?;
        let password = require_filled(password, "password")?;
        if self.users.contains_key(&username) {
            return Err(SessionError::DuplicateUsername);
        }
        let role = role_for_username(&username);
        self.users.insert(
            username,
            UserAccount {
                password_hash: hash_password(&password),
                role,
                data: UserData::default(),
            },
        );
        Ok(role)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Role, SessionError> {
        let Some(account) = self.users.get(username) else {
            return Err(SessionError::InvalidCredentials);
        };
        if !verify_password(password, &account.password_hash) {
            return Err(SessionError::InvalidCredentials);
        }
        Ok(account.role)
    }

    pub fn role_of(&self, username: &str) -> Result<Role, SessionError> {
        self.users
            .get(username)
            .map(|a| a.role)
            .ok_or(SessionError::UnknownUser)
    }

    fn require_teacher(&self, username: &str) -> Result<(), SessionError> {
        if self.role_of(username)? != Role::Teacher {
            return Err(SessionError::Forbidden);
        }
        Ok(())
    }

    fn user_data(&self, username: &str) -> Result<&UserData, SessionError> {
        self.users
            .get(username)
            .map(|a| &a.data)
            .ok_or(SessionError::UnknownUser)
    }

    fn user_data_mut(&mut self, username: &str) -> Result<&mut UserData, SessionError> {
        self.users
            .get_mut(username)
            .map(|a| &mut a.data)
            .ok_or(SessionError::UnknownUser)
    }

    // --- master data: courses ---

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn course(&self, course_id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == course_id)
    }

    pub fn add_course(
        &mut self,
        acting: &str,
        code: &str,
        name: &str,
        professor: &str,
        room: &str,
        time_slot: Option<&str>,
    ) -> Result<String, SessionError> {
        self.require_teacher(acting)?;
        let code = require_filled(code, "code")?;
        let name = require_filled(name, "name")?;
        let professor = require_filled(professor, "professor")?;
        let room = require_filled(room, "room")?;
        if self.courses.iter().any(|c| c.code == code) {
            return Err(SessionError::DuplicateCourseCode(code));
        }
        let id = Uuid::new_v4().to_string();
        self.courses.push(Course {
            id: id.clone(),
            code,
            name,
            professor,
            room,
            time_slot: time_slot.map(|s| s.to_string()),
        });
        Ok(id)
    }

    pub fn update_course(
        &mut self,
        acting: &str,
        course_id: &str,
        code: &str,
        name: &str,
        professor: &str,
        room: &str,
        time_slot: Option<&str>,
    ) -> Result<(), SessionError> {
        self.require_teacher(acting)?;
        let code = require_filled(code, "code")?;
        let name = require_filled(name, "name")?;
        let professor = require_filled(professor, "professor")?;
        let room = require_filled(room, "room")?;
        if self
            .courses
            .iter()
            .any(|c| c.code == code && c.id != course_id)
        {
            return Err(SessionError::DuplicateCourseCode(code));
        }
        let course = self
            .courses
            .iter_mut()
            .find(|c| c.id == course_id)
            .ok_or(SessionError::UnknownCourse)?;
        course.code = code;
        course.name = name;
        course.professor = professor;
        course.room = room;
        course.time_slot = time_slot.map(|s| s.to_string());
        Ok(())
    }

    /// Removes the course and everything hanging off it: tagged
    /// announcements, its assignments (with every user's status entries),
    /// and each user's grade and attendance collections for it.
    pub fn delete_course(&mut self, acting: &str, course_id: &str) -> Result<(), SessionError> {
        self.require_teacher(acting)?;
        if self.course(course_id).is_none() {
            return Err(SessionError::UnknownCourse);
        }

        self.courses.retain(|c| c.id != course_id);
        self.announcements
            .retain(|a| a.course_id.as_deref() != Some(course_id));

        let removed_assignments: Vec<String> = self
            .assignments
            .iter()
            .filter(|a| a.course_id == course_id)
            .map(|a| a.id.clone())
            .collect();
        self.assignments.retain(|a| a.course_id != course_id);

        for account in self.users.values_mut() {
            account.data.grades.remove(course_id);
            account.data.attendance.remove(course_id);
            for assignment_id in &removed_assignments {
                account.data.assignment_status.remove(assignment_id);
            }
        }
        Ok(())
    }

    // --- master data: announcements ---

    pub fn announcements(&self) -> Vec<&Announcement> {
        let mut sorted: Vec<&Announcement> = self.announcements.iter().collect();
        sorted.sort_by(|a, b| b.posted_on.cmp(&a.posted_on));
        sorted
    }

    pub fn post_announcement(
        &mut self,
        acting: &str,
        title: &str,
        content: &str,
        course_id: Option<&str>,
        posted_on: NaiveDate,
    ) -> Result<String, SessionError> {
        self.require_teacher(acting)?;
        let title = require_filled(title, "title")?;
        let content = require_filled(content, "content")?;
        if let Some(cid) = course_id {
            if self.course(cid).is_none() {
                return Err(SessionError::UnknownCourse);
            }
        }
        let id = Uuid::new_v4().to_string();
        self.announcements.push(Announcement {
            id: id.clone(),
            course_id: course_id.map(|s| s.to_string()),
            title,
            content,
            posted_on,
        });
        Ok(id)
    }

    pub fn update_announcement(
        &mut self,
        acting: &str,
        announcement_id: &str,
        title: &str,
        content: &str,
        posted_on: NaiveDate,
    ) -> Result<(), SessionError> {
        self.require_teacher(acting)?;
        let title = require_filled(title, "title")?;
        let content = require_filled(content, "content")?;
        let announcement = self
            .announcements
            .iter_mut()
            .find(|a| a.id == announcement_id)
            .ok_or(SessionError::UnknownAnnouncement)?;
        announcement.title = title;
        announcement.content = content;
        announcement.posted_on = posted_on;
        Ok(())
    }

    pub fn delete_announcement(
        &mut self,
        acting: &str,
        announcement_id: &str,
    ) -> Result<(), SessionError> {
        self.require_teacher(acting)?;
        let before = self.announcements.len();
        self.announcements.retain(|a| a.id != announcement_id);
        if self.announcements.len() == before {
            return Err(SessionError::UnknownAnnouncement);
        }
        Ok(())
    }

    // --- master data: assignments ---

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn create_assignment(
        &mut self,
        acting: &str,
        course_id: &str,
        title: &str,
        due_date: NaiveDate,
        description: Option<&str>,
    ) -> Result<String, SessionError> {
        self.require_teacher(acting)?;
        let title = require_filled(title, "title")?;
        if self.course(course_id).is_none() {
            return Err(SessionError::UnknownCourse);
        }
        let id = Uuid::new_v4().to_string();
        self.assignments.push(Assignment {
            id: id.clone(),
            course_id: course_id.to_string(),
            title,
            description: description.map(|s| s.to_string()),
            due_date,
        });
        Ok(id)
    }

    pub fn delete_assignment(
        &mut self,
        acting: &str,
        assignment_id: &str,
    ) -> Result<(), SessionError> {
        self.require_teacher(acting)?;
        let before = self.assignments.len();
        self.assignments.retain(|a| a.id != assignment_id);
        if self.assignments.len() == before {
            return Err(SessionError::UnknownAssignment);
        }
        for account in self.users.values_mut() {
            account.data.assignment_status.remove(assignment_id);
        }
        Ok(())
    }

    /// A user's own status for a shared assignment. There is exactly one
    /// status entry per (user, assignment); unset reads as to-do.
    pub fn set_assignment_status(
        &mut self,
        username: &str,
        assignment_id: &str,
        status: AssignmentStatus,
    ) -> Result<(), SessionError> {
        if !self.assignments.iter().any(|a| a.id == assignment_id) {
            return Err(SessionError::UnknownAssignment);
        }
        let data = self.user_data_mut(username)?;
        data.assignment_status
            .insert(assignment_id.to_string(), status);
        Ok(())
    }

    // --- private data: attendance ---

    pub fn record_attendance(
        &mut self,
        acting: &str,
        student: &str,
        course_id: &str,
        date: NaiveDate,
        present: bool,
    ) -> Result<String, SessionError> {
        self.require_teacher(acting)?;
        if self.course(course_id).is_none() {
            return Err(SessionError::UnknownCourse);
        }
        let data = self.user_data_mut(student)?;
        let records = data.attendance.entry(course_id.to_string()).or_default();
        if records.iter().any(|r| r.date == date) {
            return Err(SessionError::DuplicateAttendance(date));
        }
        let id = Uuid::new_v4().to_string();
        records.push(AttendanceRecord {
            id: id.clone(),
            date,
            present,
        });
        Ok(id)
    }

    pub fn delete_attendance(
        &mut self,
        acting: &str,
        student: &str,
        course_id: &str,
        record_id: &str,
    ) -> Result<(), SessionError> {
        self.require_teacher(acting)?;
        let data = self.user_data_mut(student)?;
        let records = data
            .attendance
            .get_mut(course_id)
            .ok_or(SessionError::UnknownAttendance)?;
        let before = records.len();
        records.retain(|r| r.id != record_id);
        if records.len() == before {
            return Err(SessionError::UnknownAttendance);
        }
        Ok(())
    }

    pub fn attendance_summary(
        &self,
        username: &str,
    ) -> Result<Vec<CourseAttendance>, SessionError> {
        let data = self.user_data(username)?;
        let mut summary = Vec::new();
        for course in &self.courses {
            let Some(records) = data.attendance.get(&course.id) else {
                continue;
            };
            if records.is_empty() {
                continue;
            }
            let present = records.iter().filter(|r| r.present).count();
            summary.push(CourseAttendance {
                course_id: course.id.clone(),
                code: course.code.clone(),
                present,
                total: records.len(),
                percentage: calc::attendance_percent(present, records.len()),
            });
        }
        Ok(summary)
    }

    // --- private data: grades ---

    pub fn add_grade(
        &mut self,
        acting: &str,
        student: &str,
        course_id: &str,
        title: &str,
        letter: &str,
        weight: f64,
    ) -> Result<String, SessionError> {
        self.require_teacher(acting)?;
        let title = require_filled(title, "title")?;
        if calc::grade_points(letter).is_none() {
            return Err(SessionError::InvalidGrade(letter.to_string()));
        }
        if !(weight > 0.0) {
            return Err(SessionError::InvalidWeight);
        }
        if self.course(course_id).is_none() {
            return Err(SessionError::UnknownCourse);
        }
        let data = self.user_data_mut(student)?;
        let id = Uuid::new_v4().to_string();
        data.grades
            .entry(course_id.to_string())
            .or_default()
            .push(GradeRecord {
                id: id.clone(),
                title,
                letter: letter.to_string(),
                weight,
            });
        Ok(id)
    }

    pub fn delete_grade(
        &mut self,
        acting: &str,
        student: &str,
        course_id: &str,
        grade_id: &str,
    ) -> Result<(), SessionError> {
        self.require_teacher(acting)?;
        let data = self.user_data_mut(student)?;
        let grades = data
            .grades
            .get_mut(course_id)
            .ok_or(SessionError::UnknownGrade)?;
        let before = grades.len();
        grades.retain(|g| g.id != grade_id);
        if grades.len() == before {
            return Err(SessionError::UnknownGrade);
        }
        Ok(())
    }

    pub fn gpa_report(&self, username: &str) -> Result<GpaReport, SessionError> {
        let data = self.user_data(username)?;
        let courses = self
            .courses
            .iter()
            .map(|course| CourseGrades {
                course_id: course.id.clone(),
                code: course.code.clone(),
                name: course.name.clone(),
                entries: data
                    .grades
                    .get(&course.id)
                    .map(|grades| {
                        grades
                            .iter()
                            .map(|g| (calc::grade_points(&g.letter).unwrap_or(0.0), g.weight))
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect();
        Ok(calc::gpa_report(courses))
    }

    // --- derived views ---

    pub fn assignment_overview(
        &self,
        username: &str,
        today: NaiveDate,
    ) -> Result<Vec<AssignmentView>, SessionError> {
        let data = self.user_data(username)?;
        let mut views: Vec<AssignmentView> = self
            .assignments
            .iter()
            .map(|a| {
                let status = data
                    .assignment_status
                    .get(&a.id)
                    .copied()
                    .unwrap_or_default();
                let course_code = self
                    .course(&a.course_id)
                    .map(|c| c.code.clone())
                    .unwrap_or_else(|| "?".to_string());
                AssignmentView {
                    id: a.id.clone(),
                    course_code,
                    title: a.title.clone(),
                    due_date: a.due_date,
                    status,
                    overdue: a.due_date < today && status != AssignmentStatus::Done,
                }
            })
            .collect();
        views.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        Ok(views)
    }

    pub fn dashboard(
        &self,
        username: &str,
        today: NaiveDate,
    ) -> Result<DashboardSummary, SessionError> {
        let views = self.assignment_overview(username, today)?;
        let overdue = views.iter().filter(|v| v.overdue).count();
        let pending = views
            .iter()
            .filter(|v| !v.overdue && v.status != AssignmentStatus::Done)
            .count();
        Ok(DashboardSummary {
            course_count: self.courses.len(),
            assignment_count: self.assignments.len(),
            overdue,
            pending,
        })
    }
}
