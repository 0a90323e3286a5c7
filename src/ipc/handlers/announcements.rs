use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    course_exists, get_optional_str, get_required_str, parse_date_param, today_string, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

struct AnnouncementRow {
    id: String,
    course_id: Option<String>,
    title: String,
    content: String,
    posted_on: String,
}

impl AnnouncementRow {
    fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "courseId": self.course_id,
            "title": self.title,
            "content": self.content,
            "postedOn": self.posted_on
        })
    }
}

fn fetch_announcement(
    conn: &Connection,
    announcement_id: &str,
) -> Result<Option<AnnouncementRow>, HandlerErr> {
    conn.query_row(
        "SELECT id, course_id, title, content, posted_on FROM announcements WHERE id = ?",
        [announcement_id],
        |r| {
            Ok(AnnouncementRow {
                id: r.get(0)?,
                course_id: r.get(1)?,
                title: r.get(2)?,
                content: r.get(3)?,
                posted_on: r.get(4)?,
            })
        },
    )
    .optional()
    .map_err(HandlerErr::db)
}

fn check_course_tag(conn: &Connection, course_id: &str) -> Result<(), HandlerErr> {
    if !course_exists(conn, course_id)? {
        return Err(HandlerErr::not_found("course not found"));
    }
    Ok(())
}

fn announcements_list(
    conn: &Connection,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, course_id, title, content, posted_on
             FROM announcements
             ORDER BY posted_on DESC, id",
        )
        .map_err(HandlerErr::db)?;
    let rows = stmt
        .query_map([], |r| {
            let id: String = r.get(0)?;
            let course_id: Option<String> = r.get(1)?;
            let title: String = r.get(2)?;
            let content: String = r.get(3)?;
            let posted_on: String = r.get(4)?;
            Ok(json!({
                "id": id,
                "courseId": course_id,
                "title": title,
                "content": content,
                "postedOn": posted_on
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db)?;

    Ok(json!({ "announcements": rows }))
}

fn announcements_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let title = get_required_str(params, "title")?;
    let content = get_required_str(params, "content")?;
    let course_id = get_optional_str(params, "courseId")?;
    if let Some(cid) = course_id.as_deref() {
        check_course_tag(conn, cid)?;
    }
    let posted_on = match get_optional_str(params, "postedOn")? {
        Some(raw) => parse_date_param(&raw, "postedOn")?,
        None => today_string(),
    };

    let row = AnnouncementRow {
        id: Uuid::new_v4().to_string(),
        course_id,
        title,
        content,
        posted_on,
    };
    conn.execute(
        "INSERT INTO announcements(id, course_id, title, content, posted_on)
         VALUES(?, ?, ?, ?, ?)",
        (
            &row.id,
            &row.course_id,
            &row.title,
            &row.content,
            &row.posted_on,
        ),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    Ok(row.to_json())
}

fn announcements_get(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let announcement_id = get_required_str(params, "announcementId")?;
    let Some(row) = fetch_announcement(conn, &announcement_id)? else {
        return Err(HandlerErr::not_found("announcement not found"));
    };
    Ok(row.to_json())
}

fn announcements_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let announcement_id = get_required_str(params, "announcementId")?;
    let Some(mut row) = fetch_announcement(conn, &announcement_id)? else {
        return Err(HandlerErr::not_found("announcement not found"));
    };

    if let Some(title) = get_optional_str(params, "title")? {
        row.title = title;
    }
    if let Some(content) = get_optional_str(params, "content")? {
        row.content = content;
    }
    if let Some(cid) = get_optional_str(params, "courseId")? {
        check_course_tag(conn, &cid)?;
        row.course_id = Some(cid);
    }
    // Edits restamp the post date unless the caller pins one.
    row.posted_on = match get_optional_str(params, "postedOn")? {
        Some(raw) => parse_date_param(&raw, "postedOn")?,
        None => today_string(),
    };

    conn.execute(
        "UPDATE announcements SET course_id = ?, title = ?, content = ?, posted_on = ?
         WHERE id = ?",
        (
            &row.course_id,
            &row.title,
            &row.content,
            &row.posted_on,
            &announcement_id,
        ),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    Ok(row.to_json())
}

fn announcements_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let announcement_id = get_required_str(params, "announcementId")?;
    let deleted = conn
        .execute("DELETE FROM announcements WHERE id = ?", [&announcement_id])
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    if deleted == 0 {
        return Err(HandlerErr::not_found("announcement not found"));
    }
    Ok(json!({ "ok": true }))
}

fn with_conn(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "announcements.list" => Some(with_conn(state, req, announcements_list)),
        "announcements.create" => Some(with_conn(state, req, announcements_create)),
        "announcements.get" => Some(with_conn(state, req, announcements_get)),
        "announcements.update" => Some(with_conn(state, req, announcements_update)),
        "announcements.delete" => Some(with_conn(state, req, announcements_delete)),
        _ => None,
    }
}
