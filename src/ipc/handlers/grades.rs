use crate::calc::{self, CourseGrades};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    course_exists, get_optional_str, get_required_f64, get_required_str, today_string,
    user_exists, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn grades_add(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    let course_id = get_required_str(params, "courseId")?;
    let title = get_required_str(params, "title")?;
    let letter = get_required_str(params, "grade")?;
    let weight = get_required_f64(params, "weight")?;

    if calc::grade_points(&letter).is_none() {
        return Err(HandlerErr::bad_params(format!(
            "invalid grade '{}', expected one of {}",
            letter,
            calc::LETTERS.join(", ")
        )));
    }
    if !(weight > 0.0) {
        return Err(HandlerErr::bad_params("weight must be a positive number"));
    }
    if !user_exists(conn, &user_id)? {
        return Err(HandlerErr::not_found("user not found"));
    }
    if !course_exists(conn, &course_id)? {
        return Err(HandlerErr::not_found("course not found"));
    }

    let id = Uuid::new_v4().to_string();
    let recorded_on = today_string();
    conn.execute(
        "INSERT INTO grades(id, user_id, course_id, title, letter, weight, recorded_on)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &user_id,
            &course_id,
            &title,
            &letter,
            weight,
            &recorded_on,
        ),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    Ok(json!({
        "id": id,
        "userId": user_id,
        "courseId": course_id,
        "title": title,
        "grade": letter,
        "weight": weight,
        "recordedOn": recorded_on
    }))
}

fn grades_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    let course_id = get_optional_str(params, "courseId")?;

    if !user_exists(conn, &user_id)? {
        return Err(HandlerErr::not_found("user not found"));
    }

    let mut sql = String::from(
        "SELECT id, course_id, title, letter, weight, recorded_on
         FROM grades WHERE user_id = ?",
    );
    if course_id.is_some() {
        sql.push_str(" AND course_id = ?");
    }
    sql.push_str(" ORDER BY rowid");

    let mut stmt = conn.prepare(&sql).map_err(HandlerErr::db)?;
    let map_row = |r: &rusqlite::Row<'_>| -> rusqlite::Result<serde_json::Value> {
        let id: String = r.get(0)?;
        let course_id: String = r.get(1)?;
        let title: String = r.get(2)?;
        let letter: String = r.get(3)?;
        let weight: f64 = r.get(4)?;
        let recorded_on: Option<String> = r.get(5)?;
        Ok(json!({
            "id": id,
            "courseId": course_id,
            "title": title,
            "grade": letter,
            "weight": weight,
            "recordedOn": recorded_on
        }))
    };
    let rows = match course_id.as_deref() {
        Some(cid) => stmt
            .query_map((&user_id, cid), map_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
        None => stmt
            .query_map([&user_id], map_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
    }
    .map_err(HandlerErr::db)?;

    Ok(json!({ "grades": rows }))
}

fn grades_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let grade_id = get_required_str(params, "gradeId")?;
    let deleted = conn
        .execute("DELETE FROM grades WHERE id = ?", [&grade_id])
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    if deleted == 0 {
        return Err(HandlerErr::not_found("grade not found"));
    }
    Ok(json!({ "ok": true }))
}

fn grades_gpa(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    if !user_exists(conn, &user_id)? {
        return Err(HandlerErr::not_found("user not found"));
    }

    let mut stmt = conn
        .prepare(
            "SELECT g.course_id, c.code, c.name, g.letter, g.weight
             FROM grades g
             JOIN courses c ON c.id = g.course_id
             WHERE g.user_id = ?
             ORDER BY c.code, g.rowid",
        )
        .map_err(HandlerErr::db)?;
    let rows = stmt
        .query_map([&user_id], |r| {
            let course_id: String = r.get(0)?;
            let code: String = r.get(1)?;
            let name: String = r.get(2)?;
            let letter: String = r.get(3)?;
            let weight: f64 = r.get(4)?;
            Ok((course_id, code, name, letter, weight))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db)?;

    let mut courses: Vec<CourseGrades> = Vec::new();
    for (course_id, code, name, letter, weight) in rows {
        // Letters were validated on insert; a bad row contributes zero points.
        let points = calc::grade_points(&letter).unwrap_or(0.0);
        match courses.last_mut() {
            Some(last) if last.course_id == course_id => last.entries.push((points, weight)),
            _ => courses.push(CourseGrades {
                course_id,
                code,
                name,
                entries: vec![(points, weight)],
            }),
        }
    }

    let report = calc::gpa_report(courses);
    serde_json::to_value(&report).map_err(|e| HandlerErr::new("internal", e.to_string()))
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
        "grades.add" => Some(with_conn(state, req, grades_add)),
        "grades.list" => Some(with_conn(state, req, grades_list)),
        "grades.delete" => Some(with_conn(state, req, grades_delete)),
        "grades.gpa" => Some(with_conn(state, req, grades_gpa)),
        _ => None,
    }
}
