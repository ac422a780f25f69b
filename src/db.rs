//! Thin layer over sqlite: schema bootstrap plus a row-level
//! insert-or-update keyed by rowid, addressed by table name and a
//! field→value mapping.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::Connection;

use crate::error::Result;

/// Field→value mapping for one row. Ordered so generated SQL is stable.
pub type MemberMap = BTreeMap<String, Value>;

const SCHEMA: &str = "
create table if not exists pms_fe (
    id integer primary key,
    detector_type text not null,
    grid_spacing integer not null,
    patch_radius integer not null,
    min_contrast real not null
);
create table if not exists pms_match (
    id integer primary key,
    matcher_type text not null,
    knn integer not null,
    do_ratio_test integer not null,
    ratio_threshold real not null
);
create table if not exists pms_guess (
    id integer primary key,
    min_inliers integer not null,
    max_projection_error real not null,
    ransac_iterations integer not null
);
create table if not exists pms_choice (
    id integer primary key,
    accept_threshold real not null,
    ranking text not null
);
create table if not exists response (
    id integer primary key,
    value real not null,
    sipc_frames integer not null,
    sipc_acc_score real not null,
    sipc_final_score real not null,
    sipc_rscore real not null,
    sipc_tscore real not null,
    sipc_cscore real not null,
    sipc_max_rscore real not null,
    sipc_max_tscore real not null,
    sipc_max_cscore real not null,
    succ_rate real not null,
    avg_angle_err real not null,
    avg_succ_angle_err real not null,
    avg_trans_err real not null,
    avg_succ_trans_err real not null,
    avg_angle_sq_err real not null,
    avg_succ_angle_sq_err real not null,
    avg_trans_sq_err real not null,
    avg_succ_trans_sq_err real not null,
    mislabel_rate real not null,
    none_rate real not null,
    avg_keypoints real not null,
    avg_detect_matches real not null,
    avg_detect_guesses real not null,
    avg_detect_inliers real not null,
    avg_detect_choice_matches real not null,
    avg_detect_choice_inliers real not null,
    detect_tp integer not null,
    detect_fp integer not null,
    detect_fn integer not null,
    detect_tn integer not null,
    avg_locate_matches real not null,
    avg_locate_guesses real not null,
    avg_locate_inliers real not null,
    avg_locate_choice_matches real not null,
    avg_locate_choice_inliers real not null
);
create table if not exists experiment (
    id integer primary key,
    train_pms_fe_id integer not null,
    recog_pms_fe_id integer not null,
    detect_pms_match_id integer not null,
    detect_pms_guess_id integer not null,
    locate_pms_match_id integer not null,
    locate_pms_guess_id integer not null,
    pms_choice_id integer not null,
    max_trans_error real not null,
    max_angle_error real not null,
    response_id integer,
    train_set text not null,
    test_set text not null,
    time text not null default '',
    vcs_commit text not null default '',
    skip integer not null default 0,
    has_run integer not null default 0
);
";

/// Opens (creating if needed) an experiment database and bootstraps the
/// schema.
pub fn db_open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// In-memory database with the same schema, for tests.
pub fn db_open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// Inserts a new row (`*id <= 0`) or updates the existing one, writing the
/// assigned rowid back into `id`. Statements are prepared with bound
/// parameters; values never pass through string formatting.
pub fn insert_or_update(
    conn: &Connection,
    table: &str,
    fields: &MemberMap,
    id: &mut i64,
) -> Result<()> {
    if *id > 0 {
        let assignments = fields
            .keys()
            .enumerate()
            .map(|(i, k)| format!("{} = ?{}", k, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "update {} set {} where id = ?{}",
            table,
            assignments,
            fields.len() + 1
        );
        let params = fields
            .values()
            .cloned()
            .chain(std::iter::once(Value::Integer(*id)));
        conn.execute(&sql, rusqlite::params_from_iter(params))?;
    } else {
        let columns = fields.keys().cloned().collect::<Vec<_>>().join(", ");
        let placeholders = (1..=fields.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("insert into {table} ({columns}) values ({placeholders})");
        conn.execute(&sql, rusqlite::params_from_iter(fields.values().cloned()))?;
        *id = conn.last_insert_rowid();
    }
    Ok(())
}
