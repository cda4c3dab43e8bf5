// ==========================================
// 定长监管报送文件导入系统 - SQLite 连接与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout, 减少并发读写时的偶发 busy 错误
// - 各记录类型的最终表/暂存表 DDL 由切片布局生成, 列名与字段名一致
// ==========================================

use crate::domain::types::{ErrorCode, RecordKind};
use crate::importer::layout::layout_for;
use rusqlite::{params, Connection, OptionalExtension};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前 schema 版本
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 暂存行状态
pub mod staging_status {
    pub const PENDING: &str = "PENDING";
    pub const INVALID: &str = "INVALID";
    pub const DUPLICATE_FILE: &str = "DUPLICATE_FILE";
    pub const MISSING_PARENT: &str = "MISSING_PARENT";
    pub const DUPLICATE_STORE: &str = "DUPLICATE_STORE";
}

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：foreign_keys / busy_timeout 需要每个连接单独设置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
}

// ==========================================
// DDL 生成
// ==========================================

/// 记录类型的字段列名（布局顺序）
pub fn field_columns(kind: RecordKind) -> Vec<&'static str> {
    layout_for(kind).iter().map(|f| f.name).collect()
}

/// linkage 额外的父引用列
pub fn extra_columns(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Linkage => &["subject_ref", "relationship_ref"],
        _ => &[],
    }
}

fn column_defs(kind: RecordKind) -> String {
    field_columns(kind)
        .into_iter()
        .chain(extra_columns(kind).iter().copied())
        .map(|c| format!("    {} TEXT NOT NULL DEFAULT ''", c))
        .collect::<Vec<_>>()
        .join(",\n")
}

/// 最终表 DDL
pub fn final_table_ddl(kind: RecordKind) -> String {
    let table = kind.table_name();
    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n\
         \x20   id INTEGER PRIMARY KEY AUTOINCREMENT,\n\
         \x20   submission_id TEXT NOT NULL,\n\
         \x20   ingestion_id TEXT NOT NULL,\n\
         \x20   raw_row TEXT NOT NULL,\n\
         \x20   dup_key TEXT NOT NULL,\n\
         {cols},\n\
         \x20   created_at TEXT NOT NULL DEFAULT (datetime('now'))\n\
         );\n\
         CREATE INDEX IF NOT EXISTS idx_{table}_dup ON {table}(submission_id, dup_key);\n",
        table = table,
        cols = column_defs(kind),
    );
    for extra in extra_columns(kind) {
        ddl.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{col} ON {table}(submission_id, {col});\n",
            table = table,
            col = extra
        ));
    }
    ddl
}

/// 暂存表 DDL
///
/// file_key: 解析值组成的键（文件内去重）
/// dup_key: 改写后记录的键（与最终表一致, 库内去重）
pub fn staging_table_ddl(kind: RecordKind) -> String {
    let table = kind.staging_table_name();
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n\
         \x20   staging_id INTEGER PRIMARY KEY AUTOINCREMENT,\n\
         \x20   submission_id TEXT NOT NULL,\n\
         \x20   ingestion_id TEXT NOT NULL,\n\
         \x20   raw_row TEXT NOT NULL,\n\
         \x20   file_key TEXT,\n\
         \x20   dup_key TEXT,\n\
         {cols},\n\
         \x20   parent_ref TEXT,\n\
         \x20   status TEXT NOT NULL DEFAULT 'PENDING'\n\
         );\n\
         CREATE INDEX IF NOT EXISTS idx_{table}_file_key ON {table}(submission_id, file_key);\n\
         CREATE INDEX IF NOT EXISTS idx_{table}_status ON {table}(submission_id, status);\n",
        table = table,
        cols = column_defs(kind),
    )
}

const BASE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS error_type (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS error_record (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ingestion_id TEXT NOT NULL,
    submission_id TEXT NOT NULL,
    record_kind TEXT NOT NULL,
    raw_row TEXT NOT NULL,
    source_ref TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_error_record_ingestion ON error_record(ingestion_id);
CREATE INDEX IF NOT EXISTS idx_error_record_source ON error_record(source_ref);

CREATE TABLE IF NOT EXISTS error_cause (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    error_record_id INTEGER NOT NULL REFERENCES error_record(id) ON DELETE CASCADE,
    error_type_id INTEGER NOT NULL REFERENCES error_type(id),
    description TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_error_cause_record ON error_cause(error_record_id);

CREATE TABLE IF NOT EXISTS stg_cause (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    staging_table TEXT NOT NULL,
    staging_id INTEGER NOT NULL,
    error_code TEXT NOT NULL,
    description TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_stg_cause_row ON stg_cause(staging_table, staging_id);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);
"#;

/// 初始化全部表并写入 error_type 种子数据（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(BASE_SCHEMA)?;
    for kind in RecordKind::ALL {
        conn.execute_batch(&final_table_ddl(kind))?;
        conn.execute_batch(&staging_table_ddl(kind))?;
    }

    // id 顺序与 CachedErrorTypeResolver::defaults 一致
    for (i, code) in ErrorCode::ALL.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO error_type (id, code, description) VALUES (?1, ?2, ?3)",
            params![i as i64 + 1, code.as_str(), code.default_description()],
        )?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM error_type", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 6);
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_tables_have_layout_columns() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        for kind in RecordKind::ALL {
            for table in [kind.table_name().to_string(), kind.staging_table_name()] {
                let mut stmt = conn
                    .prepare(&format!("SELECT name FROM pragma_table_info('{}')", table))
                    .unwrap();
                let cols: Vec<String> = stmt
                    .query_map([], |r| r.get(0))
                    .unwrap()
                    .collect::<Result<_, _>>()
                    .unwrap();
                for field in field_columns(kind) {
                    assert!(cols.iter().any(|c| c == field), "{} missing {}", table, field);
                }
            }
        }
    }

    #[test]
    fn test_linkage_has_parent_columns() {
        let ddl = final_table_ddl(RecordKind::Linkage);
        assert!(ddl.contains("subject_ref TEXT"));
        assert!(ddl.contains("idx_linkage_relationship_ref"));
    }
}
