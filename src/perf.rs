// ==========================================
// 定长监管报送文件导入系统 - SQL 性能统计
// ==========================================
// 用途: 校验 staging ETL 的往返次数与记录数无关, 记录慢 SQL
// 计数: rusqlite trace 回调 → 线程局部计数器（仅 Guard 活跃时累计）
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const PERF_SQL_ENV: &str = "REGFILE_INGEST_PERF_SQL";
pub const SLOW_SQL_MS_ENV: &str = "REGFILE_INGEST_SLOW_SQL_MS";

static ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

/// 当前线程的计数器
#[derive(Default)]
struct Counters {
    active_guards: Cell<u32>,
    statements: Cell<u64>,
    slow_statements: Cell<u64>,
}

thread_local! {
    static COUNTERS: Counters = Counters::default();
}

/// 从环境变量解析出的开关
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PerfSettings {
    enabled: bool,
    slow_ms: u64,
}

impl PerfSettings {
    fn from_env() -> Self {
        let enabled = std::env::var(PERF_SQL_ENV)
            .map(|v| {
                matches!(
                    v.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            })
            .unwrap_or(cfg!(debug_assertions));
        let slow_ms = std::env::var(SLOW_SQL_MS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self { enabled, slow_ms }
    }
}

fn guard_active() -> bool {
    COUNTERS.with(|c| c.active_guards.get() > 0)
}

/// 压缩空白后截断（慢 SQL 日志用）
fn compact_sql(sql: &str, max_chars: usize) -> String {
    let s = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s,
    }
}

/// SQL 计数是否开启
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// 为连接挂接 trace/profile 回调
///
/// - Debug 构建默认开启, Release 默认关闭
/// - `REGFILE_INGEST_PERF_SQL=1` 强制开启
/// - `REGFILE_INGEST_SLOW_SQL_MS` 慢 SQL 阈值（毫秒）
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let settings = PerfSettings::from_env();
    ENABLED.store(settings.enabled, Ordering::Relaxed);

    if !settings.enabled {
        conn.trace(None);
        conn.profile(None);
        return;
    }

    SLOW_THRESHOLD_MS.store(settings.slow_ms, Ordering::Relaxed);
    conn.trace(Some(on_statement));
    conn.profile(Some(on_statement_done));
}

fn on_statement(_sql: &str) {
    if is_enabled() && guard_active() {
        COUNTERS.with(|c| c.statements.set(c.statements.get().saturating_add(1)));
    }
}

fn on_statement_done(sql: &str, duration: Duration) {
    if !is_enabled() {
        return;
    }
    let threshold = SLOW_THRESHOLD_MS.load(Ordering::Relaxed);
    let ms = duration.as_millis() as u64;
    if threshold == 0 || ms < threshold {
        return;
    }

    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %compact_sql(sql, 420),
        "slow sql"
    );
    if guard_active() {
        COUNTERS.with(|c| {
            c.slow_statements
                .set(c.slow_statements.get().saturating_add(1))
        });
    }
}

// ==========================================
// PerfGuard
// ==========================================

/// 单个操作的统计结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfReport {
    pub op: &'static str,
    pub rows: Option<usize>,
    pub elapsed_ms: u64,
    pub sql_count: u64,
    pub slow_sql_count: u64,
}

/// 作用域统计: 创建时记下起点, 析构时按 target "perf" 输出
///
/// 计数为线程局部, Guard 须与被测 SQL 在同一线程
/// ```ignore
/// let _perf = regfile_ingest::perf::PerfGuard::new("staging_pass");
/// ```
pub struct PerfGuard {
    op: &'static str,
    rows: Option<usize>,
    started: Instant,
    statements_at_start: u64,
    slow_at_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        let (statements_at_start, slow_at_start) = COUNTERS.with(|c| {
            c.active_guards.set(c.active_guards.get().saturating_add(1));
            (c.statements.get(), c.slow_statements.get())
        });
        Self {
            op,
            rows: None,
            started: Instant::now(),
            statements_at_start,
            slow_at_start,
        }
    }

    /// 附带处理行数（写入日志）
    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    /// 截至目前本 Guard 内执行的 SQL 语句数
    pub fn sql_count(&self) -> u64 {
        self.report().sql_count
    }

    pub fn report(&self) -> PerfReport {
        let (statements, slow) =
            COUNTERS.with(|c| (c.statements.get(), c.slow_statements.get()));
        PerfReport {
            op: self.op,
            rows: self.rows,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            sql_count: statements.saturating_sub(self.statements_at_start),
            slow_sql_count: slow.saturating_sub(self.slow_at_start),
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let report = self.report();
        tracing::info!(
            target: "perf",
            op = report.op,
            rows = report.rows,
            elapsed_ms = report.elapsed_ms,
            sql_count = report.sql_count,
            slow_sql_count = report.slow_sql_count,
            "done"
        );
        COUNTERS.with(|c| c.active_guards.set(c.active_guards.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_sql_collapses_whitespace() {
        assert_eq!(compact_sql("SELECT  1\n  FROM t", 100), "SELECT 1 FROM t");
        assert_eq!(compact_sql("SELECT 1 FROM t", 6), "SELECT…");
    }

    #[test]
    fn test_guard_counts_statements() {
        std::env::set_var(PERF_SQL_ENV, "1");
        let mut conn = Connection::open_in_memory().unwrap();
        install_sqlite_tracing(&mut conn);

        let guard = PerfGuard::new("perf_test").with_rows(1);
        conn.execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (1);")
            .unwrap();
        let _: i64 = conn.query_row("SELECT v FROM t", [], |r| r.get(0)).unwrap();
        let report = guard.report();
        assert!(report.sql_count >= 3);
        assert_eq!(report.rows, Some(1));
    }

    #[test]
    fn test_statements_outside_guard_are_not_counted() {
        std::env::set_var(PERF_SQL_ENV, "1");
        let mut conn = Connection::open_in_memory().unwrap();
        install_sqlite_tracing(&mut conn);
        conn.execute_batch("CREATE TABLE t (v INTEGER);").unwrap();

        let guard = PerfGuard::new("perf_idle");
        assert_eq!(guard.sql_count(), 0);
    }
}
