// ==========================================
// 定长监管报送文件导入系统 - 命令行入口
// ==========================================
// 子命令:
// - ingest: 导入单个文件, 输出 JSON 结果（接受数 + 错误记录）
// - init-db: 建表并写入 error_type 种子数据
// 退出码: 仅致命错误非零（文件结构错误 / 配置缺陷 / 存储故障）
// ==========================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use regfile_ingest::config::resolve_db_path;
use regfile_ingest::db::{init_schema, open_sqlite_connection};
use regfile_ingest::{FileLineSource, IngestionContext, IngestionService, RecordKind};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "regfile-ingest")]
#[command(author, version, about = "定长监管报送文件导入工具")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 导入一个定长文件
    Ingest {
        /// 记录类型（subject / relationship / accounting-data / linkage / ndg-change / transaction / merchant）
        #[arg(short, long, value_parser = parse_kind)]
        kind: RecordKind,

        /// 报送批次 ID
        #[arg(short, long)]
        submission: String,

        /// 导入批次 ID（缺省自动生成）
        #[arg(long)]
        ingestion: Option<String>,

        /// 导入模式
        #[arg(short, long, value_enum, default_value_t = Mode::Batch)]
        mode: Mode,

        /// 数据库路径
        #[arg(long, env = "REGFILE_INGEST_DB_PATH")]
        db: Option<String>,

        /// 待导入文件
        file: PathBuf,
    },

    /// 初始化数据库
    InitDb {
        /// 数据库路径
        #[arg(long, env = "REGFILE_INGEST_DB_PATH")]
        db: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Batch,
    Streaming,
    Staging,
}

fn parse_kind(s: &str) -> std::result::Result<RecordKind, String> {
    s.parse::<RecordKind>()
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("无法创建数据库目录: {}", parent.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    regfile_ingest::logging::init();
    let cli = Cli::parse();

    tracing::info!(
        version = regfile_ingest::VERSION,
        "{}",
        regfile_ingest::APP_NAME
    );

    match cli.command {
        Command::InitDb { db } => {
            let db_path = resolve_db_path(db.as_deref());
            ensure_parent_dir(&db_path)?;
            let conn = open_sqlite_connection(&db_path.to_string_lossy())
                .with_context(|| format!("无法打开数据库: {}", db_path.display()))?;
            init_schema(&conn).context("建表失败")?;
            tracing::info!(db_path = %db_path.display(), "数据库初始化完成");
        }
        Command::Ingest {
            kind,
            submission,
            ingestion,
            mode,
            db,
            file,
        } => {
            let db_path = resolve_db_path(db.as_deref());
            ensure_parent_dir(&db_path)?;
            let service = IngestionService::open(&db_path.to_string_lossy()).await?;

            let source = FileLineSource::new(&file);
            let mut ctx = IngestionContext::new(kind, submission)
                .with_file_name(file.display().to_string());
            if let Some(id) = ingestion {
                ctx = ctx.with_ingestion_id(id);
            }

            let summary = match mode {
                Mode::Batch => service.ingest_batch_mode(&source, &ctx).await?,
                Mode::Streaming => service.ingest_streaming_mode(&source, &ctx).await?,
                Mode::Staging => service.ingest_staging_mode(&source, &ctx).await?,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
