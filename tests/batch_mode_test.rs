// ==========================================
// 批量模式集成测试
// ==========================================
// 测试目标: 真实 SQLite 上的 解析 → 校验 → 去重 → 父记录 → 落库
// ==========================================

mod test_helpers;

use regfile_ingest::domain::error_record::{DUPLICATE_IN_FILE, DUPLICATE_IN_STORE, MISSING_PARENT};
use regfile_ingest::domain::ProcessedBatch;
use regfile_ingest::importer::line_parser::parse_relationship;
use regfile_ingest::importer::line_validator::{relationship, ValidationContext};
use regfile_ingest::repository::{IngestQueryRepository, PersistenceSink};
use regfile_ingest::{
    ErrorCode, IngestConfig, IngestError, IngestionContext, IngestionService, MemoryLineSource,
    RecordKind,
};
use test_helpers::*;

async fn open_service(db_path: &str) -> IngestionService {
    let config = IngestConfig::default().with_worker_count(4);
    IngestionService::from_connection(open_shared(db_path).unwrap(), config)
        .await
        .expect("Failed to create service")
}

async fn load_linkages(service: &IngestionService, submission: &str, pairs: &[(&str, &str)]) {
    let lines = pairs.iter().map(|(rel, ndg)| linkage_line(rel, ndg)).collect();
    let ctx = IngestionContext::new(RecordKind::Linkage, submission);
    let summary = service
        .ingest_batch_mode(&source("linkage.txt", lines), &ctx)
        .await
        .unwrap();
    assert_eq!(summary.accepted, pairs.len());
}

#[tokio::test]
async fn test_linkage_dates_are_persisted_rewritten() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let service = open_service(&db_path).await;

    load_linkages(&service, "SUB-A", &[("REL1", "NDG1"), ("REL2", "NDG2")]).await;

    let rewritten = count_rows(
        &db_path,
        "SELECT COUNT(*) FROM linkage WHERE role_start_date = '01012023'",
    )
    .unwrap();
    assert_eq!(rewritten, 2);
    let raw_kept = count_rows(
        &db_path,
        "SELECT COUNT(*) FROM linkage WHERE raw_row LIKE '%20230101%'",
    )
    .unwrap();
    assert_eq!(raw_kept, 2);
}

#[tokio::test]
async fn test_relationship_file_duplicates_and_missing_parent() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let service = open_service(&db_path).await;
    load_linkages(&service, "SUB-A", &[("REL1", "NDG1"), ("REL2", "NDG2")]).await;

    let ctx = IngestionContext::new(RecordKind::Relationship, "SUB-A");
    let lines = vec![
        relationship_line("REL1"),
        relationship_line("REL1"),
        relationship_line("REL3"),
        relationship_line("REL2"),
    ];
    let summary = service
        .ingest_batch_mode(&source("rel.txt", lines), &ctx)
        .await
        .unwrap();

    assert_eq!(summary.total_lines, 4);
    assert_eq!(summary.accepted, 2);
    assert_eq!(summary.rejected, 2);
    assert!(summary.is_reconciled());

    let dup = find_by_key(
        &summary.error_records,
        RecordKind::Relationship,
        "relationship_key",
        "REL1",
    );
    assert_eq!(dup.len(), 1);
    assert!(only_code(dup[0], ErrorCode::DuplicateRecord));
    assert_eq!(dup[0].causes[0].description, DUPLICATE_IN_FILE);

    let orphan = find_by_key(
        &summary.error_records,
        RecordKind::Relationship,
        "relationship_key",
        "REL3",
    );
    assert_eq!(orphan.len(), 1);
    assert!(only_code(orphan[0], ErrorCode::MissingParentReference));
    assert_eq!(orphan[0].causes[0].description, MISSING_PARENT);

    let repo = service.repository();
    let stored = repo
        .count_records(RecordKind::Relationship, "SUB-A")
        .await
        .unwrap();
    assert_eq!(stored, 2);
    assert_eq!(
        repo.count_ingested(RecordKind::Relationship, &ctx.ingestion_id)
            .await
            .unwrap(),
        2
    );
    let errors = count_rows(
        &db_path,
        &format!(
            "SELECT COUNT(*) FROM error_record WHERE ingestion_id = '{}'",
            ctx.ingestion_id
        ),
    )
    .unwrap();
    assert_eq!(errors, 2);
    let causes = count_rows(&db_path, "SELECT COUNT(*) FROM error_cause").unwrap();
    assert_eq!(causes, 2);
}

#[tokio::test]
async fn test_duplicate_in_store_is_scoped_by_submission() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let service = open_service(&db_path).await;
    load_linkages(&service, "SUB-A", &[("REL2", "NDG2")]).await;
    load_linkages(&service, "SUB-B", &[("REL2", "NDG2")]).await;

    let first = IngestionContext::new(RecordKind::Relationship, "SUB-A");
    let summary = service
        .ingest_batch_mode(&source("rel-1.txt", vec![relationship_line("REL2")]), &first)
        .await
        .unwrap();
    assert_eq!(summary.accepted, 1);

    // 同一报送批次再次导入 → 库内重复
    let again = IngestionContext::new(RecordKind::Relationship, "SUB-A");
    let summary = service
        .ingest_batch_mode(&source("rel-2.txt", vec![relationship_line("REL2")]), &again)
        .await
        .unwrap();
    assert_eq!(summary.accepted, 0);
    assert_eq!(summary.rejected, 1);
    assert!(only_code(&summary.error_records[0], ErrorCode::DuplicateRecord));
    assert_eq!(
        summary.error_records[0].causes[0].description,
        DUPLICATE_IN_STORE
    );

    // 其他报送批次不受影响
    let other = IngestionContext::new(RecordKind::Relationship, "SUB-B");
    let summary = service
        .ingest_batch_mode(&source("rel-3.txt", vec![relationship_line("REL2")]), &other)
        .await
        .unwrap();
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.rejected, 0);
}

#[tokio::test]
async fn test_missing_parent_takes_precedence_over_duplicate_in_store() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let service = open_service(&db_path).await;

    // 绕过父记录检查直接落库一条 Relationship
    let ctx = IngestionContext::new(RecordKind::Relationship, "SUB-P");
    let record = parse_relationship(&relationship_line("REL9")).unwrap();
    let record = relationship::validate(record, &ValidationContext::default()).unwrap();
    let mut batch = ProcessedBatch::new(0);
    batch.line_count = 1;
    batch.accepted.push(record);
    service.repository().save_batch(&ctx, &batch).await.unwrap();

    let again = IngestionContext::new(RecordKind::Relationship, "SUB-P");
    let summary = service
        .ingest_batch_mode(&source("rel.txt", vec![relationship_line("REL9")]), &again)
        .await
        .unwrap();

    assert_eq!(summary.rejected, 1);
    let record = &summary.error_records[0];
    assert!(only_code(record, ErrorCode::MissingParentReference));
    assert!(!record.has_code(ErrorCode::DuplicateRecord));
}

#[tokio::test]
async fn test_subject_collects_all_field_causes() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let service = open_service(&db_path).await;
    load_linkages(&service, "SUB-S", &[("REL1", "N2")]).await;

    let ctx = IngestionContext::new(RecordKind::Subject, "SUB-S");
    let lines = vec![
        subject_line("N1", &[("birth_date", "20200230"), ("sex", "X")]),
        subject_line("N2", &[]),
    ];
    let summary = service
        .ingest_batch_mode(&source("subject.txt", lines), &ctx)
        .await
        .unwrap();

    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.rejected, 1);
    let record = &summary.error_records[0];
    assert_eq!(
        codes_of(record),
        vec!["INVALID_VALUE".to_string(), "INVALID_DATE_FORMAT".to_string()]
    );
    assert!(record
        .causes
        .iter()
        .any(|c| c.description.contains("birth_date")));
    assert!(!record
        .causes
        .iter()
        .any(|c| c.description.contains("geography_code")));

    let stored = count_rows(
        &db_path,
        "SELECT COUNT(*) FROM subject WHERE birth_date = '01011980' AND ndg = 'N2'",
    )
    .unwrap();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn test_bad_header_end_marker_fails_whole_file() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let service = open_service(&db_path).await;

    let mut lines = regfile(vec![linkage_line("REL1", "NDG1")]);
    let header = &mut lines[0];
    header.pop();
    header.push('B');

    let ctx = IngestionContext::new(RecordKind::Linkage, "SUB-H");
    let err = service
        .ingest_batch_mode(&MemoryLineSource::new("bad.txt", lines), &ctx)
        .await
        .unwrap_err();

    assert!(err.is_structural());
    let message = err.to_string();
    assert!(message.contains("end marker must be 'A', found 'B'"), "{}", message);
    assert_eq!(count_rows(&db_path, "SELECT COUNT(*) FROM linkage").unwrap(), 0);
    assert_eq!(count_rows(&db_path, "SELECT COUNT(*) FROM error_record").unwrap(), 0);
}

#[tokio::test]
async fn test_footer_count_mismatch_is_structural() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let service = open_service(&db_path).await;

    let mut lines = regfile(vec![linkage_line("REL1", "NDG1"), linkage_line("REL2", "NDG2")]);
    let last = lines.len() - 1;
    lines[last] = footer_line(3);

    let ctx = IngestionContext::new(RecordKind::Linkage, "SUB-F");
    match service
        .ingest_batch_mode(&MemoryLineSource::new("bad.txt", lines), &ctx)
        .await
    {
        Err(IngestError::StructuralFileError { reasons }) => {
            assert!(reasons
                .iter()
                .any(|r| r.contains("declared record count 3")));
        }
        other => panic!("expected StructuralFileError, got {:?}", other.map(|s| s.accepted)),
    }
}

#[tokio::test]
async fn test_malformed_lines_become_error_records() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let service = open_service(&db_path).await;

    let short = "1SHORT".to_string();
    let ctx = IngestionContext::new(RecordKind::Linkage, "SUB-M");
    let summary = service
        .ingest_batch_mode(
            &source("linkage.txt", vec![short.clone(), linkage_line("REL1", "NDG1")]),
            &ctx,
        )
        .await
        .unwrap();

    assert!(summary.is_reconciled());
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.error_records[0].raw_row, short);
    assert!(summary.error_records[0].has_code(ErrorCode::InvalidFormat));
}
