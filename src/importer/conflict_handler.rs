// ==========================================
// 定长监管报送文件导入系统 - 重复/父记录冲突处理
// ==========================================
// 文件内重复: 分片加锁的并发集合, 所有分片任务共享
// 库内重复 / 缺少父记录: 基于批量查询快照的纯函数
// 优先级: 缺少父记录 先于 库内重复
// ==========================================

pub use crate::domain::error_record::{DUPLICATE_IN_FILE, DUPLICATE_IN_STORE, MISSING_PARENT};

use crate::domain::error_record::ErrorCause;
use crate::domain::records::{ParentRef, Record};
use crate::domain::types::ErrorCode;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

/// 报送批次限定的键
pub fn scoped_key(submission_id: &str, key: &str) -> String {
    format!("{}#{}", submission_id, key)
}

// ==========================================
// ShardedKeySet - 文件级并发去重集合
// ==========================================
pub struct ShardedKeySet {
    shards: Vec<Mutex<HashSet<String>>>,
}

impl ShardedKeySet {
    /// # 参数
    /// - shard_count: 分片数（通常取工作线程数的倍数）
    /// - expected_keys: 预计键数量（文件行数）
    pub fn new(shard_count: usize, expected_keys: usize) -> Self {
        let shard_count = shard_count.max(1);
        let per_shard = expected_keys / shard_count + 1;
        let shards = (0..shard_count)
            .map(|_| Mutex::new(HashSet::with_capacity(per_shard)))
            .collect();
        Self { shards }
    }

    fn shard_for(&self, key: &str) -> &Mutex<HashSet<String>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }

    /// 插入键
    ///
    /// # 返回
    /// - true: 首次出现
    /// - false: 文件内已存在
    pub fn insert(&self, key: String) -> bool {
        // 集合只做插入, 锁中毒后数据仍一致
        let mut shard = self
            .shard_for(&key)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        shard.insert(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        let shard = self
            .shard_for(key)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        shard.contains(key)
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().map(|set| set.len()).unwrap_or_else(|p| p.into_inner().len()))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 文件内重复原因
pub fn duplicate_in_file_cause() -> ErrorCause {
    ErrorCause::new(ErrorCode::DuplicateRecord, DUPLICATE_IN_FILE)
}

// ==========================================
// 跨记录校验
// ==========================================

/// 批量查询结果快照（同一报送批次）
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub existing_keys: HashSet<String>,
    pub existing_parents: HashSet<ParentRef>,
}

/// 跨记录阶段结果
#[derive(Debug, Default)]
pub struct CrossRecordOutcome {
    pub accepted: Vec<Record>,
    pub rejected: Vec<(Record, ErrorCause)>,
}

/// 单条记录的跨记录判定
pub fn cross_check(record: &Record, snapshot: &StoreSnapshot) -> Option<ErrorCause> {
    if record.kind().requires_parent() {
        let parent_present = record
            .parent_ref()
            .map(|p| snapshot.existing_parents.contains(&p))
            .unwrap_or(false);
        if !parent_present {
            return Some(ErrorCause::new(
                ErrorCode::MissingParentReference,
                MISSING_PARENT,
            ));
        }
    }
    if snapshot.existing_keys.contains(&record.duplicate_key()) {
        return Some(ErrorCause::new(ErrorCode::DuplicateRecord, DUPLICATE_IN_STORE));
    }
    None
}

/// 对已接受记录执行跨记录校验, 降级不通过的记录
pub fn cross_validate(records: Vec<Record>, snapshot: &StoreSnapshot) -> CrossRecordOutcome {
    let mut outcome = CrossRecordOutcome::default();
    for record in records {
        match cross_check(&record, snapshot) {
            Some(cause) => outcome.rejected.push((record, cause)),
            None => outcome.accepted.push(record),
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::records::{MerchantRecord, ParentColumn, RelationshipRecord};
    use std::sync::Arc;

    fn relationship(key: &str) -> Record {
        Record::Relationship(RelationshipRecord {
            intermediary: "12345678901".to_string(),
            relationship_key: key.to_string(),
            ..Default::default()
        })
    }

    fn parent(key: &str) -> ParentRef {
        ParentRef {
            column: ParentColumn::RelationshipRef,
            key: format!("12345678901|{}", key),
        }
    }

    #[test]
    fn test_insert_reports_duplicates() {
        let set = ShardedKeySet::new(4, 10);
        assert!(set.insert("a".to_string()));
        assert!(set.insert("b".to_string()));
        assert!(!set.insert("a".to_string()));
        assert_eq!(set.len(), 2);
        assert!(set.contains("b"));
    }

    #[test]
    fn test_concurrent_inserts_flag_each_repeat_once() {
        let set = Arc::new(ShardedKeySet::new(8, 1000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || {
                    (0..250)
                        .filter(|i| !set.insert(format!("key-{}", i)))
                        .count()
                })
            })
            .collect();
        let duplicates: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(duplicates, 750);
        assert_eq!(set.len(), 250);
    }

    #[test]
    fn test_missing_parent_takes_precedence() {
        let record = relationship("REL1");
        let snapshot = StoreSnapshot {
            existing_keys: [record.duplicate_key()].into_iter().collect(),
            existing_parents: HashSet::new(),
        };
        let cause = cross_check(&record, &snapshot).unwrap();
        assert_eq!(cause.error_code, ErrorCode::MissingParentReference);
    }

    #[test]
    fn test_duplicate_in_store_when_parent_present() {
        let record = relationship("REL1");
        let snapshot = StoreSnapshot {
            existing_keys: [record.duplicate_key()].into_iter().collect(),
            existing_parents: [parent("REL1")].into_iter().collect(),
        };
        let cause = cross_check(&record, &snapshot).unwrap();
        assert_eq!(cause.error_code, ErrorCode::DuplicateRecord);
        assert_eq!(cause.description, DUPLICATE_IN_STORE);
    }

    #[test]
    fn test_cross_validate_splits_records() {
        let merchant = Record::Merchant(MerchantRecord::default());
        let snapshot = StoreSnapshot {
            existing_keys: HashSet::new(),
            existing_parents: [parent("REL1")].into_iter().collect(),
        };
        let outcome = cross_validate(
            vec![relationship("REL1"), relationship("REL2"), merchant],
            &snapshot,
        );
        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(
            outcome.rejected[0].1.error_code,
            ErrorCode::MissingParentReference
        );
    }
}
