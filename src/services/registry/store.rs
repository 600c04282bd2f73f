use std::collections::HashMap;

use tokio::sync::RwLock;

use super::types::{Registration, ServiceRecord, ServiceStatus};

#[derive(Debug, Default)]
struct StoreInner {
    records: HashMap<String, ServiceRecord>,
    // 单调递增，用于识别被重新注册替换掉的旧记录
    generation: u64,
}

/// 服务注册表存储
///
/// 读写锁保护整张表：任意数量的快照读可以并发进行，写操作独占。
/// 记录一旦创建便不会被删除。
#[derive(Debug, Default)]
pub struct RegistryStore {
    inner: RwLock<StoreInner>,
}

impl RegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或整体替换同名记录，状态重置为 Unknown
    pub async fn upsert(&self, registration: Registration) -> ServiceRecord {
        let mut inner = self.inner.write().await;
        inner.generation += 1;
        let record = ServiceRecord::from_registration(registration, inner.generation);

        if let Some(previous) = inner.records.insert(record.name.clone(), record.clone()) {
            tracing::debug!(
                service_name = %record.name,
                previous_address = %previous.address(),
                address = %record.address(),
                "Replaced existing service record"
            );
        }

        record
    }

    /// 返回当前所有记录的独立副本（按名称排序）
    pub async fn snapshot(&self) -> Vec<ServiceRecord> {
        let inner = self.inner.read().await;
        let mut records: Vec<ServiceRecord> = inner.records.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// 写回健康检查结果
    ///
    /// 以整条记录拷贝后替换的方式更新，且仅当存储中的记录仍是检查开始时的
    /// 那一版时才生效。返回 false 表示记录已被重新注册，结果被丢弃。
    pub async fn update_status(&self, name: &str, generation: u64, status: ServiceStatus) -> bool {
        let mut inner = self.inner.write().await;
        let Some(current) = inner.records.get(name) else {
            return false;
        };
        if current.generation != generation {
            return false;
        }

        let mut updated = current.clone();
        updated.status = status;
        inner.records.insert(name.to_string(), updated);
        true
    }

    pub async fn get(&self, name: &str) -> Option<ServiceRecord> {
        self.inner.read().await.records.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}
