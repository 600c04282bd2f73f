use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::checker::HealthChecker;
use super::error::CheckError;
use super::rest::RestChecker;
use super::rpc::RpcChecker;
use crate::config::MonitorConfig;
use crate::services::registry::{ServiceKind, ServiceRecord, SharedRegistry};

/// 周期性健康检查调度器
///
/// 每个周期对注册表取一次快照，为每条记录派发一个并发检查任务，
/// 派发完成后立即进入下一次等待，不等待检查结束。并发检查数由信号量限制；
/// 上一次检查尚未结束的记录本轮跳过，因此排队任务数不超过记录数。
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    registry: SharedRegistry,
    rest_checker: Arc<dyn HealthChecker>,
    rpc_checker: Arc<dyn HealthChecker>,
    interval: Duration,
    limiter: Arc<Semaphore>,
    // 仍有检查在排队或执行中的服务名
    in_flight: Arc<DashSet<String>>,
    task_tracker: TaskTracker,
}

// 任务结束（包括被取消）时把服务名移出 in_flight
struct InFlightGuard {
    in_flight: Arc<DashSet<String>>,
    name: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.name);
    }
}

impl HealthMonitor {
    pub fn new(registry: SharedRegistry, config: &MonitorConfig) -> Result<Self, CheckError> {
        let rest_checker = RestChecker::new(config.rest_timeout(), config.status_path.clone())?;
        let rpc_checker = RpcChecker::new(config.rpc_timeout());

        Ok(Self::with_checkers(
            registry,
            Arc::new(rest_checker),
            Arc::new(rpc_checker),
            config.interval(),
            config.max_concurrent_checks,
        ))
    }

    pub fn with_checkers(
        registry: SharedRegistry,
        rest_checker: Arc<dyn HealthChecker>,
        rpc_checker: Arc<dyn HealthChecker>,
        interval: Duration,
        max_concurrent_checks: usize,
    ) -> Self {
        Self {
            registry,
            rest_checker,
            rpc_checker,
            interval,
            limiter: Arc::new(Semaphore::new(max_concurrent_checks.min(Semaphore::MAX_PERMITS))),
            in_flight: Arc::new(DashSet::new()),
            task_tracker: TaskTracker::new(),
        }
    }

    /// 运行监控循环直到收到关闭信号，然后等待进行中的检查结束
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            max_concurrent_checks = self.limiter.available_permits(),
            "Health monitor started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let dispatched = self.sweep().await;
                    tracing::debug!(dispatched = dispatched, "Health sweep dispatched");
                }
            }
        }

        tracing::info!(in_flight = self.task_tracker.len(), "Health monitor stopping");
        self.limiter.close();
        self.wait_idle().await;
    }

    /// 执行一次巡检：为快照中的每条记录派发一个检查任务，返回派发数量
    ///
    /// 上一轮检查仍未完成的记录不会重复派发。
    pub async fn sweep(&self) -> usize {
        let records = self.registry.snapshot().await;
        let total = records.len();
        let mut dispatched = 0;

        for record in records {
            if !self.in_flight.insert(record.name.clone()) {
                continue;
            }
            self.dispatch(record);
            dispatched += 1;
        }

        if dispatched < total {
            tracing::debug!(
                skipped = total - dispatched,
                "Previous checks still pending, skipping those services this sweep"
            );
        }
        dispatched
    }

    /// 当前已派发但尚未结束的检查任务数
    pub fn pending_checks(&self) -> usize {
        self.task_tracker.len()
    }

    /// 等待所有已派发的检查完成
    pub async fn wait_idle(&self) {
        self.task_tracker.close();
        self.task_tracker.wait().await;
        self.task_tracker.reopen();
    }

    fn checker_for(&self, kind: ServiceKind) -> Arc<dyn HealthChecker> {
        match kind {
            ServiceKind::Rest => self.rest_checker.clone(),
            ServiceKind::Rpc => self.rpc_checker.clone(),
        }
    }

    fn dispatch(&self, record: ServiceRecord) {
        let checker = self.checker_for(record.kind);
        let registry = self.registry.clone();
        let limiter = self.limiter.clone();
        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            name: record.name.clone(),
        };

        self.task_tracker.spawn(async move {
            let _guard = guard;
            // 在任务内部获取许可，避免阻塞巡检循环
            let Ok(_permit) = limiter.acquire_owned().await else {
                return;
            };

            let status = checker.check(&record.host, record.port).await;
            let applied = registry
                .update_status(&record.name, record.generation, status.clone())
                .await;

            if applied {
                tracing::debug!(
                    service_name = %record.name,
                    kind = %record.kind,
                    status = %status,
                    "Service status updated"
                );
            } else {
                tracing::debug!(
                    service_name = %record.name,
                    status = %status,
                    "Service was re-registered during check, discarding result"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::services::registry::{Registration, RegistryStore, ServiceStatus};

    #[derive(Debug)]
    struct FixedChecker(ServiceStatus);

    #[tonic::async_trait]
    impl HealthChecker for FixedChecker {
        async fn check(&self, _host: &str, _port: u16) -> ServiceStatus {
            self.0.clone()
        }
    }

    // 记录同时在跑的检查数量峰值
    #[derive(Debug, Default)]
    struct CountingChecker {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[tonic::async_trait]
    impl HealthChecker for CountingChecker {
        async fn check(&self, _host: &str, _port: u16) -> ServiceStatus {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            ServiceStatus::Up
        }
    }

    // 每次检查都比巡检周期慢
    #[derive(Debug)]
    struct SlowChecker(Duration);

    #[tonic::async_trait]
    impl HealthChecker for SlowChecker {
        async fn check(&self, _host: &str, _port: u16) -> ServiceStatus {
            tokio::time::sleep(self.0).await;
            ServiceStatus::Up
        }
    }

    // 直到放行前一直挂起的检查
    #[derive(Debug)]
    struct GatedChecker {
        gate: Arc<Semaphore>,
        result: ServiceStatus,
    }

    #[tonic::async_trait]
    impl HealthChecker for GatedChecker {
        async fn check(&self, _host: &str, _port: u16) -> ServiceStatus {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            self.result.clone()
        }
    }

    fn registration(name: &str, kind: ServiceKind) -> Registration {
        Registration {
            name: name.to_string(),
            host: "127.0.0.1".to_string(),
            port: 1,
            kind,
        }
    }

    fn monitor_with(
        registry: SharedRegistry,
        rest: Arc<dyn HealthChecker>,
        rpc: Arc<dyn HealthChecker>,
        max_concurrent_checks: usize,
    ) -> HealthMonitor {
        HealthMonitor::with_checkers(
            registry,
            rest,
            rpc,
            Duration::from_millis(50),
            max_concurrent_checks,
        )
    }

    #[tokio::test]
    async fn test_sweep_dispatches_by_kind() {
        let registry = Arc::new(RegistryStore::new());
        registry.upsert(registration("web", ServiceKind::Rest)).await;
        registry.upsert(registration("grpc", ServiceKind::Rpc)).await;

        let monitor = monitor_with(
            registry.clone(),
            Arc::new(FixedChecker(ServiceStatus::Up)),
            Arc::new(FixedChecker(ServiceStatus::Reported("Degraded".into()))),
            8,
        );

        assert_eq!(monitor.sweep().await, 2);
        monitor.wait_idle().await;

        assert_eq!(registry.get("web").await.unwrap().status, ServiceStatus::Up);
        assert_eq!(
            registry.get("grpc").await.unwrap().status,
            ServiceStatus::Reported("Degraded".into())
        );
    }

    #[tokio::test]
    async fn test_all_records_leave_unknown_after_one_sweep() {
        let registry = Arc::new(RegistryStore::new());
        let mut handles = Vec::new();
        for i in 0..20 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let kind = if i % 2 == 0 { ServiceKind::Rest } else { ServiceKind::Rpc };
                registry.upsert(registration(&format!("svc-{i}"), kind)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let monitor = monitor_with(
            registry.clone(),
            Arc::new(FixedChecker(ServiceStatus::Up)),
            Arc::new(FixedChecker(ServiceStatus::Down)),
            4,
        );
        monitor.sweep().await;
        monitor.wait_idle().await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 20);
        assert!(snapshot.iter().all(|record| !record.status.is_unknown()));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let registry = Arc::new(RegistryStore::new());
        for i in 0..10 {
            registry
                .upsert(registration(&format!("svc-{i}"), ServiceKind::Rest))
                .await;
        }

        let checker = Arc::new(CountingChecker::default());
        let monitor = monitor_with(registry.clone(), checker.clone(), checker.clone(), 3);

        monitor.sweep().await;
        monitor.wait_idle().await;

        let peak = checker.peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak concurrency was {peak}");
    }

    #[tokio::test]
    async fn test_overlapping_sweeps_do_not_pile_up_checks() {
        let registry = Arc::new(RegistryStore::new());
        for i in 0..20 {
            registry
                .upsert(registration(&format!("svc-{i}"), ServiceKind::Rest))
                .await;
        }

        let checker = Arc::new(SlowChecker(Duration::from_millis(200)));
        let monitor = monitor_with(registry.clone(), checker.clone(), checker, 2);

        assert_eq!(monitor.sweep().await, 20);
        // 上一轮的检查全部还在排队或执行，这一轮不应再派发
        assert_eq!(monitor.sweep().await, 0);

        for round in 0..10 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            monitor.sweep().await;
            let pending = monitor.pending_checks();
            assert!(pending <= 20, "pending checks grew to {pending} after round {round}");
        }

        monitor.wait_idle().await;
        assert_eq!(monitor.pending_checks(), 0);
        let snapshot = registry.snapshot().await;
        assert!(snapshot.iter().all(|record| record.status == ServiceStatus::Up));

        // 全部结束后可以重新派发
        assert_eq!(monitor.sweep().await, 20);
        monitor.wait_idle().await;
    }

    #[tokio::test]
    async fn test_stale_check_does_not_overwrite_reregistered_record() {
        let registry = Arc::new(RegistryStore::new());
        registry.upsert(registration("api", ServiceKind::Rest)).await;

        let gate = Arc::new(Semaphore::new(0));
        let monitor = monitor_with(
            registry.clone(),
            Arc::new(GatedChecker {
                gate: gate.clone(),
                result: ServiceStatus::Down,
            }),
            Arc::new(FixedChecker(ServiceStatus::Up)),
            8,
        );

        monitor.sweep().await;
        // 检查进行中时重新注册为 RPC 服务
        let mut replacement = registration("api", ServiceKind::Rpc);
        replacement.port = 2;
        registry.upsert(replacement).await;

        gate.add_permits(1);
        monitor.wait_idle().await;

        let record = registry.get("api").await.unwrap();
        assert_eq!(record.port, 2);
        assert_eq!(record.kind, ServiceKind::Rpc);
        assert_eq!(record.status, ServiceStatus::Unknown);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let registry = Arc::new(RegistryStore::new());
        registry.upsert(registration("loop", ServiceKind::Rest)).await;

        let monitor = monitor_with(
            registry.clone(),
            Arc::new(FixedChecker(ServiceStatus::Up)),
            Arc::new(FixedChecker(ServiceStatus::Up)),
            8,
        );
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(120)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(registry.get("loop").await.unwrap().status, ServiceStatus::Up);
    }
}
