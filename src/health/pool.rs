//! 并发探测工作池
//!
//! 每个目标一个探测任务，通过信号量限制并发度，等待全部任务完成后返回

use crate::health::{ProbeConfig, ProbeJob, ProbeResult, Prober, Target};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// 固定并发度的探测工作池
pub struct WorkerPool {
    /// 探测器
    prober: Arc<dyn Prober>,
    /// 并发控制信号量
    semaphore: Arc<Semaphore>,
    /// 并发度
    concurrency: usize,
}

impl WorkerPool {
    /// 创建工作池，并发度至少为1
    pub fn new(prober: Arc<dyn Prober>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            prober,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// 执行一轮探测
    ///
    /// 所有目标都返回结果后才结束；结果顺序与 `targets` 一致，
    /// 每个结果都以 `observed_at` 作为观测时间。任务异常退出时按不可达处理。
    pub async fn run_round(
        &self,
        targets: &[Target],
        config: ProbeConfig,
        observed_at: DateTime<Utc>,
    ) -> Vec<ProbeResult> {
        let handles: Vec<(Target, JoinHandle<bool>)> = targets
            .iter()
            .map(|target| {
                let job = ProbeJob {
                    target: target.clone(),
                    retry_budget: config.retries,
                };
                (target.clone(), self.spawn_job(job, config))
            })
            .collect();

        let outcomes = futures::future::join_all(
            handles
                .into_iter()
                .map(|(target, handle)| async move { (target, handle.await) }),
        )
        .await;

        outcomes
            .into_iter()
            .map(|(target, outcome)| {
                let reachable = match outcome {
                    Ok(reachable) => reachable,
                    Err(e) => {
                        error!("探测任务异常 {}: {}", target.id, e);
                        false
                    }
                };
                ProbeResult::new(target, reachable, observed_at)
            })
            .collect()
    }

    fn spawn_job(&self, job: ProbeJob, config: ProbeConfig) -> JoinHandle<bool> {
        let prober = Arc::clone(&self.prober);
        let semaphore = Arc::clone(&self.semaphore);

        tokio::spawn(async move {
            // 获取信号量许可
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    warn!("获取并发许可失败，直接探测: {}", job.target.id);
                    None
                }
            };

            debug!("开始探测: {} ({})", job.target.id, job.target.socket_addr());

            prober
                .probe(
                    &job.target.address,
                    job.target.port,
                    config.timeout,
                    job.retry_budget,
                )
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 记录最大并发数；地址以 "down" 开头的目标不可达，"panic" 直接崩溃
    #[derive(Default)]
    struct RecordingProber {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl Prober for RecordingProber {
        async fn attempt(&self, address: &str, port: u16, _: Duration) -> Result<(), ProbeError> {
            if address == "panic" {
                panic!("simulated worker crash");
            }

            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if address.starts_with("down") {
                Err(ProbeError::Timeout {
                    addr: format!("{}:{}", address, port),
                })
            } else {
                Ok(())
            }
        }
    }

    fn targets(addresses: &[&str]) -> Vec<Target> {
        addresses
            .iter()
            .enumerate()
            .map(|(i, address)| Target::new(format!("site-{i}"), *address, 9111))
            .collect()
    }

    #[tokio::test]
    async fn test_round_respects_concurrency_limit() {
        let prober = Arc::new(RecordingProber::default());
        let pool = WorkerPool::new(prober.clone(), 3);
        let targets = targets(&["a", "b", "c", "d", "e", "f", "g", "h"]);

        let config = ProbeConfig {
            timeout: Duration::from_secs(1),
            retries: 1,
        };
        let results = pool.run_round(&targets, config, Utc::now()).await;

        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|r| r.reachable));
        let max = prober.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "max in flight was {max}");
    }

    #[tokio::test]
    async fn test_round_preserves_order_and_timestamp() {
        let pool = WorkerPool::new(Arc::new(RecordingProber::default()), 2);
        let targets = targets(&["up-1", "down-1", "up-2"]);
        let observed_at = Utc::now();

        let config = ProbeConfig {
            timeout: Duration::from_secs(1),
            retries: 2,
        };
        let results = pool.run_round(&targets, config, observed_at).await;

        let reachable: Vec<bool> = results.iter().map(|r| r.reachable).collect();
        assert_eq!(reachable, vec![true, false, true]);
        assert_eq!(results[1].target, targets[1]);
        assert!(results.iter().all(|r| r.observed_at == observed_at));
    }

    #[tokio::test]
    async fn test_crashed_job_counts_as_unreachable() {
        let pool = WorkerPool::new(Arc::new(RecordingProber::default()), 3);
        let targets = targets(&["up", "panic", "up-again"]);

        let results = pool
            .run_round(&targets, ProbeConfig::default(), Utc::now())
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].reachable);
        assert!(!results[1].reachable);
        assert!(results[2].reachable);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let pool = WorkerPool::new(Arc::new(RecordingProber::default()), 0);
        assert_eq!(pool.concurrency(), 1);
    }
}
