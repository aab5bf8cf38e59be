//! 可达性检测模块
//!
//! 提供TCP探测、连通性哨兵、并发工作池和监控引擎

pub mod pool;
pub mod prober;
pub mod result;
pub mod scheduler;
pub mod sentinel;

// 重新导出主要类型
pub use pool::WorkerPool;
pub use prober::{Prober, TcpProber};
pub use result::{HealthStatus, ProbeConfig, ProbeJob, ProbeResult, Target};
pub use scheduler::{Engine, EnginePhase, EngineSettings, RoundOutcome, RoundSummary};
pub use sentinel::Sentinel;
