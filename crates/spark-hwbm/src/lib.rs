//! `spark-hwbm` 提供面向硬件卸载接收路径的定长缓冲池（HWBM，hardware buffer manager）。
//!
//! # 模块定位（Why）
//! - 网卡驱动把一批等尺寸缓冲交给硬件/固件驱动的接收路径；本 crate 负责在并发调用下
//!   维护“存活缓冲数量”，并在分配或初始化失败时保持池状态不被破坏。
//! - DMA 映射、描述符环操作、缓冲地址记录均由调用方的初始化钩子负责，不在本 crate 范围内。
//!
//! # 设计概要（How）
//! - [`HwbmPool`] 持有不可变的 [`PoolConfig`]、构建期解析的分配策略、可选初始化钩子、
//!   受自旋锁保护的存活计数以及调用方上下文 `C`；
//! - [`AllocStrategy`] 按缓冲尺寸在 [`FragmentAllocator`]（小缓冲）与 [`HeapAllocator`]（大缓冲）间选择，
//!   自定义后端通过 [`BufferBackend`] trait 注入；
//! - `add` 在锁内完成容量校验与批量补充，所有退出路径都由守卫析构释放锁；
//! - 诊断信息经由 `tracing` 输出，库本身不安装任何 Subscriber。
//!
//! # 使用示例
//!
//! ```
//! use std::sync::Mutex;
//!
//! use spark_hwbm::{AllocHint, HwbmBuffer, HwbmPool, InitRejected, PoolConfig};
//!
//! #[derive(Default)]
//! struct RxRing {
//!     slots: Mutex<Vec<HwbmBuffer>>,
//! }
//!
//! let pool = HwbmPool::with_context(PoolConfig::new(64, 1536), RxRing::default())
//!     .init(|ring: &RxRing, buffer: HwbmBuffer| -> Result<(), InitRejected> {
//!         ring.slots.lock().unwrap().push(buffer);
//!         Ok(())
//!     })
//!     .build()?;
//!
//! assert_eq!(pool.add(16, AllocHint::Atomic), 16);
//! assert_eq!(pool.live_count(), 16);
//! # Ok::<(), spark_hwbm::ConfigError>(())
//! ```

mod backend;
mod buffer;
mod config;
mod error;
mod hook;
mod pool;
mod stats;
mod strategy;
mod sync;

pub use backend::{BackendStats, DEFAULT_CHUNK_SIZE, FragmentAllocator, HeapAllocator};
pub use buffer::HwbmBuffer;
pub use config::{PAGE_SIZE, PoolConfig};
pub use error::{AddRejected, AllocError, ConfigError, HwbmError};
pub use hook::{BufferInit, InitRejected};
pub use pool::{HwbmPool, HwbmPoolBuilder, PoolGuard};
pub use stats::PoolStats;
pub use strategy::{AllocHint, AllocStrategy, BufferBackend};
