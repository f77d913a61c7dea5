use std::{fmt, sync::Arc};

use tracing::{debug, warn};

use crate::{
    backend::{FragmentAllocator, HeapAllocator},
    buffer::HwbmBuffer,
    config::PoolConfig,
    error::{AddRejected, ConfigError, HwbmError},
    hook::BufferInit,
    stats::{PoolMetrics, PoolStats},
    strategy::{AllocHint, AllocStrategy, BufferBackend, ResolvedStrategy},
    sync::{self, Mutex, MutexGuard},
};

/// `HwbmPool` 管理固定容量、等尺寸缓冲的存活计数，服务于硬件卸载的接收路径。
///
/// # 模块角色（Why）
/// - 驱动配置一次容量、缓冲尺寸与初始化钩子，之后在池生命周期内反复调用 `add`/`refill`/`free`；
/// - 池只记录“认为存活的缓冲数量”，不记录缓冲身份，缓冲本身由钩子挂入驱动的硬件结构。
///
/// # 核心机制（How）
/// - 存活计数由 `spin::Mutex<u32>` 保护，仅 [`add`](Self::add) 与 [`lock`](Self::lock) 获取该锁；
///   所有出口都依赖守卫析构释放锁；
/// - 分配策略在构建期按阈值解析一次并保存，分配与释放共用同一后端；
/// - `PoolMetrics` 以宽松原子计数记录补充、失败、拒绝等事件，支撑 [`stats`](Self::stats) 快照。
///
/// # 契约说明（What）
/// - **不变式**：任意可观测时刻 `0 <= live_count <= capacity`；
/// - **不对称**：`free` 不会递减存活计数，调用方需通过 [`PoolGuard::record_released`] 自行登记；
/// - **无锁操作**：`refill` 与 `free` 本身不加锁，也不修改计数；需要与 `add` 互斥的调用方应在
///   [`PoolGuard`] 内调用 [`PoolGuard::refill`]。
pub struct HwbmPool<C = ()> {
    config: PoolConfig,
    strategy: ResolvedStrategy,
    init: Option<Box<dyn BufferInit<C>>>,
    live: Mutex<u32>,
    metrics: PoolMetrics,
    context: C,
}

impl HwbmPool<()> {
    /// 以空上下文开始构建池。
    pub fn builder(config: PoolConfig) -> HwbmPoolBuilder<()> {
        HwbmPoolBuilder::new(config, ())
    }
}

impl<C> HwbmPool<C> {
    /// 以调用方上下文开始构建池；上下文会以 `&C` 形式传给初始化钩子。
    pub fn with_context(config: PoolConfig, context: C) -> HwbmPoolBuilder<C> {
        HwbmPoolBuilder::new(config, context)
    }

    /// 构建时的池配置。
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// 存活计数的上限。
    pub fn capacity(&self) -> u32 {
        self.config.capacity()
    }

    /// 每个缓冲的字节数。
    pub fn buffer_size(&self) -> usize {
        self.config.buffer_size()
    }

    /// 构建期解析出的分配策略。
    pub fn strategy(&self) -> AllocStrategy {
        self.strategy.kind()
    }

    /// 传给初始化钩子的调用方上下文。
    pub fn context(&self) -> &C {
        &self.context
    }

    /// 读取当前存活计数（短暂持锁）。
    pub fn live_count(&self) -> u32 {
        *sync::lock(&self.live)
    }

    /// 获取池锁，返回作用域守卫。
    ///
    /// 守卫存续期间其它线程的 `add`/`lock` 将自旋等待；守卫析构即释放锁。
    pub fn lock(&self) -> PoolGuard<'_, C> {
        PoolGuard {
            pool: self,
            live: sync::lock(&self.live),
        }
    }

    /// 分配并初始化恰好一个缓冲。
    ///
    /// # 契约说明（What）
    /// - 分配失败：返回 [`HwbmError::OutOfMemory`]，无副作用；
    /// - 钩子拒绝：缓冲经由匹配后端释放，同样返回 [`HwbmError::OutOfMemory`]；
    /// - 未配置钩子：没有任何一方能接管缓冲，缓冲立即归还后端，本次调用仅证明后端可以满足分配；
    /// - 成功时**不**修改存活计数，计数由调用方（通常是 [`add`](Self::add)）负责。
    ///
    /// 该方法不加锁；与 `add` 并发调用时，存活计数不会反映这次补充。
    pub fn refill(&self, hint: AllocHint) -> Result<(), HwbmError> {
        let size = self.buffer_size();
        let buffer = match self.strategy.allocate(size, hint) {
            Ok(buffer) => buffer,
            Err(err) => {
                self.metrics.record_allocation_failure();
                debug!(
                    size,
                    strategy = %self.strategy.kind(),
                    error = %err,
                    "hwbm pool: buffer allocation failed"
                );
                return Err(HwbmError::OutOfMemory { size });
            }
        };

        match &self.init {
            Some(init) => {
                if let Err(rejected) = init.initialize(&self.context, buffer) {
                    debug!(
                        size,
                        reason = rejected.reason(),
                        "hwbm pool: init hook rejected buffer"
                    );
                    self.strategy.release(rejected.into_buffer(), size);
                    self.metrics.record_init_rejection();
                    return Err(HwbmError::OutOfMemory { size });
                }
            }
            None => self.strategy.release(buffer, size),
        }

        self.metrics.record_refill();
        Ok(())
    }

    /// 请求向池中补充 `count` 个缓冲，返回实际补充的数量。
    ///
    /// # 契约说明（What）
    /// - 池已满：返回当前存活计数；
    /// - 超出容量或计数溢出：返回 0；
    /// - 否则最多调用 `count` 次 `refill`，遇到首个失败即停止，已补充的缓冲保留，
    ///   存活计数按成功次数增加。
    ///
    /// 需要区分拒绝原因时使用 [`try_add`](Self::try_add)。
    pub fn add(&self, count: u32, hint: AllocHint) -> u32 {
        match self.try_add(count, hint) {
            Ok(added) => added,
            Err(rejected) => rejected.reported_count(),
        }
    }

    /// 与 [`add`](Self::add) 相同的算法，但以 [`AddRejected`] 报告被拒绝的原因。
    pub fn try_add(&self, count: u32, hint: AllocHint) -> Result<u32, AddRejected> {
        let mut guard = self.lock();
        guard.check_headroom(count)?;

        let mut added = 0;
        while added < count {
            if guard.refill(hint).is_err() {
                break;
            }
            added += 1;
        }
        // 头部空间已校验，`added <= count`，不会越过容量。
        *guard.live += added;
        drop(guard);

        debug!(added, requested = count, "hwbm pool: buffers added");
        Ok(added)
    }

    /// 经由构建期解析的后端释放一个缓冲。
    ///
    /// 后端按缓冲的实际长度记账，尺寸与池配置不符的缓冲同样被接受。
    /// 不修改存活计数；需要计数同步的调用方在 [`PoolGuard`] 中调用
    /// [`record_released`](PoolGuard::record_released)。
    pub fn free(&self, buffer: HwbmBuffer) {
        self.strategy.release(buffer, self.buffer_size());
        self.metrics.record_free();
    }

    /// 汇总计数器与当前存活计数的快照。
    pub fn stats(&self) -> PoolStats {
        let live = self.live_count();
        self.metrics
            .snapshot(self.capacity(), self.buffer_size(), self.strategy(), live)
    }
}

impl<C: fmt::Debug> fmt::Debug for HwbmPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HwbmPool")
            .field("config", &self.config)
            .field("strategy", &self.strategy)
            .field("has_init", &self.init.is_some())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// 池锁的作用域守卫。
///
/// # 契约说明（What）
/// - 守卫存续期间独占存活计数，析构时释放锁（包括提前返回与 panic 展开路径）；
/// - [`refill`](Self::refill) 与池上的同名方法语义一致，成功后由调用方通过
///   [`record_added`](Self::record_added) 登记；
/// - [`record_released`](Self::record_released) 是 `free` 之后唯一受支持的计数递减入口。
pub struct PoolGuard<'a, C> {
    pool: &'a HwbmPool<C>,
    live: MutexGuard<'a, u32>,
}

impl<C> PoolGuard<'_, C> {
    /// 锁内看到的存活计数。
    pub fn live_count(&self) -> u32 {
        *self.live
    }

    /// 距离容量上限的剩余数量。
    pub fn headroom(&self) -> u32 {
        self.pool.capacity().saturating_sub(*self.live)
    }

    /// 在锁内补充一个缓冲；不修改计数。
    pub fn refill(&self, hint: AllocHint) -> Result<(), HwbmError> {
        self.pool.refill(hint)
    }

    /// 登记 `count` 个已在锁外（或经 [`refill`](Self::refill)）补充的缓冲，返回新的存活计数。
    ///
    /// 校验顺序与 [`HwbmPool::add`] 相同；被拒绝时计数不变。
    pub fn record_added(&mut self, count: u32) -> Result<u32, AddRejected> {
        self.check_headroom(count)?;
        *self.live += count;
        Ok(*self.live)
    }

    /// 登记 `count` 个已释放的缓冲，返回新的存活计数。
    pub fn record_released(&mut self, count: u32) -> Result<u32, HwbmError> {
        let live = *self.live;
        let remaining = live
            .checked_sub(count)
            .ok_or(HwbmError::LiveCountUnderflow {
                requested: count,
                live,
            })?;
        *self.live = remaining;
        Ok(remaining)
    }

    /// 依次执行“池已满”“超出容量”“计数溢出”三项检查，并输出告警。
    fn check_headroom(&self, count: u32) -> Result<(), AddRejected> {
        let live = *self.live;
        let capacity = self.pool.capacity();

        let rejected = if live == capacity {
            warn!(live, capacity, "hwbm pool: pool already filled");
            Some(AddRejected::PoolFull { live })
        } else if count.wrapping_add(live) > capacity {
            // 与原生无符号计数器一致：先按回绕后的和比较容量，再单独检查溢出。
            warn!(
                requested = count,
                live,
                capacity,
                "hwbm pool: cannot allocate buffers for pool"
            );
            Some(AddRejected::CapacityExceeded {
                requested: count,
                live,
                capacity,
            })
        } else if count.checked_add(live).is_none() {
            warn!(requested = count, live, "hwbm pool: adding buffers will overflow");
            Some(AddRejected::CounterOverflow {
                requested: count,
                live,
            })
        } else {
            None
        };

        match rejected {
            Some(rejected) => {
                self.pool.metrics.record_rejection(&rejected);
                Err(rejected)
            }
            None => Ok(()),
        }
    }
}

/// `HwbmPool` 的构建器。
///
/// 未显式指定时，分片策略使用 [`FragmentAllocator`]，通用策略使用 [`HeapAllocator`]；
/// 只有与解析结果匹配的那个后端会被保留。
pub struct HwbmPoolBuilder<C> {
    config: PoolConfig,
    context: C,
    init: Option<Box<dyn BufferInit<C>>>,
    fragment: Option<Arc<dyn BufferBackend>>,
    generic: Option<Arc<dyn BufferBackend>>,
}

impl<C> HwbmPoolBuilder<C> {
    fn new(config: PoolConfig, context: C) -> Self {
        Self {
            config,
            context,
            init: None,
            fragment: None,
            generic: None,
        }
    }

    /// 设置初始化钩子。
    #[must_use]
    pub fn init(mut self, init: impl BufferInit<C> + 'static) -> Self {
        self.init = Some(Box::new(init));
        self
    }

    /// 覆盖分片策略使用的后端。
    #[must_use]
    pub fn fragment_backend(mut self, backend: Arc<dyn BufferBackend>) -> Self {
        self.fragment = Some(backend);
        self
    }

    /// 覆盖通用策略使用的后端。
    #[must_use]
    pub fn generic_backend(mut self, backend: Arc<dyn BufferBackend>) -> Self {
        self.generic = Some(backend);
        self
    }

    /// 校验配置、解析分配策略并生成池。
    pub fn build(self) -> Result<HwbmPool<C>, ConfigError> {
        self.config.validate()?;

        let kind =
            AllocStrategy::select(self.config.buffer_size(), self.config.fragment_threshold());
        let backend: Arc<dyn BufferBackend> = match kind {
            AllocStrategy::Fragment => self
                .fragment
                .unwrap_or_else(|| Arc::new(FragmentAllocator::new())),
            AllocStrategy::Generic => self
                .generic
                .unwrap_or_else(|| Arc::new(HeapAllocator::new())),
        };
        debug!(
            capacity = self.config.capacity(),
            buffer_size = self.config.buffer_size(),
            strategy = %kind,
            "hwbm pool: configured"
        );

        Ok(HwbmPool {
            config: self.config,
            strategy: ResolvedStrategy::new(kind, backend),
            init: self.init,
            live: Mutex::new(0),
            metrics: PoolMetrics::new(),
            context: self.context,
        })
    }
}
