use crate::{
    error::AddRejected,
    strategy::AllocStrategy,
    sync::{AtomicU64, Ordering},
};

/// 缓冲池统计快照。
///
/// # 契约说明（What）
/// - `live_count` 在读取瞬间持锁获得，其余计数为无锁的宽松原子读，整体仅作观测用途；
/// - `allocation_failures` 与 `init_rejections` 都会让 `refill` 报告内存不足，
///   此处分开统计以便区分“后端耗尽”与“驱动拒绝”。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PoolStats {
    /// 存活计数上限。
    pub capacity: u32,
    /// 每个缓冲的字节数。
    pub buffer_size: usize,
    /// 构建期解析出的分配策略。
    pub strategy: AllocStrategy,
    /// 快照时刻的存活计数。
    pub live_count: u32,
    /// 成功的补充次数（含未配置钩子时立即归还的补充）。
    pub refills: u64,
    /// 后端分配失败次数。
    pub allocation_failures: u64,
    /// 初始化钩子拒绝次数。
    pub init_rejections: u64,
    /// 经 `free` 释放的缓冲数。
    pub frees: u64,
    /// 因池已满被拒绝的 `add` 次数。
    pub rejected_full: u64,
    /// 因超出容量被拒绝的 `add` 次数。
    pub rejected_capacity: u64,
    /// 因计数溢出被拒绝的 `add` 次数。
    pub rejected_overflow: u64,
}

#[derive(Debug)]
pub(crate) struct PoolMetrics {
    refills: AtomicU64,
    allocation_failures: AtomicU64,
    init_rejections: AtomicU64,
    frees: AtomicU64,
    rejected_full: AtomicU64,
    rejected_capacity: AtomicU64,
    rejected_overflow: AtomicU64,
}

impl PoolMetrics {
    pub(crate) fn new() -> Self {
        Self {
            refills: AtomicU64::new(0),
            allocation_failures: AtomicU64::new(0),
            init_rejections: AtomicU64::new(0),
            frees: AtomicU64::new(0),
            rejected_full: AtomicU64::new(0),
            rejected_capacity: AtomicU64::new(0),
            rejected_overflow: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_refill(&self) {
        self.refills.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_allocation_failure(&self) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_init_rejection(&self) {
        self.init_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_free(&self) {
        self.frees.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejection(&self, rejected: &AddRejected) {
        let counter = match rejected {
            AddRejected::PoolFull { .. } => &self.rejected_full,
            AddRejected::CapacityExceeded { .. } => &self.rejected_capacity,
            AddRejected::CounterOverflow { .. } => &self.rejected_overflow,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        capacity: u32,
        buffer_size: usize,
        strategy: AllocStrategy,
        live_count: u32,
    ) -> PoolStats {
        PoolStats {
            capacity,
            buffer_size,
            strategy,
            live_count,
            refills: self.refills.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
            init_rejections: self.init_rejections.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            rejected_full: self.rejected_full.load(Ordering::Relaxed),
            rejected_capacity: self.rejected_capacity.load(Ordering::Relaxed),
            rejected_overflow: self.rejected_overflow.load(Ordering::Relaxed),
        }
    }
}
