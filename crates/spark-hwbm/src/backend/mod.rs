//! 内置分配后端。
//!
//! - [`FragmentAllocator`]：从共享块中切分小缓冲，服务不超过分片阈值的池；
//! - [`HeapAllocator`]：每个缓冲一次独立的堆分配，服务超过阈值的池。
//!
//! 两者都通过可失败的分配接口（`Vec::try_reserve_exact`）报告耗尽，而不是终止进程；
//! 可选的字节预算用于模拟或限制后端内存上限。

mod fragment;
mod heap;

pub use fragment::{DEFAULT_CHUNK_SIZE, FragmentAllocator};
pub use heap::HeapAllocator;

use bytes::{Bytes, BytesMut};

use crate::{
    error::AllocError,
    sync::{AtomicU64, AtomicUsize, Ordering},
};

/// 后端统计快照。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BackendStats {
    /// 成功分配的累计次数。
    pub allocations: u64,
    /// 经 `release` 归还的累计次数。
    pub releases: u64,
    /// 分配失败的累计次数（预算耗尽或系统分配失败）。
    pub failures: u64,
    /// 当前在途缓冲数量。
    pub outstanding: usize,
    /// 当前在途字节数。
    pub outstanding_bytes: usize,
}

/// 后端共享的原子计数与字节预算。
///
/// 预算检查先于真实分配执行：`try_charge` 成功后若系统分配失败，必须调用 `refund` 撤销。
#[derive(Debug)]
pub(crate) struct BackendMetrics {
    byte_limit: Option<usize>,
    outstanding_bytes: AtomicUsize,
    outstanding: AtomicUsize,
    allocations: AtomicU64,
    releases: AtomicU64,
    failures: AtomicU64,
}

impl BackendMetrics {
    pub(crate) fn new(byte_limit: Option<usize>) -> Self {
        Self {
            byte_limit,
            outstanding_bytes: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
            allocations: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn byte_limit(&self) -> Option<usize> {
        self.byte_limit
    }

    /// 按预算预占 `size` 字节；超出预算时记一次失败并返回 `false`。
    pub(crate) fn try_charge(&self, size: usize) -> bool {
        let limit = self.byte_limit.unwrap_or(usize::MAX);
        let charged = self
            .outstanding_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(size).filter(|next| *next <= limit)
            })
            .is_ok();
        if !charged {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        charged
    }

    /// 撤销一次预占，并记为失败。
    pub(crate) fn refund(&self, size: usize) {
        saturating_sub(&self.outstanding_bytes, size);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_allocation(&self) {
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self, size: usize) {
        saturating_sub(&self.outstanding_bytes, size);
        saturating_sub(&self.outstanding, 1);
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> BackendStats {
        BackendStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            outstanding: self.outstanding.load(Ordering::Relaxed),
            outstanding_bytes: self.outstanding_bytes.load(Ordering::Relaxed),
        }
    }
}

fn saturating_sub(target: &AtomicUsize, value: usize) {
    let _ = target.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
        Some(current.saturating_sub(value))
    });
}

/// 可失败地分配 `len` 字节的零填充内存。
pub(crate) fn try_zeroed(len: usize) -> Result<BytesMut, AllocError> {
    let mut block = Vec::new();
    block
        .try_reserve_exact(len)
        .map_err(|_| AllocError::new(len))?;
    // 容量已预留，resize 不会再次分配。
    block.resize(len, 0);
    // 唯一持有的 `Bytes` 转回 `BytesMut` 时沿用同一块内存，不发生拷贝。
    Ok(BytesMut::from(Bytes::from(block)))
}
