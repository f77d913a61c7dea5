use super::{BackendMetrics, BackendStats, try_zeroed};
use crate::{
    buffer::HwbmBuffer,
    error::AllocError,
    strategy::{AllocHint, BufferBackend},
};

/// 通用堆分配器：每个缓冲一次独立、可失败的堆分配。
///
/// 分配提示对该后端没有影响，堆分配本身不会等待其他线程。
#[derive(Debug)]
pub struct HeapAllocator {
    metrics: BackendMetrics,
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapAllocator {
    /// 不限字节预算的堆分配器。
    pub fn new() -> Self {
        Self {
            metrics: BackendMetrics::new(None),
        }
    }

    /// 限制在途缓冲的总字节数。
    #[must_use]
    pub fn with_byte_limit(self, limit: usize) -> Self {
        Self {
            metrics: BackendMetrics::new(Some(limit)),
        }
    }

    /// 当前后端计数器的快照。
    pub fn stats(&self) -> BackendStats {
        self.metrics.snapshot()
    }
}

impl BufferBackend for HeapAllocator {
    fn allocate(&self, size: usize, _hint: AllocHint) -> Result<HwbmBuffer, AllocError> {
        if !self.metrics.try_charge(size) {
            return Err(AllocError::new(size));
        }
        match try_zeroed(size) {
            Ok(block) => {
                self.metrics.record_allocation();
                Ok(HwbmBuffer::from_bytes(block))
            }
            Err(err) => {
                self.metrics.refund(size);
                Err(err)
            }
        }
    }

    /// 按缓冲的实际长度记账；`size` 仅为池配置的期望值。
    fn release(&self, buffer: HwbmBuffer, _size: usize) {
        let len = buffer.len();
        drop(buffer);
        self.metrics.record_release(len);
    }
}
