use bytes::BytesMut;

use super::{BackendMetrics, BackendStats, try_zeroed};
use crate::{
    buffer::HwbmBuffer,
    error::AllocError,
    strategy::{AllocHint, BufferBackend},
    sync::{self, AtomicU64, Mutex, Ordering},
};

/// 分片分配器默认的块大小（32 KiB）。
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// `FragmentAllocator` 从共享块中切分小缓冲，面向接收路径上的页内分片。
///
/// # 核心机制（How）
/// - 内部缓存一块剩余的 `BytesMut`；每次分配通过 `split_to` 切出前缀，切出的分片与块共享引用计数；
/// - 剩余空间不足时整块替换为新块，旧块在其最后一个分片释放后才真正归还给系统；
/// - 单次请求大于块大小时直接分配一块恰好等长的专用块。
///
/// # 契约说明（What）
/// - [`AllocHint::Atomic`] 下若块缓存正被其他线程持有，不自旋等待，改为分配专用块；
///   [`AllocHint::MaySleep`] 下自旋获取缓存；
/// - 字节预算（若设置）按在途分片的字节数计算，而非块的驻留字节数。
#[derive(Debug)]
pub struct FragmentAllocator {
    chunk_size: usize,
    cache: Mutex<BytesMut>,
    chunks: AtomicU64,
    metrics: BackendMetrics,
}

impl Default for FragmentAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentAllocator {
    /// 使用默认块大小、不限字节预算。
    pub fn new() -> Self {
        Self::with_config(DEFAULT_CHUNK_SIZE, None)
    }

    /// 使用自定义块大小；0 会被提升为 1。
    #[must_use]
    pub fn with_chunk_size(self, chunk_size: usize) -> Self {
        Self::with_config(chunk_size.max(1), self.metrics.byte_limit())
    }

    /// 限制在途分片的总字节数。
    #[must_use]
    pub fn with_byte_limit(self, limit: usize) -> Self {
        Self::with_config(self.chunk_size, Some(limit))
    }

    fn with_config(chunk_size: usize, byte_limit: Option<usize>) -> Self {
        Self {
            chunk_size,
            cache: Mutex::new(BytesMut::new()),
            chunks: AtomicU64::new(0),
            metrics: BackendMetrics::new(byte_limit),
        }
    }

    /// 每块的字节数。
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 累计分配过的块数量（含专用块）。
    pub fn chunks_allocated(&self) -> u64 {
        self.chunks.load(Ordering::Relaxed)
    }

    /// 当前后端计数器的快照。
    pub fn stats(&self) -> BackendStats {
        self.metrics.snapshot()
    }

    fn carve(&self, size: usize, hint: AllocHint) -> Result<BytesMut, AllocError> {
        if size > self.chunk_size {
            return self.dedicated(size);
        }

        let cache = match hint {
            AllocHint::MaySleep => Some(sync::lock(&self.cache)),
            AllocHint::Atomic => sync::try_lock(&self.cache),
        };
        let Some(mut cache) = cache else {
            return self.dedicated(size);
        };

        if cache.len() < size {
            *cache = try_zeroed(self.chunk_size)?;
            self.chunks.fetch_add(1, Ordering::Relaxed);
        }
        Ok(cache.split_to(size))
    }

    fn dedicated(&self, size: usize) -> Result<BytesMut, AllocError> {
        let block = try_zeroed(size)?;
        self.chunks.fetch_add(1, Ordering::Relaxed);
        Ok(block)
    }
}

impl BufferBackend for FragmentAllocator {
    fn allocate(&self, size: usize, hint: AllocHint) -> Result<HwbmBuffer, AllocError> {
        if !self.metrics.try_charge(size) {
            return Err(AllocError::new(size));
        }
        match self.carve(size, hint) {
            Ok(fragment) => {
                self.metrics.record_allocation();
                Ok(HwbmBuffer::from_bytes(fragment))
            }
            Err(_) => {
                self.metrics.refund(size);
                Err(AllocError::new(size))
            }
        }
    }

    /// 按缓冲的实际长度记账；`size` 仅为池配置的期望值。
    fn release(&self, buffer: HwbmBuffer, _size: usize) {
        let len = buffer.len();
        // 丢弃分片即释放其对所在块的引用。
        drop(buffer);
        self.metrics.record_release(len);
    }
}
