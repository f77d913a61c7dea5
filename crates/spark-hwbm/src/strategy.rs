//! 分配策略：按缓冲尺寸在分片分配器与通用堆分配器之间选择。
//!
//! # 核心约束（What）
//! - 选择在池构建时完成一次，结果与后端句柄一起保存在 `ResolvedStrategy` 中；
//! - 分配与释放都经由同一个已解析的后端，两条路径不可能使用不同的阈值判断。

use std::{fmt, sync::Arc};

use crate::{buffer::HwbmBuffer, error::AllocError};

/// 分配上下文提示，随每次分配透传给后端。
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum AllocHint {
    /// 调用方不能等待（例如中断或软中断上下文）。
    #[default]
    Atomic,
    /// 调用方允许在竞争时等待。
    MaySleep,
}

/// 已选定的分配后端类别。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AllocStrategy {
    /// 轻量分片分配器，服务不超过阈值的小缓冲。
    Fragment,
    /// 通用堆分配器，服务超过阈值的大缓冲。
    Generic,
}

impl AllocStrategy {
    /// 按阈值选择策略：`buffer_size <= threshold` 选分片分配器。
    pub fn select(buffer_size: usize, threshold: usize) -> Self {
        if buffer_size <= threshold {
            Self::Fragment
        } else {
            Self::Generic
        }
    }
}

impl fmt::Display for AllocStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fragment => f.write_str("fragment"),
            Self::Generic => f.write_str("generic"),
        }
    }
}

/// 分配后端契约。
///
/// # 契约定义（What）
/// - `allocate`：返回恰好 `size` 字节的缓冲，失败时返回 [`AllocError`] 且不得留下副作用；
/// - `release`：归还一个缓冲，不会失败；内置后端按 `buffer.len()` 记账；
/// - **前置条件**：实现必须线程安全，且两个方法都不得阻塞调用线程（`AllocHint::MaySleep`
///   仅表示允许在竞争时自旋等待）。
pub trait BufferBackend: Send + Sync + 'static {
    /// 分配一个 `size` 字节的缓冲。
    fn allocate(&self, size: usize, hint: AllocHint) -> Result<HwbmBuffer, AllocError>;

    /// 归还缓冲；`size` 为池配置的尺寸，可能与 `buffer.len()` 不同，实现不得因此 panic。
    fn release(&self, buffer: HwbmBuffer, size: usize);
}

/// 构建期解析完成的策略与对应后端。
#[derive(Clone)]
pub(crate) struct ResolvedStrategy {
    kind: AllocStrategy,
    backend: Arc<dyn BufferBackend>,
}

impl ResolvedStrategy {
    pub(crate) fn new(kind: AllocStrategy, backend: Arc<dyn BufferBackend>) -> Self {
        Self { kind, backend }
    }

    pub(crate) fn kind(&self) -> AllocStrategy {
        self.kind
    }

    pub(crate) fn allocate(&self, size: usize, hint: AllocHint) -> Result<HwbmBuffer, AllocError> {
        self.backend.allocate(size, hint)
    }

    pub(crate) fn release(&self, buffer: HwbmBuffer, size: usize) {
        self.backend.release(buffer, size);
    }
}

impl fmt::Debug for ResolvedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedStrategy")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
