//! 池几何参数：容量、缓冲尺寸与分片阈值。

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 默认分片阈值：一页。
pub const PAGE_SIZE: usize = 4096;

/// 缓冲池的不可变配置。
///
/// # 契约说明（What）
/// - `capacity`：池最多允许存活的缓冲数量，允许为 0（此时池恒为“已满”）；
/// - `buffer_size`：每个缓冲的字节数，必须非零；
/// - `fragment_threshold`：`buffer_size` 不超过该值时使用分片分配器，否则使用通用堆分配器。
///
/// 配置在 [`HwbmPoolBuilder::build`](crate::HwbmPoolBuilder::build) 时校验，之后在池生命周期内不可变。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfig {
    capacity: u32,
    buffer_size: usize,
    #[cfg_attr(feature = "serde", serde(default = "default_fragment_threshold"))]
    fragment_threshold: usize,
}

#[cfg(feature = "serde")]
fn default_fragment_threshold() -> usize {
    PAGE_SIZE
}

impl PoolConfig {
    /// 以默认分片阈值（一页）创建配置。
    pub fn new(capacity: u32, buffer_size: usize) -> Self {
        Self {
            capacity,
            buffer_size,
            fragment_threshold: PAGE_SIZE,
        }
    }

    /// 覆盖分片阈值。
    #[must_use]
    pub fn with_fragment_threshold(mut self, threshold: usize) -> Self {
        self.fragment_threshold = threshold;
        self
    }

    /// 存活计数上限。
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// 每个缓冲的字节数。
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// 不超过该尺寸的缓冲走分片分配器。
    pub fn fragment_threshold(&self) -> usize {
        self.fragment_threshold
    }

    /// 校验配置是否可用于构建池。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        if self.buffer_size > isize::MAX as usize {
            return Err(ConfigError::BufferSizeTooLarge {
                size: self.buffer_size,
            });
        }
        Ok(())
    }
}
