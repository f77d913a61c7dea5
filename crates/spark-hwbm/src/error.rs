//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 汇总缓冲池对外暴露的全部失败语义：分配耗尽、批量补充被拒、配置非法、计数下溢；
//! - 所有失败都可恢复，调用方据此决定重试或降级，而不是终止接收路径。
//!
//! ## 设计要求（What）
//! - 错误类型统一派生 `thiserror::Error`，与 `std::error::Error` 生态兼容；
//! - 初始化钩子的拒绝原因不在此处保留独立错误码，而是折叠为 [`HwbmError::OutOfMemory`]，
//!   原因文本仅用于诊断日志。

use thiserror::Error;

/// 分配后端无法满足一次请求。
///
/// - **契约 (What)**：`size` 为本次请求的字节数；返回该错误时后端不得保留任何副作用。
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("allocation of {size} bytes failed")]
pub struct AllocError {
    size: usize,
}

impl AllocError {
    /// 构造指定尺寸的分配失败。
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    /// 失败请求的字节数。
    pub fn size(&self) -> usize {
        self.size
    }
}

/// 缓冲池单缓冲操作的错误域。
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum HwbmError {
    /// 分配后端耗尽，或初始化钩子拒绝了新分配的缓冲。
    ///
    /// 两种情况对调用方不可区分：钩子失败时缓冲已经通过匹配的后端归还。
    #[error("out of memory while refilling a {size}-byte buffer")]
    OutOfMemory { size: usize },

    /// 调用方试图登记的释放数量超过了当前存活计数。
    #[error("cannot release {requested} buffers, only {live} are live")]
    LiveCountUnderflow { requested: u32, live: u32 },
}

/// 批量补充在进入分配循环之前被拒绝的原因。
///
/// # 教案式说明
/// - **意图 (Why)**：数值契约（`add` 返回补充数量）无法说明“为什么是 0”，
///   该枚举为需要精确判断的调用方保留拒绝原因；
/// - **契约 (What)**：三个变体分别对应“池已满”“超出容量”“计数溢出”，检查顺序固定；
///   任何变体出现时存活计数都未被修改。
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum AddRejected {
    /// 存活计数已经等于容量。
    #[error("pool already filled with {live} buffers")]
    PoolFull { live: u32 },

    /// 本次请求会让存活计数超过容量。
    #[error("cannot add {requested} buffers to {live} live buffers, capacity is {capacity}")]
    CapacityExceeded {
        requested: u32,
        live: u32,
        capacity: u32,
    },

    /// 本次请求会让存活计数超出计数器的表示范围。
    #[error("adding {requested} buffers to the {live} current buffers will overflow")]
    CounterOverflow { requested: u32, live: u32 },
}

impl AddRejected {
    /// 将拒绝原因映射回数值契约：池已满时返回当前存活数，其余返回 0。
    pub fn reported_count(&self) -> u32 {
        match self {
            Self::PoolFull { live } => *live,
            Self::CapacityExceeded { .. } | Self::CounterOverflow { .. } => 0,
        }
    }
}

/// 池配置在构建阶段的校验错误。
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// 缓冲尺寸为 0，无法分配任何有效缓冲。
    #[error("buffer size must be non-zero")]
    ZeroBufferSize,

    /// 缓冲尺寸超出单次分配可表示的上限。
    #[error("buffer size {size} exceeds the maximum allocation size")]
    BufferSizeTooLarge { size: usize },
}
