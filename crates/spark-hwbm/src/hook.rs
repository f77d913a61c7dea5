use std::borrow::Cow;

use crate::buffer::HwbmBuffer;

/// `BufferInit` 描述驱动为每个新分配缓冲提供的初始化钩子。
///
/// # 设计初衷（Why）
/// - 池不记录缓冲地址；缓冲一经分配即交给钩子，由驱动把它挂到自己的描述符环等结构上。
/// - 调用方上下文以泛型 `C` 表达，钩子直接拿到 `&C`，无需任何类型擦除或强制转换。
///
/// # 契约定义（What）
/// - 成功时钩子取得缓冲所有权，之后由驱动在适当时机调用 [`HwbmPool::free`](crate::HwbmPool::free)；
/// - 失败时必须通过 [`InitRejected`] 原样交还缓冲，池会经由匹配的后端释放它，
///   并向调用方报告内存不足；
/// - **前置条件**：钩子在池锁内执行，不得回调同一个池的 `add`/`lock`，否则自旋锁将永久等待。
pub trait BufferInit<C>: Send + Sync {
    fn initialize(&self, context: &C, buffer: HwbmBuffer) -> Result<(), InitRejected>;
}

impl<C, F> BufferInit<C> for F
where
    F: Fn(&C, HwbmBuffer) -> Result<(), InitRejected> + Send + Sync,
{
    fn initialize(&self, context: &C, buffer: HwbmBuffer) -> Result<(), InitRejected> {
        self(context, buffer)
    }
}

/// 初始化钩子拒绝缓冲时的返还载体。
#[derive(Debug)]
pub struct InitRejected {
    buffer: HwbmBuffer,
    reason: Cow<'static, str>,
}

impl InitRejected {
    /// 退回缓冲并附上拒绝原因。
    pub fn new(buffer: HwbmBuffer, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            buffer,
            reason: reason.into(),
        }
    }

    /// 诊断用的拒绝原因。
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// 取回被拒绝的缓冲。
    pub fn into_buffer(self) -> HwbmBuffer {
        self.buffer
    }
}
