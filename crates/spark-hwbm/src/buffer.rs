use core::{
    fmt,
    ops::{Deref, DerefMut},
};

use bytes::BytesMut;

/// 池分配出的定长缓冲。
///
/// # 设计初衷（Why）
/// - 缓冲在分配后立即交给初始化钩子，由驱动把它挂到自己的描述符结构上；池本身不保留缓冲身份，
///   只统计数量。
/// - 底层以 `BytesMut` 承载：分片分配器切出的缓冲与所在块共享引用计数，
///   最后一个分片释放时整块内存才归还。
///
/// # 契约定义（What）
/// - 内置后端分配出的缓冲，`len()` 等于池配置的缓冲尺寸；经 [`from_bytes`](Self::from_bytes)
///   自行构造的缓冲不受此约束，释放时后端按实际长度记账；
/// - 释放必须通过 [`HwbmPool::free`](crate::HwbmPool::free)，以便走与分配时一致的后端。
///   直接丢弃同样不会泄漏内存，但后端的在途统计将不再平衡。
/// - `Debug` 只输出长度，不输出缓冲内容。
pub struct HwbmBuffer {
    data: BytesMut,
}

impl HwbmBuffer {
    /// 包装一块已分配好的内存，供自定义后端使用。
    pub fn from_bytes(data: BytesMut) -> Self {
        Self { data }
    }

    /// 缓冲的字节数。
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为零长度缓冲。
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 取回底层 `BytesMut`。
    pub fn into_bytes(self) -> BytesMut {
        self.data
    }
}

impl fmt::Debug for HwbmBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HwbmBuffer")
            .field("len", &self.data.len())
            .finish()
    }
}

impl From<BytesMut> for HwbmBuffer {
    fn from(data: BytesMut) -> Self {
        Self::from_bytes(data)
    }
}

impl Deref for HwbmBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for HwbmBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
