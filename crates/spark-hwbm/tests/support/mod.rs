//! 集成测试共享的后端替身与描述符环模拟。

#![allow(dead_code)]

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use bytes::BytesMut;
use spark_hwbm::{AllocError, AllocHint, BufferBackend, HwbmBuffer};

/// 后端替身观测到的事件。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Event {
    Allocated { id: u32, size: usize },
    Released { id: u32, size: usize },
}

/// 记录每次分配与释放的后端替身。
///
/// - 每个缓冲前 4 字节写入递增编号，释放时读回，用于确认“释放的正是分配出的那一个”；
/// - `fail_from` 指定从第几次（1 起）分配调用开始失败，模拟后端耗尽。
pub struct RecordingBackend {
    label: &'static str,
    calls: AtomicUsize,
    fail_from: Option<usize>,
    events: Mutex<Vec<Event>>,
}

impl RecordingBackend {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            calls: AtomicUsize::new(0),
            fail_from: None,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_from(label: &'static str, call: usize) -> Self {
        Self {
            fail_from: Some(call),
            ..Self::new(label)
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("事件锁中毒").clone()
    }

    pub fn allocations(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Allocated { .. }))
            .count()
    }

    pub fn releases(&self) -> Vec<u32> {
        self.events()
            .iter()
            .filter_map(|event| match event {
                Event::Released { id, .. } => Some(*id),
                Event::Allocated { .. } => None,
            })
            .collect()
    }

    /// 累计的 `allocate` 调用次数（含失败）。
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BufferBackend for RecordingBackend {
    fn allocate(&self, size: usize, _hint: AllocHint) -> Result<HwbmBuffer, AllocError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_from.is_some_and(|from| call >= from) {
            return Err(AllocError::new(size));
        }
        let id = call as u32;
        let mut data = BytesMut::zeroed(size);
        if size >= 4 {
            data[..4].copy_from_slice(&id.to_le_bytes());
        }
        self.events
            .lock()
            .expect("事件锁中毒")
            .push(Event::Allocated { id, size });
        Ok(HwbmBuffer::from_bytes(data))
    }

    fn release(&self, buffer: HwbmBuffer, size: usize) {
        let id = buffer_id(&buffer);
        self.events
            .lock()
            .expect("事件锁中毒")
            .push(Event::Released { id, size });
    }
}

/// 读回替身写入的缓冲编号。
pub fn buffer_id(buffer: &HwbmBuffer) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buffer[..4]);
    u32::from_le_bytes(raw)
}

/// 模拟驱动接收环：钩子把缓冲压入 `slots`。
#[derive(Default)]
pub struct RxRing {
    pub slots: Mutex<Vec<HwbmBuffer>>,
}

impl RxRing {
    pub fn install(&self, buffer: HwbmBuffer) {
        self.slots.lock().expect("接收环锁中毒").push(buffer);
    }

    pub fn len(&self) -> usize {
        self.slots.lock().expect("接收环锁中毒").len()
    }

    pub fn take_all(&self) -> Vec<HwbmBuffer> {
        std::mem::take(&mut *self.slots.lock().expect("接收环锁中毒"))
    }
}
