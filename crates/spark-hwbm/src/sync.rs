//! 同步原语切换层。
//!
//! 常规构建使用 `spin::Mutex` 与 `core` 原子；在 `--cfg loom`（或 `spark_loom`）下切换到
//! loom 的实现，使加锁协议可以被模型检查器穷举。
//!
//! 调用方统一通过 [`lock`] / [`try_lock`] 获取守卫，屏蔽两套实现在中毒语义上的差异。

#[cfg(not(any(loom, spark_loom)))]
pub(crate) use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
#[cfg(not(any(loom, spark_loom)))]
pub(crate) use spin::{Mutex, MutexGuard};

#[cfg(any(loom, spark_loom))]
pub(crate) use loom::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
#[cfg(any(loom, spark_loom))]
pub(crate) use loom::sync::{Mutex, MutexGuard};

/// 自旋获取锁，直到成功。
#[cfg(not(any(loom, spark_loom)))]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock()
}

/// 尝试获取锁，竞争时立即返回 `None`。
#[cfg(not(any(loom, spark_loom)))]
pub(crate) fn try_lock<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    mutex.try_lock()
}

#[cfg(any(loom, spark_loom))]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // 自旋锁没有中毒概念；loom 下沿用同样语义，直接取回守卫。
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(any(loom, spark_loom))]
pub(crate) fn try_lock<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    use std::sync::TryLockError;

    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}
