//! `pool_contract` 集成测试：从 crate 公开 API 视角验证 `HwbmPool` 的计数、策略与失败恢复契约。
//!
//! # 结构安排（How）
//! - `scenario_*`：固定场景，覆盖满池、超容量、分配中途失败、钩子拒绝；
//! - `*_strategy_*`：以记录型后端替身确认分配与释放始终命中同一后端；
//! - 其余测试覆盖锁守卫记账与计数溢出等边界。

#![cfg(not(any(loom, spark_loom)))]

mod support;

use std::sync::Arc;

use spark_hwbm::{
    AddRejected, AllocHint, AllocStrategy, BufferBackend, HwbmBuffer, HwbmError, HwbmPool,
    InitRejected, PoolConfig,
};
use support::{Event, RecordingBackend, RxRing, buffer_id};

/// 构建一个钩子把缓冲压入接收环、后端为记录型替身的池。
fn recorded_pool(
    capacity: u32,
    buffer_size: usize,
    backend: Arc<RecordingBackend>,
) -> HwbmPool<RxRing> {
    HwbmPool::with_context(PoolConfig::new(capacity, buffer_size), RxRing::default())
        .init(|ring: &RxRing, buffer: HwbmBuffer| -> Result<(), InitRejected> {
            ring.install(buffer);
            Ok(())
        })
        .fragment_backend(backend.clone())
        .generic_backend(backend)
        .build()
        .expect("构建缓冲池失败")
}

/// 场景 A/B：容量 4 的池先补满，再请求 1 个时返回当前存活数。
#[test]
fn scenario_fill_then_full() {
    let backend = Arc::new(RecordingBackend::new("frag"));
    let pool = recorded_pool(4, 1024, backend.clone());

    assert_eq!(pool.add(4, AllocHint::Atomic), 4);
    assert_eq!(pool.live_count(), 4);
    assert_eq!(pool.context().len(), 4, "每个缓冲都应交给钩子");

    assert_eq!(pool.add(1, AllocHint::Atomic), 4, "满池返回当前存活数");
    assert_eq!(pool.live_count(), 4);
    assert_eq!(backend.allocations(), 4, "满池分支不得触发分配");
}

/// 场景 C：存活 2、容量 4 时请求 3 个，超出容量，返回 0 且计数不变。
#[test]
fn scenario_capacity_exceeded_is_a_no_op() {
    let backend = Arc::new(RecordingBackend::new("frag"));
    let pool = recorded_pool(4, 1024, backend.clone());
    assert_eq!(pool.add(2, AllocHint::Atomic), 2);

    assert_eq!(pool.add(3, AllocHint::Atomic), 0);
    assert_eq!(pool.live_count(), 2);
    assert_eq!(
        pool.try_add(3, AllocHint::Atomic),
        Err(AddRejected::CapacityExceeded {
            requested: 3,
            live: 2,
            capacity: 4
        })
    );
    assert_eq!(backend.allocations(), 2);
    assert_eq!(pool.stats().rejected_capacity, 2);
}

/// 场景 D：后端第 3 次分配失败，请求 5 个只补充 2 个，且不回滚。
#[test]
fn scenario_mid_loop_allocation_failure() {
    let backend = Arc::new(RecordingBackend::failing_from("frag", 3));
    let pool = recorded_pool(10, 1024, backend.clone());

    assert_eq!(pool.add(5, AllocHint::Atomic), 2);
    assert_eq!(pool.live_count(), 2);
    assert_eq!(backend.calls(), 3, "首个失败后不再重试");
    assert!(backend.releases().is_empty(), "已补充的缓冲不回滚");

    let stats = pool.stats();
    assert_eq!(stats.refills, 2);
    assert_eq!(stats.allocation_failures, 1);
}

/// 场景 E：钩子拒绝新缓冲时，`refill` 报告内存不足，且恰好观测到一次匹配的释放。
#[test]
fn scenario_init_rejection_releases_exactly_once() {
    let backend = Arc::new(RecordingBackend::new("frag"));
    let pool = HwbmPool::builder(PoolConfig::new(4, 256))
        .init(|_: &(), buffer: HwbmBuffer| -> Result<(), InitRejected> {
            Err(InitRejected::new(buffer, "descriptor ring full"))
        })
        .fragment_backend(backend.clone())
        .build()
        .expect("构建缓冲池失败");

    assert_eq!(
        pool.refill(AllocHint::Atomic),
        Err(HwbmError::OutOfMemory { size: 256 })
    );
    assert_eq!(
        backend.events(),
        vec![
            Event::Allocated { id: 1, size: 256 },
            Event::Released { id: 1, size: 256 },
        ]
    );
    assert_eq!(pool.live_count(), 0, "refill 不修改存活计数");
}

/// 钩子在 `add` 中途拒绝：已成功的缓冲计入存活数，被拒缓冲被释放。
#[test]
fn hook_rejection_inside_add_stops_the_loop() {
    let backend = Arc::new(RecordingBackend::new("frag"));
    let pool = HwbmPool::with_context(PoolConfig::new(8, 512), RxRing::default())
        .init(|ring: &RxRing, buffer: HwbmBuffer| -> Result<(), InitRejected> {
            if ring.len() == 3 {
                return Err(InitRejected::new(buffer, "ring exhausted"));
            }
            ring.install(buffer);
            Ok(())
        })
        .fragment_backend(backend.clone())
        .build()
        .expect("构建缓冲池失败");

    assert_eq!(pool.add(6, AllocHint::Atomic), 3);
    assert_eq!(pool.live_count(), 3);
    assert_eq!(backend.releases(), vec![4], "只有被拒绝的第 4 个缓冲被释放");
}

/// 不超过阈值的池：分配与释放都命中分片后端，通用后端从未被调用。
#[test]
fn small_buffers_use_fragment_strategy_end_to_end() {
    let fragment = Arc::new(RecordingBackend::new("fragment"));
    let generic = Arc::new(RecordingBackend::new("generic"));
    let pool = HwbmPool::with_context(
        PoolConfig::new(4, 4096).with_fragment_threshold(4096),
        RxRing::default(),
    )
    .init(|ring: &RxRing, buffer: HwbmBuffer| -> Result<(), InitRejected> {
        ring.install(buffer);
        Ok(())
    })
    .fragment_backend(fragment.clone())
    .generic_backend(generic.clone())
    .build()
    .expect("构建缓冲池失败");

    assert_eq!(pool.strategy(), AllocStrategy::Fragment);
    assert_eq!(pool.add(2, AllocHint::Atomic), 2);
    for buffer in pool.context().take_all() {
        pool.free(buffer);
    }

    assert_eq!(fragment.allocations(), 2);
    assert_eq!(fragment.releases(), vec![1, 2]);
    assert!(
        generic.events().is_empty(),
        "{} 后端不应被触达",
        generic.label()
    );
}

/// 超过阈值的池：分配与释放都命中通用后端。
#[test]
fn large_buffers_use_generic_strategy_end_to_end() {
    let fragment = Arc::new(RecordingBackend::new("fragment"));
    let generic = Arc::new(RecordingBackend::new("generic"));
    let pool = HwbmPool::with_context(PoolConfig::new(4, 4097), RxRing::default())
        .init(|ring: &RxRing, buffer: HwbmBuffer| -> Result<(), InitRejected> {
            ring.install(buffer);
            Ok(())
        })
        .fragment_backend(fragment.clone())
        .generic_backend(generic.clone())
        .build()
        .expect("构建缓冲池失败");

    assert_eq!(pool.strategy(), AllocStrategy::Generic);
    assert_eq!(pool.add(3, AllocHint::MaySleep), 3);
    let buffers = pool.context().take_all();
    let ids: Vec<u32> = buffers.iter().map(buffer_id).collect();
    for buffer in buffers {
        pool.free(buffer);
    }

    assert_eq!(generic.releases(), ids);
    assert!(
        fragment.events().is_empty(),
        "{} 后端不应被触达",
        fragment.label()
    );
}

/// 计数溢出：回绕后的和未超过容量，但真实和超出 `u32`，返回 0 且计数不变。
#[test]
fn counter_overflow_is_rejected() {
    let backend = Arc::new(RecordingBackend::new("frag"));
    let pool = recorded_pool(u32::MAX, 64, backend.clone());
    assert_eq!(pool.add(10, AllocHint::Atomic), 10);

    let requested = u32::MAX - 5;
    assert_eq!(pool.add(requested, AllocHint::Atomic), 0);
    assert_eq!(
        pool.try_add(requested, AllocHint::Atomic),
        Err(AddRejected::CounterOverflow {
            requested,
            live: 10
        })
    );
    assert_eq!(pool.live_count(), 10);
    assert_eq!(backend.allocations(), 10);
    assert_eq!(pool.stats().rejected_overflow, 2);
}

/// 调用方在锁守卫内自行补充并登记，再释放并回收计数。
#[test]
fn guard_supports_external_refill_bookkeeping() {
    let backend = Arc::new(RecordingBackend::new("frag"));
    let pool = recorded_pool(3, 128, backend.clone());

    {
        let mut guard = pool.lock();
        let mut refilled = 0;
        while guard.headroom() > refilled && guard.refill(AllocHint::Atomic).is_ok() {
            refilled += 1;
        }
        assert_eq!(guard.record_added(refilled), Ok(3));
        assert_eq!(
            guard.record_added(1),
            Err(AddRejected::PoolFull { live: 3 })
        );
    }
    assert_eq!(pool.live_count(), 3);

    let returned = pool.context().take_all();
    let count = returned.len() as u32;
    for buffer in returned {
        pool.free(buffer);
    }
    assert_eq!(pool.live_count(), 3, "free 本身不递减计数");
    assert_eq!(pool.lock().record_released(count), Ok(0));
    assert_eq!(pool.add(3, AllocHint::Atomic), 3, "登记释放后可重新补满");
    assert_eq!(backend.releases().len(), 3);
}

/// 自定义后端可以是任意实现 `BufferBackend` 的 trait 对象。
#[test]
fn builder_accepts_trait_objects() {
    let backend: Arc<dyn BufferBackend> = Arc::new(RecordingBackend::new("dyn"));
    let pool = HwbmPool::builder(PoolConfig::new(2, 32))
        .fragment_backend(backend)
        .build()
        .expect("构建缓冲池失败");
    assert_eq!(pool.add(2, AllocHint::Atomic), 2);
}
