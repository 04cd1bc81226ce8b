use anyhow::Result;

use deimos::*;

use crate::framework::{init_logger, is_error, FakeDescriptorBackend};

mod framework;

fn settings() -> DescriptorAllocatorSettings {
    DescriptorAllocatorSettings {
        descriptors_per_type: 16,
        max_sets_per_pool: 2,
        pools_per_batch: 2,
        pool_deletion_delay: 2,
    }
}

fn make_allocator(sets_per_pool: u32) -> Result<(FakeDescriptorBackend, DescriptorAllocator<FakeDescriptorBackend>)> {
    init_logger();
    let backend = FakeDescriptorBackend::new(sets_per_pool);
    let allocator = DescriptorAllocator::new(backend.clone(), settings())?;
    Ok((backend, allocator))
}

#[test]
pub fn creates_first_batch() -> Result<()> {
    let (backend, allocator) = make_allocator(2)?;
    assert_eq!(backend.created_pools(), 2);
    assert_eq!(allocator.active_pool_count(), 1);
    assert_eq!(allocator.free_pool_count(), 1);
    assert_eq!(allocator.live_set_count(), 0);
    Ok(())
}

#[test]
pub fn allocates_from_current_pool_until_full() -> Result<()> {
    let (backend, mut allocator) = make_allocator(2)?;
    let first_pool = allocator.current_pool();
    let a = allocator.allocate(vk::DescriptorSetLayout::null())?;
    let b = allocator.allocate(vk::DescriptorSetLayout::null())?;
    assert_eq!(a.pool(), first_pool);
    assert_eq!(b.pool(), first_pool);

    let c = allocator.allocate(vk::DescriptorSetLayout::null())?;
    assert_ne!(c.pool(), first_pool);
    assert_eq!(allocator.current_pool(), c.pool());
    // The full pool still has live sets, so it stays active.
    assert_eq!(allocator.active_pool_count(), 2);
    assert!(allocator.pool(first_pool).unwrap().is_exhausted());
    assert_eq!(allocator.pool(first_pool).unwrap().live_set_count(), 2);
    // The spare pool from the first batch was used, no new pools needed.
    assert_eq!(backend.created_pools(), 2);
    assert_eq!(allocator.free_pool_count(), 0);

    allocator.release(a)?;
    allocator.release(b)?;
    allocator.release(c)?;
    Ok(())
}

#[test]
pub fn live_set_count_matches_outstanding_sets() -> Result<()> {
    let (_backend, mut allocator) = make_allocator(3)?;
    let mut outstanding = vec![];
    for round in 0..6 {
        for _ in 0..round + 2 {
            outstanding.push(allocator.allocate(vk::DescriptorSetLayout::null())?);
            assert_eq!(allocator.live_set_count() as usize, outstanding.len());
        }
        // Release every other set, oldest first.
        let (released, kept): (Vec<_>, Vec<_>) = outstanding.drain(..).enumerate().partition(|(i, _)| i % 2 == 0);
        for (_, set) in released {
            allocator.release(set)?;
        }
        outstanding.extend(kept.into_iter().map(|(_, set)| set));
        assert_eq!(allocator.live_set_count() as usize, outstanding.len());
    }
    for set in outstanding {
        allocator.release(set)?;
    }
    assert_eq!(allocator.live_set_count(), 0);
    Ok(())
}

#[test]
pub fn creates_new_batch_when_free_list_is_empty() -> Result<()> {
    let (backend, mut allocator) = make_allocator(2)?;
    let sets = (0..5)
        .map(|_| allocator.allocate(vk::DescriptorSetLayout::null()))
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(backend.created_pools(), 4);
    assert_eq!(allocator.active_pool_count(), 3);
    assert_eq!(allocator.free_pool_count(), 1);
    assert_eq!(allocator.live_set_count(), 5);
    for set in sets {
        allocator.release(set)?;
    }
    Ok(())
}

#[test]
pub fn retires_drained_pools() -> Result<()> {
    let (backend, mut allocator) = make_allocator(2)?;
    let a = allocator.allocate(vk::DescriptorSetLayout::null())?;
    let b = allocator.allocate(vk::DescriptorSetLayout::null())?;
    let c = allocator.allocate(vk::DescriptorSetLayout::null())?;
    let full_pool = a.pool();
    let current = c.pool();

    allocator.release(a)?;
    assert_eq!(allocator.active_pool_count(), 2);
    allocator.release(b)?;
    // Exhausted and empty: retired, but not destroyed yet.
    assert_eq!(allocator.active_pool_count(), 1);
    assert!(allocator.pool(full_pool).is_none());
    assert_eq!(allocator.pending_destruction_count(), 1);
    assert_eq!(backend.destroyed_pools(), 0);

    // The current pool is empty, but was never exhausted, so it stays.
    allocator.release(c)?;
    assert_eq!(allocator.active_pool_count(), 1);
    assert_eq!(allocator.current_pool(), current);
    assert_eq!(allocator.pool(current).unwrap().live_set_count(), 0);
    Ok(())
}

#[test]
pub fn destroys_retired_pools_after_delay() -> Result<()> {
    let (backend, mut allocator) = make_allocator(1)?;
    let a = allocator.allocate(vk::DescriptorSetLayout::null())?;
    let b = allocator.allocate(vk::DescriptorSetLayout::null())?;
    allocator.release(a)?;
    assert_eq!(allocator.pending_destruction_count(), 1);

    allocator.next_frame();
    assert_eq!(backend.destroyed_pools(), 0);
    allocator.next_frame();
    assert_eq!(backend.destroyed_pools(), 1);
    assert_eq!(allocator.pending_destruction_count(), 0);
    assert_eq!(backend.live_pools(), 1);

    allocator.release(b)?;
    Ok(())
}

#[test]
pub fn fragmented_pool_is_replaced() -> Result<()> {
    let (backend, mut allocator) = make_allocator(8)?;
    let first_pool = allocator.current_pool();
    backend.fragment_next_allocation();
    let set = allocator.allocate(vk::DescriptorSetLayout::null())?;
    assert_ne!(set.pool(), first_pool);
    // The fragmented pool never had a live set, so it is retired right away.
    assert!(allocator.pool(first_pool).is_none());
    assert_eq!(allocator.pending_destruction_count(), 1);
    allocator.release(set)?;
    Ok(())
}

#[test]
pub fn fails_when_fresh_pool_is_also_full() -> Result<()> {
    let (_backend, mut allocator) = make_allocator(0)?;
    let err = allocator.allocate(vk::DescriptorSetLayout::null()).unwrap_err();
    assert!(is_error(&err, |e| matches!(e, Error::DescriptorAllocationFailed { .. })));
    Ok(())
}

#[test]
pub fn propagates_device_errors() -> Result<()> {
    let (backend, mut allocator) = make_allocator(2)?;
    let current = allocator.current_pool();
    backend.lose_device();
    let err = allocator.allocate(vk::DescriptorSetLayout::null()).unwrap_err();
    assert!(is_error(&err, |e| matches!(e, Error::VkError(vk::Result::ERROR_DEVICE_LOST))));
    // Not a growth signal, the pool is untouched.
    assert_eq!(allocator.current_pool(), current);
    assert!(!allocator.pool(current).unwrap().is_exhausted());
    Ok(())
}

#[test]
pub fn release_underflow_is_an_error() -> Result<()> {
    let (_backend, mut allocator) = make_allocator(2)?;
    let current = allocator.current_pool();
    let err = allocator.release_from(current).unwrap_err();
    assert!(is_error(&err, |e| matches!(e, Error::DescriptorPoolUnderflow)));
    Ok(())
}

#[test]
pub fn release_from_retired_pool_is_an_error() -> Result<()> {
    let (_backend, mut allocator) = make_allocator(1)?;
    let a = allocator.allocate(vk::DescriptorSetLayout::null())?;
    let b = allocator.allocate(vk::DescriptorSetLayout::null())?;
    let retired = a.pool();
    allocator.release(a)?;
    let err = allocator.release_from(retired).unwrap_err();
    assert!(is_error(&err, |e| matches!(e, Error::UnknownDescriptorPool(pool) if *pool == retired)));
    allocator.release(b)?;
    Ok(())
}

#[test]
pub fn rejects_invalid_settings() -> Result<()> {
    init_logger();
    let backend = FakeDescriptorBackend::new(2);
    let invalid = [
        DescriptorAllocatorSettings {
            pools_per_batch: 0,
            ..settings()
        },
        DescriptorAllocatorSettings {
            pools_per_batch: 4,
            ..settings()
        },
        DescriptorAllocatorSettings {
            max_sets_per_pool: 0,
            ..settings()
        },
        DescriptorAllocatorSettings {
            descriptors_per_type: 0,
            ..settings()
        },
    ];
    for settings in invalid {
        let err = DescriptorAllocator::new(backend.clone(), settings).unwrap_err();
        assert!(is_error(&err, |e| matches!(e, Error::Uncategorized(_))));
    }
    // Nothing reaches the device.
    assert_eq!(backend.created_pools(), 0);
    Ok(())
}

#[test]
pub fn pool_size_includes_acceleration_structures() -> Result<()> {
    init_logger();
    let backend = FakeDescriptorBackend::new(2).with_acceleration_structures();
    let allocator = DescriptorAllocator::new(backend, settings())?;
    assert_eq!(allocator.pool_size().get(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR), 16);
    assert_eq!(allocator.pool_size().get(vk::DescriptorType::STORAGE_IMAGE), 16);
    assert_eq!(allocator.pool_size().max_sets(), 2);

    let (_backend, allocator) = make_allocator(2)?;
    assert_eq!(allocator.pool_size().get(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR), 0);
    Ok(())
}

#[test]
pub fn dropping_allocator_destroys_all_pools() -> Result<()> {
    let (backend, mut allocator) = make_allocator(1)?;
    let sets = (0..4)
        .map(|_| allocator.allocate(vk::DescriptorSetLayout::null()))
        .collect::<Result<Vec<_>>>()?;
    for set in sets {
        allocator.release(set)?;
    }
    drop(allocator);
    assert_eq!(backend.live_pools(), 0);
    assert_eq!(backend.destroyed_pools(), backend.created_pools());
    Ok(())
}
