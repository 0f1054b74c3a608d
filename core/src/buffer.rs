//! Partition buffers with a capacity fixed before the scan starts.
//!
//! [`PartitionBuffer`] is owned by a single worker and appended to
//! sequentially. [`SharedPartitions`] is one set of buffers written by many
//! workers at once: a writer claims a slot with a `fetch_add` on the
//! partition's counter and then owns that slot exclusively. Both refuse
//! writes past capacity instead of reallocating.

use std::cell::UnsafeCell;
use std::mem::{ManuallyDrop, MaybeUninit};
use std::sync::atomic::{AtomicUsize, Ordering};

use hashpart_common::{ErrorStage, PartitionError, Result};

use crate::tuple::Tuple;

/// Allocate an empty vector able to hold `len` elements, reporting
/// exhaustion as [`PartitionError::AllocationFailure`].
pub(crate) fn try_vec_with_capacity<T>(
    len: usize,
    stage: ErrorStage,
    what: &'static str,
) -> Result<Vec<T>> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(len)
        .map_err(|e| PartitionError::allocation(stage, what, len, e))?;
    Ok(vec)
}

/// Records routed to one partition, bounded by a planned capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionBuffer {
    records: Vec<Tuple>,
    capacity: usize,
}

impl PartitionBuffer {
    /// Allocate an empty buffer that accepts up to `capacity` records.
    pub fn with_capacity(capacity: usize, stage: ErrorStage) -> Result<Self> {
        Ok(Self {
            records: try_vec_with_capacity(capacity, stage, "partition buffer")?,
            capacity,
        })
    }

    /// Append `record`. Returns `false`, leaving the buffer unchanged, when
    /// the buffer is already full.
    #[inline]
    #[must_use]
    pub fn try_push(&mut self, record: Tuple) -> bool {
        if self.records.len() == self.capacity {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The planned capacity, not the allocator's.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn records(&self) -> &[Tuple] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Tuple> {
        self.records
    }
}

/// Allocate `num_partitions` buffers of `capacity` records each.
pub(crate) fn allocate_uniform(
    num_partitions: usize,
    capacity: usize,
    stage: ErrorStage,
) -> Result<Vec<PartitionBuffer>> {
    let mut buffers = try_vec_with_capacity(num_partitions, stage, "partition table")?;
    for _ in 0..num_partitions {
        buffers.push(PartitionBuffer::with_capacity(capacity, stage)?);
    }
    Ok(buffers)
}

/// Allocate one buffer per entry of `counts`, sized exactly to it.
pub(crate) fn allocate_exact(counts: &[usize], stage: ErrorStage) -> Result<Vec<PartitionBuffer>> {
    let mut buffers = try_vec_with_capacity(counts.len(), stage, "partition table")?;
    for &count in counts {
        buffers.push(PartitionBuffer::with_capacity(count, stage)?);
    }
    Ok(buffers)
}

/// Slots and claim counter of one shared partition.
struct SharedSlots {
    slots: Box<[UnsafeCell<MaybeUninit<Tuple>>]>,
    claimed: AtomicUsize,
}

// SAFETY: a slot is only written by the thread whose `fetch_add` returned its
// index, and each index is returned at most once. Slots are only read after
// `self` is consumed by `into_buffers`, i.e. after every writer has been
// joined.
unsafe impl Sync for SharedSlots {}

impl SharedSlots {
    fn allocate(capacity: usize, stage: ErrorStage) -> Result<Self> {
        let mut slots = try_vec_with_capacity(capacity, stage, "shared partition buffer")?;
        slots.resize_with(capacity, || UnsafeCell::new(MaybeUninit::uninit()));
        Ok(Self {
            slots: slots.into_boxed_slice(),
            claimed: AtomicUsize::new(0),
        })
    }

    fn into_buffer(self) -> PartitionBuffer {
        let capacity = self.slots.len();
        let len = self.claimed.into_inner().min(capacity);
        let mut slots = ManuallyDrop::new(Vec::from(self.slots));
        let ptr = slots.as_mut_ptr().cast::<Tuple>();
        let alloc_capacity = slots.capacity();
        // SAFETY: `UnsafeCell<MaybeUninit<Tuple>>` has the layout of `Tuple`,
        // so the allocation is valid for a `Vec<Tuple>` of the same capacity.
        // Every index below `len` was claimed exactly once and written
        // immediately after the claim, so the first `len` slots are
        // initialized.
        let records = unsafe { Vec::from_raw_parts(ptr, len, alloc_capacity) };
        PartitionBuffer { records, capacity }
    }
}

/// A set of partition buffers shared by all workers of a run.
pub struct SharedPartitions {
    partitions: Vec<SharedSlots>,
}

impl SharedPartitions {
    /// Allocate one shared buffer per capacity in `capacities`.
    pub fn allocate<I>(capacities: I, stage: ErrorStage) -> Result<Self>
    where
        I: IntoIterator<Item = usize>,
        I::IntoIter: ExactSizeIterator,
    {
        let capacities = capacities.into_iter();
        let mut partitions = try_vec_with_capacity(capacities.len(), stage, "partition table")?;
        for capacity in capacities {
            partitions.push(SharedSlots::allocate(capacity, stage)?);
        }
        Ok(Self { partitions })
    }

    /// Claim the next free slot of `partition` and write `record` into it.
    ///
    /// Returns `false` when the claimed slot is past the capacity; nothing is
    /// written in that case. The counter keeps growing past capacity, so
    /// later claims on the same partition fail too.
    #[inline]
    #[must_use]
    pub fn insert(&self, partition: usize, record: Tuple) -> bool {
        let shared = &self.partitions[partition];
        // Uniqueness of the returned index is all that is needed here; the
        // join that ends the scan orders the writes before any read.
        let slot = shared.claimed.fetch_add(1, Ordering::Relaxed);
        match shared.slots.get(slot) {
            Some(cell) => {
                // SAFETY: `slot` was returned by this `fetch_add` only, so no
                // other thread reads or writes this cell during the scan.
                unsafe { (*cell.get()).write(record) };
                true
            }
            None => false,
        }
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn capacity(&self, partition: usize) -> usize {
        self.partitions[partition].slots.len()
    }

    /// Records claimed so far in `partition`, clamped to its capacity.
    pub fn len(&self, partition: usize) -> usize {
        let shared = &self.partitions[partition];
        shared.claimed.load(Ordering::Relaxed).min(shared.slots.len())
    }

    /// Convert into owned buffers once every writer has finished.
    pub fn into_buffers(self) -> Vec<PartitionBuffer> {
        self.partitions
            .into_iter()
            .map(SharedSlots::into_buffer)
            .collect()
    }
}

impl std::fmt::Debug for SharedPartitions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPartitions")
            .field("num_partitions", &self.partitions.len())
            .finish()
    }
}
