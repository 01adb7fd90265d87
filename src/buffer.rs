// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity byte queue shared between one producer and one consumer.
//!
//! A [`RingBuffer`] binds caller-supplied storage of 2 to 256 bytes. One slot always stays
//! free so that a full buffer can be told apart from an empty one, leaving `capacity - 1`
//! usable slots.
//!
//! Across contexts (e.g. an interrupt handler and the main loop) the buffer is used through
//! the [`Producer`] and [`Consumer`] halves returned by [`RingBuffer::split`]. Each side only
//! ever stores its own offset, and reads the other side's offset with acquire ordering, so no
//! lock is taken on either path.
//!
//! ```
//! use uart_ring::buffer::RingBuffer;
//!
//! let mut storage = [0u8; 4];
//! let mut ring = RingBuffer::new(&mut storage).unwrap();
//! let (mut producer, mut consumer) = ring.split();
//!
//! producer.put(0xAA).unwrap();
//! assert_eq!(consumer.get(), Ok(0xAA));
//! assert!(consumer.is_empty());
//! ```

use core::{
    cell::UnsafeCell,
    fmt, slice,
    sync::atomic::{AtomicU8, Ordering},
};

use crate::error::{BufferEmpty, BufferFull, ConfigError};

/// Smallest accepted storage length. One slot always stays free, leaving a single usable one.
pub const MIN_CAPACITY: usize = 2;
/// Largest accepted storage length, the range of an 8-bit offset.
pub const MAX_CAPACITY: usize = u8::MAX as usize + 1;

/// Position of the next read or write within ring buffer storage.
///
/// Only built by [`RingBuffer`], so `capacity` is always within \[[`MIN_CAPACITY`],
/// [`MAX_CAPACITY`]\].
#[derive(Default, Debug, Eq, PartialEq, Copy, Clone)]
pub(crate) struct Offset(u8);

impl Offset {
    /// Get the offset as a storage index
    pub(crate) fn get(&self) -> usize {
        usize::from(self.0)
    }

    /// Advance by one with defined wrapping. Result will be within range \[0, `capacity` - 1\].
    pub(crate) fn wrapping_increment(&self, capacity: usize) -> Self {
        let next = self.get() + 1;
        if next >= capacity {
            Self(0)
        } else {
            // `next < capacity <= MAX_CAPACITY`, so it fits
            Self(next as u8)
        }
    }

    /// Number of increments needed to move from `self` to `ahead`, wrapping at `capacity`.
    pub(crate) fn distance_to(&self, ahead: Offset, capacity: usize) -> usize {
        (ahead.get() + capacity - self.get()) % capacity
    }
}

/// An [`Offset`] stored by exactly one side of the buffer and observed by the other.
struct SharedOffset(AtomicU8);

impl SharedOffset {
    /// Offset zero
    const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Atomically read the offset
    fn load(&self, order: Ordering) -> Offset {
        Offset(self.0.load(order))
    }

    /// Atomically publish the offset
    fn store(&self, offset: Offset, order: Ordering) {
        self.0.store(offset.0, order)
    }
}

/// Circular byte queue over borrowed storage.
///
/// The buffer is empty when both offsets are equal, and full when advancing the write offset
/// would make it equal to the read offset.
pub struct RingBuffer<'a> {
    /// Backing bytes. Slots in `[read_offset, write_offset)` are owned by the consumer, all
    /// others by the producer.
    storage: &'a [UnsafeCell<u8>],
    /// Next slot to write. Stored only by the producer.
    write_offset: SharedOffset,
    /// Next slot to read. Stored only by the consumer.
    read_offset: SharedOffset,
}

// SAFETY: `storage` was exclusively borrowed at construction and is only reached through this
// buffer. Producer and consumer paths never address the same slot while it is live.
unsafe impl Send for RingBuffer<'_> {}
// SAFETY: every method reachable from `&RingBuffer` only reads the atomic offsets or a slot
// that the producer cannot touch until the consumer publishes its next offset.
unsafe impl Sync for RingBuffer<'_> {}

impl<'a> RingBuffer<'a> {
    /// Bind `storage` as the buffer's backing array. The capacity is `storage.len()`, and both
    /// offsets start at zero.
    ///
    /// Fails if the capacity is outside \[[`MIN_CAPACITY`], [`MAX_CAPACITY`]\].
    pub fn new(storage: &'a mut [u8]) -> Result<Self, ConfigError> {
        let capacity = storage.len();
        if capacity < MIN_CAPACITY {
            return Err(ConfigError::CapacityTooSmall { capacity });
        }
        if capacity > MAX_CAPACITY {
            return Err(ConfigError::CapacityTooLarge { capacity });
        }

        // SAFETY: `UnsafeCell<u8>` has the same in-memory representation as `u8`, and the
        // exclusive borrow of `storage` is held for `'a`.
        let storage =
            unsafe { slice::from_raw_parts(storage.as_mut_ptr().cast::<UnsafeCell<u8>>(), capacity) };
        debug!("ring buffer bound to {} bytes of storage", capacity);

        Ok(Self {
            storage,
            write_offset: SharedOffset::new(),
            read_offset: SharedOffset::new(),
        })
    }

    /// Length of the backing storage. Usable capacity is one less.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// No byte is waiting to be read
    pub fn is_empty(&self) -> bool {
        self.read_offset.load(Ordering::Acquire) == self.write_offset.load(Ordering::Acquire)
    }

    /// No slot is free for another write
    pub fn is_full(&self) -> bool {
        self.write_offset
            .load(Ordering::Acquire)
            .wrapping_increment(self.capacity())
            == self.read_offset.load(Ordering::Acquire)
    }

    /// Number of bytes waiting to be read
    pub fn len(&self) -> usize {
        let read = self.read_offset.load(Ordering::Acquire);
        let write = self.write_offset.load(Ordering::Acquire);
        read.distance_to(write, self.capacity())
    }

    /// Number of bytes that can be written before the buffer is full
    pub fn free(&self) -> usize {
        self.capacity() - 1 - self.len()
    }

    /// Write `byte` at the write offset, then advance it.
    ///
    /// A full buffer is left untouched and the byte is handed back in [`BufferFull`].
    pub fn put(&mut self, byte: u8) -> Result<(), BufferFull> {
        self.enqueue(byte)
    }

    /// Read the byte at the read offset, then advance it.
    pub fn get(&mut self) -> Result<u8, BufferEmpty> {
        self.dequeue()
    }

    /// Read the byte at the read offset without consuming it
    pub fn peek(&self) -> Result<u8, BufferEmpty> {
        self.front()
    }

    /// Queue as many bytes of `bytes` as fit, in order. Returns how many were queued.
    pub fn write_from(&mut self, bytes: &[u8]) -> usize {
        self.enqueue_slice(bytes)
    }

    /// Fill `buf` with as many waiting bytes as available. Returns how many were read.
    pub fn read_into(&mut self, buf: &mut [u8]) -> usize {
        self.dequeue_slice(buf)
    }

    /// Discard every waiting byte and rewind both offsets to zero.
    pub fn clear(&mut self) {
        self.read_offset.store(Offset::default(), Ordering::Release);
        self.write_offset.store(Offset::default(), Ordering::Release);
    }

    /// Hand out the producer and consumer halves.
    ///
    /// The buffer stays borrowed, and therefore in place, for as long as either half lives.
    pub fn split(&mut self) -> (Producer<'_, 'a>, Consumer<'_, 'a>) {
        let ring = &*self;
        (Producer { ring }, Consumer { ring })
    }

    /// Producer path of [`Self::put`]. Must only be called by the single producer.
    fn enqueue(&self, byte: u8) -> Result<(), BufferFull> {
        let write = self.write_offset.load(Ordering::Relaxed);
        let next = write.wrapping_increment(self.capacity());
        if next == self.read_offset.load(Ordering::Acquire) {
            return Err(BufferFull(byte));
        }

        // SAFETY: the slot at `write` is not visible to the consumer until `next` is published
        unsafe { *self.storage[write.get()].get() = byte };
        self.write_offset.store(next, Ordering::Release);
        Ok(())
    }

    /// Consumer path of [`Self::get`]. Must only be called by the single consumer.
    fn dequeue(&self) -> Result<u8, BufferEmpty> {
        let read = self.read_offset.load(Ordering::Relaxed);
        let byte = self.front_at(read)?;
        self.read_offset
            .store(read.wrapping_increment(self.capacity()), Ordering::Release);
        Ok(byte)
    }

    /// Consumer path of [`Self::peek`]
    fn front(&self) -> Result<u8, BufferEmpty> {
        self.front_at(self.read_offset.load(Ordering::Relaxed))
    }

    /// Read the slot at `read`, if the producer has published it
    fn front_at(&self, read: Offset) -> Result<u8, BufferEmpty> {
        if read == self.write_offset.load(Ordering::Acquire) {
            return Err(BufferEmpty);
        }

        // SAFETY: the acquire load above makes the producer's write to this slot visible, and
        // the producer will not reuse it until the consumer publishes a later read offset
        Ok(unsafe { *self.storage[read.get()].get() })
    }

    /// Producer path of [`Self::write_from`]
    fn enqueue_slice(&self, bytes: &[u8]) -> usize {
        bytes
            .iter()
            .take_while(|&&byte| self.enqueue(byte).is_ok())
            .count()
    }

    /// Consumer path of [`Self::read_into`]
    fn dequeue_slice(&self, buf: &mut [u8]) -> usize {
        let mut count = 0;
        for slot in buf.iter_mut() {
            match self.dequeue() {
                Ok(byte) => *slot = byte,
                Err(BufferEmpty) => break,
            }
            count += 1;
        }
        count
    }
}

impl fmt::Debug for RingBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("write_offset", &self.write_offset.load(Ordering::Relaxed))
            .field("read_offset", &self.read_offset.load(Ordering::Relaxed))
            .finish()
    }
}

/// Writing half of a [`RingBuffer`], for the context that produces bytes
pub struct Producer<'r, 'a> {
    /// Shared buffer. Only the write offset is stored through this handle.
    ring: &'r RingBuffer<'a>,
}

impl Producer<'_, '_> {
    /// See [`RingBuffer::put`]
    pub fn put(&mut self, byte: u8) -> Result<(), BufferFull> {
        self.ring.enqueue(byte)
    }

    /// See [`RingBuffer::write_from`]
    pub fn write_from(&mut self, bytes: &[u8]) -> usize {
        self.ring.enqueue_slice(bytes)
    }

    /// See [`RingBuffer::is_full`]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// See [`RingBuffer::is_empty`]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// See [`RingBuffer::free`]
    pub fn free(&self) -> usize {
        self.ring.free()
    }

    /// See [`RingBuffer::capacity`]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Reading half of a [`RingBuffer`], for the context that consumes bytes
pub struct Consumer<'r, 'a> {
    /// Shared buffer. Only the read offset is stored through this handle.
    ring: &'r RingBuffer<'a>,
}

impl Consumer<'_, '_> {
    /// See [`RingBuffer::get`]
    pub fn get(&mut self) -> Result<u8, BufferEmpty> {
        self.ring.dequeue()
    }

    /// See [`RingBuffer::peek`]
    pub fn peek(&self) -> Result<u8, BufferEmpty> {
        self.ring.front()
    }

    /// See [`RingBuffer::read_into`]
    pub fn read_into(&mut self, buf: &mut [u8]) -> usize {
        self.ring.dequeue_slice(buf)
    }

    /// See [`RingBuffer::is_empty`]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// See [`RingBuffer::len`]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// See [`RingBuffer::capacity`]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}
