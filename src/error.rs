// SPDX-License-Identifier: Apache-2.0

//! Error types for ring buffers and the serial transport.

use thiserror::Error;

/// Raised while setting up a [`RingBuffer`](crate::buffer::RingBuffer) or its static storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Storage is too short to hold even one byte (one slot is always kept free).
    #[error("ring buffer capacity {capacity} is below the minimum of 2")]
    CapacityTooSmall {
        /// Length of the rejected storage
        capacity: usize,
    },
    /// Storage is longer than an 8-bit offset can address.
    #[error("ring buffer capacity {capacity} exceeds the maximum of 256")]
    CapacityTooLarge {
        /// Length of the rejected storage
        capacity: usize,
    },
    /// Static storage was requested a second time.
    #[error("static ring buffer storage has already been taken")]
    AlreadyInitialized,
}

/// The buffer had no free slot. Carries the byte that was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("ring buffer is full, byte {0:#04x} was not queued")]
pub struct BufferFull(pub u8);

/// The buffer held no byte to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("ring buffer is empty")]
pub struct BufferEmpty;

/// Failures of the blocking serial calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    /// The configured poll limit ran out before the ring buffer became ready.
    #[error("serial transfer timed out after {polls} polls")]
    Timeout {
        /// Number of polls made before giving up
        polls: u32,
    },
}
