//! Lock-free, interrupt-safe byte ring buffers, and the interrupt-driven UART transport built
//! on them.
//!
//! A [`RingBuffer`](buffer::RingBuffer) is a fixed-capacity FIFO over caller-supplied storage,
//! shared by exactly one producer and one consumer (typically a UART interrupt and the main
//! loop). Neither side takes a lock: each stores only its own 8-bit offset.
//!
//! [`serial::Serial`] pairs a receive ring and a transmit ring with a [`serial::Uart`]
//! implementation, and splits into an interrupt half and a foreground half.
//!
//! ## Crate features
//!
//! - `defmt`: Log through [`defmt`](https://docs.rs/defmt) instead of [`log`], and derive
//!   `defmt::Format` for errors and states.
//! - `trace_bytes`: Logs every byte moved by the interrupt handler. Very noisy!
//!
//! ## Demo
//!
//! A simplified interrupt-driven echo loop. `Uart0` stands for the board's UART. On a Cortex-M
//! target the ring storage and the `Serial` come from `ring_storage!` and
//! `cortex_m::singleton!` instead of the heap.
//!
//! ```no_run
//! use uart_ring::{
//!     components::NoStatusLed,
//!     interrupt::{install, isr_cell, with_installed, IsrCell, IsrKick},
//!     serial::{Config, Serial, SerialIsr, Uart},
//! };
//!
//! struct Uart0;
//!
//! impl Uart for Uart0 {
//!     type Error = ();
//!
//!     fn read(&mut self) -> nb::Result<u8, ()> {
//!         Err(nb::Error::WouldBlock) // data register
//!     }
//!
//!     fn write(&mut self, _byte: u8) -> nb::Result<(), ()> {
//!         Ok(())
//!     }
//!
//!     fn set_tx_interrupt(&mut self, _enabled: bool) {}
//! }
//!
//! static UART0_ISR: IsrCell<SerialIsr<'static, 'static, Uart0, NoStatusLed>> = isr_cell();
//!
//! fn main() {
//!     let rx = Box::leak(Box::new([0u8; 64]));
//!     let tx = Box::leak(Box::new([0u8; 64]));
//!     let serial = Box::leak(Box::new(Serial::new(rx, tx, Config::default()).unwrap()));
//!
//!     let (isr, mut foreground) = serial.split(Uart0, IsrKick::new(&UART0_ISR));
//!     install(&UART0_ISR, isr);
//!     // Unmask the UART interrupt here
//!
//!     loop {
//!         if let Ok(byte) = foreground.read_blocking() {
//!             foreground.write_blocking(byte).ok();
//!         }
//!     }
//! }
//!
//! // Registered as the UART interrupt vector
//! fn uart0_irq() {
//!     with_installed(&UART0_ISR, |isr| isr.on_interrupt());
//! }
//! ```

// Copyright 2024 The uart_ring authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_auto_cfg), feature(doc_cfg_hide))]

#[macro_use]
mod fmt;

pub mod buffer;
pub mod components;
pub mod error;
pub mod interrupt;
pub mod serial;

#[doc(hidden)]
pub mod __private {
    #[cfg(all(target_arch = "arm", target_os = "none"))]
    pub use cortex_m;
}
