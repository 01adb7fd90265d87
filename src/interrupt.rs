// SPDX-License-Identifier: Apache-2.0

//! Sharing interrupt handler state with the foreground through a static [`Mutex`].
//!
//! The critical section only guards the handler object (and so the UART registers it owns).
//! Bytes still move through the lock-free ring buffers.
//!
//! ```ignore
//! static UART0_ISR: IsrCell<SerialIsr<'static, 'static, Uart0, NoStatusLed>> = isr_cell();
//!
//! #[interrupt]
//! fn UART0_IRQ() {
//!     with_installed(&UART0_ISR, |isr| isr.on_interrupt());
//! }
//! ```

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::digital::OutputPin;

use crate::serial::{SerialIsr, TxInterrupt, Uart};

/// Static slot for state owned by an interrupt handler
pub type IsrCell<T> = Mutex<RefCell<Option<T>>>;

/// Empty [`IsrCell`], usable in a `static` initializer
pub const fn isr_cell<T>() -> IsrCell<T> {
    Mutex::new(RefCell::new(None))
}

/// Move `value` into `cell`. Returns the value it replaces, if any.
pub fn install<T>(cell: &IsrCell<T>, value: T) -> Option<T> {
    debug!("critical_section: install interrupt handler state");
    let previous = critical_section::with(|cs| cell.replace(cs, Some(value)));
    if previous.is_some() {
        warn!("Interrupt handler state was already installed and has been replaced");
    }
    previous
}

/// Take the value back out of `cell`
pub fn uninstall<T>(cell: &IsrCell<T>) -> Option<T> {
    debug!("critical_section: uninstall interrupt handler state");
    critical_section::with(|cs| cell.take(cs))
}

/// Run `f` on the installed value inside a critical section. Returns `None` if nothing is
/// installed.
///
/// Panics if called again from within `f` on the same cell.
pub fn with_installed<T, R>(cell: &IsrCell<T>, f: impl FnOnce(&mut T) -> R) -> Option<R> {
    critical_section::with(|cs| cell.borrow_ref_mut(cs).as_mut().map(f))
}

/// [`TxInterrupt`] for a [`SerialIsr`] installed in an [`IsrCell`]
pub struct IsrKick<'c, T> {
    /// Cell holding the handler
    cell: &'c IsrCell<T>,
}

impl<'c, T> IsrKick<'c, T> {
    /// Request transmit interrupts from the handler in `cell`
    pub const fn new(cell: &'c IsrCell<T>) -> Self {
        Self { cell }
    }
}

impl<U: Uart, L: OutputPin> TxInterrupt for IsrKick<'_, SerialIsr<'_, '_, U, L>> {
    fn enable(&mut self) {
        if with_installed(self.cell, |isr| isr.request_tx()).is_none() {
            warn!("Transmit requested before the serial interrupt handler was installed");
        }
    }
}

/// Take a `&'static mut [u8; N]` for ring buffer storage, once per call site.
///
/// Evaluates to `Err(ConfigError::AlreadyInitialized)` when the call site is reached again.
///
/// ```ignore
/// let rx = ring_storage!(64)?;
/// let tx = ring_storage!(64)?;
/// ```
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[macro_export]
macro_rules! ring_storage {
    ($size:expr) => {
        $crate::__private::cortex_m::singleton!(: [u8; $size] = [0u8; $size])
            .ok_or($crate::error::ConfigError::AlreadyInitialized)
    };
}
