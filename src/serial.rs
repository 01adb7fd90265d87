// SPDX-License-Identifier: Apache-2.0

//! Interrupt-driven serial transport over a pair of [`RingBuffer`]s.
//!
//! [`Serial::split`] turns the receive and transmit rings into two halves:
//!
//! - [`SerialIsr`] runs in the UART interrupt. It produces into the receive ring and consumes
//!   from the transmit ring.
//! - [`SerialForeground`] runs in the main loop. It consumes from the receive ring and
//!   produces into the transmit ring, asking for a transmit interrupt through [`TxInterrupt`]
//!   after queueing a byte.
//!
//! Neither side ever blocks the other: the rings are lock-free, and the interrupt handler
//! drops (and counts) received bytes that do not fit instead of waiting.

use core::{
    convert::Infallible,
    fmt, hint,
    sync::atomic::{AtomicU32, Ordering},
};

use embedded_hal::digital::OutputPin;

use crate::{
    buffer::{Consumer, Producer, RingBuffer},
    components::{NoStatusLed, StatusLed, StatusLedStates},
    error::{BufferFull, ConfigError, SerialError},
};

/// UART hardware as seen from its interrupt handler.
///
/// Mirrors the `nb` serial traits: calls return [`nb::Error::WouldBlock`] instead of waiting.
pub trait Uart {
    /// Line error reported by the receiver (framing, parity, hardware overrun)
    type Error;

    /// Take the byte held by the receive data register
    fn read(&mut self) -> nb::Result<u8, Self::Error>;

    /// Load the transmit data register
    fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error>;

    /// Enable or disable the transmit-register-empty interrupt
    fn set_tx_interrupt(&mut self, enabled: bool);
}

/// Requests a transmit interrupt from the foreground side.
///
/// Implementations must not race with [`SerialIsr::on_interrupt`]: either the handler cannot be
/// preempted by the caller (single core), or the request goes through the same lock as the
/// handler (see [`IsrKick`](crate::interrupt::IsrKick)).
pub trait TxInterrupt {
    /// Make sure the handler runs soon to drain the transmit ring
    fn enable(&mut self);
}

impl<F: FnMut()> TxInterrupt for F {
    fn enable(&mut self) {
        self()
    }
}

/// Busy-wait limits for the blocking calls of [`SerialForeground`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Polls made by [`SerialForeground::read_blocking`] before giving up. `None` waits forever.
    pub read_timeout: Option<u32>,
    /// Polls made per byte by [`SerialForeground::write_blocking`] before giving up. `None`
    /// waits forever.
    pub write_timeout: Option<u32>,
}

impl Config {
    /// Give up reading after `polls` empty polls
    pub fn read_timeout(mut self, polls: u32) -> Self {
        self.read_timeout = Some(polls);
        self
    }

    /// Give up writing a byte after `polls` polls of a full transmit ring
    pub fn write_timeout(mut self, polls: u32) -> Self {
        self.write_timeout = Some(polls);
        self
    }
}

/// Received bytes dropped by the handler, and how many of those the foreground has seen.
///
/// Each counter has a single writer, so plain loads and stores are enough.
#[derive(Default)]
struct OverrunCounters {
    /// Stored only by [`SerialIsr`]
    dropped: AtomicU32,
    /// Stored only by [`SerialForeground`]
    acknowledged: AtomicU32,
}

/// Receive and transmit rings of one UART
pub struct Serial<'a> {
    /// Filled by the interrupt handler
    rx: RingBuffer<'a>,
    /// Drained by the interrupt handler
    tx: RingBuffer<'a>,
    /// Overrun bookkeeping shared by both halves
    overruns: OverrunCounters,
    /// Handed to the foreground half
    config: Config,
}

impl<'a> Serial<'a> {
    /// Bind receive and transmit storage. Each must hold 2 to 256 bytes.
    pub fn new(
        rx_storage: &'a mut [u8],
        tx_storage: &'a mut [u8],
        config: Config,
    ) -> Result<Self, ConfigError> {
        let rx = RingBuffer::new(rx_storage)?;
        let tx = RingBuffer::new(tx_storage)?;
        debug!(
            "serial transport ready: {} byte receive ring, {} byte transmit ring",
            rx.capacity(),
            tx.capacity()
        );

        Ok(Self {
            rx,
            tx,
            overruns: OverrunCounters::default(),
            config,
        })
    }

    /// Split into the interrupt handler half, driving `uart`, and the foreground half, which
    /// requests transmit interrupts through `kick`.
    pub fn split<U: Uart, K: TxInterrupt>(
        &mut self,
        uart: U,
        kick: K,
    ) -> (SerialIsr<'_, 'a, U, NoStatusLed>, SerialForeground<'_, 'a, K>) {
        let (rx_producer, rx_consumer) = self.rx.split();
        let (tx_producer, tx_consumer) = self.tx.split();
        let led = match StatusLed::init(NoStatusLed) {
            Ok(led) => led,
            Err(never) => match never {},
        };

        let isr = SerialIsr {
            uart,
            rx: rx_producer,
            tx: tx_consumer,
            overruns: &self.overruns,
            led,
            line_errors: 0,
        };
        let foreground = SerialForeground {
            rx: rx_consumer,
            tx: tx_producer,
            kick,
            overruns: &self.overruns,
            config: self.config,
        };
        (isr, foreground)
    }
}

/// Interrupt handler half of a [`Serial`]
pub struct SerialIsr<'s, 'a, U, L> {
    /// Hardware
    uart: U,
    /// Received bytes go here
    rx: Producer<'s, 'a>,
    /// Bytes to transmit come from here
    tx: Consumer<'s, 'a>,
    /// Shared with the foreground half
    overruns: &'s OverrunCounters,
    /// Lit while overruns are unacknowledged
    led: StatusLed<L>,
    /// Line errors reported by the UART
    line_errors: u32,
}

impl<'s, 'a, U: Uart, L: OutputPin> SerialIsr<'s, 'a, U, L> {
    /// Show unacknowledged overruns on `led`
    pub fn with_status_led<P: OutputPin>(self, led: StatusLed<P>) -> SerialIsr<'s, 'a, U, P> {
        SerialIsr {
            uart: self.uart,
            rx: self.rx,
            tx: self.tx,
            overruns: self.overruns,
            led,
            line_errors: self.line_errors,
        }
    }

    /// Service the UART. Call from its interrupt vector.
    ///
    /// Moves every received byte into the receive ring, then feeds the UART from the transmit
    /// ring until either runs out. The transmit interrupt is disabled once the ring is drained.
    pub fn on_interrupt(&mut self) {
        self.service_rx();
        self.service_tx();
        self.refresh_status();
    }

    /// Enable the transmit interrupt so the next [`Self::on_interrupt`] drains the ring
    pub fn request_tx(&mut self) {
        self.uart.set_tx_interrupt(true);
    }

    /// Line errors reported by the UART so far
    pub fn line_errors(&self) -> u32 {
        self.line_errors
    }

    /// Current state of the overrun indicator
    pub fn status(&self) -> StatusLedStates {
        self.led.state()
    }

    /// Access the hardware, e.g. to reconfigure it between interrupts
    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }

    /// Drain the receive data register into the receive ring.
    ///
    /// Makes at most one read per receive slot, so a line stuck reporting errors cannot hold
    /// the handler. Whatever is left raises the interrupt again.
    fn service_rx(&mut self) {
        for _ in 0..self.rx.capacity() {
            match self.uart.read() {
                Ok(byte) => {
                    #[cfg(feature = "trace_bytes")]
                    trace!("rx byte {}", byte);
                    if let Err(full) = self.rx.put(byte) {
                        self.record_overrun(full);
                    }
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_)) => {
                    self.line_errors = self.line_errors.wrapping_add(1);
                    warn!("UART line error, {} so far", self.line_errors);
                }
            }
        }
    }

    /// Feed the UART from the transmit ring
    fn service_tx(&mut self) {
        while let Ok(byte) = self.tx.peek() {
            match self.uart.write(byte) {
                Ok(()) => {
                    #[cfg(feature = "trace_bytes")]
                    trace!("tx byte {}", byte);
                    // Only this half consumes, so the peeked byte is still at the front
                    let sent = self.tx.get();
                    debug_assert_eq!(sent, Ok(byte));
                }
                Err(nb::Error::WouldBlock) => return,
                Err(nb::Error::Other(_)) => {
                    warn!("UART rejected a byte for transmission, retrying on next interrupt");
                    return;
                }
            }
        }
        self.uart.set_tx_interrupt(false);
    }

    /// Count a dropped byte and light the status LED
    fn record_overrun(&mut self, BufferFull(lost): BufferFull) {
        let dropped = self.overruns.dropped.load(Ordering::Relaxed).wrapping_add(1);
        self.overruns.dropped.store(dropped, Ordering::Release);
        warn!(
            "receive ring full, dropped byte {} ({} unread drops)",
            lost,
            dropped.wrapping_sub(self.overruns.acknowledged.load(Ordering::Acquire))
        );

        if self.led.set_overrun().is_err() {
            error!("Unable to light the overrun status LED");
        }
    }

    /// Turn the status LED off once the foreground has acknowledged every drop
    fn refresh_status(&mut self) {
        if self.led.state() == StatusLedStates::Overrun
            && self.overruns.acknowledged.load(Ordering::Acquire)
                == self.overruns.dropped.load(Ordering::Relaxed)
        {
            debug!("overruns acknowledged, clearing status LED");
            if self.led.set_normal().is_err() {
                error!("Unable to clear the overrun status LED");
            }
        }
    }
}

/// Main loop half of a [`Serial`]
pub struct SerialForeground<'s, 'a, K> {
    /// Received bytes come from here
    rx: Consumer<'s, 'a>,
    /// Bytes to transmit go here
    tx: Producer<'s, 'a>,
    /// Wakes the interrupt handler after queueing
    kick: K,
    /// Shared with the interrupt half
    overruns: &'s OverrunCounters,
    /// Busy-wait limits
    config: Config,
}

impl<K: TxInterrupt> SerialForeground<'_, '_, K> {
    /// Take the oldest received byte, or [`nb::Error::WouldBlock`] if none arrived yet.
    pub fn read(&mut self) -> nb::Result<u8, Infallible> {
        self.rx.get().map_err(|_| nb::Error::WouldBlock)
    }

    /// Spin until a byte arrives, for at most [`Config::read_timeout`] polls.
    pub fn read_blocking(&mut self) -> Result<u8, SerialError> {
        let limit = self.config.read_timeout;
        poll_until(limit, || self.read())
    }

    /// Move as many received bytes into `buf` as are waiting. Returns how many were read.
    pub fn read_into(&mut self, buf: &mut [u8]) -> usize {
        self.rx.read_into(buf)
    }

    /// Number of received bytes waiting to be read
    pub fn available(&self) -> usize {
        self.rx.len()
    }

    /// Queue `byte` for transmission, or [`nb::Error::WouldBlock`] if the transmit ring is full.
    pub fn write(&mut self, byte: u8) -> nb::Result<(), Infallible> {
        self.tx.put(byte).map_err(|_| nb::Error::WouldBlock)?;
        self.kick.enable();
        Ok(())
    }

    /// Spin until `byte` is queued, for at most [`Config::write_timeout`] polls.
    pub fn write_blocking(&mut self, byte: u8) -> Result<(), SerialError> {
        let limit = self.config.write_timeout;
        poll_until(limit, || self.write(byte))
    }

    /// Queue every byte of `bytes` in order, see [`Self::write_blocking`].
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        bytes
            .iter()
            .try_for_each(|&byte| self.write_blocking(byte))
    }

    /// The interrupt handler has taken every queued byte
    pub fn tx_idle(&self) -> bool {
        self.tx.is_empty()
    }

    /// Number of received bytes dropped since the last call. Once acknowledged, the next
    /// interrupt turns the status LED off.
    pub fn take_overruns(&mut self) -> u32 {
        let dropped = self.overruns.dropped.load(Ordering::Acquire);
        let acknowledged = self.overruns.acknowledged.load(Ordering::Relaxed);
        self.overruns.acknowledged.store(dropped, Ordering::Release);
        dropped.wrapping_sub(acknowledged)
    }

    /// Busy-wait limits in use
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl<K: TxInterrupt> fmt::Write for SerialForeground<'_, '_, K> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

/// Retry `attempt` until it stops blocking, or `limit` polls have been made.
fn poll_until<T>(
    limit: Option<u32>,
    mut attempt: impl FnMut() -> nb::Result<T, Infallible>,
) -> Result<T, SerialError> {
    let mut polls: u32 = 0;
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(nb::Error::WouldBlock) => {}
            Err(nb::Error::Other(never)) => match never {},
        }

        polls = polls.saturating_add(1);
        if limit.is_some_and(|limit| polls >= limit) {
            return Err(SerialError::Timeout { polls });
        }
        hint::spin_loop();
    }
}
