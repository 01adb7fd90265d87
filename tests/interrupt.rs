use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use uart_ring::{
    components::{NoStatusLed, StatusLedStates},
    interrupt::{install, isr_cell, uninstall, with_installed, IsrCell, IsrKick},
    serial::{Config, Serial, SerialIsr, Uart},
};

/// UART whose transmitter is wired back to its receiver
#[derive(Default)]
struct Loopback {
    wire: VecDeque<u8>,
    tx_interrupt: bool,
}

impl Uart for Loopback {
    type Error = ();

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.wire.pop_front().ok_or(nb::Error::WouldBlock)
    }

    fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        self.wire.push_back(byte);
        Ok(())
    }

    fn set_tx_interrupt(&mut self, enabled: bool) {
        self.tx_interrupt = enabled;
    }
}

type LoopbackIsr = SerialIsr<'static, 'static, Loopback, NoStatusLed>;

fn leaked_serial(rx: usize, tx: usize, config: Config) -> &'static mut Serial<'static> {
    let rx = vec![0u8; rx].leak();
    let tx = vec![0u8; tx].leak();
    Box::leak(Box::new(Serial::new(rx, tx, config).unwrap()))
}

#[test]
fn install_replace_and_uninstall() {
    static CELL: IsrCell<u32> = isr_cell();

    assert_eq!(with_installed(&CELL, |value| *value), None);
    assert_eq!(install(&CELL, 1), None);
    assert_eq!(install(&CELL, 2), Some(1));
    assert_eq!(
        with_installed(&CELL, |value| {
            *value += 1;
            *value
        }),
        Some(3)
    );
    assert_eq!(uninstall(&CELL), Some(3));
    assert_eq!(uninstall(&CELL), None);
}

#[test]
fn kick_enables_installed_handler_tx_interrupt() {
    static ISR: IsrCell<LoopbackIsr> = isr_cell();

    let serial = leaked_serial(8, 8, Config::default());
    let (isr, mut foreground) = serial.split(Loopback::default(), IsrKick::new(&ISR));

    // Nothing installed yet: the byte is queued, the kick is dropped
    foreground.write(b'x').unwrap();
    assert!(install(&ISR, isr).is_none());
    assert_eq!(with_installed(&ISR, |isr| isr.uart_mut().tx_interrupt), Some(false));

    foreground.write(b'y').unwrap();
    assert_eq!(with_installed(&ISR, |isr| isr.uart_mut().tx_interrupt), Some(true));

    // Transmit both, then receive them back on the next interrupt
    with_installed(&ISR, |isr| isr.on_interrupt());
    assert_eq!(with_installed(&ISR, |isr| isr.uart_mut().tx_interrupt), Some(false));
    with_installed(&ISR, |isr| isr.on_interrupt());
    assert_eq!(foreground.read(), Ok(b'x'));
    assert_eq!(foreground.read(), Ok(b'y'));
    assert!(foreground.tx_idle());

    let isr = uninstall(&ISR).unwrap();
    assert_eq!(isr.status(), StatusLedStates::Normal);
}

#[test]
fn handler_thread_echoes_foreground_writes() {
    const TOTAL: usize = 20_000;

    let (mut rx, mut tx) = ([0u8; 32], [0u8; 32]);
    let mut serial = Serial::new(&mut rx, &mut tx, Config::default()).unwrap();
    let (mut isr, mut foreground) = serial.split(Loopback::default(), || {});
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        let done = &done;
        // Stands in for the interrupt: services the UART until the foreground is finished
        s.spawn(move || {
            while !done.load(Ordering::Acquire) {
                isr.on_interrupt();
            }
            assert_eq!(isr.line_errors(), 0);
            assert_eq!(isr.status(), StatusLedStates::Normal);
        });

        for i in 0..TOTAL {
            foreground.write_blocking(i as u8).unwrap();
            assert_eq!(foreground.read_blocking(), Ok(i as u8));
        }
        assert_eq!(foreground.take_overruns(), 0);
        done.store(true, Ordering::Release);
    });
}
