#![cfg_attr(target_arch = "avr", no_std, no_main, feature(abi_avr_interrupt))]

//! Heartbeat firmware: blinks the on-board LED from a 1 ms timer callback
//! and reports the tick count over the serial port.

#[cfg(target_arch = "avr")]
mod firmware {
    use core::cell::Cell;

    use critical_section::Mutex;
    use nano_fmt::{NanoDisplay, NanoWrite};
    use panic_halt as _;

    use timer_two::{
        SharedTimer, TimerTwo,
        clock::BoardClock,
        hal::{self, pac::TC2},
        led::Led,
        usart::Usart0,
    };

    /// UART baud rate.
    const BAUDRATE: u32 = 9600;

    /// Callback period (in microseconds).
    const PERIOD_US: u32 = 1000;

    /// Number of callbacks between LED toggles.
    const BLINK_EVERY: u16 = 500;

    static TIMER: SharedTimer<TC2, BoardClock> = SharedTimer::new();

    /// Callbacks since the last report.
    static TICKS: Mutex<Cell<u16>> = Mutex::new(Cell::new(0));

    /// Runs in interrupt context, keep it short.
    fn on_tick() {
        critical_section::with(|cs| {
            let ticks = TICKS.borrow(cs);
            ticks.set(ticks.get().wrapping_add(1));
        });
    }

    /// TIMER2 compare interrupt.
    /// Called every time TCNT2 reaches OCR2A and is reset back to 0 (CTC mode).
    #[avr_device::interrupt(atmega328p)]
    fn TIMER2_COMPA() {
        TIMER.on_compare_match();
    }

    fn newline<W: NanoWrite>(w: &mut W) {
        "\r\n".fmt(w);
    }

    #[hal::entry]
    fn main() -> ! {
        // Only called once, the peripherals cannot be taken already.
        let Some(dp) = hal::Peripherals::take() else {
            loop {}
        };
        let pins = hal::pins!(dp);

        let mut serial = Usart0::new(
            dp.USART0,
            pins.pd0.into_pull_up_input(),
            pins.pd1.into_output(),
            BAUDRATE,
        );
        let mut led = Led::new(pins.pb5.into_output());
        // Lit until the timer is running, stays lit if init fails.
        led.turn_on().ok();

        "timer-two heartbeat".fmt(&mut serial);
        newline(&mut serial);

        let mut timer = TimerTwo::<TC2, BoardClock>::new(dp.TC2);
        match timer.init(PERIOD_US, on_tick, true) {
            Ok(config) => config.fmt(&mut serial),
            Err(e) => {
                "init failed: ".fmt(&mut serial);
                e.fmt(&mut serial);
                newline(&mut serial);
                loop {}
            }
        }
        newline(&mut serial);

        timer.start();
        TIMER.install(timer);
        led.turn_off().ok();

        // SAFETY: Not inside a critical section and any non-atomic operations
        // have been completed at this point.
        unsafe { avr_device::interrupt::enable() };

        // Idle sleep keeps the timer running.
        dp.CPU.smcr.write(|w| w.sm().idle().se().set_bit());

        let mut total: u32 = 0;
        loop {
            avr_device::asm::sleep();

            let ticks = critical_section::with(|cs| TICKS.borrow(cs).replace(0));
            if ticks == 0 {
                continue;
            }

            let before = total / u32::from(BLINK_EVERY);
            total = total.wrapping_add(u32::from(ticks));
            if total / u32::from(BLINK_EVERY) != before {
                led.toggle().ok();
                "ticks=".fmt(&mut serial);
                total.fmt(&mut serial);
                newline(&mut serial);
            }
        }
    }
}

/// Host builds only compile the library and its tests.
#[cfg(not(target_arch = "avr"))]
fn main() {}
