//! Periodic callback driver on top of Timer/Counter 2.
//!
//! [`TimerTwo`] owns the timer registers, so holding one is proof of
//! exclusive access to the peripheral. Firmware that dispatches from the
//! `TIMER2_COMPA` vector keeps it in a [`SharedTimer`] static:
//!
//! ```ignore
//! static TIMER: SharedTimer<pac::TC2, BoardClock> = SharedTimer::new();
//!
//! #[avr_device::interrupt(atmega328p)]
//! fn TIMER2_COMPA() {
//!     TIMER.on_compare_match();
//! }
//! ```
//!
//! # Callback context
//!
//! The callback runs inside the compare-match interrupt. It must be short,
//! must not block and must not allocate. While it runs, the timer's own
//! interrupt is masked, so a callback that never returns stops the timer
//! for good.

use core::{cell::RefCell, marker::PhantomData};

use critical_section::{CriticalSection, Mutex};

use crate::{
    clock::Clock,
    config::{Error, TimerConfig},
    regs::Registers,
};

/// Function invoked from interrupt context on every compare match.
pub type Callback = fn();

/// Driver state as seen by the interrupt handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Compare interrupt masked, either not started or stopped.
    Idle,
    /// Compare interrupt enabled, waiting for the next match.
    Armed,
    /// Interrupt sources masked, callback running. The timer is rearmed
    /// when the callback returns.
    Firing,
    /// Callback returned, counter and flag being restored.
    Rearming,
}

#[derive(Clone, Copy)]
struct Handler {
    callback: Callback,
    auto_reset: bool,
}

/// Periodic callback timer using the `TC2` peripheral.
///
/// Triggers the `TIMER2_COMPA` interrupt.
pub struct TimerTwo<R, C> {
    regs: R,
    config: Option<TimerConfig>,
    handler: Option<Handler>,
    state: State,
    in_callback: bool,
    _clock: PhantomData<C>,
}

impl<R: Registers, C: Clock> TimerTwo<R, C> {
    /// Take ownership of the timer registers.
    ///
    /// Nothing is written until [`TimerTwo::init`] is called.
    ///
    /// The CPU clock must be a whole number of MHz:
    ///
    /// ```compile_fail
    /// use timer_two::{TimerTwo, clock::Clock, sim::SimRegisters};
    ///
    /// struct KHz1500;
    ///
    /// impl Clock for KHz1500 {
    ///     const FREQ: u32 = 1_500_000;
    /// }
    ///
    /// let _timer = TimerTwo::<SimRegisters, KHz1500>::new(SimRegisters::new());
    /// ```
    pub fn new(regs: R) -> Self {
        const {
            assert!(
                C::FREQ >= 1_000_000 && C::FREQ % 1_000_000 == 0,
                "clock frequency must be a whole number of MHz"
            )
        };

        Self {
            regs,
            config: None,
            handler: None,
            state: State::Idle,
            in_callback: false,
            _clock: PhantomData,
        }
    }

    /// Configure the timer to call `callback` every `period_us`
    /// microseconds.
    ///
    /// With `auto_reset` set, the counter is cleared after each callback so
    /// time spent in the callback does not shorten the next period.
    ///
    /// The timer is left stopped; call [`TimerTwo::start`] to enable it.
    /// On error nothing is changed.
    pub fn init(
        &mut self,
        period_us: u32,
        callback: Callback,
        auto_reset: bool,
    ) -> Result<TimerConfig, Error> {
        let config = TimerConfig::for_period(period_us, C::FREQ)?;

        self.regs.disable_interrupts();
        self.regs.select_system_clock();
        self.regs.select_ctc_mode();
        self.regs.set_prescale(config.prescale());
        self.regs.set_compare(config.top());

        self.config = Some(config);
        self.handler = Some(Handler {
            callback,
            auto_reset,
        });
        self.state = State::Idle;

        Ok(config)
    }

    /// Enable the compare-match interrupt.
    ///
    /// Does nothing before a successful [`TimerTwo::init`] or when already
    /// started. From inside the callback the interrupt is enabled when the
    /// callback returns, after the counter reset.
    pub fn start(&mut self) {
        if self.handler.is_none() || self.state != State::Idle {
            return;
        }

        if self.in_callback {
            self.state = State::Firing;
        } else {
            self.regs.enable_compare_interrupt();
            self.state = State::Armed;
        }
    }

    /// Mask all timer interrupts.
    ///
    /// When called from the callback, the timer stays stopped after the
    /// callback returns unless the callback calls [`TimerTwo::start`] again.
    pub fn stop(&mut self) {
        self.regs.disable_interrupts();
        self.state = State::Idle;
    }

    /// Achieved period of the current configuration.
    #[must_use]
    pub fn period_us(&self) -> Option<u32> {
        self.config.map(|c| c.period_us())
    }

    #[must_use]
    pub fn config(&self) -> Option<TimerConfig> {
        self.config
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Stop the timer and give back the registers.
    pub fn release(mut self) -> R {
        self.stop();
        self.regs
    }

    /// Handle a compare match with exclusive access to the driver.
    ///
    /// The callback cannot reach the driver through this path. Use
    /// [`SharedTimer::on_compare_match`] if it needs to.
    pub fn on_compare_match(&mut self) {
        if let Some(callback) = self.fire() {
            callback();
            self.rearm();
        }
    }

    /// Armed -> Firing. Returns the callback to run.
    fn fire(&mut self) -> Option<Callback> {
        if self.state != State::Armed {
            return None;
        }
        let handler = self.handler?;

        // Mask the source before the callback so it cannot fire again.
        self.regs.disable_interrupts();
        self.state = State::Firing;
        self.in_callback = true;

        Some(handler.callback)
    }

    /// Firing -> Rearming -> Armed.
    fn rearm(&mut self) {
        self.in_callback = false;
        // Stopped or reconfigured from the callback.
        if self.state != State::Firing {
            return;
        }
        let Some(handler) = self.handler else {
            return;
        };

        self.state = State::Rearming;
        if handler.auto_reset {
            self.regs.reset_counter();
            // A match may have latched while the callback ran.
            self.regs.clear_compare_flag();
        }

        self.regs.enable_compare_interrupt();
        self.state = State::Armed;
    }
}

/// Interrupt-safe slot holding the one [`TimerTwo`] of the firmware.
pub struct SharedTimer<R, C>(Mutex<RefCell<Option<TimerTwo<R, C>>>>);

impl<R, C> SharedTimer<R, C> {
    /// Create an empty slot.
    pub const fn new() -> Self {
        Self(Mutex::new(RefCell::new(None)))
    }
}

impl<R, C> Default for SharedTimer<R, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Registers, C: Clock> SharedTimer<R, C> {
    /// Move the driver into the slot, returning the previous one.
    pub fn install(&self, timer: TimerTwo<R, C>) -> Option<TimerTwo<R, C>> {
        critical_section::with(|cs| self.0.borrow_ref_mut(cs).replace(timer))
    }

    /// Take the driver back out of the slot.
    pub fn take(&self) -> Option<TimerTwo<R, C>> {
        critical_section::with(|cs| self.0.borrow_ref_mut(cs).take())
    }

    /// Run `f` on the installed driver inside a critical section.
    ///
    /// Returns `None` if the slot is empty or already borrowed.
    pub fn lock<T>(&self, f: impl FnOnce(&mut TimerTwo<R, C>) -> T) -> Option<T> {
        critical_section::with(|cs| self.with_cs(cs, f))
    }

    fn with_cs<T>(
        &self,
        cs: CriticalSection<'_>,
        f: impl FnOnce(&mut TimerTwo<R, C>) -> T,
    ) -> Option<T> {
        let mut slot = self.0.borrow(cs).try_borrow_mut().ok()?;
        slot.as_mut().map(f)
    }

    /// Handle a compare match. Call this from the `TIMER2_COMPA` vector.
    ///
    /// The slot is not borrowed while the callback runs, so the callback
    /// may call [`SharedTimer::lock`] to stop or reconfigure the timer.
    pub fn on_compare_match(&self) {
        let Some(callback) = self.lock(TimerTwo::fire).flatten() else {
            return;
        };

        callback();

        // The critical section masks interrupts again in case the callback
        // enabled them, so the counter and flag are restored without racing
        // another match.
        self.lock(TimerTwo::rearm);
    }
}
