//! Simulated Timer/Counter 2 for host builds.
//!
//! Models the subset of the register file the driver touches: the counter
//! advances once per tick in CTC mode, a match latches `OCF2A`, and an
//! interrupt is only dispatched while `OCIE2A` is set.

use crate::{
    clock::Clock,
    config::Prescale,
    driver::SharedTimer,
    regs::Registers,
};

/// `WGM21` in `TCCR2A`.
pub const WGM21: u8 = 1 << 1;
/// `AS2` in `ASSR`.
pub const AS2: u8 = 1 << 5;
/// `OCIE2A` in `TIMSK2`.
pub const OCIE2A: u8 = 1 << 1;
/// `OCF2A` in `TIFR2`.
pub const OCF2A: u8 = 1 << 1;

const CS2_MASK: u8 = 0b111;

/// Register file of a simulated Timer/Counter 2.
#[derive(Debug, Clone, Default)]
pub struct SimRegisters {
    pub tccr2a: u8,
    pub tccr2b: u8,
    pub assr: u8,
    pub ocr2a: u8,
    pub tcnt2: u8,
    pub timsk2: u8,
    pub tifr2: u8,
    cycles: u64,
}

impl SimRegisters {
    /// Registers in their reset state.
    pub const fn new() -> Self {
        Self {
            tccr2a: 0,
            tccr2b: 0,
            assr: 0,
            ocr2a: 0,
            tcnt2: 0,
            timsk2: 0,
            tifr2: 0,
            cycles: 0,
        }
    }

    /// Prescale currently selected, `None` while the timer clock is stopped.
    pub fn prescale(&self) -> Option<Prescale> {
        Prescale::from_select_bits(self.tccr2b & CS2_MASK)
    }

    pub fn compare_interrupt_enabled(&self) -> bool {
        self.timsk2 & OCIE2A != 0
    }

    pub fn compare_flag(&self) -> bool {
        self.tifr2 & OCF2A != 0
    }

    pub fn ctc_mode(&self) -> bool {
        self.tccr2a == WGM21
    }

    pub fn uses_system_clock(&self) -> bool {
        self.assr & AS2 == 0
    }

    /// CPU cycles elapsed since creation.
    pub fn now(&self) -> u64 {
        self.cycles
    }

    /// Advance by one timer tick.
    ///
    /// Returns `true` when a compare-match interrupt should be dispatched.
    /// Dispatching clears `OCF2A`, as the hardware does on vector entry.
    pub fn tick(&mut self) -> bool {
        let Some(prescale) = self.prescale() else {
            return false;
        };
        self.cycles += u64::from(prescale.divisor());

        if self.tcnt2 == self.ocr2a {
            self.tcnt2 = 0;
            self.tifr2 |= OCF2A;
        } else {
            self.tcnt2 = self.tcnt2.wrapping_add(1);
        }

        self.take_pending()
    }

    /// Dispatch a latched compare match if its interrupt is enabled.
    pub fn take_pending(&mut self) -> bool {
        if self.compare_flag() && self.compare_interrupt_enabled() {
            self.tifr2 &= !OCF2A;
            true
        } else {
            false
        }
    }
}

impl Registers for SimRegisters {
    fn disable_interrupts(&mut self) {
        self.timsk2 = 0;
    }

    fn enable_compare_interrupt(&mut self) {
        self.timsk2 |= OCIE2A;
    }

    fn select_system_clock(&mut self) {
        self.assr &= !AS2;
    }

    fn select_ctc_mode(&mut self) {
        self.tccr2a = WGM21;
    }

    fn set_prescale(&mut self, prescale: Prescale) {
        self.tccr2b = prescale.select_bits();
    }

    fn set_compare(&mut self, top: u8) {
        self.ocr2a = top;
    }

    fn reset_counter(&mut self) {
        self.tcnt2 = 0;
    }

    fn clear_compare_flag(&mut self) {
        self.tifr2 &= !OCF2A;
    }
}

impl<C: Clock> SharedTimer<SimRegisters, C> {
    /// Advance the simulated timer by `ticks`, running the interrupt handler
    /// whenever a compare match is dispatched.
    ///
    /// Returns the number of dispatched interrupts.
    pub fn run_ticks(&self, ticks: u32) -> u32 {
        let mut dispatched = 0;

        for _ in 0..ticks {
            let due = self
                .lock(|timer| timer.registers_mut().tick())
                .unwrap_or(false);
            if due {
                self.on_compare_match();
                dispatched += 1;
            }
        }

        dispatched
    }

    /// Run the interrupt handler if a compare match is pending and enabled.
    pub fn dispatch_pending(&self) -> bool {
        let due = self
            .lock(|timer| timer.registers_mut().take_pending())
            .unwrap_or(false);
        if due {
            self.on_compare_match();
        }
        due
    }
}
