//! Register level access to Timer/Counter 2.

use crate::config::Prescale;

/// Register effects used by the driver.
///
/// Each method maps to one write of the `TC2` register file.
pub trait Registers {
    /// Clear `TIMSK2`, masking every timer 2 interrupt source.
    fn disable_interrupts(&mut self);

    /// Set `OCIE2A` in `TIMSK2`.
    fn enable_compare_interrupt(&mut self);

    /// Clock the timer from the internal I/O clock rather than the
    /// asynchronous oscillator (clear `AS2` in `ASSR`).
    fn select_system_clock(&mut self);

    /// Clear Timer on Compare Match mode (`WGM21` only in `TCCR2A`).
    fn select_ctc_mode(&mut self);

    /// Write the clock select bits of `TCCR2B`.
    fn set_prescale(&mut self, prescale: Prescale);

    /// Write `OCR2A`.
    fn set_compare(&mut self, top: u8);

    /// Write zero to `TCNT2`.
    fn reset_counter(&mut self);

    /// Clear a pending `OCF2A` flag in `TIFR2`.
    fn clear_compare_flag(&mut self);
}

#[cfg(target_arch = "avr")]
impl Registers for crate::hal::pac::TC2 {
    fn disable_interrupts(&mut self) {
        self.timsk2.reset();
    }

    fn enable_compare_interrupt(&mut self) {
        self.timsk2.modify(|_, w| w.ocie2a().set_bit());
    }

    fn select_system_clock(&mut self) {
        self.assr.modify(|_, w| w.as2().clear_bit());
    }

    fn select_ctc_mode(&mut self) {
        self.tccr2a.write(|w| w.wgm2().ctc());
    }

    fn set_prescale(&mut self, prescale: Prescale) {
        self.tccr2b.write(|w| match prescale {
            Prescale::Direct => w.cs2().direct(),
            Prescale::Div8 => w.cs2().prescale_8(),
            Prescale::Div32 => w.cs2().prescale_32(),
            Prescale::Div64 => w.cs2().prescale_64(),
            Prescale::Div128 => w.cs2().prescale_128(),
            Prescale::Div256 => w.cs2().prescale_256(),
            Prescale::Div1024 => w.cs2().prescale_1024(),
        });
    }

    fn set_compare(&mut self, top: u8) {
        self.ocr2a.write(|w| unsafe { w.bits(top) });
    }

    fn reset_counter(&mut self) {
        self.tcnt2.write(|w| unsafe { w.bits(0) });
    }

    fn clear_compare_flag(&mut self) {
        // Flags are cleared by writing one.
        self.tifr2.write(|w| w.ocf2a().set_bit());
    }
}
