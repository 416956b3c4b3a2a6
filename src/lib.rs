#![no_std]

#[cfg(test)]
extern crate std;

pub mod clock;
pub mod config;
pub mod driver;
pub mod led;
pub mod regs;
#[cfg(not(target_arch = "avr"))]
pub mod sim;
#[cfg(target_arch = "avr")]
pub mod usart;

#[cfg(target_arch = "avr")]
pub use atmega_hal as hal;

pub use config::{Error, Prescale, TimerConfig};
pub use driver::{Callback, SharedTimer, State, TimerTwo};
