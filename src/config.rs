//! Prescale and compare threshold selection for Timer/Counter 2.
//!
//! The timer runs in CTC mode with an 8-bit compare register, so one period
//! spans `top + 1` ticks with `top` in `0..=255`. The search picks the
//! smallest prescale that fits the requested period into 256 ticks, which
//! gives the best timing resolution.

use core::fmt;

use nano_fmt::{NanoDisplay, NanoWrite};

/// Number of counter steps available in one period.
const COUNTER_CAPACITY: u32 = 256;

/// Clock divisors supported by Timer/Counter 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Prescale {
    Direct,
    Div8,
    Div32,
    Div64,
    Div128,
    Div256,
    Div1024,
}

/// Prescale indexed by its base 2 logarithm. `None` marks unsupported divisors.
const PRESCALE_TABLE: [Option<Prescale>; 11] = [
    Some(Prescale::Direct),
    None,
    None,
    Some(Prescale::Div8),
    None,
    Some(Prescale::Div32),
    Some(Prescale::Div64),
    Some(Prescale::Div128),
    Some(Prescale::Div256),
    None,
    Some(Prescale::Div1024),
];

impl Prescale {
    /// All supported prescales, smallest first.
    pub const ALL: [Prescale; 7] = [
        Prescale::Direct,
        Prescale::Div8,
        Prescale::Div32,
        Prescale::Div64,
        Prescale::Div128,
        Prescale::Div256,
        Prescale::Div1024,
    ];

    /// Base 2 logarithm of the divisor.
    #[must_use]
    pub const fn shift(self) -> u8 {
        match self {
            Prescale::Direct => 0,
            Prescale::Div8 => 3,
            Prescale::Div32 => 5,
            Prescale::Div64 => 6,
            Prescale::Div128 => 7,
            Prescale::Div256 => 8,
            Prescale::Div1024 => 10,
        }
    }

    #[must_use]
    pub const fn divisor(self) -> u16 {
        1 << self.shift()
    }

    /// Value of the `CS22:0` clock select bits in `TCCR2B`.
    #[must_use]
    pub const fn select_bits(self) -> u8 {
        match self {
            Prescale::Direct => 0b001,
            Prescale::Div8 => 0b010,
            Prescale::Div32 => 0b011,
            Prescale::Div64 => 0b100,
            Prescale::Div128 => 0b101,
            Prescale::Div256 => 0b110,
            Prescale::Div1024 => 0b111,
        }
    }

    /// Inverse of [`Prescale::select_bits`]. Returns `None` for a stopped clock
    /// or an out of range value.
    #[must_use]
    pub const fn from_select_bits(bits: u8) -> Option<Self> {
        match bits {
            0b001 => Some(Prescale::Direct),
            0b010 => Some(Prescale::Div8),
            0b011 => Some(Prescale::Div32),
            0b100 => Some(Prescale::Div64),
            0b101 => Some(Prescale::Div128),
            0b110 => Some(Prescale::Div256),
            0b111 => Some(Prescale::Div1024),
            _ => None,
        }
    }
}

impl NanoDisplay for Prescale {
    fn fmt<F: NanoWrite>(self, f: &mut F) {
        self.divisor().fmt(f);
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The period does not fit into 256 ticks with any prescale.
    PeriodTooLong,
    /// A zero period has no compare threshold.
    ZeroPeriod,
}

impl Error {
    const fn as_str(self) -> &'static str {
        match self {
            Error::PeriodTooLong => "period too long",
            Error::ZeroPeriod => "zero period",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::error::Error for Error {}

impl NanoDisplay for Error {
    fn fmt<F: NanoWrite>(self, f: &mut F) {
        self.as_str().fmt(f);
    }
}

/// Register values for one periodic compare-match configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    prescale: Prescale,
    top: u8,
    period_us: u32,
}

impl TimerConfig {
    /// Select prescale and compare threshold for a period of `period_us`
    /// microseconds at a CPU clock of `clock_hz`.
    ///
    /// `clock_hz` must be a multiple of 1 MHz. The achieved period is the
    /// requested one truncated to a whole number of ticks at the selected
    /// prescale, so it never exceeds `period_us`.
    pub fn for_period(period_us: u32, clock_hz: u32) -> Result<Self, Error> {
        let ticks_per_us = clock_hz / 1_000_000;
        let ticks = period_us
            .checked_mul(ticks_per_us)
            .ok_or(Error::PeriodTooLong)?;
        if ticks == 0 {
            return Err(Error::ZeroPeriod);
        }

        let prescale = PRESCALE_TABLE
            .iter()
            .copied()
            .enumerate()
            .find_map(|(shift, prescale)| {
                prescale.filter(|_| (ticks >> shift) <= COUNTER_CAPACITY)
            })
            .ok_or(Error::PeriodTooLong)?;

        let shift = prescale.shift();
        let scaled = ticks >> shift;

        Ok(Self {
            prescale,
            // `scaled` is in 1..=256 here.
            top: (scaled - 1) as u8,
            period_us: (scaled << shift) / ticks_per_us,
        })
    }

    #[must_use]
    pub const fn prescale(&self) -> Prescale {
        self.prescale
    }

    /// Compare threshold written to `OCR2A`.
    #[must_use]
    pub const fn top(&self) -> u8 {
        self.top
    }

    /// Timer ticks in one period, at the selected prescale.
    #[must_use]
    pub const fn ticks(&self) -> u16 {
        self.top as u16 + 1
    }

    /// Achieved period in microseconds.
    #[must_use]
    pub const fn period_us(&self) -> u32 {
        self.period_us
    }
}

impl NanoDisplay for TimerConfig {
    fn fmt<F: NanoWrite>(self, f: &mut F) {
        "prescale=".fmt(f);
        self.prescale.fmt(f);
        " top=".fmt(f);
        self.top.fmt(f);
        " period_us=".fmt(f);
        self.period_us.fmt(f);
    }
}
