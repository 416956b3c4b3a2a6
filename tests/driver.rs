//! Driver behavior against the simulated Timer/Counter 2.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use timer_two::{
    Error, Prescale, SharedTimer, State, TimerTwo, clock::MHz16, sim::SimRegisters,
};

type SimTimer = TimerTwo<SimRegisters, MHz16>;

fn noop() {}

#[test]
fn init_programs_ctc_mode() {
    let mut timer = SimTimer::new(SimRegisters::new());
    let config = timer.init(1000, noop, true).unwrap();

    assert_eq!(config.prescale(), Prescale::Div64);
    assert_eq!(config.top(), 249);
    assert_eq!(timer.period_us(), Some(1000));
    assert_eq!(timer.state(), State::Idle);

    let regs = timer.registers();
    assert!(regs.ctc_mode());
    assert!(regs.uses_system_clock());
    assert_eq!(regs.prescale(), Some(Prescale::Div64));
    assert_eq!(regs.ocr2a, 249);
    // init leaves the timer stopped.
    assert!(!regs.compare_interrupt_enabled());
}

#[test]
fn init_selects_system_clock() {
    let mut regs = SimRegisters::new();
    regs.assr = timer_two::sim::AS2;
    regs.timsk2 = 0b111;

    let mut timer = SimTimer::new(regs);
    timer.init(500, noop, false).unwrap();
    assert!(timer.registers().uses_system_clock());
    assert_eq!(timer.registers().timsk2, 0);
}

#[test]
fn failed_init_keeps_previous_configuration() {
    let mut timer = SimTimer::new(SimRegisters::new());
    timer.init(1000, noop, true).unwrap();
    timer.start();

    assert_eq!(timer.init(20_000, noop, true), Err(Error::PeriodTooLong));
    assert_eq!(timer.period_us(), Some(1000));
    assert_eq!(timer.registers().ocr2a, 249);
    assert_eq!(timer.state(), State::Armed);
    assert!(timer.registers().compare_interrupt_enabled());
}

#[test]
fn start_requires_init() {
    let mut timer = SimTimer::new(SimRegisters::new());
    timer.start();
    assert_eq!(timer.state(), State::Idle);
    assert!(!timer.registers().compare_interrupt_enabled());
}

#[test]
fn start_and_stop_are_idempotent() {
    let mut timer = SimTimer::new(SimRegisters::new());
    timer.init(1000, noop, true).unwrap();

    timer.start();
    timer.start();
    assert_eq!(timer.state(), State::Armed);
    assert_eq!(timer.registers().timsk2, timer_two::sim::OCIE2A);

    timer.stop();
    let once = timer.registers().clone();
    timer.stop();
    assert_eq!(timer.state(), State::Idle);
    assert_eq!(timer.registers().timsk2, once.timsk2);
    assert!(!timer.registers().compare_interrupt_enabled());
}

#[test]
fn stop_clears_every_interrupt_source() {
    let mut timer = SimTimer::new(SimRegisters::new());
    timer.init(1000, noop, true).unwrap();
    timer.start();
    // Overflow and compare B enabled behind the driver's back.
    timer.registers_mut().timsk2 |= 0b101;

    timer.stop();
    assert_eq!(timer.registers().timsk2, 0);
}

static PERIODIC: SharedTimer<SimRegisters, MHz16> = SharedTimer::new();
static PERIODIC_HITS: AtomicU32 = AtomicU32::new(0);

fn count_periodic() {
    PERIODIC_HITS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn callback_runs_once_per_period() {
    let mut timer = SimTimer::new(SimRegisters::new());
    timer.init(1000, count_periodic, true).unwrap();
    timer.start();
    PERIODIC.install(timer);

    // 250 ticks at clk/64 per millisecond.
    assert_eq!(PERIODIC.run_ticks(249), 0);
    assert_eq!(PERIODIC.run_ticks(1), 1);
    assert_eq!(PERIODIC.run_ticks(2500), 10);
    assert_eq!(PERIODIC_HITS.load(Ordering::SeqCst), 11);

    let now = PERIODIC.lock(|t| t.registers().now()).unwrap();
    assert_eq!(now, 2750 * 64);

    PERIODIC.lock(|t| t.stop());
    assert_eq!(PERIODIC.run_ticks(1000), 0);
    assert_eq!(PERIODIC_HITS.load(Ordering::SeqCst), 11);

    // Restart after stop.
    PERIODIC.lock(|t| t.start());
    assert!(PERIODIC.run_ticks(250) >= 1);
}

static SERIAL: SharedTimer<SimRegisters, MHz16> = SharedTimer::new();
static SERIAL_LOG: Mutex<Vec<(u64, u64)>> = Mutex::new(Vec::new());

/// Simulated work longer than one period.
const WORK_TICKS: u32 = 300;

fn slow_callback() {
    let (start, end) = SERIAL
        .lock(|t| {
            assert_eq!(t.state(), State::Firing);
            assert!(!t.registers().compare_interrupt_enabled());

            let start = t.registers().now();
            for _ in 0..WORK_TICKS {
                // Matches latch the flag but cannot dispatch.
                assert!(!t.registers_mut().tick());
            }
            (start, t.registers().now())
        })
        .unwrap();

    // A nested dispatch attempt is ignored while firing.
    assert!(!SERIAL.dispatch_pending());
    SERIAL.on_compare_match();

    SERIAL_LOG.lock().unwrap().push((start, end));
}

#[test]
fn callbacks_never_overlap() {
    let mut timer = SimTimer::new(SimRegisters::new());
    timer.init(1000, slow_callback, true).unwrap();
    timer.start();
    SERIAL.install(timer);

    let dispatched = SERIAL.run_ticks(5000);
    assert!(dispatched > 1);

    let log = SERIAL_LOG.lock().unwrap();
    assert_eq!(log.len() as u32, dispatched);
    for pair in log.windows(2) {
        let (_, prev_end) = pair[0];
        let (next_start, _) = pair[1];
        assert!(next_start >= prev_end);
    }

    SERIAL
        .lock(|t| {
            assert_eq!(t.state(), State::Armed);
            assert!(t.registers().compare_interrupt_enabled());
        })
        .unwrap();
}

static RESET: SharedTimer<SimRegisters, MHz16> = SharedTimer::new();

fn reset_work() {
    RESET
        .lock(|t| {
            for _ in 0..WORK_TICKS {
                t.registers_mut().tick();
            }
            assert!(t.registers().compare_flag());
        })
        .unwrap();
}

#[test]
fn auto_reset_clears_counter_and_latched_flag() {
    let mut timer = SimTimer::new(SimRegisters::new());
    timer.init(1000, reset_work, true).unwrap();
    timer.start();
    RESET.install(timer);

    assert_eq!(RESET.run_ticks(250), 1);

    RESET
        .lock(|t| {
            let regs = t.registers();
            assert_eq!(t.state(), State::Armed);
            assert!(regs.compare_interrupt_enabled());
            assert_eq!(regs.tcnt2, 0);
            assert!(!regs.compare_flag());
        })
        .unwrap();

    // No spurious re-fire, the next match is a full period away.
    assert!(!RESET.dispatch_pending());
    assert_eq!(RESET.run_ticks(249), 0);
    assert_eq!(RESET.run_ticks(1), 1);
}

static LATCH: SharedTimer<SimRegisters, MHz16> = SharedTimer::new();
static LATCH_HITS: AtomicU32 = AtomicU32::new(0);

fn latch_work() {
    LATCH_HITS.fetch_add(1, Ordering::SeqCst);
    LATCH
        .lock(|t| {
            for _ in 0..WORK_TICKS {
                t.registers_mut().tick();
            }
        })
        .unwrap();
}

#[test]
fn without_reset_latched_match_fires_on_rearm() {
    let mut timer = SimTimer::new(SimRegisters::new());
    timer.init(1000, latch_work, false).unwrap();
    timer.start();
    LATCH.install(timer);

    assert_eq!(LATCH.run_ticks(250), 1);

    LATCH
        .lock(|t| {
            let regs = t.registers();
            assert!(regs.compare_interrupt_enabled());
            // Counter kept running through the callback.
            assert_eq!(regs.tcnt2, (WORK_TICKS - 250) as u8);
            assert!(regs.compare_flag());
        })
        .unwrap();

    assert!(LATCH.dispatch_pending());
    assert_eq!(LATCH_HITS.load(Ordering::SeqCst), 2);
}

static ONESHOT: SharedTimer<SimRegisters, MHz16> = SharedTimer::new();
static ONESHOT_HITS: AtomicU32 = AtomicU32::new(0);

fn stop_from_callback() {
    ONESHOT_HITS.fetch_add(1, Ordering::SeqCst);
    ONESHOT.lock(|t| t.stop()).unwrap();
}

#[test]
fn stop_inside_callback_is_honored() {
    let mut timer = SimTimer::new(SimRegisters::new());
    timer.init(100, stop_from_callback, true).unwrap();
    timer.start();
    ONESHOT.install(timer);

    ONESHOT.run_ticks(10_000);
    assert_eq!(ONESHOT_HITS.load(Ordering::SeqCst), 1);

    ONESHOT
        .lock(|t| {
            assert_eq!(t.state(), State::Idle);
            assert!(!t.registers().compare_interrupt_enabled());
        })
        .unwrap();
}

static OWNED_HITS: AtomicU32 = AtomicU32::new(0);

fn count_owned() {
    OWNED_HITS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn exclusive_handler_rearms() {
    let mut timer = SimTimer::new(SimRegisters::new());
    timer.init(1000, count_owned, true).unwrap();

    // Not started: a stray call does nothing.
    timer.on_compare_match();
    assert_eq!(OWNED_HITS.load(Ordering::SeqCst), 0);

    timer.start();
    timer.on_compare_match();
    assert_eq!(OWNED_HITS.load(Ordering::SeqCst), 1);
    assert_eq!(timer.state(), State::Armed);
    assert!(timer.registers().compare_interrupt_enabled());

    let regs = timer.release();
    assert_eq!(regs.timsk2, 0);
}

static EMPTY: SharedTimer<SimRegisters, MHz16> = SharedTimer::new();

#[test]
fn empty_slot_ignores_interrupts() {
    EMPTY.on_compare_match();
    assert_eq!(EMPTY.run_ticks(10), 0);
    assert!(EMPTY.lock(|t| t.state()).is_none());

    let mut timer = SimTimer::new(SimRegisters::new());
    timer.init(1000, noop, true).unwrap();
    assert!(EMPTY.install(timer).is_none());
    assert!(EMPTY.take().is_some());
    assert!(EMPTY.take().is_none());
}

static REINIT: SharedTimer<SimRegisters, MHz16> = SharedTimer::new();
static REINIT_HITS: AtomicU32 = AtomicU32::new(0);

fn init_from_callback() {
    REINIT_HITS.fetch_add(1, Ordering::SeqCst);
    REINIT
        .lock(|t| t.init(500, init_from_callback, true).unwrap())
        .unwrap();
}

#[test]
fn init_inside_callback_leaves_timer_stopped() {
    let mut timer = SimTimer::new(SimRegisters::new());
    timer.init(1000, init_from_callback, true).unwrap();
    timer.start();
    REINIT.install(timer);

    REINIT.run_ticks(10_000);
    assert_eq!(REINIT_HITS.load(Ordering::SeqCst), 1);

    REINIT
        .lock(|t| {
            assert_eq!(t.state(), State::Idle);
            assert!(!t.registers().compare_interrupt_enabled());
            assert_eq!(t.period_us(), Some(500));
            // 8000 ticks at clk/32.
            assert_eq!(t.registers().ocr2a, 249);
            assert_eq!(t.registers().prescale(), Some(Prescale::Div32));
        })
        .unwrap();
}

static RESTART: SharedTimer<SimRegisters, MHz16> = SharedTimer::new();
static RESTART_HITS: AtomicU32 = AtomicU32::new(0);

fn restart_from_callback() {
    RESTART_HITS.fetch_add(1, Ordering::SeqCst);
    RESTART
        .lock(|t| {
            for _ in 0..WORK_TICKS {
                t.registers_mut().tick();
            }
            t.stop();
            t.start();
            // Still masked until the callback returns.
            assert_eq!(t.state(), State::Firing);
            assert!(!t.registers().compare_interrupt_enabled());
        })
        .unwrap();
}

#[test]
fn restart_inside_callback_still_resets_counter() {
    let mut timer = SimTimer::new(SimRegisters::new());
    timer.init(1000, restart_from_callback, true).unwrap();
    timer.start();
    RESTART.install(timer);

    assert_eq!(RESTART.run_ticks(250), 1);

    RESTART
        .lock(|t| {
            let regs = t.registers();
            assert_eq!(t.state(), State::Armed);
            assert!(regs.compare_interrupt_enabled());
            assert_eq!(regs.tcnt2, 0);
            assert!(!regs.compare_flag());
        })
        .unwrap();

    assert!(!RESTART.dispatch_pending());
    assert_eq!(RESTART_HITS.load(Ordering::SeqCst), 1);
    assert_eq!(RESTART.run_ticks(249), 0);
    assert_eq!(RESTART.run_ticks(1), 1);
}

static REINIT_START: SharedTimer<SimRegisters, MHz16> = SharedTimer::new();
static REINIT_START_HITS: AtomicU32 = AtomicU32::new(0);

fn reinit_and_start() {
    REINIT_START_HITS.fetch_add(1, Ordering::SeqCst);
    REINIT_START
        .lock(|t| {
            for _ in 0..WORK_TICKS {
                t.registers_mut().tick();
            }
            t.init(1000, reinit_and_start, true).unwrap();
            t.start();
        })
        .unwrap();
}

#[test]
fn reinit_and_start_inside_callback_resets_counter() {
    let mut timer = SimTimer::new(SimRegisters::new());
    timer.init(1000, reinit_and_start, true).unwrap();
    timer.start();
    REINIT_START.install(timer);

    assert_eq!(REINIT_START.run_ticks(250), 1);

    REINIT_START
        .lock(|t| {
            assert_eq!(t.state(), State::Armed);
            assert_eq!(t.registers().tcnt2, 0);
            assert!(!t.registers().compare_flag());
        })
        .unwrap();

    assert!(!REINIT_START.dispatch_pending());
    assert_eq!(REINIT_START_HITS.load(Ordering::SeqCst), 1);
}
