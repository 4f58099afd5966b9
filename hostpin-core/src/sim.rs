//! Simulated pins
//!
//! [`SimPin`] implements every capability in memory, for tests and for
//! developing on a machine without GPIO hardware. Time is virtual: streaming
//! calls return immediately and advance [`SimPin::elapsed`] by the duration
//! they would have taken.
//!
//! Output playback is recorded as `(level, hold)` runs, merged when adjacent
//! runs share a level. Input capture samples a scripted waveform set with
//! [`SimPin::script_input`]. [`SimPin::inject`] changes the input level from
//! another thread and wakes [`PinIn::wait_for_edge`] when the transition
//! matches the configured edge.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hostpin_hal::gpio::{
    Edge, GpioError, Pin, PinDefaultPull, PinIn, PinOut, PinPwm, PinStreamIn, PinStreamOut, Pull,
};
use hostpin_hal::stream::{BitStream, Program, StreamError};
use hostpin_hal::{Duty, Level, DUTY_MAX};
use tracing::debug;

use crate::host::{Driver, DriverError};
use crate::registry::Registry;

/// Limits a simulated pin enforces, mirroring real controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimCaps {
    /// Finest streaming tick
    pub min_resolution: Duration,
    /// Playback cannot change clock mid-program
    pub single_clock: bool,
    /// Pull resistors can be configured
    pub pulls: bool,
    /// Pull at reset
    pub default_pull: Pull,
}

impl Default for SimCaps {
    fn default() -> Self {
        Self {
            min_resolution: Duration::from_micros(1),
            single_clock: false,
            pulls: true,
            default_pull: Pull::Down,
        }
    }
}

/// Current function of a simulated pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Unset,
    In,
    Out,
    Pwm { duty: Duty, freq_hz: u32 },
}

#[derive(Debug)]
struct SimState {
    level: Level,
    function: Function,
    pull: Pull,
    edge: Edge,
    /// Matching edges not yet consumed by `wait_for_edge`
    pending_edges: u64,
    /// Scripted input for `stream_in`
    script: Vec<(Level, Duration)>,
    /// Output runs from `stream_out`
    history: Vec<(Level, Duration)>,
    elapsed: Duration,
}

/// In-memory pin with every capability
#[derive(Debug)]
pub struct SimPin {
    name: String,
    number: Option<u32>,
    caps: SimCaps,
    state: Mutex<SimState>,
    edge: Condvar,
}

impl SimPin {
    /// Create a pin with default limits
    pub fn new(name: &str, number: Option<u32>) -> Self {
        Self::with_caps(name, number, SimCaps::default())
    }

    /// Create a pin with explicit limits
    pub fn with_caps(name: &str, number: Option<u32>, caps: SimCaps) -> Self {
        Self {
            name: name.to_owned(),
            number,
            caps,
            state: Mutex::new(SimState {
                level: Level::Low,
                function: Function::Unset,
                pull: caps.default_pull,
                edge: Edge::None,
                pending_edges: 0,
                script: Vec::new(),
                history: Vec::new(),
                elapsed: Duration::ZERO,
            }),
            edge: Condvar::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drive the input externally, as if a signal arrived on the pin
    pub fn inject(&self, level: Level) {
        let mut state = self.state();
        let previous = state.level;
        state.level = level;
        if state.function == Function::In && state.edge.matches(previous, level) {
            state.pending_edges += 1;
            self.edge.notify_all();
        }
    }

    /// Waveform sampled by the next `stream_in`, as `(level, hold)` runs
    ///
    /// Samples past the end of the script read the last scripted level.
    pub fn script_input(&self, runs: Vec<(Level, Duration)>) {
        self.state().script = runs;
    }

    /// Runs played by `stream_out` so far
    pub fn history(&self) -> Vec<(Level, Duration)> {
        self.state().history.clone()
    }

    /// Forget recorded output runs
    pub fn clear_history(&self) {
        self.state().history.clear();
    }

    /// Virtual time spent streaming
    pub fn elapsed(&self) -> Duration {
        self.state().elapsed
    }

    fn check_pull(&self, pull: Pull) -> Result<(), GpioError> {
        match pull {
            Pull::Up | Pull::Down if !self.caps.pulls => Err(GpioError::UnsupportedConfiguration),
            _ => Ok(()),
        }
    }

    fn check_resolution(&self, res: Duration) -> Result<(), StreamError> {
        if res.is_zero() {
            Err(StreamError::ZeroResolution)
        } else if res < self.caps.min_resolution {
            Err(StreamError::ResolutionTooFine)
        } else {
            Ok(())
        }
    }
}

impl Pin for SimPin {
    fn name(&self) -> &str {
        &self.name
    }

    fn number(&self) -> Option<u32> {
        self.number
    }

    fn function(&self) -> String {
        let state = self.state();
        match state.function {
            Function::Unset => String::from("Unset"),
            Function::In => format!("In/{}", state.level),
            Function::Out => format!("Out/{}", state.level),
            Function::Pwm { duty, freq_hz } => format!("PWM({}@{}Hz)", duty, freq_hz),
        }
    }

    fn read(&self) -> Level {
        self.state().level
    }

    fn as_in(&self) -> Option<&dyn PinIn> {
        Some(self)
    }

    fn as_out(&self) -> Option<&dyn PinOut> {
        Some(self)
    }

    fn as_pwm(&self) -> Option<&dyn PinPwm> {
        Some(self)
    }

    fn as_stream_in(&self) -> Option<&dyn PinStreamIn> {
        Some(self)
    }

    fn as_stream_out(&self) -> Option<&dyn PinStreamOut> {
        Some(self)
    }

    fn as_default_pull(&self) -> Option<&dyn PinDefaultPull> {
        Some(self)
    }
}

impl PinIn for SimPin {
    fn set_in(&self, pull: Pull, edge: Edge) -> Result<(), GpioError> {
        self.check_pull(pull)?;
        let mut state = self.state();
        if pull != Pull::NoChange {
            state.pull = pull;
        }
        state.function = Function::In;
        state.edge = edge;
        state.pending_edges = 0;
        Ok(())
    }

    fn wait_for_edge(&self, timeout: Option<Duration>) -> bool {
        let state = self.state();
        let mut state = match timeout {
            None => self
                .edge
                .wait_while(state, |s| s.pending_edges == 0)
                .unwrap_or_else(PoisonError::into_inner),
            Some(timeout) => {
                self.edge
                    .wait_timeout_while(state, timeout, |s| s.pending_edges == 0)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
        };
        if state.pending_edges == 0 {
            return false;
        }
        state.pending_edges -= 1;
        true
    }

    fn pull(&self) -> Pull {
        self.state().pull
    }
}

impl PinOut for SimPin {
    fn set_out(&self, level: Level) -> Result<(), GpioError> {
        let mut state = self.state();
        state.function = Function::Out;
        state.level = level;
        Ok(())
    }
}

impl PinPwm for SimPin {
    /// Software PWM on a `min_resolution` tick
    ///
    /// A period needs at least two ticks, and a duty strictly between 0% and
    /// 100% must land on at least one tick of each level.
    fn pwm(&self, duty: Duty, freq_hz: u32) -> Result<(), GpioError> {
        if freq_hz == 0 {
            return Err(GpioError::UnsupportedFrequency);
        }
        let tick = self.caps.min_resolution.as_nanos().max(1);
        let ticks = 1_000_000_000u128 / freq_hz as u128 / tick;
        if ticks < 2 {
            return Err(GpioError::UnsupportedFrequency);
        }
        let high = (duty.raw() as u128 * ticks + DUTY_MAX as u128 / 2) / DUTY_MAX as u128;
        if duty != Duty::ZERO && duty != Duty::MAX && (high == 0 || high == ticks) {
            return Err(GpioError::UnsupportedDuty);
        }

        let mut state = self.state();
        state.function = Function::Pwm { duty, freq_hz };
        state.level = Level::from(duty != Duty::ZERO);
        Ok(())
    }
}

impl PinStreamIn for SimPin {
    fn stream_in(&self, pull: Pull, stream: &mut BitStream) -> Result<(), GpioError> {
        self.check_pull(pull)?;
        self.check_resolution(stream.res)?;

        let mut state = self.state();
        if pull != Pull::NoChange {
            state.pull = pull;
        }
        state.function = Function::In;

        let res = stream.res;
        let order = stream.order;
        let mut runs = state.script.iter().copied();
        let mut current = runs.next();
        let mut run_end = current.map_or(Duration::MAX, |(_, hold)| hold);
        let mut last = current.map_or(state.level, |(level, _)| level);

        for index in 0..stream.bits.len() {
            let t = res * index as u32;
            while current.is_some() && t >= run_end {
                current = runs.next();
                if let Some((level, hold)) = current {
                    run_end += hold;
                    last = level;
                }
            }
            stream.bits.set(index, last, order);
        }

        state.level = last;
        state.elapsed += stream.duration();
        debug!(pin = %self.name, samples = stream.bits.len(), "captured stream");
        Ok(())
    }
}

impl PinStreamOut for SimPin {
    fn stream_out(&self, program: &Program) -> Result<(), GpioError> {
        if self.caps.single_clock {
            program.check_single_clock(self.caps.min_resolution)?;
        } else {
            program.check(self.caps.min_resolution)?;
        }

        let mut state = self.state();
        state.function = Function::Out;
        let state = &mut *state;
        program.for_each_run(|level, hold| {
            match state.history.last_mut() {
                Some((last, total)) if *last == level => *total += hold,
                _ => state.history.push((level, hold)),
            }
            state.level = level;
            state.elapsed += hold;
        })?;

        debug!(pin = %self.name, loops = program.loops, "played program");
        Ok(())
    }
}

impl PinDefaultPull for SimPin {
    fn default_pull(&self) -> Pull {
        self.caps.default_pull
    }
}

/// Host driver registering a bank of simulated pins `GPIO0..GPIO{count-1}`
#[derive(Debug, Clone)]
pub struct SimDriver {
    count: u32,
    caps: SimCaps,
}

impl SimDriver {
    /// Driver name used for prerequisites
    pub const NAME: &'static str = "sim";

    /// Create a driver for `count` pins with default limits
    pub fn new(count: u32) -> Self {
        Self {
            count,
            caps: SimCaps::default(),
        }
    }

    /// Use `caps` for every pin
    pub fn with_caps(mut self, caps: SimCaps) -> Self {
        self.caps = caps;
        self
    }
}

impl Driver for SimDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, registry: &mut Registry) -> Result<bool, DriverError> {
        for number in 0..self.count {
            let name = format!("GPIO{}", number);
            registry.register(Arc::new(SimPin::with_caps(&name, Some(number), self.caps)))?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostpin_hal::stream::{BitOrder, EdgeStream};
    use hostpin_hal::Level::{High, Low};
    use hostpin_hal::{Bits, Stream};
    use std::thread;

    fn us(n: u64) -> Duration {
        Duration::from_micros(n)
    }

    fn pwm_program(loops: u32) -> Program {
        Program::new(
            vec![EdgeStream::new(us(1), vec![us(250), us(750)]).into()],
            loops,
        )
    }

    #[test]
    fn test_program_loops_without_drift() {
        let pin = SimPin::new("GPIO3", Some(3));
        pin.stream_out(&pwm_program(5000)).unwrap();

        let history = pin.history();
        assert_eq!(history.len(), 10_000);
        for period in history.chunks(2) {
            assert_eq!(period, [(Low, us(250)), (High, us(750))]);
        }
        assert_eq!(pin.elapsed(), Duration::from_secs(5));
        assert_eq!(pin.read(), High);
    }

    #[test]
    fn test_stream_out_rejects_invalid_programs() {
        let pin = SimPin::new("GPIO3", Some(3));
        assert_eq!(
            pin.stream_out(&Program::default()),
            Err(GpioError::InvalidProgram(StreamError::EmptyProgram))
        );

        let fine = Program::new(
            vec![EdgeStream::new(Duration::from_nanos(100), vec![us(1)]).into()],
            1,
        );
        assert_eq!(
            pin.stream_out(&fine),
            Err(GpioError::InvalidProgram(StreamError::ResolutionTooFine))
        );
        assert!(pin.history().is_empty());
    }

    #[test]
    fn test_single_clock_rejects_mixed_resolution() {
        let caps = SimCaps {
            single_clock: true,
            ..SimCaps::default()
        };
        let pin = SimPin::with_caps("GPIO3", Some(3), caps);
        let mut program = pwm_program(1);
        program
            .parts
            .push(EdgeStream::new(us(10), vec![us(100)]).into());

        assert_eq!(
            pin.stream_out(&program),
            Err(GpioError::InvalidProgram(StreamError::MixedResolution))
        );

        // Same program plays on a pin that can switch clocks
        let flexible = SimPin::new("GPIO4", Some(4));
        flexible.stream_out(&program).unwrap();
        assert_eq!(flexible.elapsed(), us(1100));
    }

    #[test]
    fn test_stream_out_bits_part() {
        let pin = SimPin::new("GPIO3", Some(3));
        let bits = BitStream::new(
            Duration::from_millis(1),
            Bits::from_bytes(vec![0xF0]),
            BitOrder::Msb,
        );
        pin.stream_out(&Program::new(vec![Stream::Bits(bits)], 2))
            .unwrap();

        let ms = Duration::from_millis;
        assert_eq!(
            pin.history(),
            [(High, ms(4)), (Low, ms(4)), (High, ms(4)), (Low, ms(4))]
        );
    }

    #[test]
    fn test_stream_in_samples_script() {
        let pin = SimPin::new("GPIO3", Some(3));
        pin.script_input(vec![(Low, us(3)), (High, us(2)), (Low, us(1))]);

        let mut stream = BitStream::capture(us(1), 8, BitOrder::Lsb);
        pin.stream_in(Pull::Up, &mut stream).unwrap();

        assert_eq!(
            stream.levels().collect::<Vec<_>>(),
            [Low, Low, Low, High, High, Low, Low, Low]
        );
        assert_eq!(pin.pull(), Pull::Up);
        assert_eq!(pin.elapsed(), us(8));
    }

    #[test]
    fn test_stream_in_rejects_zero_resolution() {
        let pin = SimPin::new("GPIO3", Some(3));
        let mut stream = BitStream::capture(Duration::ZERO, 8, BitOrder::Msb);
        assert_eq!(
            pin.stream_in(Pull::NoChange, &mut stream),
            Err(GpioError::InvalidProgram(StreamError::ZeroResolution))
        );
    }

    #[test]
    fn test_pwm_limits() {
        let pin = SimPin::new("GPIO3", Some(3));
        let third = Duty::from_ratio(1, 3).unwrap();

        pin.pwm(third, 10_000).unwrap();
        assert_eq!(pin.function(), format!("PWM({}@10000Hz)", third));

        assert_eq!(pin.pwm(third, 0), Err(GpioError::UnsupportedFrequency));
        // 1µs tick cannot make a 1MHz period
        assert_eq!(pin.pwm(third, 1_000_000), Err(GpioError::UnsupportedFrequency));
        // 0.1% of a 10-tick period rounds to zero ticks
        let tiny: Duty = "0.1%".parse().unwrap();
        assert_eq!(pin.pwm(tiny, 100_000), Err(GpioError::UnsupportedDuty));
        assert!(pin.pwm(Duty::ZERO, 100_000).is_ok());
    }

    #[test]
    fn test_pull_unsupported() {
        let caps = SimCaps {
            pulls: false,
            ..SimCaps::default()
        };
        let pin = SimPin::with_caps("GPIO3", Some(3), caps);
        assert_eq!(
            pin.set_in(Pull::Up, Edge::None),
            Err(GpioError::UnsupportedConfiguration)
        );
        assert!(pin.set_in(Pull::Float, Edge::Rising).is_ok());
    }

    #[test]
    fn test_wait_for_edge_timeout() {
        let pin = SimPin::new("GPIO3", Some(3));
        pin.set_in(Pull::Down, Edge::Rising).unwrap();
        assert!(!pin.wait_for_edge(Some(Duration::from_millis(10))));
        assert!(!pin.wait_for_edge(Some(Duration::ZERO)));
    }

    #[test]
    fn test_wait_for_edge_wakes_on_matching_edge() {
        let pin = Arc::new(SimPin::new("GPIO3", Some(3)));
        pin.set_in(Pull::Down, Edge::Rising).unwrap();

        let waiter = {
            let pin = Arc::clone(&pin);
            thread::spawn(move || pin.wait_for_edge(None))
        };
        // Falling edges are ignored, the rising one wakes the waiter
        pin.inject(High);
        pin.inject(Low);
        assert!(waiter.join().unwrap());
        assert_eq!(pin.read(), Low);

        // Edge already consumed
        assert!(!pin.wait_for_edge(Some(Duration::from_millis(1))));
    }

    #[test]
    fn test_edges_counted_only_as_input() {
        let pin = SimPin::new("GPIO3", Some(3));
        pin.set_out(Low).unwrap();
        pin.inject(High);
        pin.set_in(Pull::NoChange, Edge::Both).unwrap();
        assert!(!pin.wait_for_edge(Some(Duration::ZERO)));
        pin.inject(Low);
        assert!(pin.wait_for_edge(Some(Duration::ZERO)));
    }

    #[test]
    fn test_probing_does_not_change_level() {
        let pin = SimPin::new("GPIO3", Some(3));
        pin.set_out(High).unwrap();
        let before = pin.read();

        let pin: &dyn Pin = &pin;
        assert!(pin.as_real().is_none());
        assert!(pin.as_stream_out().is_some());
        assert!(pin.as_real().is_none());
        assert_eq!(pin.read(), before);
        assert_eq!(pin.function(), "Out/High");
    }

    #[test]
    fn test_sim_driver_registers_bank() {
        let mut registry = Registry::new();
        let mut driver = SimDriver::new(4);
        assert!(driver.init(&mut registry).unwrap());

        assert_eq!(registry.all().len(), 4);
        assert_eq!(registry.by_name("GPIO3").unwrap().number(), Some(3));
        assert!(registry.by_name("GPIO4").is_none());
        assert_eq!(
            registry
                .by_name("GPIO0")
                .unwrap()
                .as_default_pull()
                .unwrap()
                .default_pull(),
            Pull::Down
        );
    }
}
