//! Command encoder and mode tracker for a Golduino board.
//!
//! The firmware has three run modes (configure, step, continuous) and no
//! response channel, so the host keeps its own idea of the current mode and
//! only sends a mode switch when it would change something.
//!
//! Transitions, by operation (`*` = any mode, `-` = unchanged):
//!
//! | operation          | from                | writes   | to                   |
//! |--------------------|---------------------|----------|----------------------|
//! | `enter_configure`  | not `Configure`     | `c`      | `Configure`          |
//! | `enter_configure`  | `Configure`         | nothing  | -                    |
//! | `step`             | not `RunningStep`   | `s`      | `RunningStep`        |
//! | `step`             | `RunningStep`       | `n`      | -                    |
//! | `run_continuous`   | not `RunningCont.`  | `t`      | `RunningContinuous`  |
//! | `run_continuous`   | `RunningContinuous` | nothing  | -                    |
//! | `reset`            | *                   | `r`      | - or `Unknown`       |
//! | `configure_*`      | `Configure`         | payload  | -                    |
//! | `configure_*`      | anything else       | nothing  | -                    |

use std::io::{self, Write};

use thiserror::Error;
use tracing::{debug, warn};

use crate::cli::{ResetPolicy, Validation};
use crate::proto::command::{ColorChoice, DeviceCommand, Point, Rgb, SeedChoice};
use crate::proto::format::format_command;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceMode {
    /// Nothing sent yet.
    #[default]
    Unset,
    Configure,
    RunningStep,
    RunningContinuous,
    /// After a reset, when the tracker is told not to assume anything.
    Unknown,
}

#[derive(Debug, Error)]
pub enum GolduinoError {
    #[error("unknown {kind} choice: {name}")]
    InvalidChoice { kind: &'static str, name: String },
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("Input_Color requires red, green and blue")]
    MissingRgb,
    #[error("serial write: {0}")]
    Io(#[from] io::Error),
}

pub struct Golduino<W: Write> {
    sink: W,
    mode: DeviceMode,
    reset_policy: ResetPolicy,
    validation: Validation,
}

impl<W: Write> Golduino<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            mode: DeviceMode::Unset,
            reset_policy: ResetPolicy::default(),
            validation: Validation::default(),
        }
    }

    pub fn with_reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.reset_policy = policy;
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    #[cfg(test)]
    pub fn sink(&self) -> &W {
        &self.sink
    }

    /// Write one whole command. Mode bookkeeping is the caller's job and
    /// must only happen after this returns `Ok`.
    fn send(&mut self, cmd: &DeviceCommand) -> Result<(), GolduinoError> {
        let out = format_command(cmd);
        self.sink.write_all(out.as_bytes())?;
        self.sink.flush()?;
        debug!(bytes = %out, mode = ?self.mode, "sent");
        Ok(())
    }

    fn switch_to(&mut self, cmd: DeviceCommand, target: DeviceMode) -> Result<(), GolduinoError> {
        self.send(&cmd)?;
        debug!(from = ?self.mode, to = ?target, "mode change");
        self.mode = target;
        Ok(())
    }

    pub fn enter_configure(&mut self) -> Result<(), GolduinoError> {
        if self.mode != DeviceMode::Configure {
            self.switch_to(DeviceCommand::EnterConfigure, DeviceMode::Configure)?;
        }
        Ok(())
    }

    /// Advance one generation. The first step after leaving another mode is
    /// `s`, every following one is `n`.
    pub fn step(&mut self) -> Result<(), GolduinoError> {
        if self.mode == DeviceMode::RunningStep {
            self.send(&DeviceCommand::StepNext)
        } else {
            self.switch_to(DeviceCommand::StepFirst, DeviceMode::RunningStep)
        }
    }

    pub fn run_continuous(&mut self) -> Result<(), GolduinoError> {
        if self.mode != DeviceMode::RunningContinuous {
            self.switch_to(DeviceCommand::RunContinuous, DeviceMode::RunningContinuous)?;
        }
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), GolduinoError> {
        self.send(&DeviceCommand::Reset)?;
        if self.reset_policy == ResetPolicy::Unknown {
            self.mode = DeviceMode::Unknown;
        }
        Ok(())
    }

    /// `points` is only used for `Input_Seed`.
    pub fn configure_seed(&mut self, choice: &str, points: &[Point]) -> Result<(), GolduinoError> {
        if !self.configuring("seed") {
            return Ok(());
        }
        let Some(choice) = self.lookup::<SeedChoice>("seed", choice)? else {
            return Ok(());
        };
        self.send(&DeviceCommand::Seed {
            choice,
            points: points.to_vec(),
        })
    }

    /// `rgb` is required for `Input_Color` and ignored otherwise.
    pub fn configure_color(&mut self, choice: &str, rgb: Option<Rgb>) -> Result<(), GolduinoError> {
        if !self.configuring("color") {
            return Ok(());
        }
        let Some(choice) = self.lookup::<ColorChoice>("color", choice)? else {
            return Ok(());
        };
        let rgb = match (choice, rgb) {
            (ColorChoice::InputColor, None) => return Err(GolduinoError::MissingRgb),
            (ColorChoice::InputColor, Some(rgb)) => {
                if self.validation == Validation::Strict {
                    check_channel("red", rgb.r)?;
                    check_channel("green", rgb.g)?;
                    check_channel("blue", rgb.b)?;
                }
                Some(rgb)
            }
            _ => None,
        };
        self.send(&DeviceCommand::Color { choice, rgb })
    }

    pub fn configure_iteration_interval(&mut self, interval: i64) -> Result<(), GolduinoError> {
        if !self.configuring("interval") {
            return Ok(());
        }
        if self.validation == Validation::Strict && interval < 0 {
            return Err(GolduinoError::OutOfRange {
                field: "interval",
                value: interval,
            });
        }
        self.send(&DeviceCommand::Interval(interval))
    }

    fn configuring(&self, what: &str) -> bool {
        if self.mode == DeviceMode::Configure {
            return true;
        }
        warn!(mode = ?self.mode, "ignoring {} config outside configure mode", what);
        false
    }

    /// `Ok(None)` means "drop the command quietly" (lenient mode).
    fn lookup<T: std::str::FromStr>(
        &self,
        kind: &'static str,
        name: &str,
    ) -> Result<Option<T>, GolduinoError> {
        match name.parse::<T>() {
            Ok(c) => Ok(Some(c)),
            Err(_) if self.validation == Validation::Lenient => {
                warn!("ignoring unknown {} choice {:?}", kind, name);
                Ok(None)
            }
            Err(_) => Err(GolduinoError::InvalidChoice {
                kind,
                name: name.to_string(),
            }),
        }
    }
}

fn check_channel(field: &'static str, value: i64) -> Result<(), GolduinoError> {
    if (0..=255).contains(&value) {
        Ok(())
    } else {
        Err(GolduinoError::OutOfRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lenient() -> Golduino<Vec<u8>> {
        Golduino::new(Vec::new()).with_validation(Validation::Lenient)
    }

    fn written(g: &Golduino<Vec<u8>>) -> &str {
        std::str::from_utf8(g.sink()).unwrap()
    }

    fn configuring(mut g: Golduino<Vec<u8>>) -> Golduino<Vec<u8>> {
        g.enter_configure().unwrap();
        assert_eq!(written(&g), "c");
        g
    }

    #[test]
    fn starts_unset() {
        let g = lenient();
        assert_eq!(g.mode(), DeviceMode::Unset);
        assert!(g.sink().is_empty());
    }

    #[test]
    fn configure_is_idempotent() {
        let mut g = lenient();
        g.enter_configure().unwrap();
        g.enter_configure().unwrap();
        assert_eq!(written(&g), "c");
        assert_eq!(g.mode(), DeviceMode::Configure);
    }

    #[test]
    fn step_twice_from_unset() {
        let mut g = lenient();
        g.step().unwrap();
        g.step().unwrap();
        assert_eq!(written(&g), "sn");
        assert_eq!(g.mode(), DeviceMode::RunningStep);
    }

    #[test]
    fn step_after_run_restarts_step_mode() {
        let mut g = lenient();
        g.step().unwrap();
        g.run_continuous().unwrap();
        g.step().unwrap();
        g.step().unwrap();
        assert_eq!(written(&g), "stsn");
    }

    #[test]
    fn run_continuous_twice_writes_once() {
        let mut g = lenient();
        g.run_continuous().unwrap();
        g.run_continuous().unwrap();
        assert_eq!(written(&g), "t");
        assert_eq!(g.mode(), DeviceMode::RunningContinuous);
    }

    #[test]
    fn reset_keeps_mode_by_default() {
        let mut g = lenient();
        g.step().unwrap();
        g.reset().unwrap();
        assert_eq!(g.mode(), DeviceMode::RunningStep);
        g.step().unwrap();
        assert_eq!(written(&g), "srn");

        let mut g = lenient();
        g.reset().unwrap();
        assert_eq!(written(&g), "r");
        assert_eq!(g.mode(), DeviceMode::Unset);
    }

    #[test]
    fn reset_to_unknown_forces_next_switch() {
        let mut g = lenient().with_reset_policy(ResetPolicy::Unknown);
        g.enter_configure().unwrap();
        g.reset().unwrap();
        assert_eq!(g.mode(), DeviceMode::Unknown);
        g.enter_configure().unwrap();
        g.run_continuous().unwrap();
        g.reset().unwrap();
        g.step().unwrap();
        assert_eq!(written(&g), "crctrs");
        assert_eq!(g.mode(), DeviceMode::RunningStep);
    }

    #[test]
    fn config_ignored_outside_configure() {
        let setups: [fn() -> Golduino<Vec<u8>>; 4] = [
            || Golduino::new(Vec::new()),
            || {
                let mut g = Golduino::new(Vec::new());
                g.step().unwrap();
                g
            },
            || {
                let mut g = Golduino::new(Vec::new());
                g.run_continuous().unwrap();
                g
            },
            || {
                let mut g = Golduino::new(Vec::new()).with_reset_policy(ResetPolicy::Unknown);
                g.enter_configure().unwrap();
                g.reset().unwrap();
                g
            },
        ];
        for setup in setups {
            let mut g = setup();
            assert_ne!(g.mode(), DeviceMode::Configure);
            let before = g.sink().len();
            let mode = g.mode();
            g.configure_seed("Acorn", &[]).unwrap();
            // not validated outside configure, even in strict mode
            g.configure_seed("Nope", &[]).unwrap();
            g.configure_color("Red", None).unwrap();
            g.configure_iteration_interval(500).unwrap();
            g.configure_iteration_interval(-1).unwrap();
            assert_eq!(g.sink().len(), before);
            assert_eq!(g.mode(), mode);
        }
    }

    #[test]
    fn input_seed_points() {
        let mut g = configuring(lenient());
        g.configure_seed("Input_Seed", &[Point { x: 1, y: 2 }, Point { x: 3, y: 4 }])
            .unwrap();
        assert_eq!(written(&g), "ce0,1,2,3,4,-1");
        assert_eq!(g.mode(), DeviceMode::Configure);
    }

    #[test]
    fn named_seed() {
        let mut g = configuring(lenient());
        g.configure_seed("Diehard", &[]).unwrap();
        assert_eq!(written(&g), "ce3");
    }

    #[test]
    fn colors() {
        let mut g = configuring(lenient());
        g.configure_color("Input_Color", Some(Rgb { r: 10, g: 20, b: 30 }))
            .unwrap();
        assert_eq!(written(&g), "cl0,10,20,30");

        let mut g = configuring(lenient());
        g.configure_color("Red", None).unwrap();
        assert_eq!(written(&g), "cl1");
    }

    #[test]
    fn interval() {
        let mut g = configuring(lenient());
        g.configure_iteration_interval(500).unwrap();
        assert_eq!(written(&g), "ci500");
    }

    #[test]
    fn lenient_drops_unknown_choices() {
        let mut g = configuring(lenient());
        g.configure_seed("Glider", &[]).unwrap();
        g.configure_color("Purple", None).unwrap();
        assert_eq!(written(&g), "c");
    }

    #[test]
    fn lenient_passes_values_through() {
        let mut g = configuring(lenient());
        g.configure_color("Input_Color", Some(Rgb { r: 300, g: -1, b: 0 }))
            .unwrap();
        g.configure_iteration_interval(-5).unwrap();
        assert_eq!(written(&g), "cl0,300,-1,0i-5");
    }

    #[test]
    fn strict_rejects_bad_input() {
        let mut g = configuring(Golduino::new(Vec::new()));
        assert!(matches!(
            g.configure_seed("Glider", &[]),
            Err(GolduinoError::InvalidChoice { kind: "seed", .. })
        ));
        assert!(matches!(
            g.configure_color("Purple", None),
            Err(GolduinoError::InvalidChoice { kind: "color", .. })
        ));
        assert!(matches!(
            g.configure_color("Input_Color", Some(Rgb { r: 0, g: 256, b: 0 })),
            Err(GolduinoError::OutOfRange {
                field: "green",
                value: 256
            })
        ));
        assert!(matches!(
            g.configure_iteration_interval(-1),
            Err(GolduinoError::OutOfRange {
                field: "interval",
                ..
            })
        ));
        assert_eq!(written(&g), "c");
        g.configure_color("Input_Color", Some(Rgb { r: 0, g: 255, b: 0 }))
            .unwrap();
        assert_eq!(written(&g), "cl0,0,255,0");
    }

    #[test]
    fn input_color_needs_rgb() {
        let mut g = configuring(lenient());
        assert!(matches!(
            g.configure_color("Input_Color", None),
            Err(GolduinoError::MissingRgb)
        ));
        assert_eq!(written(&g), "c");
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_keeps_mode() {
        let mut g = Golduino::new(BrokenSink);
        assert!(matches!(g.enter_configure(), Err(GolduinoError::Io(_))));
        assert!(matches!(g.step(), Err(GolduinoError::Io(_))));
        assert!(matches!(g.run_continuous(), Err(GolduinoError::Io(_))));
        assert_eq!(g.mode(), DeviceMode::Unset);
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Configure,
        Step,
        Run,
        Reset,
    }

    /// Every 4-long sequence: the tracked mode matches the last mode byte written.
    #[test]
    fn mode_follows_last_switch() {
        let ops = [Op::Configure, Op::Step, Op::Run, Op::Reset];
        for a in ops {
            for b in ops {
                for c in ops {
                    for d in ops {
                        let mut g = lenient();
                        for op in [a, b, c, d] {
                            let res = match op {
                                Op::Configure => g.enter_configure(),
                                Op::Step => g.step(),
                                Op::Run => g.run_continuous(),
                                Op::Reset => g.reset(),
                            };
                            res.unwrap();
                        }
                        let expect = written(&g)
                            .chars()
                            .rev()
                            .find_map(|ch| match ch {
                                'c' => Some(DeviceMode::Configure),
                                's' | 'n' => Some(DeviceMode::RunningStep),
                                't' => Some(DeviceMode::RunningContinuous),
                                _ => None,
                            })
                            .unwrap_or(DeviceMode::Unset);
                        assert_eq!(g.mode(), expect, "ops {:?}", [a, b, c, d]);
                    }
                }
            }
        }
    }
}
