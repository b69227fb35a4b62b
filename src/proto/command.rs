/// One command in the Golduino serial protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    // ---- Mode switches ----
    EnterConfigure,
    /// Enter step mode and take the first step.
    StepFirst,
    /// Take the next step (already in step mode).
    StepNext,
    RunContinuous,
    Reset,

    // ---- Configuration ----
    Seed {
        choice: SeedChoice,
        points: Vec<Point>, // only sent for SeedChoice::InputSeed
    },
    Color {
        choice: ColorChoice,
        rgb: Option<Rgb>, // only sent for ColorChoice::InputColor
    },
    Interval(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedChoice {
    InputSeed,
    RPentamino,
    Acorn,
    Diehard,
    Pattern10,
    Pattern5x5,
    RandomSeed,
    RandomChoice,
}

impl SeedChoice {
    pub const ALL: [SeedChoice; 8] = [
        SeedChoice::InputSeed,
        SeedChoice::RPentamino,
        SeedChoice::Acorn,
        SeedChoice::Diehard,
        SeedChoice::Pattern10,
        SeedChoice::Pattern5x5,
        SeedChoice::RandomSeed,
        SeedChoice::RandomChoice,
    ];

    /// Wire index: position in the firmware's seed table.
    pub fn index(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChoice {
    InputColor,
    Red,
    Green,
    Blue,
    RandomColor,
    ContinuousRandom,
}

impl ColorChoice {
    pub const ALL: [ColorChoice; 6] = [
        ColorChoice::InputColor,
        ColorChoice::Red,
        ColorChoice::Green,
        ColorChoice::Blue,
        ColorChoice::RandomColor,
        ColorChoice::ContinuousRandom,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }
}

/// A live cell to seed, in firmware matrix coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

/// Channels are kept wide so lenient callers can pass values through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: i64,
    pub g: i64,
    pub b: i64,
}
