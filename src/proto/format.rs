// src/proto/format.rs
use std::{fmt::Write, str::FromStr};

use super::command::{ColorChoice, DeviceCommand, SeedChoice};

/// Marks the end of an InputSeed point list.
const POINTS_END: i64 = -1;

/// Public API: serialize a command to the ASCII bytes the firmware reads.
/// No line terminator; the firmware parses byte by byte.
pub fn format_command(cmd: &DeviceCommand) -> String {
    use DeviceCommand::*;
    let mut out = String::new();

    macro_rules! push_field {
        ($v:expr) => {{
            let _ = write!(out, ",{}", $v);
        }};
    }

    match cmd {
        EnterConfigure => out.push('c'),
        StepFirst => out.push('s'),
        StepNext => out.push('n'),
        RunContinuous => out.push('t'),
        Reset => out.push('r'),

        Seed { choice, points } => {
            let _ = write!(out, "e{}", choice.index());
            if *choice == SeedChoice::InputSeed {
                for pt in points {
                    push_field!(pt.x);
                    push_field!(pt.y);
                }
                push_field!(POINTS_END);
            }
        }
        Color { choice, rgb } => {
            let _ = write!(out, "l{}", choice.index());
            if *choice == ColorChoice::InputColor
                && let Some(rgb) = rgb
            {
                push_field!(rgb.r);
                push_field!(rgb.g);
                push_field!(rgb.b);
            }
        }
        Interval(interval) => {
            let _ = write!(out, "i{}", interval);
        }
    }

    out
}

/* ---------- choice names & FromStr impls ---------- */

pub fn seed_to_str(s: SeedChoice) -> &'static str {
    match s {
        SeedChoice::InputSeed => "Input_Seed",
        SeedChoice::RPentamino => "R_Pentamino",
        SeedChoice::Acorn => "Acorn",
        SeedChoice::Diehard => "Diehard",
        SeedChoice::Pattern10 => "Pattern_10",
        SeedChoice::Pattern5x5 => "Pattern_5x5",
        SeedChoice::RandomSeed => "Random_Seed",
        SeedChoice::RandomChoice => "Random_Choice",
    }
}
pub fn color_to_str(c: ColorChoice) -> &'static str {
    match c {
        ColorChoice::InputColor => "Input_Color",
        ColorChoice::Red => "Red",
        ColorChoice::Green => "Green",
        ColorChoice::Blue => "Blue",
        ColorChoice::RandomColor => "Random_Color",
        ColorChoice::ContinuousRandom => "Continuous_Random",
    }
}

// Names are matched exactly, the way the web UI sends them.

impl FromStr for SeedChoice {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeedChoice::ALL
            .into_iter()
            .find(|c| seed_to_str(*c) == s)
            .ok_or(())
    }
}
impl FromStr for ColorChoice {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorChoice::ALL
            .into_iter()
            .find(|c| color_to_str(*c) == s)
            .ok_or(())
    }
}

/* ---------- tests ---------- */
