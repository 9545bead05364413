use crate::camera::CameraSensitivity;
use crate::physics::PhysicalParams;
use clap::Parser;
use std::time::Duration;

/// Command line arguments; every flag is optional
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Haptic device demo: carry a ball inside a force-feedback cube")]
pub struct Args {
    /// Display frame rate
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Servo loop rate of the haptic scheduler, in Hz
    #[arg(long, default_value_t = 1000)]
    pub servo_rate: u32,

    /// Initial sphere mass (gravity multiplier)
    #[arg(long, default_value_t = 1.0)]
    pub mass: f64,

    /// Start with the debug overlay visible
    #[arg(long)]
    pub debug: bool,

    /// Exit on fatal errors without waiting for a keypress
    #[arg(long)]
    pub no_prompt: bool,
}

/// Runtime configuration
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub frame_rate: u32,
    pub servo_rate_hz: u32,
    pub initial_mass: f64,
    pub debug: bool,
    pub prompt_on_error: bool,
    pub physics: PhysicalParams,
    pub camera: CameraSensitivity,
    /// Stylus travel per arrow key press, in device units
    pub stylus_step: f64,
    /// Stylus twist per key press, in degrees
    pub stylus_twist: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            frame_rate: 30,
            servo_rate_hz: 1000,
            initial_mass: 1.0,
            debug: false,
            prompt_on_error: true,
            physics: PhysicalParams::default(),
            camera: CameraSensitivity::default(),
            stylus_step: 4.0,
            stylus_twist: 10.0,
        }
    }
}

impl Config {
    pub fn frame_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.frame_rate.max(1) as u64)
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Config {
            frame_rate: args.fps.max(1),
            servo_rate_hz: args.servo_rate,
            initial_mass: args.mass.max(0.0),
            debug: args.debug,
            prompt_on_error: !args.no_prompt,
            ..Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_matches_defaults() {
        let args = Args::try_parse_from(["haptic-cube"]).unwrap();
        assert_eq!(Config::from(&args), Config::default());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "haptic-cube",
            "--fps",
            "60",
            "--servo-rate",
            "500",
            "--mass=-2",
            "--debug",
            "--no-prompt",
        ])
        .unwrap();
        let config = Config::from(&args);
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.servo_rate_hz, 500);
        assert_eq!(config.initial_mass, 0.0);
        assert!(config.debug);
        assert!(!config.prompt_on_error);
    }

    #[test]
    fn frame_period_follows_rate() {
        let config = Config {
            frame_rate: 50,
            ..Config::default()
        };
        assert_eq!(config.frame_period(), Duration::from_millis(20));
    }
}
