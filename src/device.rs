//! Haptic device contract and a keyboard-driven simulated device.
//!
//! The device is owned by the servo thread once the scheduler starts; every
//! call below happens either inside the force task or inside a synchronous
//! request serviced between two force task iterations.

use crate::math::{compose_transform, length, multiply_matrices, rotation_x, rotation_z, scale};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Stylus button state as reported by the device
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Button {
    #[default]
    None,
    /// First (blue) stylus button
    Primary,
    /// Second (white) stylus button
    Secondary,
}

impl Button {
    pub fn is_pressed(self) -> bool {
        self != Button::None
    }
}

/// Device features that can be switched on after initialization
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    ForceOutput,
    MaxForceClamping,
}

/// Reachable volume of the stylus tip, as two opposite corners
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Workspace {
    /// Low, left, back corner
    pub low: [f64; 3],
    /// Top, right, front corner
    pub high: [f64; 3],
}

impl Workspace {
    pub fn center(&self) -> [f64; 3] {
        [
            (self.high[0] + self.low[0]) / 2.0,
            (self.high[1] + self.low[1]) / 2.0,
            (self.high[2] + self.low[2]) / 2.0,
        ]
    }

    /// Half of the largest extent over all three axes
    pub fn half_max_dimension(&self) -> f64 {
        let dims = [
            self.high[0] - self.low[0],
            self.high[1] - self.low[1],
            self.high[2] - self.low[2],
        ];
        dims[0].max(dims[1]).max(dims[2]) / 2.0
    }

    pub fn clamp(&self, point: [f64; 3]) -> [f64; 3] {
        [
            point[0].clamp(self.low[0], self.high[0]),
            point[1].clamp(self.low[1], self.high[1]),
            point[2].clamp(self.low[2], self.high[2]),
        ]
    }
}

impl fmt::Display for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6} {:.6} {:.6} {:.6} {:.6} {:.6}",
            self.low[0], self.low[1], self.low[2], self.high[0], self.high[1], self.high[2]
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceErrorKind {
    /// The device could not be found or opened
    Initialization,
    /// The servo loop itself failed; callbacks must stop
    Scheduler,
    /// A transfer to or from the device was dropped
    Communication,
    /// The requested force exceeded what the device can render
    ForceLimit,
}

/// An error reported by the device after an operation
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} (HD error 0x{code:04X}, {kind:?})")]
pub struct DeviceError {
    pub kind: DeviceErrorKind,
    pub code: u32,
    pub message: String,
}

impl DeviceError {
    pub fn new(kind: DeviceErrorKind, message: impl Into<String>) -> Self {
        let code = match kind {
            DeviceErrorKind::Initialization => 0x0100,
            DeviceErrorKind::Scheduler => 0x0200,
            DeviceErrorKind::Communication => 0x0300,
            DeviceErrorKind::ForceLimit => 0x0400,
        };
        DeviceError {
            kind,
            code,
            message: message.into(),
        }
    }

    /// Scheduler-level errors terminate the callback that observed them
    pub fn is_scheduler_error(&self) -> bool {
        self.kind == DeviceErrorKind::Scheduler
    }
}

/// Operations the servo thread needs from a force-feedback device
pub trait HapticDevice: Send {
    fn model(&self) -> &str;
    fn enable(&mut self, capability: Capability);
    fn workspace(&self) -> Workspace;
    /// Starts a haptic frame; device state is constant until `end_frame`
    fn begin_frame(&mut self);
    fn end_frame(&mut self);
    fn position(&self) -> [f64; 3];
    /// Column-major 4x4 transform of the stylus tip
    fn transform(&self) -> [f64; 16];
    fn force(&self) -> [f64; 3];
    fn buttons(&self) -> Button;
    fn set_force(&mut self, force: [f64; 3]);
    /// Returns and clears the last error raised by any operation
    fn take_error(&mut self) -> Option<DeviceError>;
    fn disable(&mut self);
}

/// Commanded stylus pose for the simulated device
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StylusPose {
    pub position: [f64; 3],
    /// Twist of the stylus about its own axis, in degrees
    pub roll: f64,
    /// Tilt of the stylus towards the viewer, in degrees
    pub pitch: f64,
    pub button: Button,
}

impl Default for StylusPose {
    fn default() -> Self {
        StylusPose {
            position: [0.0, 0.0, 40.0],
            roll: 0.0,
            pitch: 0.0,
            button: Button::None,
        }
    }
}

/// Shared handle the display thread uses to steer the simulated stylus
#[derive(Clone, Default)]
pub struct StylusInput {
    pose: Arc<Mutex<StylusPose>>,
}

impl StylusInput {
    pub fn pose(&self) -> StylusPose {
        *self.pose.lock()
    }

    pub fn move_to(&self, position: [f64; 3]) {
        self.pose.lock().position = position;
    }

    pub fn twist(&self, roll: f64, pitch: f64) {
        let mut pose = self.pose.lock();
        pose.roll += roll;
        pose.pitch += pitch;
    }

    /// Presses `button` if it is not held, otherwise releases it
    pub fn toggle_button(&self, button: Button) {
        let mut pose = self.pose.lock();
        pose.button = if pose.button == button {
            Button::None
        } else {
            button
        };
    }
}

/// Injected failure for exercising error handling
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fault {
    /// Number of completed haptic frames before the error is raised
    pub after_frames: u64,
    pub kind: DeviceErrorKind,
}

#[derive(Clone, Default)]
pub struct SimulatedConfig {
    pub input: StylusInput,
    pub fault: Option<Fault>,
    /// Opening fails as if nothing were plugged in
    pub unplugged: bool,
}

/// A device whose stylus follows [`StylusInput`] exactly.
///
/// Forces are recorded and reported back but do not move the tip.
pub struct SimulatedDevice {
    input: StylusInput,
    fault: Option<Fault>,
    workspace: Workspace,
    max_force: f64,
    force_output: bool,
    clamping: bool,
    in_frame: bool,
    frames: u64,
    pose: StylusPose,
    force: [f64; 3],
    error: Option<DeviceError>,
    enabled: bool,
}

impl SimulatedDevice {
    pub const MODEL: &'static str = "Simulated PHANTOM";

    pub fn open(config: SimulatedConfig) -> Result<Self, DeviceError> {
        if config.unplugged {
            return Err(DeviceError::new(
                DeviceErrorKind::Initialization,
                "No haptic device found",
            ));
        }
        let pose = config.input.pose();
        Ok(SimulatedDevice {
            input: config.input,
            fault: config.fault,
            workspace: Workspace {
                low: [-120.0, -100.0, -100.0],
                high: [120.0, 100.0, 100.0],
            },
            max_force: 25.0,
            force_output: false,
            clamping: false,
            in_frame: false,
            frames: 0,
            pose,
            force: [0.0; 3],
            error: None,
            enabled: true,
        })
    }

    fn sample_input(&mut self) {
        let mut pose = self.input.pose();
        pose.position = self.workspace.clamp(pose.position);
        self.pose = pose;
    }
}

impl HapticDevice for SimulatedDevice {
    fn model(&self) -> &str {
        Self::MODEL
    }

    fn enable(&mut self, capability: Capability) {
        match capability {
            Capability::ForceOutput => self.force_output = true,
            Capability::MaxForceClamping => self.clamping = true,
        }
    }

    fn workspace(&self) -> Workspace {
        self.workspace
    }

    fn begin_frame(&mut self) {
        if !self.enabled {
            self.error = Some(DeviceError::new(
                DeviceErrorKind::Communication,
                "Frame started on a disabled device",
            ));
            return;
        }
        self.in_frame = true;
        self.sample_input();
    }

    fn end_frame(&mut self) {
        if !self.in_frame {
            return;
        }
        self.in_frame = false;
        self.frames += 1;
        if let Some(fault) = self.fault {
            if self.frames >= fault.after_frames {
                self.fault = None;
                self.error = Some(DeviceError::new(fault.kind, "Injected device fault"));
            }
        }
    }

    fn position(&self) -> [f64; 3] {
        self.pose.position
    }

    fn transform(&self) -> [f64; 16] {
        let rotation = multiply_matrices(&rotation_x(self.pose.pitch), &rotation_z(self.pose.roll));
        compose_transform(&rotation, &self.pose.position)
    }

    fn force(&self) -> [f64; 3] {
        self.force
    }

    fn buttons(&self) -> Button {
        self.pose.button
    }

    fn set_force(&mut self, force: [f64; 3]) {
        if !self.in_frame {
            self.error = Some(DeviceError::new(
                DeviceErrorKind::Communication,
                "Force set outside of a haptic frame",
            ));
            return;
        }
        if !self.force_output {
            self.force = [0.0; 3];
            return;
        }
        let magnitude = length(&force);
        if magnitude > self.max_force {
            if self.clamping {
                self.force = scale(&force, self.max_force / magnitude);
            } else {
                self.force = [0.0; 3];
                self.error = Some(DeviceError::new(
                    DeviceErrorKind::ForceLimit,
                    "Requested force exceeds the device maximum",
                ));
            }
            return;
        }
        self.force = force;
    }

    fn take_error(&mut self) -> Option<DeviceError> {
        self.error.take()
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.force = [0.0; 3];
    }
}
