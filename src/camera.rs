use crate::math::{multiply_matrices, rotation_about_axis, rotation_x, rotation_y};

/// Which view operation a mouse drag performs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragMode {
    /// Left button: horizontal drag yaws, vertical drag pitches
    Rotate,
    /// Middle button: vertical drag zooms
    Scale,
}

/// Degrees or zoom units per terminal cell of mouse travel
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraSensitivity {
    pub degrees_per_cell: f64,
    pub zoom_per_cell: f64,
}

impl Default for CameraSensitivity {
    fn default() -> Self {
        CameraSensitivity {
            degrees_per_cell: 2.0,
            zoom_per_cell: 0.05,
        }
    }
}

/// Fixed tilt applied before the user's yaw and pitch so all three axes are visible
pub const BASE_TILT_DEGREES: f64 = 15.0;

/// Mouse-driven view accumulator. Angles and zoom are unbounded.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    /// Rotation about Y, in degrees
    pub yaw: f64,
    /// Rotation about X, in degrees
    pub pitch: f64,
    pub zoom: f64,
    sensitivity: CameraSensitivity,
    drag: Option<DragMode>,
    last_mouse: (u16, u16),
}

impl Camera {
    pub fn new(sensitivity: CameraSensitivity) -> Self {
        Camera {
            yaw: 0.0,
            pitch: 0.0,
            zoom: 1.0,
            sensitivity,
            drag: None,
            last_mouse: (0, 0),
        }
    }

    pub fn press(&mut self, mode: DragMode, column: u16, row: u16) {
        self.drag = Some(mode);
        self.last_mouse = (column, row);
    }

    pub fn release(&mut self) {
        self.drag = None;
    }

    /// Accumulates the mouse travel since the last press or drag event
    pub fn drag_to(&mut self, column: u16, row: u16) {
        let dx = column as f64 - self.last_mouse.0 as f64;
        let dy = row as f64 - self.last_mouse.1 as f64;
        match self.drag {
            Some(DragMode::Rotate) => {
                self.yaw += self.sensitivity.degrees_per_cell * dx;
                self.pitch += self.sensitivity.degrees_per_cell * dy;
            }
            Some(DragMode::Scale) => {
                self.zoom -= self.sensitivity.zoom_per_cell * dy;
            }
            None => {}
        }
        self.last_mouse = (column, row);
    }

    /// Reset to default values
    pub fn reset(&mut self) {
        self.yaw = 0.0;
        self.pitch = 0.0;
        self.zoom = 1.0;
        self.drag = None;
    }

    /// World-to-view rotation: base tilt, then yaw, then pitch
    pub fn rotation(&self) -> [[f64; 3]; 3] {
        let tilt = rotation_about_axis(&[1.0, 1.0, 1.0], BASE_TILT_DEGREES);
        let yaw = rotation_y(self.yaw);
        let pitch = rotation_x(self.pitch);
        multiply_matrices(&multiply_matrices(&tilt, &yaw), &pitch)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Camera::new(CameraSensitivity::default())
    }
}
