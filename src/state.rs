use crate::grab::TrackedSphere;
use crate::menu::{adjust_mass, MenuCommand};
use parking_lot::{Mutex, MutexGuard};

/// Values the force task needs from the display thread
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceInput {
    pub position: [f64; 3],
    pub attached: bool,
    pub mass: f64,
}

/// Scene data written by the display thread and read by the force task
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneState {
    pub ball: TrackedSphere,
    /// Gravity multiplier, never negative
    pub mass: f64,
}

impl SceneState {
    pub fn force_input(&self) -> ForceInput {
        ForceInput {
            position: self.ball.position,
            attached: self.ball.is_attached(),
            mass: self.mass,
        }
    }
}

/// The one piece of state shared between the servo and display threads
pub struct SharedScene {
    inner: Mutex<SceneState>,
}

impl SharedScene {
    pub fn new(mass: f64) -> Self {
        SharedScene {
            inner: Mutex::new(SceneState {
                ball: TrackedSphere::default(),
                mass: mass.max(0.0),
            }),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, SceneState> {
        self.inner.lock()
    }

    /// Non-blocking read for the servo thread; `None` while the display thread holds the lock
    pub fn try_force_input(&self) -> Option<ForceInput> {
        self.inner.try_lock().map(|state| state.force_input())
    }

    pub fn snapshot(&self) -> SceneState {
        *self.inner.lock()
    }

    pub fn apply(&self, command: MenuCommand) -> f64 {
        let mut state = self.inner.lock();
        state.mass = adjust_mass(state.mass, command);
        state.mass
    }
}
