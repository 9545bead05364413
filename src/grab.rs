//! Grab/attach state machine for the movable ball.

use crate::device::Button;
use crate::math::{distance, sub, IDENTITY_TRANSFORM};
use crate::physics::PhysicalParams;

/// Device state captured once per display frame on the servo thread
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceSnapshot {
    pub position: [f64; 3],
    /// Column-major 4x4 transform of the stylus tip
    pub transform: [f64; 16],
    pub force: [f64; 3],
    pub button: Button,
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        DeviceSnapshot {
            position: [0.0; 3],
            transform: IDENTITY_TRANSFORM,
            force: [0.0; 3],
            button: Button::None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Grab {
    Detached,
    /// Held by the stylus; `offset` is tip minus ball centre at the moment of grab
    Attached { offset: [f64; 3] },
}

/// Result of feeding one snapshot through the state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Grabbed,
    Held,
    Released,
    Idle,
}

/// The ball the stylus can pick up and carry
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedSphere {
    pub position: [f64; 3],
    pub grab: Grab,
    /// Stylus transform from the last attached frame, reused while detached
    pub orientation: [f64; 16],
}

impl Default for TrackedSphere {
    fn default() -> Self {
        TrackedSphere {
            position: [0.0; 3],
            grab: Grab::Detached,
            orientation: IDENTITY_TRANSFORM,
        }
    }
}

impl TrackedSphere {
    pub fn is_attached(&self) -> bool {
        matches!(self.grab, Grab::Attached { .. })
    }

    /// Whether the tip is close enough to grab the ball
    pub fn within_reach(&self, tip: &[f64; 3], params: &PhysicalParams) -> bool {
        distance(tip, &self.position) <= params.grab_range()
    }

    /// Advances the state machine with this frame's snapshot
    pub fn update(&mut self, snapshot: &DeviceSnapshot, params: &PhysicalParams) -> Transition {
        let holding =
            snapshot.button.is_pressed() && self.within_reach(&snapshot.position, params);

        let (offset, transition) = match (self.grab, holding) {
            (Grab::Detached, true) => (sub(&snapshot.position, &self.position), Transition::Grabbed),
            (Grab::Attached { offset }, true) => (offset, Transition::Held),
            (Grab::Attached { .. }, false) => {
                self.grab = Grab::Detached;
                return Transition::Released;
            }
            (Grab::Detached, false) => return Transition::Idle,
        };

        self.grab = Grab::Attached { offset };
        self.position = sub(&snapshot.position, &offset);
        self.orientation = snapshot.transform;
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{add, compose_transform, rotation_z};

    fn params() -> PhysicalParams {
        PhysicalParams::default()
    }

    fn snapshot(position: [f64; 3], button: Button) -> DeviceSnapshot {
        DeviceSnapshot {
            position,
            transform: compose_transform(&rotation_z(0.0), &position),
            force: [0.0; 3],
            button,
        }
    }

    #[test]
    fn grab_requires_button_and_reach() {
        let mut ball = TrackedSphere::default();
        assert_eq!(ball.update(&snapshot([10.0, 0.0, 0.0], Button::None), &params()), Transition::Idle);
        assert_eq!(
            ball.update(&snapshot([40.0, 0.0, 0.0], Button::Primary), &params()),
            Transition::Idle
        );
        assert!(!ball.is_attached());
        assert_eq!(ball.position, [0.0; 3]);

        // Exactly at 3r is still within reach
        assert_eq!(
            ball.update(&snapshot([36.0, 0.0, 0.0], Button::Secondary), &params()),
            Transition::Grabbed
        );
        assert!(ball.is_attached());
    }

    #[test]
    fn offset_is_frozen_while_continuously_attached() {
        let mut ball = TrackedSphere::default();
        ball.update(&snapshot([0.0, 20.0, 0.0], Button::Primary), &params());
        let first = ball.grab;
        assert_eq!(first, Grab::Attached { offset: [0.0, 20.0, 0.0] });

        for step in 1..10 {
            let tip = [step as f64, 20.0 + step as f64, -(step as f64)];
            assert_eq!(ball.update(&snapshot(tip, Button::Primary), &params()), Transition::Held);
            assert_eq!(ball.grab, first);
        }
    }

    #[test]
    fn offset_is_recomputed_on_each_new_grab() {
        let mut ball = TrackedSphere::default();
        ball.update(&snapshot([0.0, 20.0, 0.0], Button::Primary), &params());
        ball.update(&snapshot([0.0, 20.0, 0.0], Button::None), &params());
        assert_eq!(ball.grab, Grab::Detached);

        ball.update(&snapshot([10.0, 0.0, 0.0], Button::Primary), &params());
        assert_eq!(ball.grab, Grab::Attached { offset: [10.0, 0.0, 0.0] });
    }

    #[test]
    fn carry_then_release_scenario() {
        let params = params();
        let mut ball = TrackedSphere::default();
        let tip = [2.0 * params.sphere_radius, 0.0, 0.0];

        assert_eq!(ball.update(&snapshot(tip, Button::Primary), &params), Transition::Grabbed);
        assert_eq!(ball.position, [0.0; 3]);

        let delta = [5.0, -7.5, 3.25];
        let moved = add(&tip, &delta);
        ball.update(&snapshot(moved, Button::Primary), &params);
        assert_eq!(ball.position, delta);

        assert_eq!(ball.update(&snapshot(moved, Button::None), &params), Transition::Released);
        let resting = ball.position;
        let resting_orientation = ball.orientation;

        for far in [[60.0, 60.0, 0.0], [-30.0, 5.0, 12.0]] {
            ball.update(&snapshot(far, Button::None), &params);
            assert_eq!(ball.position, resting);
            assert_eq!(ball.orientation, resting_orientation);
        }
    }

    #[test]
    fn jumping_out_of_reach_releases_even_with_button_held() {
        let mut ball = TrackedSphere::default();
        ball.update(&snapshot([30.0, 0.0, 0.0], Button::Primary), &params());
        assert_eq!(
            ball.update(&snapshot([34.0, 0.0, 0.0], Button::Primary), &params()),
            Transition::Held
        );
        assert_eq!(ball.position, [4.0, 0.0, 0.0]);

        // Reach is measured against the ball's last position, not the new tip
        let mut near_edge = ball;
        assert_eq!(
            near_edge.update(&snapshot([44.0, 0.0, 0.0], Button::Primary), &params()),
            Transition::Released
        );

        assert_eq!(
            ball.update(&snapshot([200.0, 0.0, 0.0], Button::Primary), &params()),
            Transition::Released
        );
        assert_eq!(ball.position, [4.0, 0.0, 0.0]);
    }

    #[test]
    fn orientation_follows_stylus_while_attached() {
        let mut ball = TrackedSphere::default();
        let mut grabbed = snapshot([0.0, 0.0, 10.0], Button::Primary);
        grabbed.transform = compose_transform(&rotation_z(30.0), &grabbed.position);
        ball.update(&grabbed, &params());
        assert_eq!(ball.orientation, grabbed.transform);
    }
}
