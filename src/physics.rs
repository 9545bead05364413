//! Boundary wall and gravity forces for the grabbed ball.

/// Fixed scene dimensions and force constants
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicalParams {
    /// Radius of the stylus cursor; the ball is drawn at twice this
    pub sphere_radius: f64,
    /// Half the edge length of the bounding cube
    pub cube_half_extent: f64,
    /// Magnitude of each per-axis wall force
    pub wall_force: f64,
}

impl Default for PhysicalParams {
    fn default() -> Self {
        PhysicalParams {
            sphere_radius: 12.0,
            cube_half_extent: 75.0,
            wall_force: 10.0,
        }
    }
}

impl PhysicalParams {
    pub fn ball_radius(&self) -> f64 {
        2.0 * self.sphere_radius
    }

    /// Maximum tip-to-ball distance at which the ball can be grabbed
    pub fn grab_range(&self) -> f64 {
        3.0 * self.sphere_radius
    }

    /// Whether the ball surface reaches the wall on `axis` (inclusive)
    pub fn touches_wall(&self, position: &[f64; 3], axis: usize) -> bool {
        position[axis].abs() + self.ball_radius() >= self.cube_half_extent
    }
}

/// Vertical axis, along which gravity acts
pub const UP_AXIS: usize = 1;

/// Force to render for the ball at `position`.
///
/// Each axis contributes an independent wall force pointing back into the cube,
/// so edges and corners add two or three of them. Gravity (`-mass` on Y) is
/// applied whenever the ball is held. Nothing is rendered while detached.
pub fn boundary_force(
    position: &[f64; 3],
    attached: bool,
    mass: f64,
    params: &PhysicalParams,
) -> [f64; 3] {
    let mut force = [0.0; 3];
    if !attached {
        return force;
    }
    for axis in 0..3 {
        if params.touches_wall(position, axis) {
            force[axis] = if position[axis] > 0.0 {
                -params.wall_force
            } else {
                params.wall_force
            };
        }
    }
    force[UP_AXIS] -= mass;
    force
}

/// A face of the bounding cube
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Face {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::PosX,
        Face::NegX,
        Face::PosY,
        Face::NegY,
        Face::PosZ,
        Face::NegZ,
    ];

    pub fn axis(self) -> usize {
        match self {
            Face::PosX | Face::NegX => 0,
            Face::PosY | Face::NegY => 1,
            Face::PosZ | Face::NegZ => 2,
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(self, Face::PosX | Face::PosY | Face::PosZ)
    }

    fn index(self) -> usize {
        self.axis() * 2 + usize::from(!self.is_positive())
    }
}

/// Cube faces currently touched by the held ball; recomputed every frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Contacts {
    faces: [bool; 6],
}

impl Contacts {
    pub fn detect(position: &[f64; 3], attached: bool, params: &PhysicalParams) -> Self {
        let mut contacts = Contacts::default();
        if !attached {
            return contacts;
        }
        for face in Face::ALL {
            let axis = face.axis();
            let on_side = if face.is_positive() {
                position[axis] > 0.0
            } else {
                position[axis] < 0.0
            };
            contacts.faces[face.index()] = on_side && params.touches_wall(position, axis);
        }
        contacts
    }

    pub fn touches(&self, face: Face) -> bool {
        self.faces[face.index()]
    }

    pub fn any(&self) -> bool {
        self.faces.iter().any(|&touched| touched)
    }

    pub fn iter(&self) -> impl Iterator<Item = Face> + '_ {
        Face::ALL.into_iter().filter(|&face| self.touches(face))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PhysicalParams {
        PhysicalParams::default()
    }

    #[test]
    fn interior_ball_only_feels_gravity() {
        let mass = 3.0;
        for position in [[0.0, 0.0, 0.0], [50.0, -50.0, 50.9], [-50.9, 10.0, -20.0]] {
            let force = boundary_force(&position, true, mass, &params());
            assert_eq!(force, [0.0, -mass, 0.0], "at {:?}", position);
        }
    }

    #[test]
    fn positive_side_violation_pushes_back_on_that_axis_only() {
        let force = boundary_force(&[60.0, 0.0, 0.0], true, 0.0, &params());
        assert_eq!(force, [-10.0, 0.0, 0.0]);

        let force = boundary_force(&[0.0, 0.0, 70.0], true, 0.0, &params());
        assert_eq!(force, [0.0, 0.0, -10.0]);
    }

    #[test]
    fn negative_side_violation_pushes_in_positive_direction() {
        let force = boundary_force(&[0.0, -55.0, 0.0], true, 2.0, &params());
        assert_eq!(force, [0.0, 10.0 - 2.0, 0.0]);
    }

    #[test]
    fn detached_ball_renders_exact_zero() {
        for position in [[0.0; 3], [74.0, 74.0, 74.0], [-100.0, 3.0, 0.0]] {
            assert_eq!(boundary_force(&position, false, 5.0, &params()), [0.0; 3]);
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        // |p| + 2r == half extent
        let position = [51.0, 0.0, 0.0];
        assert!(params().touches_wall(&position, 0));
        let force = boundary_force(&position, true, 0.0, &params());
        assert_eq!(force[0], -10.0);

        let just_inside = [50.999, 0.0, 0.0];
        assert_eq!(boundary_force(&just_inside, true, 0.0, &params())[0], 0.0);
    }

    #[test]
    fn corners_sum_independent_wall_forces() {
        let force = boundary_force(&[60.0, 60.0, -60.0], true, 1.0, &params());
        assert_eq!(force, [-10.0, -11.0, 10.0]);
    }

    #[test]
    fn contacts_follow_sign_and_attachment() {
        let position = [60.0, -60.0, 0.0];
        let contacts = Contacts::detect(&position, true, &params());
        assert!(contacts.touches(Face::PosX));
        assert!(contacts.touches(Face::NegY));
        assert!(!contacts.touches(Face::NegX));
        assert!(!contacts.touches(Face::PosZ));
        assert_eq!(contacts.iter().collect::<Vec<_>>(), vec![Face::PosX, Face::NegY]);

        let detached = Contacts::detect(&position, false, &params());
        assert!(!detached.any());
    }
}
