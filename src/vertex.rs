/// A projected mesh vertex ready for rasterization.
///
/// `position` is in view space with `z` growing away from the viewer, so the
/// depth buffer keeps the smallest value.
#[derive(Clone, Copy, Debug)]
pub struct Vertex {
    pub position: [f64; 3],
    pub screen_position: [f64; 2],
    pub normal: [f64; 3],
}

impl Vertex {
    pub fn depth(&self) -> f64 {
        self.position[2]
    }
}
