use crate::camera::Camera;
use crate::device::{Button, Workspace};
use crate::graphics::{draw_line, draw_triangle, Canvas, Material};
use crate::grab::{DeviceSnapshot, TrackedSphere};
use crate::math::{
    add, compose_transform, multiply_matrix_vector, rgb_f, rotation_part, scale,
    transform_point, translation_part, IDENTITY_TRANSFORM,
};
use crate::physics::{Contacts, Face, PhysicalParams};
use crate::vertex::Vertex;
use crossterm::style::Color;
use std::f64::consts::PI;

/// Light source position in view space (x right, y up, z into the screen)
const LIGHT_POSITION: [f64; 3] = [60.0, 80.0, -400.0];

/// Device units of force line per unit of force
const FORCE_LINE_SCALE: f64 = 3.0;

pub fn background_color() -> Color {
    rgb_f(0.7, 0.7, 0.7)
}

fn axis_colors() -> [Color; 3] {
    [rgb_f(1.0, 0.0, 0.0), rgb_f(0.0, 1.0, 0.0), rgb_f(0.0, 0.0, 1.0)]
}

/// Colour of the stylus cursor for each button state
pub fn cursor_color(button: Button) -> Color {
    match button {
        Button::None => rgb_f(0.8, 0.2, 0.2),
        Button::Primary => rgb_f(0.2, 0.8, 0.2),
        Button::Secondary => rgb_f(0.2, 0.2, 0.8),
    }
}

/// Colour of the ball: red while the tip could grab it
pub fn ball_color(within_reach: bool) -> Color {
    if within_reach {
        rgb_f(0.8, 0.2, 0.2)
    } else {
        rgb_f(0.2, 0.8, 0.8)
    }
}

fn highlight_color() -> Color {
    rgb_f(0.3, 1.0, 1.0)
}

/// Orthographic view volume fitted to the device workspace
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub center: [f64; 3],
    pub half_extent: f64,
}

impl Projection {
    pub fn from_workspace(workspace: &Workspace) -> Self {
        Projection {
            center: workspace.center(),
            half_extent: workspace.half_max_dimension(),
        }
    }
}

/// Unit UV sphere
struct SphereMesh {
    points: Vec<[f64; 3]>,
    triangles: Vec<(usize, usize, usize)>,
}

impl SphereMesh {
    fn new(stacks: usize, slices: usize) -> Self {
        let mut points = Vec::with_capacity((stacks + 1) * (slices + 1));
        for i in 0..=stacks {
            let theta = PI * i as f64 / stacks as f64;
            for j in 0..=slices {
                let phi = 2.0 * PI * j as f64 / slices as f64;
                points.push([theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()]);
            }
        }
        let mut triangles = Vec::with_capacity(stacks * slices * 2);
        for i in 0..stacks {
            for j in 0..slices {
                let a = i * (slices + 1) + j;
                let b = a + slices + 1;
                triangles.push((a, b, a + 1));
                triangles.push((a + 1, b, b + 1));
            }
        }
        SphereMesh { points, triangles }
    }
}

/// Everything the renderer needs for one frame
pub struct SceneView<'a> {
    pub camera: &'a Camera,
    pub snapshot: &'a DeviceSnapshot,
    pub ball: &'a TrackedSphere,
    pub contacts: Contacts,
    pub show_force: bool,
}

pub struct SceneRenderer {
    params: PhysicalParams,
    projection: Projection,
    sphere: SphereMesh,
}

/// Camera rotation and zoom resolved once per frame
struct ViewTransform {
    rotation: [[f64; 3]; 3],
    zoom: f64,
}

impl SceneRenderer {
    pub fn new(params: PhysicalParams, workspace: &Workspace) -> Self {
        SceneRenderer {
            params,
            projection: Projection::from_workspace(workspace),
            sphere: SphereMesh::new(8, 12),
        }
    }

    /// Projects a world point to a vertex on `canvas`
    #[cfg(test)]
    pub fn project(&self, camera: &Camera, canvas: &Canvas, world: &[f64; 3]) -> Vertex {
        let view = ViewTransform {
            rotation: camera.rotation(),
            zoom: camera.zoom,
        };
        self.project_with(&view, canvas, world, &[0.0, 0.0, -1.0])
    }

    fn project_with(
        &self,
        view: &ViewTransform,
        canvas: &Canvas,
        world: &[f64; 3],
        world_normal: &[f64; 3],
    ) -> Vertex {
        let eye = multiply_matrix_vector(&view.rotation, &scale(world, view.zoom));
        let normal = multiply_matrix_vector(&view.rotation, world_normal);
        let pixels_per_unit =
            canvas.width.min(canvas.height) as f64 / (2.0 * self.projection.half_extent);
        let center = self.projection.center;

        let screen_x = canvas.width as f64 / 2.0 + (eye[0] - center[0]) * pixels_per_unit;
        let screen_y = canvas.height as f64 / 2.0 - (eye[1] - center[1]) * pixels_per_unit;
        // OpenGL looks down -z; depth grows away from the viewer
        let depth = center[2] - eye[2];
        Vertex {
            position: [eye[0], eye[1], depth],
            screen_position: [screen_x, screen_y],
            normal: [normal[0], normal[1], -normal[2]],
        }
    }

    /// Paint the scene
    pub fn render(&self, view: &SceneView, canvas: &mut Canvas) {
        let transform = ViewTransform {
            rotation: view.camera.rotation(),
            zoom: view.camera.zoom,
        };

        // Fixed frame and bounding cube
        self.draw_axes(canvas, &transform, &IDENTITY_TRANSFORM, 2.0 * self.params.sphere_radius);
        self.draw_wire_cube(canvas, &transform);

        // Ball, oriented by the stylus transform frozen at the last attached frame
        let ball = compose_transform(&rotation_part(&view.ball.orientation), &view.ball.position);
        let within_reach = view.ball.within_reach(&view.snapshot.position, &self.params);
        self.draw_sphere(
            canvas,
            &transform,
            &ball,
            self.params.ball_radius(),
            ball_color(within_reach),
        );
        self.draw_axes(canvas, &transform, &ball, 1.5 * self.params.ball_radius());

        // Stylus cursor
        self.draw_sphere(
            canvas,
            &transform,
            &view.snapshot.transform,
            self.params.sphere_radius,
            cursor_color(view.snapshot.button),
        );
        self.draw_axes(
            canvas,
            &transform,
            &view.snapshot.transform,
            2.0 * self.params.sphere_radius,
        );

        if view.show_force {
            let end = add(&view.snapshot.position, &scale(&view.snapshot.force, FORCE_LINE_SCALE));
            let start = self.project_with(&transform, canvas, &view.snapshot.position, &[0.0; 3]);
            let end = self.project_with(&transform, canvas, &end, &[0.0; 3]);
            draw_line(canvas, &start, &end, rgb_f(0.2, 0.7, 0.2));
        }

        // Translucent highlights last so they blend over opaque geometry
        for face in view.contacts.iter() {
            self.draw_face_highlight(canvas, &transform, face);
        }
    }

    fn draw_axes(
        &self,
        canvas: &mut Canvas,
        view: &ViewTransform,
        frame: &[f64; 16],
        length: f64,
    ) {
        let start = self.project_with(view, canvas, &translation_part(frame), &[0.0; 3]);
        for (axis, color) in axis_colors().into_iter().enumerate() {
            let mut direction = [0.0; 3];
            direction[axis] = length;
            let end_world = transform_point(frame, &direction);
            let end = self.project_with(view, canvas, &end_world, &[0.0; 3]);
            draw_line(canvas, &start, &end, color);
        }
    }

    fn draw_wire_cube(&self, canvas: &mut Canvas, view: &ViewTransform) {
        let h = self.params.cube_half_extent;
        // Define cube vertices
        let vertices = [
            [-h, -h, -h], // 0
            [h, -h, -h],  // 1
            [h, h, -h],   // 2
            [-h, h, -h],  // 3
            [-h, -h, h],  // 4
            [h, -h, h],   // 5
            [h, h, h],    // 6
            [-h, h, h],   // 7
        ];
        // Define cube edges (pairs of vertex indices)
        let edges = [
            (0, 1),
            (1, 2),
            (2, 3),
            (3, 0), // Back face
            (4, 5),
            (5, 6),
            (6, 7),
            (7, 4), // Front face
            (0, 4),
            (1, 5),
            (2, 6),
            (3, 7), // Connecting edges
        ];
        let projected: Vec<Vertex> = vertices
            .iter()
            .map(|v| self.project_with(view, canvas, v, &[0.0; 3]))
            .collect();
        for &(start, end) in &edges {
            draw_line(canvas, &projected[start], &projected[end], Color::White);
        }
    }

    fn draw_sphere(
        &self,
        canvas: &mut Canvas,
        view: &ViewTransform,
        frame: &[f64; 16],
        radius: f64,
        color: Color,
    ) {
        let rotation = rotation_part(frame);
        let projected: Vec<Vertex> = self
            .sphere
            .points
            .iter()
            .map(|unit| {
                let normal = multiply_matrix_vector(&rotation, unit);
                let world = transform_point(frame, &scale(unit, radius));
                self.project_with(view, canvas, &world, &normal)
            })
            .collect();
        let material = Material::lit(color);
        for &(a, b, c) in &self.sphere.triangles {
            draw_triangle(
                canvas,
                &projected[a],
                &projected[b],
                &projected[c],
                &LIGHT_POSITION,
                material,
            );
        }
    }

    fn draw_face_highlight(&self, canvas: &mut Canvas, view: &ViewTransform, face: Face) {
        let h = self.params.cube_half_extent;
        let axis = face.axis();
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        let corners: Vec<Vertex> = [(-h, -h), (h, -h), (h, h), (-h, h)]
            .iter()
            .map(|&(a, b)| {
                let mut world = [0.0; 3];
                world[axis] = if face.is_positive() { h } else { -h };
                world[u] = a;
                world[v] = b;
                self.project_with(view, canvas, &world, &[0.0; 3])
            })
            .collect();
        let material = Material::translucent(highlight_color(), 0.5);
        draw_triangle(canvas, &corners[0], &corners[1], &corners[2], &LIGHT_POSITION, material);
        draw_triangle(canvas, &corners[0], &corners[2], &corners[3], &LIGHT_POSITION, material);
    }
}
