use crate::math::{apply_lighting, blend, calculate_light_intensity, edge_function};
use crate::vertex::Vertex;
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
};
use std::io::{self, Write};

/// Pixels per terminal row: each cell shows an upper and a lower half block
pub const PIXELS_PER_ROW: usize = 2;

/// How a surface is shaded when rasterized
#[derive(Clone, Copy, Debug)]
pub struct Material {
    pub color: Color,
    /// Apply per-pixel lighting from the scene light
    pub lit: bool,
    /// Opacity; translucent surfaces blend and do not write depth
    pub alpha: f64,
}

impl Material {
    pub fn lit(color: Color) -> Self {
        Material {
            color,
            lit: true,
            alpha: 1.0,
        }
    }

    pub fn translucent(color: Color, alpha: f64) -> Self {
        Material {
            color,
            lit: false,
            alpha,
        }
    }
}

/// A line of text drawn over the rendered image, in terminal cells
#[derive(Clone, Debug, PartialEq)]
pub struct TextLine {
    pub column: u16,
    pub row: u16,
    pub text: String,
    pub color: Color,
}

/// Colour and depth buffers for one frame
pub struct Canvas {
    pub width: usize,
    pub height: usize,
    pixels: Vec<Color>,
    z_buffer: Vec<f64>,
    pub overlay: Vec<TextLine>,
}

impl Canvas {
    /// Creates a canvas covering `columns` x `rows` terminal cells
    pub fn for_terminal(columns: u16, rows: u16, background: Color) -> Self {
        Canvas::new(columns as usize, rows as usize * PIXELS_PER_ROW, background)
    }

    pub fn new(width: usize, height: usize, background: Color) -> Self {
        Canvas {
            width,
            height,
            pixels: vec![background; width * height],
            z_buffer: vec![f64::INFINITY; width * height],
            overlay: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    #[cfg(test)]
    pub fn depth(&self, x: usize, y: usize) -> Option<f64> {
        if x < self.width && y < self.height {
            Some(self.z_buffer[y * self.width + x])
        } else {
            None
        }
    }

    /// Writes a fragment, honouring the depth test and material opacity
    fn plot(&mut self, x: usize, y: usize, depth: f64, color: Color, alpha: f64) {
        let offset = y * self.width + x;
        if depth >= self.z_buffer[offset] {
            return;
        }
        if alpha >= 1.0 {
            self.z_buffer[offset] = depth;
            self.pixels[offset] = color;
        } else {
            self.pixels[offset] = blend(self.pixels[offset], color, alpha);
        }
    }

    pub fn text(&mut self, column: u16, row: u16, text: impl Into<String>, color: Color) {
        self.overlay.push(TextLine {
            column,
            row,
            text: text.into(),
            color,
        });
    }

    /// Presents the canvas with half-block glyphs, then the text overlay
    pub fn present<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for row in 0..self.height / PIXELS_PER_ROW {
            queue!(out, MoveTo(0, row as u16))?;
            let mut current: Option<(Color, Color)> = None;
            for x in 0..self.width {
                let top = self.pixels[(row * PIXELS_PER_ROW) * self.width + x];
                let bottom = self.pixels[(row * PIXELS_PER_ROW + 1) * self.width + x];
                if current != Some((top, bottom)) {
                    queue!(out, SetForegroundColor(top), SetBackgroundColor(bottom))?;
                    current = Some((top, bottom));
                }
                queue!(out, Print('\u{2580}'))?;
            }
        }
        queue!(out, ResetColor)?;
        for line in &self.overlay {
            queue!(
                out,
                MoveTo(line.column, line.row),
                SetForegroundColor(line.color),
                SetBackgroundColor(Color::Black),
                Print(&line.text)
            )?;
        }
        queue!(out, ResetColor)?;
        out.flush()
    }
}

/// Draws a triangle with per-pixel lighting
pub fn draw_triangle(
    canvas: &mut Canvas,
    v0: &Vertex,
    v1: &Vertex,
    v2: &Vertex,
    light_pos: &[f64; 3],
    material: Material,
) {
    if canvas.width == 0 || canvas.height == 0 {
        return;
    }
    // Compute bounding box of the triangle
    let min_x = v0.screen_position[0]
        .min(v1.screen_position[0])
        .min(v2.screen_position[0])
        .floor()
        .max(0.0) as usize;
    let max_x = v0.screen_position[0]
        .max(v1.screen_position[0])
        .max(v2.screen_position[0])
        .ceil()
        .min(canvas.width as f64 - 1.0);
    let min_y = v0.screen_position[1]
        .min(v1.screen_position[1])
        .min(v2.screen_position[1])
        .floor()
        .max(0.0) as usize;
    let max_y = v0.screen_position[1]
        .max(v1.screen_position[1])
        .max(v2.screen_position[1])
        .ceil()
        .min(canvas.height as f64 - 1.0);
    if max_x < 0.0 || max_y < 0.0 {
        return;
    }
    let (max_x, max_y) = (max_x as usize, max_y as usize);

    // Precompute area of the triangle; either winding is accepted
    let area = edge_function(&v0.screen_position, &v1.screen_position, &v2.screen_position);
    if area == 0.0 {
        return;
    }

    // For each pixel in the bounding box
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let p = [x as f64 + 0.5, y as f64 + 0.5];

            // Normalized barycentric coordinates
            let w0 = edge_function(&v1.screen_position, &v2.screen_position, &p) / area;
            let w1 = edge_function(&v2.screen_position, &v0.screen_position, &p) / area;
            let w2 = edge_function(&v0.screen_position, &v1.screen_position, &p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            // Interpolate position
            let position = [
                v0.position[0] * w0 + v1.position[0] * w1 + v2.position[0] * w2,
                v0.position[1] * w0 + v1.position[1] * w1 + v2.position[1] * w2,
                v0.position[2] * w0 + v1.position[2] * w1 + v2.position[2] * w2,
            ];

            let color = if material.lit {
                // Interpolate normal
                let nx = v0.normal[0] * w0 + v1.normal[0] * w1 + v2.normal[0] * w2;
                let ny = v0.normal[1] * w0 + v1.normal[1] * w1 + v2.normal[1] * w2;
                let nz = v0.normal[2] * w0 + v1.normal[2] * w1 + v2.normal[2] * w2;
                let length = (nx * nx + ny * ny + nz * nz).sqrt().max(f64::EPSILON);
                let interpolated_normal = [nx / length, ny / length, nz / length];
                let intensity =
                    calculate_light_intensity(&interpolated_normal, &position, light_pos);
                apply_lighting(material.color, intensity)
            } else {
                material.color
            };

            canvas.plot(x, y, position[2], color, material.alpha);
        }
    }
}

/// Parametric (Liang-Barsky) clip of a screen segment to the canvas plus a
/// one pixel margin. Returns the kept parameter range along the segment.
fn clip_to_canvas(canvas: &Canvas, start: &[f64; 2], end: &[f64; 2]) -> Option<(f64, f64)> {
    if !start.iter().chain(end.iter()).all(|c| c.is_finite()) {
        return None;
    }
    let (x_min, y_min) = (-1.0, -1.0);
    let (x_max, y_max) = (canvas.width as f64, canvas.height as f64);
    let dx = end[0] - start[0];
    let dy = end[1] - start[1];
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [
        (-dx, start[0] - x_min),
        (dx, x_max - start[0]),
        (-dy, start[1] - y_min),
        (dy, y_max - start[1]),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

/// Draws a depth-tested line between two projected vertices using Bresenham's algorithm
pub fn draw_line(canvas: &mut Canvas, start: &Vertex, end: &Vertex, color: Color) {
    let Some((t_start, t_end)) = clip_to_canvas(canvas, &start.screen_position, &end.screen_position)
    else {
        return;
    };
    let at = |t: f64| {
        let x = start.screen_position[0] + (end.screen_position[0] - start.screen_position[0]) * t;
        let y = start.screen_position[1] + (end.screen_position[1] - start.screen_position[1]) * t;
        let depth = start.depth() + (end.depth() - start.depth()) * t;
        (x, y, depth)
    };
    let (start_x, start_y, start_depth) = at(t_start);
    let (end_x, end_y, end_depth) = at(t_end);

    let (mut x0, mut y0, x1, y1) = (
        start_x.round() as isize,
        start_y.round() as isize,
        end_x.round() as isize,
        end_y.round() as isize,
    );
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy; // error value e_xy
    let steps = dx.max(-dy).max(1) as f64;
    let mut step = 0.0;
    // Lines sit slightly in front of coplanar surfaces
    let bias = 0.5;

    loop {
        if x0 >= 0 && x0 < canvas.width as isize && y0 >= 0 && y0 < canvas.height as isize {
            let t = step / steps;
            let depth = start_depth + (end_depth - start_depth) * t - bias;
            canvas.plot(x0 as usize, y0 as usize, depth, color, 1.0);
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
        step += 1.0;
    }
}
