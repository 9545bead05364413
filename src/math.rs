use crossterm::style::Color;

/// Column-major 4x4 identity, the layout device transforms are reported in
pub const IDENTITY_TRANSFORM: [f64; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Edge function used in rasterization
pub fn edge_function(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> f64 {
    (c[0] - a[0]) * (b[1] - a[1]) - (c[1] - a[1]) * (b[0] - a[0])
}

/// Multiplies a 3x3 matrix by a 3-dimensional vector
pub fn multiply_matrix_vector(matrix: &[[f64; 3]; 3], vector: &[f64; 3]) -> [f64; 3] {
    let mut result = [0.0; 3];
    for i in 0..3 {
        for j in 0..3 {
            result[i] += matrix[i][j] * vector[j];
        }
    }
    result
}

/// Multiplies two 3x3 matrices
pub fn multiply_matrices(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut result = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                result[i][j] += a[i][k] * b[k][j];
            }
        }
    }
    result
}

pub fn add(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(v: &[f64; 3], factor: f64) -> [f64; 3] {
    [v[0] * factor, v[1] * factor, v[2] * factor]
}

pub fn length(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Euclidean distance between two points
pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    length(&sub(a, b))
}

/// Rotation of `degrees` about an arbitrary axis (Rodrigues' formula).
/// The axis does not need to be normalized.
pub fn rotation_about_axis(axis: &[f64; 3], degrees: f64) -> [[f64; 3]; 3] {
    let len = length(axis);
    if len == 0.0 {
        return [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    }
    let [x, y, z] = scale(axis, 1.0 / len);
    let (s, c) = degrees.to_radians().sin_cos();
    let t = 1.0 - c;
    [
        [t * x * x + c, t * x * y - s * z, t * x * z + s * y],
        [t * x * y + s * z, t * y * y + c, t * y * z - s * x],
        [t * x * z - s * y, t * y * z + s * x, t * z * z + c],
    ]
}

/// Rotation about the X axis, in degrees
pub fn rotation_x(degrees: f64) -> [[f64; 3]; 3] {
    let (s, c) = degrees.to_radians().sin_cos();
    [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]]
}

/// Rotation about the Y axis, in degrees
pub fn rotation_y(degrees: f64) -> [[f64; 3]; 3] {
    let (s, c) = degrees.to_radians().sin_cos();
    [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]]
}

/// Rotation about the Z axis, in degrees
pub fn rotation_z(degrees: f64) -> [[f64; 3]; 3] {
    let (s, c) = degrees.to_radians().sin_cos();
    [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]]
}

/// Extracts the upper-left 3x3 rotation from a column-major 4x4 transform
pub fn rotation_part(transform: &[f64; 16]) -> [[f64; 3]; 3] {
    [
        [transform[0], transform[4], transform[8]],
        [transform[1], transform[5], transform[9]],
        [transform[2], transform[6], transform[10]],
    ]
}

/// Extracts the translation column of a column-major 4x4 transform
pub fn translation_part(transform: &[f64; 16]) -> [f64; 3] {
    [transform[12], transform[13], transform[14]]
}

/// Builds a column-major 4x4 transform from a rotation and a translation
pub fn compose_transform(rotation: &[[f64; 3]; 3], translation: &[f64; 3]) -> [f64; 16] {
    let mut m = IDENTITY_TRANSFORM;
    for row in 0..3 {
        for col in 0..3 {
            m[col * 4 + row] = rotation[row][col];
        }
    }
    m[12] = translation[0];
    m[13] = translation[1];
    m[14] = translation[2];
    m
}

/// Applies a column-major 4x4 affine transform to a point
pub fn transform_point(transform: &[f64; 16], point: &[f64; 3]) -> [f64; 3] {
    let rotated = multiply_matrix_vector(&rotation_part(transform), point);
    add(&rotated, &translation_part(transform))
}

/// Calculates the light intensity based on the normal vector and light position.
/// Normals are treated as two-sided.
pub fn calculate_light_intensity(
    normal: &[f64; 3],
    position: &[f64; 3],
    light_pos: &[f64; 3],
) -> f64 {
    let light_dir = [
        light_pos[0] - position[0],
        light_pos[1] - position[1],
        light_pos[2] - position[2],
    ];
    let length = (light_dir[0] * light_dir[0]
        + light_dir[1] * light_dir[1]
        + light_dir[2] * light_dir[2])
        .sqrt();
    let light_dir = [
        light_dir[0] / length,
        light_dir[1] / length,
        light_dir[2] / length,
    ];
    let dot_product =
        normal[0] * light_dir[0] + normal[1] * light_dir[1] + normal[2] * light_dir[2];
    dot_product.abs().max(0.25) // Ensure a minimum ambient light
}

/// Splits a colour into its RGB channels; named colours map to white
pub fn rgb_channels(color: Color) -> (u8, u8, u8) {
    match color {
        Color::Rgb { r, g, b } => (r, g, b),
        Color::Black => (0, 0, 0),
        _ => (255, 255, 255),
    }
}

/// Builds a colour from the 0..1 float channels used by the scene palette
pub fn rgb_f(r: f64, g: f64, b: f64) -> Color {
    Color::Rgb {
        r: (r.clamp(0.0, 1.0) * 255.0).round() as u8,
        g: (g.clamp(0.0, 1.0) * 255.0).round() as u8,
        b: (b.clamp(0.0, 1.0) * 255.0).round() as u8,
    }
}

/// Applies lighting to a color
pub fn apply_lighting(color: Color, intensity: f64) -> Color {
    let (r, g, b) = rgb_channels(color);
    Color::Rgb {
        r: (r as f64 * intensity).min(255.0) as u8,
        g: (g as f64 * intensity).min(255.0) as u8,
        b: (b as f64 * intensity).min(255.0) as u8,
    }
}

/// Mixes `top` over `bottom` with the given opacity
pub fn blend(bottom: Color, top: Color, alpha: f64) -> Color {
    let (br, bg, bb) = rgb_channels(bottom);
    let (tr, tg, tb) = rgb_channels(top);
    let mix = |b: u8, t: u8| (b as f64 * (1.0 - alpha) + t as f64 * alpha).round() as u8;
    Color::Rgb {
        r: mix(br, tr),
        g: mix(bg, tg),
        b: mix(bb, tb),
    }
}
