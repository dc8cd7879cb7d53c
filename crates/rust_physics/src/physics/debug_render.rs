//! Debug rendering adapter for physics backends
//!
//! Backends describe what they want drawn through [`PhysicsDebugRenderer`].
//! Only lines, triangles and text are required; wire boxes and spheres are
//! derived from `draw_line`. [`DebugDrawBuffer`] records the primitives for
//! a frame so the host renderer can present them.

use crate::foundation::math::Vec3;
use super::types::PhysicsTransform;

/// Segments per circle of a wire sphere
pub const SPHERE_SEGMENTS: usize = 16;

/// Edges of a box as corner index pairs
const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1), (1, 2), (2, 3), (3, 0),
    (4, 5), (5, 6), (6, 7), (7, 4),
    (0, 4), (1, 5), (2, 6), (3, 7),
];

/// Sink for backend debug geometry
pub trait PhysicsDebugRenderer {
    /// Draw a line segment, `color` is linear RGB
    fn draw_line(&mut self, from: Vec3, to: Vec3, color: Vec3);

    /// Draw a filled triangle
    fn draw_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3, color: Vec3, alpha: f32);

    /// Draw a text label
    fn draw_text(&mut self, position: Vec3, text: &str);

    /// Draw the twelve edges of a box
    fn draw_wire_box(&mut self, transform: &PhysicsTransform, half_extents: Vec3, color: Vec3) {
        let h = half_extents;
        let local = [
            Vec3::new(-h.x, -h.y, -h.z),
            Vec3::new(h.x, -h.y, -h.z),
            Vec3::new(h.x, h.y, -h.z),
            Vec3::new(-h.x, h.y, -h.z),
            Vec3::new(-h.x, -h.y, h.z),
            Vec3::new(h.x, -h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
            Vec3::new(-h.x, h.y, h.z),
        ];
        let corners = local.map(|c| transform.position + transform.rotation * c);
        for (a, b) in BOX_EDGES {
            self.draw_line(corners[a], corners[b], color);
        }
    }

    /// Draw three orthogonal circles
    fn draw_wire_sphere(&mut self, center: Vec3, radius: f32, color: Vec3) {
        let step = std::f32::consts::TAU / SPHERE_SEGMENTS as f32;
        let planes = [(Vec3::x(), Vec3::y()), (Vec3::y(), Vec3::z()), (Vec3::z(), Vec3::x())];
        for (u, v) in planes {
            let point = |i: usize| {
                let angle = step * i as f32;
                center + (u * angle.cos() + v * angle.sin()) * radius
            };
            for i in 0..SPHERE_SEGMENTS {
                self.draw_line(point(i), point(i + 1), color);
            }
        }
    }
}

/// A recorded debug primitive
#[derive(Clone, Debug, PartialEq)]
pub enum DebugPrimitive {
    /// Line segment from start to end
    Line {
        /// Start point
        start: Vec3,
        /// End point
        end: Vec3,
        /// RGB color
        color: Vec3,
    },

    /// Filled triangle
    Triangle {
        /// Vertices
        vertices: [Vec3; 3],
        /// RGB color
        color: Vec3,
        /// Opacity
        alpha: f32,
    },

    /// Text label
    Text {
        /// Anchor point
        position: Vec3,
        /// Label
        text: String,
    },
}

/// Records debug primitives for one frame
#[derive(Debug, Default)]
pub struct DebugDrawBuffer {
    primitives: Vec<DebugPrimitive>,
}

impl DebugDrawBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded since the last clear
    pub fn primitives(&self) -> &[DebugPrimitive] {
        &self.primitives
    }

    /// Number of recorded lines
    pub fn line_count(&self) -> usize {
        self.primitives
            .iter()
            .filter(|p| matches!(p, DebugPrimitive::Line { .. }))
            .count()
    }

    /// Number of recorded primitives of any kind
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Drop everything, called once per frame by the presenter
    pub fn clear(&mut self) {
        self.primitives.clear();
    }

    /// Hand the recorded primitives to the presenter and start over
    pub fn take(&mut self) -> Vec<DebugPrimitive> {
        std::mem::take(&mut self.primitives)
    }
}

impl PhysicsDebugRenderer for DebugDrawBuffer {
    fn draw_line(&mut self, from: Vec3, to: Vec3, color: Vec3) {
        self.primitives.push(DebugPrimitive::Line { start: from, end: to, color });
    }

    fn draw_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3, color: Vec3, alpha: f32) {
        self.primitives.push(DebugPrimitive::Triangle {
            vertices: [a, b, c],
            color,
            alpha,
        });
    }

    fn draw_text(&mut self, position: Vec3, text: &str) {
        self.primitives.push(DebugPrimitive::Text {
            position,
            text: text.to_string(),
        });
    }
}
