//! Bridge from rapier's debug render pipeline to [`PhysicsDebugRenderer`]

use rapier3d::math::{Point, Real};
use rapier3d::pipeline::{DebugRenderBackend, DebugRenderObject};

use crate::foundation::math::Vec3;
use crate::physics::debug_render::PhysicsDebugRenderer;

/// Forwards rapier debug lines to a host renderer
pub struct DebugLineForwarder<'a> {
    renderer: &'a mut dyn PhysicsDebugRenderer,
}

impl<'a> DebugLineForwarder<'a> {
    /// Wrap a host renderer
    pub fn new(renderer: &'a mut dyn PhysicsDebugRenderer) -> Self {
        Self { renderer }
    }
}

impl DebugRenderBackend for DebugLineForwarder<'_> {
    fn draw_line(&mut self, _object: DebugRenderObject, a: Point<Real>, b: Point<Real>, color: [f32; 4]) {
        self.renderer.draw_line(a.coords, b.coords, hsla_to_rgb(color));
    }
}

/// Convert rapier's `[hue, saturation, lightness, alpha]` colour to RGB
///
/// Hue is in degrees, the other channels in 0..1. Alpha is dropped.
pub fn hsla_to_rgb(hsla: [f32; 4]) -> Vec3 {
    let [h, s, l, _] = hsla;
    let h = h.rem_euclid(360.0) / 60.0;
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = l - c * 0.5;
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Vec3::new(r + m, g + m, b + m)
}
