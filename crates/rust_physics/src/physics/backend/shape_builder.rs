//! Recursive shape construction shared by every backend
//!
//! [`build_shape`] walks a [`ShapeConfig`] once and asks a [`ShapeFactory`]
//! for the native pieces. The result is a [`ShapeBundle`] that owns the
//! native shape together with every child shape and triangle buffer it was
//! built from; a backend keeps the bundle alive exactly as long as the body.
//!
//! Anything that cannot be built falls back to the unit box with a warning.

use std::sync::Arc;

use crate::foundation::math::{utils, Iso3, Vec3};
use crate::physics::types::shape::{ShapeConfig, DEFAULT_HALF_EXTENT};

/// Triangle data shared between a mesh shape and its owner
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// Vertex positions
    pub vertices: Vec<Vec3>,
    /// Index triples
    pub triangles: Vec<[u32; 3]>,
}

impl MeshData {
    /// Group a flat index list into triangles
    pub fn new(vertices: Vec<Vec3>, indices: &[u32]) -> Self {
        let triangles = indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Self { vertices, triangles }
    }

    /// Corner positions of one triangle
    pub fn triangle(&self, index: usize) -> Option<[Vec3; 3]> {
        let [a, b, c] = *self.triangles.get(index)?;
        Some([
            *self.vertices.get(a as usize)?,
            *self.vertices.get(b as usize)?,
            *self.vertices.get(c as usize)?,
        ])
    }
}

/// Native shape constructors an engine adapter provides
pub trait ShapeFactory {
    /// Native shape handle
    type Shape: Clone;

    /// Tag used in log messages
    fn engine_tag(&self) -> &'static str;

    /// Box from half extents
    fn cuboid(&mut self, half_extents: Vec3) -> Self::Shape;

    /// Sphere
    fn ball(&mut self, radius: f32) -> Self::Shape;

    /// Capsule along local Y
    fn capsule(&mut self, radius: f32, half_height: f32) -> Self::Shape;

    /// Cylinder along local Y
    fn cylinder(&mut self, radius: f32, half_height: f32) -> Self::Shape;

    /// Single triangle
    fn triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) -> Self::Shape;

    /// Convex hull, `None` when the points are degenerate
    fn convex_hull(&mut self, points: &[Vec3]) -> Option<Self::Shape>;

    /// Triangle mesh, `None` when the engine rejects the data
    fn triangle_mesh(&mut self, mesh: &Arc<MeshData>) -> Option<Self::Shape>;

    /// Compound of posed children, `None` when the engine rejects it
    fn compound(&mut self, children: Vec<(Iso3, Self::Shape)>) -> Option<Self::Shape>;

    /// Whether a compound may contain compounds or meshes
    ///
    /// When false, nested compounds are flattened and meshes inside a
    /// compound are split into triangles.
    fn supports_nested_composites(&self) -> bool {
        true
    }
}

/// A native shape and everything it was built from
#[derive(Debug, Clone)]
pub struct ShapeBundle<S> {
    /// The root shape attached to the body
    pub shape: S,
    /// Every child shape created for compounds, depth first
    pub child_shapes: Vec<S>,
    /// Triangle buffers referenced by mesh shapes
    pub mesh_data: Vec<Arc<MeshData>>,
    /// The description could not be built and the unit box was used
    pub used_fallback: bool,
}

impl<S> ShapeBundle<S> {
    fn single(shape: S) -> Self {
        Self {
            shape,
            child_shapes: Vec::new(),
            mesh_data: Vec::new(),
            used_fallback: false,
        }
    }
}

/// Build the native shape for a description
pub fn build_shape<F: ShapeFactory>(factory: &mut F, config: &ShapeConfig) -> ShapeBundle<F::Shape> {
    match try_build(factory, config) {
        Ok(bundle) => bundle,
        Err(reason) => {
            log::warn!(
                "[{}] {} shape could not be built ({}), using default box",
                factory.engine_tag(),
                config.type_name(),
                reason
            );
            fallback(factory)
        }
    }
}

fn fallback<F: ShapeFactory>(factory: &mut F) -> ShapeBundle<F::Shape> {
    let mut bundle = ShapeBundle::single(factory.cuboid(Vec3::repeat(DEFAULT_HALF_EXTENT)));
    bundle.used_fallback = true;
    bundle
}

fn try_build<F: ShapeFactory>(factory: &mut F, config: &ShapeConfig) -> Result<ShapeBundle<F::Shape>, String> {
    match config {
        ShapeConfig::Compound { children } => build_compound(factory, children),
        ShapeConfig::Mesh { vertices, indices } => {
            config.validate().map_err(|e| e.to_string())?;
            let mesh = Arc::new(MeshData::new(vertices.clone(), indices));
            let shape = factory
                .triangle_mesh(&mesh)
                .ok_or_else(|| "engine rejected the triangle data".to_string())?;
            let mut bundle = ShapeBundle::single(shape);
            bundle.mesh_data.push(mesh);
            Ok(bundle)
        }
        ShapeConfig::ConvexHull { vertices } => {
            config.validate().map_err(|e| e.to_string())?;
            factory
                .convex_hull(vertices)
                .map(ShapeBundle::single)
                .ok_or_else(|| "degenerate hull".to_string())
        }
        _ => {
            config.validate().map_err(|e| e.to_string())?;
            Ok(ShapeBundle::single(build_primitive(factory, config)))
        }
    }
}

fn build_primitive<F: ShapeFactory>(factory: &mut F, config: &ShapeConfig) -> F::Shape {
    match config {
        ShapeConfig::Sphere { radius } => factory.ball(*radius),
        ShapeConfig::Capsule { radius, height } => factory.capsule(*radius, height * 0.5),
        ShapeConfig::Cylinder { radius, height } => factory.cylinder(*radius, height * 0.5),
        ShapeConfig::Box { half_extents } => factory.cuboid(*half_extents),
        // Composite kinds never reach here
        _ => factory.cuboid(Vec3::repeat(DEFAULT_HALF_EXTENT)),
    }
}

fn build_compound<F: ShapeFactory>(
    factory: &mut F,
    children: &[crate::physics::types::CompoundChild],
) -> Result<ShapeBundle<F::Shape>, String> {
    if children.is_empty() {
        return Err("compound has no children".into());
    }

    let mut parts = Vec::new();
    let mut child_shapes = Vec::new();
    let mut mesh_data = Vec::new();
    let nested = factory.supports_nested_composites();

    collect_children(factory, children, &Iso3::identity(), nested, &mut parts, &mut child_shapes, &mut mesh_data);

    if parts.is_empty() {
        return Err("no child could be built".into());
    }

    let shape = factory
        .compound(parts)
        .ok_or_else(|| "engine rejected the compound".to_string())?;

    Ok(ShapeBundle {
        shape,
        child_shapes,
        mesh_data,
        used_fallback: false,
    })
}

fn collect_children<F: ShapeFactory>(
    factory: &mut F,
    children: &[crate::physics::types::CompoundChild],
    parent_pose: &Iso3,
    nested: bool,
    parts: &mut Vec<(Iso3, F::Shape)>,
    child_shapes: &mut Vec<F::Shape>,
    mesh_data: &mut Vec<Arc<MeshData>>,
) {
    for child in children {
        let pose = parent_pose * utils::isometry(&child.position, &child.rotation);

        match &child.shape {
            ShapeConfig::Compound { children: grandchildren } if !nested => {
                collect_children(factory, grandchildren, &pose, nested, parts, child_shapes, mesh_data);
            }
            ShapeConfig::Mesh { vertices, indices } if !nested => {
                if let Err(e) = child.shape.validate() {
                    log::warn!("[{}] skipping compound mesh child: {}", factory.engine_tag(), e);
                    continue;
                }
                let mesh = Arc::new(MeshData::new(vertices.clone(), indices));
                for i in 0..mesh.triangles.len() {
                    if let Some([a, b, c]) = mesh.triangle(i) {
                        let tri = factory.triangle(a, b, c);
                        child_shapes.push(tri.clone());
                        parts.push((pose, tri));
                    }
                }
                mesh_data.push(mesh);
            }
            other => {
                let bundle = build_shape(factory, other);
                child_shapes.extend(bundle.child_shapes);
                mesh_data.extend(bundle.mesh_data);
                child_shapes.push(bundle.shape.clone());
                parts.push((pose, bundle.shape));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use crate::physics::types::CompoundChild;
    use approx::assert_relative_eq;

    /// Records what was asked for instead of building anything
    #[derive(Debug, Clone, PartialEq)]
    enum Fake {
        Cuboid(Vec3),
        Ball(f32),
        Capsule(f32, f32),
        Cylinder(f32, f32),
        Triangle,
        Hull(usize),
        Mesh(usize),
        Compound(Vec<(Vec3, Fake)>),
    }

    struct FakeFactory {
        nested: bool,
    }

    impl ShapeFactory for FakeFactory {
        type Shape = Fake;

        fn engine_tag(&self) -> &'static str {
            "Fake"
        }

        fn cuboid(&mut self, half_extents: Vec3) -> Fake {
            Fake::Cuboid(half_extents)
        }

        fn ball(&mut self, radius: f32) -> Fake {
            Fake::Ball(radius)
        }

        fn capsule(&mut self, radius: f32, half_height: f32) -> Fake {
            Fake::Capsule(radius, half_height)
        }

        fn cylinder(&mut self, radius: f32, half_height: f32) -> Fake {
            Fake::Cylinder(radius, half_height)
        }

        fn triangle(&mut self, _a: Vec3, _b: Vec3, _c: Vec3) -> Fake {
            Fake::Triangle
        }

        fn convex_hull(&mut self, points: &[Vec3]) -> Option<Fake> {
            (points.len() >= 4).then(|| Fake::Hull(points.len()))
        }

        fn triangle_mesh(&mut self, mesh: &Arc<MeshData>) -> Option<Fake> {
            Some(Fake::Mesh(mesh.triangles.len()))
        }

        fn compound(&mut self, children: Vec<(Iso3, Fake)>) -> Option<Fake> {
            Some(Fake::Compound(
                children.into_iter().map(|(p, s)| (p.translation.vector, s)).collect(),
            ))
        }

        fn supports_nested_composites(&self) -> bool {
            self.nested
        }
    }

    fn unit_box() -> Fake {
        Fake::Cuboid(Vec3::repeat(0.5))
    }

    #[test]
    fn test_primitives_use_half_heights() {
        let mut f = FakeFactory { nested: true };
        assert_eq!(build_shape(&mut f, &ShapeConfig::capsule(0.5, 2.0)).shape, Fake::Capsule(0.5, 1.0));
        assert_eq!(build_shape(&mut f, &ShapeConfig::cylinder(1.0, 3.0)).shape, Fake::Cylinder(1.0, 1.5));
        assert_eq!(build_shape(&mut f, &ShapeConfig::sphere(2.0)).shape, Fake::Ball(2.0));
    }

    #[test]
    fn test_empty_hull_falls_back_to_unit_box() {
        let mut f = FakeFactory { nested: true };
        let bundle = build_shape(&mut f, &ShapeConfig::ConvexHull { vertices: vec![] });
        assert_eq!(bundle.shape, unit_box());
        assert!(bundle.used_fallback);
    }

    #[test]
    fn test_degenerate_hull_falls_back() {
        let mut f = FakeFactory { nested: true };
        let bundle = build_shape(&mut f, &ShapeConfig::ConvexHull { vertices: vec![Vec3::zeros(), Vec3::x()] });
        assert_eq!(bundle.shape, unit_box());
    }

    #[test]
    fn test_invalid_dimensions_fall_back() {
        let mut f = FakeFactory { nested: true };
        assert_eq!(build_shape(&mut f, &ShapeConfig::sphere(-1.0)).shape, unit_box());
        assert_eq!(build_shape(&mut f, &ShapeConfig::Compound { children: vec![] }).shape, unit_box());
        let bad_mesh = ShapeConfig::Mesh { vertices: vec![Vec3::zeros()], indices: vec![0, 1, 2] };
        assert_eq!(build_shape(&mut f, &bad_mesh).shape, unit_box());
    }

    #[test]
    fn test_mesh_bundle_owns_triangle_data() {
        let mut f = FakeFactory { nested: true };
        let mesh = ShapeConfig::Mesh {
            vertices: vec![Vec3::zeros(), Vec3::x(), Vec3::z(), Vec3::new(1.0, 0.0, 1.0)],
            indices: vec![0, 1, 2, 1, 3, 2],
        };
        let bundle = build_shape(&mut f, &mesh);
        assert_eq!(bundle.shape, Fake::Mesh(2));
        assert_eq!(bundle.mesh_data.len(), 1);
        assert_eq!(bundle.mesh_data[0].triangles.len(), 2);
    }

    #[test]
    fn test_nested_compound_keeps_structure() {
        let mut f = FakeFactory { nested: true };
        let inner = ShapeConfig::Compound {
            children: vec![CompoundChild::new(ShapeConfig::sphere(1.0), Vec3::x(), Quat::identity())],
        };
        let outer = ShapeConfig::Compound {
            children: vec![
                CompoundChild::new(inner, Vec3::new(0.0, 2.0, 0.0), Quat::identity()),
                CompoundChild::new(ShapeConfig::cuboid(1.0, 1.0, 1.0), Vec3::zeros(), Quat::identity()),
            ],
        };
        let bundle = build_shape(&mut f, &outer);
        let Fake::Compound(parts) = &bundle.shape else {
            panic!("expected compound, got {:?}", bundle.shape);
        };
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[0].1, Fake::Compound(_)));
        // Inner sphere, inner compound and the box are all owned by the bundle
        assert_eq!(bundle.child_shapes.len(), 3);
    }

    #[test]
    fn test_flattened_compound_composes_poses() {
        let mut f = FakeFactory { nested: false };
        let inner = ShapeConfig::Compound {
            children: vec![CompoundChild::new(ShapeConfig::sphere(1.0), Vec3::x(), Quat::identity())],
        };
        let mesh = ShapeConfig::Mesh {
            vertices: vec![Vec3::zeros(), Vec3::x(), Vec3::z()],
            indices: vec![0, 1, 2],
        };
        let outer = ShapeConfig::Compound {
            children: vec![
                CompoundChild::new(inner, Vec3::new(0.0, 2.0, 0.0), Quat::identity()),
                CompoundChild::new(mesh, Vec3::zeros(), Quat::identity()),
            ],
        };
        let bundle = build_shape(&mut f, &outer);
        let Fake::Compound(parts) = &bundle.shape else {
            panic!("expected compound, got {:?}", bundle.shape);
        };
        assert_eq!(parts.len(), 2);
        assert_relative_eq!(parts[0].0, Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(parts[0].1, Fake::Ball(1.0));
        assert_eq!(parts[1].1, Fake::Triangle);
        assert_eq!(bundle.mesh_data.len(), 1);
    }
}
