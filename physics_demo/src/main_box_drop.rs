//! Box drop demo
//!
//! Drops a unit box onto a static floor through the ECS bridge and logs the
//! box height until it comes to rest.
//!
//! Usage: `box_drop [rapier|reference]`

use rust_physics::ecs::{
    components::{CollisionEvents, PhysicsVelocity, TransformComponent, WorldTransform},
    resources::PhysicsWorldConfig,
    systems::PhysicsSyncBridge,
    World,
};
use rust_physics::foundation::logging;
use rust_physics::foundation::math::Vec3;
use rust_physics::physics::{
    ColliderConfig, DebugDrawBuffer, PhysicsConfig, PhysicsEngineType, PhysicsError, PhysicsSystem,
    RigidBody, ShapeConfig,
};

const FRAME_TIME: f32 = 1.0 / 60.0;
const SIMULATED_SECONDS: f32 = 3.0;

#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Physics(#[from] PhysicsError),

    #[error("box never settled (height {height:.3}, speed {speed:.3})")]
    NotSettled { height: f32, speed: f32 },
}

fn main() {
    logging::init_with_level(log::LevelFilter::Info);

    if let Err(e) = run() {
        log::error!("box_drop failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), DemoError> {
    let engine = match std::env::args().nth(1) {
        Some(name) => name.parse::<PhysicsEngineType>()?,
        None => PhysicsEngineType::default(),
    };

    let config = PhysicsConfig::default().with_debug_physics(true);
    let mut physics = PhysicsSystem::new(engine, config.clone())?;
    log::info!("Running box drop on {} ({:?})", physics.engine_name(), physics.capabilities());

    let mut world = World::new();
    world.insert_resource(PhysicsWorldConfig::from(&config));

    let floor = world.spawn();
    world.insert(floor, TransformComponent::identity());
    world.insert(floor, RigidBody::fixed());
    world.insert(floor, ColliderConfig::new(ShapeConfig::cuboid(5.0, 0.5, 5.0)));

    let falling_box = world.spawn();
    world.insert(falling_box, TransformComponent::from_position(Vec3::new(0.0, 10.0, 0.0)));
    world.insert(falling_box, RigidBody::dynamic(1.0).with_material(0.6, 0.1));
    world.insert(falling_box, ColliderConfig::new(ShapeConfig::cuboid(0.5, 0.5, 0.5)));
    world.insert(falling_box, CollisionEvents::default());

    let mut bridge = PhysicsSyncBridge::new();
    let frames = (SIMULATED_SECONDS / FRAME_TIME).round() as u32;
    let mut touched_down = false;

    for frame in 0..frames {
        bridge.update(&mut world, &mut physics, FRAME_TIME);

        let landed = world
            .get::<CollisionEvents>(falling_box)
            .is_some_and(|events| events.others(falling_box.id()).any(|other| other == floor.id()));
        if landed && !touched_down {
            log::info!("Touchdown at t = {:.2}s", frame as f32 * FRAME_TIME);
            touched_down = true;
        }

        if frame % 30 == 0 {
            let height = world.get::<WorldTransform>(falling_box).map_or(0.0, |t| t.position.y);
            let speed = world.get::<PhysicsVelocity>(falling_box).map_or(0.0, |v| v.linear.magnitude());
            log::info!("t = {:.2}s  y = {:.3}  |v| = {:.3}", frame as f32 * FRAME_TIME, height, speed);
        }
    }

    let mut debug = DebugDrawBuffer::new();
    if bridge.draw_debug(&world, &mut physics, &mut debug) {
        log::info!("Debug draw produced {} lines", debug.line_count());
    }

    let height = world.get::<WorldTransform>(falling_box).map_or(0.0, |t| t.position.y);
    let speed = world.get::<PhysicsVelocity>(falling_box).map_or(0.0, |v| v.linear.magnitude());
    if (height - 1.0).abs() > 0.05 || speed > 0.1 {
        return Err(DemoError::NotSettled { height, speed });
    }

    log::info!("Box settled at y = {height:.3}");
    Ok(())
}
