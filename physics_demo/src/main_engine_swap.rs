//! Engine hot-swap demo
//!
//! Builds a small scene, runs it on one engine, then switches engines at
//! runtime and rebuilds the scene on the new backend.

use rust_physics::foundation::logging;
use rust_physics::foundation::math::Vec3;
use rust_physics::physics::{PhysicsConfig, PhysicsEngineType, PhysicsError, PhysicsSystem, Ray};

const FLOOR: u64 = 1;
const FIRST_BALL: u64 = 100;

#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Physics(#[from] PhysicsError),

    #[error("switching to {0} was refused")]
    SwitchFailed(PhysicsEngineType),
}

fn main() {
    logging::init_with_level(log::LevelFilter::Info);

    if let Err(e) = run() {
        log::error!("engine_swap failed: {e}");
        std::process::exit(1);
    }
}

fn build_scene(physics: &mut PhysicsSystem) {
    physics.create_static_box(FLOOR, Vec3::zeros(), Vec3::new(10.0, 0.5, 10.0));
    for i in 0..5u64 {
        let x = i as f32 * 1.5 - 3.0;
        physics.create_dynamic_sphere(FIRST_BALL + i, Vec3::new(x, 3.0 + i as f32, 0.0), 0.5, 1.0);
    }
}

fn simulate(physics: &mut PhysicsSystem, seconds: f32) {
    let frame = 1.0 / 60.0;
    let mut elapsed = 0.0;
    let mut contacts = 0;
    while elapsed < seconds {
        physics.update(frame);
        contacts += physics.frame_collision_events().len();
        elapsed += frame;
    }

    let probe = Ray::new(Vec3::new(0.0, 20.0, 0.0), -Vec3::y(), 40.0);
    let hits = physics.raycast_all(&probe);
    log::info!(
        "[{}] {:.1}s simulated, {} contacts, probe ray hit {} bodies",
        physics.engine_name(),
        seconds,
        contacts,
        hits.len()
    );
    for i in 0..5u64 {
        let position = physics.body_transform(FIRST_BALL + i).position;
        log::info!("  ball {i}: ({:.2}, {:.2}, {:.2})", position.x, position.y, position.z);
    }
}

fn run() -> Result<(), DemoError> {
    let engines = PhysicsEngineType::available();
    let first = engines[0];
    let mut physics = PhysicsSystem::new(first, PhysicsConfig::default())?;

    build_scene(&mut physics);
    simulate(&mut physics, 2.0);

    for &engine in engines.iter().chain(std::iter::once(&first)).skip(1) {
        if !physics.set_engine(engine, PhysicsConfig::default()) {
            return Err(DemoError::SwitchFailed(engine));
        }
        log::info!("Switched to {}, {} bodies left", physics.engine_name(), physics.body_count());
        build_scene(&mut physics);
        simulate(&mut physics, 2.0);
    }

    Ok(())
}
