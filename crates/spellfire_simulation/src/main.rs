//! Headless симуляция Spellfire
//!
//! Дуэль игрок vs враг на плоской арене со стеной-укрытием, без рендера.
//! Игрок периодически заряжает спелл, враг прячется/блуждает/атакует.

use bevy::prelude::*;
use spellfire_simulation::*;

const TICKS: u32 = 1800;
const DELTA: f32 = 1.0 / 60.0;

/// Арена 20x20 (2 треугольника) + стена x=4 как геометрия и укрытия за ней
fn arena_level() -> Result<Level, SimulationError> {
    let data = LevelData {
        navmesh: navigation::NavMeshData {
            vertices: vec![
                -10.0, 0.0, -10.0, //
                10.0, 0.0, -10.0, //
                10.0, 0.0, 10.0, //
                -10.0, 0.0, 10.0,
            ],
            indices: vec![0, 2, 1, 0, 3, 2],
        },
        geometry: ai::WorldGeometry {
            vertices: vec![
                4.0, 0.0, -3.0, //
                4.0, 0.0, 3.0, //
                4.0, 3.0, 3.0, //
                4.0, 3.0, -3.0,
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        },
        cover_positions: vec![Vec3::new(5.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 2.0), Vec3::new(-6.0, 0.0, 6.0)],
        portals: Vec::new(),
        transition_map: None,
        orientation_position: Vec3::ZERO,
    };
    Ok(Level::from_data(data)?)
}

fn main() {
    let seed = 42;
    println!("Starting Spellfire headless simulation (seed: {})", seed);

    let mut app = create_headless_app(seed);

    match arena_level() {
        Ok(level) => {
            app.insert_resource(level);
        }
        Err(error) => {
            log_error(&format!("❌ Arena level is broken: {}", error));
            return;
        }
    }

    let (player, enemy) = {
        let mut commands = app.world_mut().commands();
        let player = spawn_player(&mut commands, Vec3::new(0.0, 0.0, 0.0));
        let enemy = spawn_enemy(&mut commands, Vec3::new(-5.0, 0.0, -5.0), player);
        (player, enemy)
    };
    app.world_mut().flush();

    for entity in [player, enemy] {
        app.world_mut().send_event(AnimationsLoaded {
            entity,
            clips: builtin_clips(),
        });
    }

    for tick in 0..TICKS {
        // игрок держит cast 3 секунды из каждых 5
        let holding_cast = (tick % 300) < 180;
        if let Some(mut intent) = app.world_mut().get_mut::<PlayerIntent>(player) {
            intent.cast = holding_cast;
        }

        run_fixed_tick(&mut app, DELTA);

        if tick % 120 == 0 {
            let world = app.world();
            let describe = |entity: Entity| {
                let hp = world.get::<Stats>(entity).map_or(0.0, |stats| stats.hp.current);
                let state = world
                    .get::<LocomotionStateMachine>(entity)
                    .and_then(|machine| machine.current_name())
                    .unwrap_or("-");
                let position = world.get::<KinematicBody>(entity).map(|body| body.position);
                format!("hp {:>5.1} state {:<9} at {:?}", hp, state, position)
            };
            println!("Tick {:>4}: player [{}] enemy [{}]", tick, describe(player), describe(enemy));
        }
    }

    println!("Simulation complete!");
}
