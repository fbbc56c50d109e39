//! Тесты детерминизма
//!
//! Один seed + одинаковый input → идентичные тела и stats после дуэли.
//! Cover search синхронный: threaded worker отвечает в недетерминированный кадр.

use bevy::prelude::*;
use spellfire_simulation::navigation::NavMeshData;
use spellfire_simulation::*;

const DELTA: f32 = 1.0 / 60.0;

fn arena() -> Level {
    let data = LevelData {
        navmesh: NavMeshData {
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
        ..default()
    };
    Level::from_data(data).expect("arena")
}

/// Дуэль с двумя врагами (блуждание берёт точки из seeded RNG)
fn run_duel(seed: u64, ticks: usize) -> (Vec<u8>, Vec<u8>) {
    let mut app = create_headless_app(seed);
    app.insert_resource(arena());
    app.insert_resource(CoverSearchService::inline());

    let (player, enemies) = {
        let mut commands = app.world_mut().commands();
        let player = spawn_player(&mut commands, Vec3::ZERO);
        let enemies = [
            spawn_enemy(&mut commands, Vec3::new(-5.0, 0.0, -5.0), player),
            spawn_enemy(&mut commands, Vec3::new(6.0, 0.0, 6.0), player),
        ];
        (player, enemies)
    };
    app.world_mut().flush();

    for entity in std::iter::once(player).chain(enemies) {
        app.world_mut().send_event(AnimationsLoaded {
            entity,
            clips: builtin_clips(),
        });
    }

    for tick in 0..ticks {
        if let Some(mut intent) = app.world_mut().get_mut::<PlayerIntent>(player) {
            intent.cast = (tick % 240) < 150;
            intent.forward = (tick % 400) < 100;
        }
        run_fixed_tick(&mut app, DELTA);
    }

    (
        world_snapshot::<KinematicBody>(app.world_mut()),
        world_snapshot::<Stats>(app.world_mut()),
    )
}

#[test]
fn test_duel_determinism_same_seed() {
    const SEED: u64 = 12345;
    const TICKS: usize = 600;

    let first = run_duel(SEED, TICKS);
    let second = run_duel(SEED, TICKS);

    assert_eq!(
        first.0, second.0,
        "Тела после дуэли с seed {} разошлись",
        SEED
    );
    assert_eq!(first.1, second.1, "Stats после дуэли с seed {} разошлись", SEED);
}

#[test]
fn test_duel_determinism_multiple_runs() {
    const SEED: u64 = 42;
    const TICKS: usize = 300;

    let snapshots: Vec<_> = (0..3).map(|_| run_duel(SEED, TICKS)).collect();

    for (i, snapshot) in snapshots.iter().enumerate().skip(1) {
        assert_eq!(
            snapshots[0], *snapshot,
            "Прогон {} дал результат отличный от прогона 0",
            i
        );
    }
}
