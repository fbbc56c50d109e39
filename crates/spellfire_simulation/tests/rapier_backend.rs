//! Integration test для Rapier backend: RapierPhysicsPlugin в FixedUpdate
//! двигает kinematic тело по тому же MoveRequest, что и headless.

mod common;

use bevy::prelude::*;
use bevy_rapier3d::prelude::{Collider, KinematicCharacterController};
use common::{tick_logged, EventLog};
use spellfire_simulation::navigation::{request_move, PathOutcome};
use spellfire_simulation::*;

fn setup_rapier(seed: u64, start: Vec3) -> (App, Entity) {
    let mut app = create_headless_app_with(SimulationConfig {
        seed,
        physics_backend: PhysicsBackend::Rapier,
        ..default()
    });

    // пол: верхняя грань на y = 0
    app.world_mut()
        .spawn((Collider::cuboid(20.0, 0.1, 20.0), Transform::from_xyz(0.0, -0.1, 0.0)));

    let player = {
        let mut commands = app.world_mut().commands();
        spawn_player(&mut commands, start)
    };
    app.world_mut().flush();
    app.world_mut().send_event(AnimationsLoaded {
        entity: player,
        clips: builtin_clips(),
    });
    run_fixed_tick(&mut app, common::DELTA);

    (app, player)
}

#[test]
fn test_rapier_attaches_character_controller() {
    let (app, player) = setup_rapier(21, Vec3::new(1.0, 0.0, 1.0));

    let world = app.world();
    assert!(world.get::<KinematicCharacterController>(player).is_some());
    assert!(world.get::<Collider>(player).is_some());
    let state = world.get::<LocomotionStateMachine>(player).expect("fsm");
    assert!(state.is_state(locomotion::states::IDLE));
}

#[test]
fn test_rapier_backend_moves_follower() {
    let (mut app, player) = setup_rapier(22, Vec3::new(1.0, 0.0, 1.0));
    let mut finished = EventLog::<PathFinished>::new(&app);
    let target = Vec3::new(4.0, 0.0, 1.0);

    request_move(app.world_mut(), MoveRequest::to(player, target));
    for _ in 0..180 {
        tick_logged(&mut app, &mut finished);
    }

    let body = app.world().get::<KinematicBody>(player).expect("body");
    assert!(body.position.x - 1.0 > 1.5, "Rapier body stayed at {:?}", body.position);
    // пол держит тело: не проваливается и не взлетает
    assert!(body.position.y.abs() < 0.2, "Rapier body left the floor: {:?}", body.position);

    let transform = app.world().get::<Transform>(player).expect("transform");
    assert!((transform.translation.x - body.position.x).abs() < 1e-3);

    let arrived = finished
        .seen
        .iter()
        .filter(|event| event.entity == player && event.outcome == PathOutcome::Arrived)
        .count();
    assert_eq!(arrived, 1);
}
