//! Physics collaborator
//!
//! Kinematic тела, player controller, интеграция (headless или Rapier).

use bevy::prelude::*;
use bevy_rapier3d::plugin::PhysicsSet;
use bevy_rapier3d::prelude::*;

use crate::config::PhysicsBackend;
use crate::SimulationSet;

pub mod controller;
pub mod movement;

pub use controller::{calc_velocity_and_rotation, PlayerController};
pub use movement::{calc_movement_vector, facing_rotation, KinematicBody};

/// Physics Plugin
///
/// Headless: Physics set интегрирует next_translation, Sync пишет Transform.
/// Rapier: Physics set отдаёт смещение в KinematicCharacterController, шаг Rapier
/// идёт в том же FixedUpdate между Physics и Sync, результат читается в Input следующего тика.
#[derive(Default)]
pub struct PhysicsPlugin {
    pub backend: PhysicsBackend,
}

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        match self.backend {
            PhysicsBackend::Headless => {
                app.add_systems(
                    FixedUpdate,
                    (controller::drive_player_controller, movement::integrate_headless)
                        .chain()
                        .in_set(SimulationSet::Physics),
                )
                .add_systems(FixedUpdate, movement::sync_transforms.in_set(SimulationSet::Sync));
            }
            PhysicsBackend::Rapier => {
                let fixed_hz = app
                    .world()
                    .get_resource::<crate::config::SimulationConfig>()
                    .map_or(60.0, |config| config.fixed_hz);

                app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default().in_schedule(FixedUpdate))
                    // шаг Rapier = ровно один тик симуляции
                    .insert_resource(TimestepMode::Fixed {
                        dt: (1.0 / fixed_hz) as f32,
                        substeps: 1,
                    })
                    .configure_sets(
                        FixedUpdate,
                        (
                            PhysicsSet::SyncBackend.after(SimulationSet::Physics),
                            PhysicsSet::Writeback.before(SimulationSet::Sync),
                        ),
                    )
                    .add_systems(FixedUpdate, movement::read_rapier_output.in_set(SimulationSet::Input))
                    .add_systems(
                        FixedUpdate,
                        (controller::drive_player_controller, movement::submit_to_rapier)
                            .chain()
                            .in_set(SimulationSet::Physics),
                    )
                    .add_systems(FixedUpdate, movement::attach_rapier_bodies.in_set(SimulationSet::Sync));
                crate::log(&format!("🧱 Rapier backend: fixed step {:.4}s", 1.0 / fixed_hz));
            }
        }
    }
}
