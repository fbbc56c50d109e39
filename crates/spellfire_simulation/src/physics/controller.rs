//! Player kinematics: intent → локальная скорость + поворот
//!
//! Скорость копится в локальном пространстве (z — вперёд), торможение
//! по z не может перевернуть знак скорости за кадр.

use bevy::prelude::*;
use std::f32::consts::PI;

use super::movement::{calc_movement_vector, KinematicBody};
use crate::components::PlayerIntent;
use crate::locomotion::{states, LocomotionStateMachine};
use crate::navigation::PathFollower;

/// Сглаживание поворота меша игрока
pub const PLAYER_ROTATION_SLERP: f32 = 0.1;

#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct PlayerController {
    /// Локальная скорость (m/s)
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub deceleration: Vec3,
}

impl Default for PlayerController {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            acceleration: Vec3::new(1.0, 0.25, 15.0),
            deceleration: Vec3::new(-0.0005, -0.0001, -5.0),
        }
    }
}

/// Один шаг контроллера: (новая локальная скорость, целевой поворот)
pub fn calc_velocity_and_rotation(
    controller: &PlayerController,
    intent: &PlayerIntent,
    state: Option<&str>,
    rotation: Quat,
    delta: f32,
) -> (Vec3, Quat) {
    let mut velocity = controller.velocity;

    let mut frame_deceleration = velocity * controller.deceleration * delta;
    frame_deceleration.z = frame_deceleration.z.signum() * frame_deceleration.z.abs().min(velocity.z.abs());
    velocity += frame_deceleration;

    let mut acceleration = controller.acceleration;
    if intent.sprint {
        acceleration *= 2.0;
    }
    if matches!(state, Some(states::CAST) | Some(states::HIT)) {
        acceleration *= 0.0;
    }
    if state == Some(states::JUMP) && !intent.sprint {
        acceleration *= 1.5;
    }

    if intent.forward {
        velocity.z += acceleration.z * delta;
    }
    if intent.backward {
        velocity.z -= acceleration.z * delta;
    }

    // yaw rate считается от базового ускорения, не от sprint/cast множителей
    let yaw_step = 4.0 * PI * delta * controller.acceleration.y;
    let mut target = rotation;
    if intent.left {
        target *= Quat::from_rotation_y(yaw_step);
    }
    if intent.right {
        target *= Quat::from_rotation_y(-yaw_step);
    }

    (velocity, target)
}

/// PlayerIntent → next_translation / next_rotation
///
/// Пока у игрока есть PathFollower, телом управляет навигация.
pub fn drive_player_controller(
    mut query: Query<
        (
            &mut PlayerController,
            &PlayerIntent,
            &LocomotionStateMachine,
            &mut KinematicBody,
        ),
        Without<PathFollower>,
    >,
    time: Res<Time>,
) {
    let delta = time.delta_secs();

    for (mut controller, intent, machine, mut body) in query.iter_mut() {
        if !machine.is_started() || machine.is_state(states::DEAD) {
            continue;
        }

        let (velocity, target) =
            calc_velocity_and_rotation(&controller, intent, machine.current_name(), body.rotation, delta);
        controller.velocity = velocity;

        body.rotation = body.rotation.slerp(target, PLAYER_ROTATION_SLERP);
        let rotation = body.rotation;
        body.set_next_kinematic_rotation(rotation);

        let next = calc_movement_vector(&body, velocity, delta);
        body.set_next_kinematic_translation(next);
    }
}
