//! Kinematic тело + интеграция (headless / Rapier)
//!
//! Архитектура:
//! - Подсистемы пишут только next_translation / next_rotation (контракт rigid body)
//! - Headless: прямая интеграция + подъём от fly-импульса с затуханием
//! - Rapier: translation уходит в KinematicCharacterController (collider без RigidBody:
//!   Rapier сам двигает Transform с учётом коллизий), grounded читается из output
//!
//! Позиция тела — ноги; eye = ноги + half_height.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use crate::components::Grounding;

/// Сглаживание поворота к цели (setRotation)
pub const ROTATION_SLERP: f32 = 0.2;
/// Затухание fly-импульса (units/sec)
pub const FLY_IMPULSE_DECAY: f32 = 20.0;

/// Kinematic rigid body (контракт: setNextKinematicTranslation / Rotation, translation)
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
#[require(Transform)]
pub struct KinematicBody {
    /// Ноги (authoritative позиция)
    pub position: Vec3,
    pub half_height: f32,
    pub collider_radius: f32,
    pub rotation: Quat,
    /// Фактическая мировая скорость последнего шага (m/s)
    pub velocity: Vec3,
    pub next_translation: Option<Vec3>,
    pub next_rotation: Option<Quat>,
}

impl Default for KinematicBody {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            half_height: 0.9, // модель 1.8m
            collider_radius: 0.5,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            next_translation: None,
            next_rotation: None,
        }
    }
}

impl KinematicBody {
    pub fn at(position: Vec3, half_height: f32) -> Self {
        Self {
            position,
            half_height,
            ..default()
        }
    }

    pub fn translation(&self) -> Vec3 {
        self.position
    }

    /// Точка на половине высоты (глаза / центр капсулы)
    pub fn eye_position(&self) -> Vec3 {
        self.position + Vec3::Y * self.half_height
    }

    /// Forward = локальная +Z
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn horizontal_speed(&self) -> f32 {
        Vec2::new(self.velocity.x, self.velocity.z).length()
    }

    pub fn set_next_kinematic_translation(&mut self, translation: Vec3) {
        self.next_translation = Some(translation);
    }

    pub fn set_next_kinematic_rotation(&mut self, rotation: Quat) {
        self.next_rotation = Some(rotation);
    }

    /// Плавный поворот к цели (slerp 0.2), тело получает тот же поворот
    pub fn set_rotation(&mut self, target: Quat) {
        self.set_rotation_smoothed(target, ROTATION_SLERP);
    }

    pub fn set_rotation_smoothed(&mut self, target: Quat, factor: f32) {
        let smoothed = self.rotation.slerp(target, factor);
        self.rotation = smoothed;
        self.next_rotation = Some(smoothed);
    }

    /// Мгновенный поворот лицом к точке (по XZ)
    pub fn look_at(&mut self, target: Vec3) {
        if let Some(rotation) = facing_rotation(self.position, target) {
            self.rotation = rotation;
            self.next_rotation = Some(rotation);
        }
    }

    /// AABB тела (для scene raycast)
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let r = self.collider_radius;
        let min = self.position - Vec3::new(r, 0.0, r);
        let max = self.position + Vec3::new(r, self.half_height * 2.0, r);
        (min, max)
    }
}

/// Поворот вокруг Y, при котором +Z смотрит на `to` (None — точки совпадают по XZ)
pub fn facing_rotation(from: Vec3, to: Vec3) -> Option<Quat> {
    let flat = Vec3::new(to.x - from.x, 0.0, to.z - from.z);
    if flat.length_squared() < 1e-8 {
        return None;
    }
    Some(Quat::from_rotation_y(flat.x.atan2(flat.z)))
}

/// Следующая позиция тела по локальной скорости
pub fn calc_movement_vector(body: &KinematicBody, local_velocity: Vec3, delta: f32) -> Vec3 {
    body.position + body.rotation * local_velocity * delta
}

/// Headless интеграция next_translation → position
///
/// Подъём: y += fly_impulse * dt, импульс затухает; пока он есть — entity в воздухе.
pub fn integrate_headless(mut query: Query<(&mut KinematicBody, &mut Grounding)>, time: Res<Time>) {
    let delta = time.delta_secs();
    if delta <= 0.0 {
        return;
    }

    for (mut body, mut grounding) in query.iter_mut() {
        match body.next_translation.take() {
            Some(mut next) => {
                next.y += grounding.applied_fly_impulse * delta;
                body.velocity = (next - body.position) / delta;
                body.position = next;
            }
            None => {
                body.velocity = Vec3::ZERO;
                if grounding.applied_fly_impulse > 0.0 {
                    body.position.y += grounding.applied_fly_impulse * delta;
                }
            }
        }

        if let Some(rotation) = body.next_rotation.take() {
            body.rotation = rotation;
        }

        step_fly_impulse(&mut grounding, delta);
        grounding.is_grounded = grounding.applied_fly_impulse <= 0.0 && grounding.takeoff_frames == 0;
        grounding.track(time.elapsed_secs());
    }
}

/// Затухание импульса + счётчик takeoff-кадров
pub fn step_fly_impulse(grounding: &mut Grounding, delta: f32) {
    grounding.applied_fly_impulse = (grounding.applied_fly_impulse - FLY_IMPULSE_DECAY * delta).max(0.0);
    grounding.takeoff_frames = grounding.takeoff_frames.saturating_sub(1);
}

/// Rapier: капсула + character controller на новые тела
pub fn attach_rapier_bodies(
    mut commands: Commands,
    query: Query<(Entity, &KinematicBody), Added<KinematicBody>>,
) {
    for (entity, body) in query.iter() {
        let segment_half = (body.half_height - body.collider_radius).max(0.05);
        commands.entity(entity).insert((
            Collider::capsule_y(segment_half, body.collider_radius),
            KinematicCharacterController::default(),
            Transform::from_translation(body.eye_position()).with_rotation(body.rotation),
        ));
        crate::log(&format!("🧱 Rapier body attached to {:?}", entity));
    }
}

/// Rapier: запрошенное смещение → KinematicCharacterController
pub fn submit_to_rapier(
    mut query: Query<(&mut KinematicBody, &mut KinematicCharacterController, &mut Transform, &mut Grounding)>,
    time: Res<Time>,
) {
    let delta = time.delta_secs();

    for (mut body, mut controller, mut transform, mut grounding) in query.iter_mut() {
        let mut translation = body
            .next_translation
            .take()
            .map(|next| next - body.position)
            .unwrap_or(Vec3::ZERO);
        translation.y += grounding.applied_fly_impulse * delta;
        controller.translation = Some(translation);

        if let Some(rotation) = body.next_rotation.take() {
            body.rotation = rotation;
            transform.rotation = rotation;
        }
        step_fly_impulse(&mut grounding, delta);
    }
}

/// Rapier: результат прошлого шага → тело + grounding
///
/// Только тела с controller: до attach Transform стоит в ногах, а не в центре капсулы.
pub fn read_rapier_output(
    mut query: Query<
        (
            &mut KinematicBody,
            &mut Grounding,
            &Transform,
            Option<&KinematicCharacterControllerOutput>,
        ),
        With<KinematicCharacterController>,
    >,
    time: Res<Time>,
) {
    let delta = time.delta_secs();

    for (mut body, mut grounding, transform, output) in query.iter_mut() {
        let feet = transform.translation - Vec3::Y * body.half_height;
        if delta > 0.0 {
            body.velocity = (feet - body.position) / delta;
        }
        body.position = feet;

        if let Some(output) = output {
            grounding.is_grounded = output.grounded && grounding.takeoff_frames == 0;
        }
        grounding.track(time.elapsed_secs());
    }
}

/// Headless: KinematicBody → Transform (центр капсулы)
pub fn sync_transforms(mut query: Query<(&KinematicBody, &mut Transform)>) {
    for (body, mut transform) in query.iter_mut() {
        transform.translation = body.eye_position();
        transform.rotation = body.rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_movement_vector_uses_body_rotation() {
        let body = KinematicBody {
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            ..default()
        };

        // локальный +Z после поворота на 90° = мировой +X
        let next = calc_movement_vector(&body, Vec3::new(0.0, 0.0, 3.0), 0.5);
        assert!((next - Vec3::new(1.5, 0.0, 0.0)).length() < 1e-5, "next = {:?}", next);
    }

    #[test]
    fn test_facing_rotation_points_forward_at_target() {
        let rotation = facing_rotation(Vec3::ZERO, Vec3::new(-4.0, 2.0, 0.0)).expect("distinct points");
        let forward = rotation * Vec3::Z;
        assert!((forward - Vec3::NEG_X).length() < 1e-5, "forward = {:?}", forward);

        assert!(facing_rotation(Vec3::ONE, Vec3::new(1.0, 5.0, 1.0)).is_none());
    }

    #[test]
    fn test_set_rotation_is_smoothed() {
        let mut body = KinematicBody::default();
        let target = Quat::from_rotation_y(1.0);
        body.set_rotation(target);

        let (_, angle) = body.rotation.to_axis_angle();
        assert!((angle - 0.2).abs() < 1e-4, "angle = {}", angle);
        assert_eq!(body.next_rotation, Some(body.rotation));
    }

    #[test]
    fn test_fly_impulse_decays_and_takeoff_counts_down() {
        let mut grounding = Grounding {
            applied_fly_impulse: 10.0,
            takeoff_frames: 2,
            ..default()
        };

        step_fly_impulse(&mut grounding, 0.25);
        assert_eq!(grounding.applied_fly_impulse, 5.0);
        assert_eq!(grounding.takeoff_frames, 1);

        step_fly_impulse(&mut grounding, 0.5);
        assert_eq!(grounding.applied_fly_impulse, 0.0);
        assert_eq!(grounding.takeoff_frames, 0);
    }
}
