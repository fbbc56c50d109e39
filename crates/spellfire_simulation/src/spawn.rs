//! Сборка акторов: игрок, враг, despawn с отменой задач

use bevy::prelude::*;

use crate::ai::{AIConfig, Awareness, Opponent};
use crate::combat::ChargeProfile;
use crate::components::{Actor, ActorKind, PlayerIntent};
use crate::locomotion::states::{CAST, DEAD, FLY, HIT, IDLE, JUMP, RUN, RUN_BACK, WALK, WALK_BACK};
use crate::locomotion::AnimationClip;
use crate::physics::{KinematicBody, PlayerController};
use crate::tasks::TaskRegistry;

/// Половина роста модели (1.8m)
pub const DEFAULT_HALF_HEIGHT: f32 = 0.9;
pub const PLAYER_FACTION: u64 = 1;
pub const ENEMY_FACTION: u64 = 2;

/// Игрок: тело + intent (заполняет input collaborator) + controller
pub fn spawn_player(commands: &mut Commands, position: Vec3) -> Entity {
    let entity = commands
        .spawn((
            Transform::from_translation(position),
            Actor {
                kind: ActorKind::Player,
                faction_id: PLAYER_FACTION,
            },
            KinematicBody::at(position, DEFAULT_HALF_HEIGHT),
            PlayerIntent::default(),
            PlayerController::default(),
        ))
        .id();
    crate::log(&format!("🧙 Player spawned: {:?} at {:?}", entity, position));
    entity
}

/// Враг: тело + AI (awareness, пороги, противник) + свой профиль заряда
pub fn spawn_enemy(commands: &mut Commands, position: Vec3, opponent: Entity) -> Entity {
    let entity = commands
        .spawn((
            Transform::from_translation(position),
            Actor {
                kind: ActorKind::Enemy,
                faction_id: ENEMY_FACTION,
            },
            KinematicBody::at(position, DEFAULT_HALF_HEIGHT),
            ChargeProfile::enemy(),
            AIConfig::default(),
            Awareness::default(),
            Opponent { target: opponent },
        ))
        .id();
    crate::log(&format!("👹 Enemy spawned: {:?} at {:?} (opponent {:?})", entity, position, opponent));
    entity
}

/// Despawn: сначала отменяем все task handles entity
pub fn despawn_actor(commands: &mut Commands, tasks: &mut TaskRegistry, entity: Entity) {
    let cancelled = tasks.cancel_all_for(entity);
    commands.entity(entity).despawn();
    crate::log(&format!("🗑️ Actor {:?} despawned ({} tasks cancelled)", entity, cancelled));
}

/// Клипы встроенных состояний (headless runner и тесты вместо asset loader'а)
pub fn builtin_clips() -> Vec<(String, AnimationClip)> {
    [
        (IDLE, AnimationClip::looping(2.0)),
        (WALK, AnimationClip::looping(1.0)),
        (WALK_BACK, AnimationClip::looping(1.0)),
        (RUN, AnimationClip::looping(0.6)),
        (RUN_BACK, AnimationClip::looping(0.6)),
        (JUMP, AnimationClip::once(0.8)),
        (FLY, AnimationClip::looping(1.0)),
        (CAST, AnimationClip::looping(1.0)),
        (HIT, AnimationClip::once(0.4)),
        (DEAD, AnimationClip::once(1.5)),
    ]
    .into_iter()
    .map(|(name, clip)| (name.to_string(), clip))
    .collect()
}
