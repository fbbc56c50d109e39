//! Spell resolution + смерть
//!
//! SpellReleased → луч caster eye → target eye (или forward) по сцене →
//! первое попадание в тело актора наносит урон.

use bevy::prelude::*;

use super::charge::ChargeCycle;
use super::spell::{spell_damage, CurrentSpell};
use crate::ai::{LevelScene, SceneObject, SceneQuery};
use crate::components::{Actor, Stats};
use crate::navigation::{Level, PathFollower};
use crate::physics::KinematicBody;
use crate::tasks::TaskRegistry;

/// Дальность полёта спелла без цели
pub const SPELL_RANGE: f32 = 100.0;

/// Событие: урон нанесен
#[derive(Event, Debug, Clone)]
pub struct DamageDealt {
    pub attacker: Entity,
    pub target: Entity,
    pub damage: f32,
    pub target_died: bool,
}

/// Событие: entity умер (hp = 0)
#[derive(Event, Debug, Clone)]
pub struct EntityDied {
    pub entity: Entity,
    pub killer: Option<Entity>,
}

/// Спелл выпущен (добровольно или перегрузкой)
#[derive(Event, Debug, Clone)]
pub struct SpellReleased {
    pub caster: Entity,
    pub target: Option<Entity>,
    pub rotation_speed: f32,
    /// Базовый урон спелла на момент выстрела
    pub damage: f32,
    pub forced: bool,
}

/// Компонент-маркер: entity мертв. Трупы остаются на месте.
#[derive(Component, Debug)]
pub struct Dead;

/// Система: SpellReleased → raycast → DamageDealt
pub fn resolve_spell_releases(
    mut releases: EventReader<SpellReleased>,
    level: Option<Res<Level>>,
    bodies: Query<(Entity, &KinematicBody), (With<Actor>, Without<Dead>)>,
    mut targets: Query<&mut Stats, Without<Dead>>,
    mut damage_events: EventWriter<DamageDealt>,
) {
    let releases: Vec<SpellReleased> = releases.read().cloned().collect();
    if releases.is_empty() {
        return;
    }

    let mut scene = LevelScene::new(level.as_deref().map(|level| level.geometry.as_ref()));
    for (entity, body) in bodies.iter() {
        scene.push_body(entity, body);
    }

    for release in releases {
        let Ok((_, caster_body)) = bodies.get(release.caster) else {
            continue;
        };
        let origin = caster_body.eye_position();

        let (direction, max_distance) = match release.target.and_then(|t| bodies.get(t).ok()) {
            Some((_, target_body)) => {
                let to_target = target_body.eye_position() - origin;
                (Dir3::new(to_target).ok(), to_target.length() + target_body.collider_radius * 2.0)
            }
            None => (Dir3::new(caster_body.forward()).ok(), SPELL_RANGE),
        };
        let Some(direction) = direction else {
            continue;
        };

        let Some(hit) = scene.raycast(origin, direction, max_distance).into_iter().next() else {
            continue;
        };
        let SceneObject::Actor(victim) = hit.object else {
            crate::log(&format!("🧱 Spell from {:?} hit level geometry", release.caster));
            continue;
        };
        let Ok(mut stats) = targets.get_mut(victim) else {
            continue;
        };

        let damage = spell_damage(release.damage, release.rotation_speed);
        let was_alive = stats.is_alive();
        stats.deal_damage(damage);
        let is_alive = stats.is_alive();

        damage_events.write(DamageDealt {
            attacker: release.caster,
            target: victim,
            damage,
            target_died: was_alive && !is_alive,
        });
        crate::log(&format!(
            "⚔️ {:?} → {:?}: {} damage (hp {})",
            release.caster, victim, damage, stats.hp.current
        ));
    }
}

/// Система: hp = 0 → Dead + EntityDied, отмена всех task handles entity
pub fn detect_deaths(
    mut commands: Commands,
    mut tasks: ResMut<TaskRegistry>,
    mut damage_events: EventReader<DamageDealt>,
    mut query: Query<(Entity, &Stats, &mut CurrentSpell), (With<Actor>, Without<Dead>)>,
    mut died: EventWriter<EntityDied>,
) {
    let killers: Vec<(Entity, Entity)> = damage_events
        .read()
        .filter(|event| event.target_died)
        .map(|event| (event.target, event.attacker))
        .collect();

    for (entity, stats, mut spell) in query.iter_mut() {
        if stats.is_alive() {
            continue;
        }

        let killer = killers
            .iter()
            .find(|(target, _)| *target == entity)
            .map(|(_, attacker)| *attacker);

        let cancelled = tasks.cancel_all_for(entity);
        spell.reset();
        commands
            .entity(entity)
            .insert(Dead)
            .remove::<(ChargeCycle, PathFollower)>();

        died.write(EntityDied { entity, killer });
        crate::log_info(&format!(
            "💀 Entity {:?} died (killer: {:?}, {} tasks cancelled)",
            entity, killer, cancelled
        ));
    }
}
