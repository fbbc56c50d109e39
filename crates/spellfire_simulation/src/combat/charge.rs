//! Charge cycle systems
//!
//! Цикл зарядки = TaskHandle (TaskKind::Charge) + компонент ChargeCycle.
//! Терминальные переходы (выстрел / перегрузка / fizzle) взаимоисключающие:
//! каждый снимает ChargeCycle и отменяет handle.

use bevy::prelude::*;
use std::collections::HashSet;

use super::damage::{DamageDealt, Dead, SpellReleased};
use super::spell::{
    advance_charge, begin_charge, release_charge, ChargeProfile, ChargeStep, CurrentSpell,
    OVERLOAD_SELF_DAMAGE,
};
use crate::components::{PlayerIntent, Stats};
use crate::tasks::{TaskHandle, TaskKind, TaskRegistry};

/// Активный цикл зарядки (wall-clock: считаем от started_at, не по кадрам)
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct ChargeCycle {
    pub handle: TaskHandle,
    pub started_at: f32,
    pub target: Option<Entity>,
}

/// Запрос на зарядку (AI)
#[derive(Event, Debug, Clone)]
pub struct ChargeRequested {
    pub caster: Entity,
    pub target: Option<Entity>,
}

/// Запрос на добровольный выстрел (AI)
#[derive(Event, Debug, Clone)]
pub struct FireRequested {
    pub caster: Entity,
}

/// Старт циклов: ChargeRequested + зажатый cast у игрока
pub fn start_charges(
    mut commands: Commands,
    mut requests: EventReader<ChargeRequested>,
    mut tasks: ResMut<TaskRegistry>,
    time: Res<Time>,
    players: Query<(Entity, &PlayerIntent), (Without<ChargeCycle>, Without<Dead>)>,
    mut casters: Query<(&mut CurrentSpell, Has<ChargeCycle>, Has<Dead>)>,
) {
    let mut wanted: Vec<(Entity, Option<Entity>)> = requests
        .read()
        .map(|request| (request.caster, request.target))
        .collect();
    wanted.extend(
        players
            .iter()
            .filter(|(_, intent)| intent.cast)
            .map(|(entity, _)| (entity, None)),
    );

    let mut started = HashSet::new();
    for (caster, target) in wanted {
        if started.contains(&caster) {
            continue;
        }
        let Ok((mut spell, has_cycle, is_dead)) = casters.get_mut(caster) else {
            continue;
        };
        // не больше одного заряда на entity
        if has_cycle || is_dead {
            continue;
        }
        if !begin_charge(&mut spell) {
            continue;
        }

        let handle = tasks.register(caster, TaskKind::Charge);
        commands.entity(caster).insert(ChargeCycle {
            handle,
            started_at: time.elapsed_secs(),
            target,
        });
        started.insert(caster);
        crate::log(&format!("🔮 {:?} started charging '{}'", caster, spell.name));
    }
}

/// Шаг всех активных циклов; перегрузка = принудительный выстрел + урон себе
pub fn advance_charges(
    mut commands: Commands,
    mut tasks: ResMut<TaskRegistry>,
    time: Res<Time>,
    mut query: Query<(Entity, &mut CurrentSpell, &ChargeProfile, &ChargeCycle, &mut Stats), Without<Dead>>,
    mut released: EventWriter<SpellReleased>,
    mut damage_events: EventWriter<DamageDealt>,
) {
    let now = time.elapsed_secs();

    for (entity, mut spell, profile, cycle, mut stats) in query.iter_mut() {
        if !tasks.is_active(cycle.handle) {
            // handle отменён снаружи (смерть, despawn) — цикл мёртв
            commands.entity(entity).remove::<ChargeCycle>();
            continue;
        }

        let elapsed = now - cycle.started_at;
        match advance_charge(&mut spell, elapsed, profile.duration_secs) {
            ChargeStep::Charging { .. } => {}
            ChargeStep::Overload { rotation_speed } => {
                tasks.cancel(cycle.handle);
                commands.entity(entity).remove::<ChargeCycle>();

                released.write(SpellReleased {
                    caster: entity,
                    target: cycle.target,
                    rotation_speed,
                    damage: spell.damage,
                    forced: true,
                });

                stats.deal_damage(OVERLOAD_SELF_DAMAGE);
                damage_events.write(DamageDealt {
                    attacker: entity,
                    target: entity,
                    damage: OVERLOAD_SELF_DAMAGE,
                    target_died: !stats.is_alive(),
                });

                crate::log_warning(&format!("💥 {:?} spell overload (speed {:.3})", entity, rotation_speed));
            }
        }
    }
}

/// Добровольный выстрел (FireRequested / отпущенный cast игрока) или fizzle
pub fn release_charges(
    mut commands: Commands,
    mut requests: EventReader<FireRequested>,
    mut tasks: ResMut<TaskRegistry>,
    players: Query<(Entity, &PlayerIntent), With<ChargeCycle>>,
    mut casters: Query<(&mut CurrentSpell, &ChargeCycle), Without<Dead>>,
    mut released: EventWriter<SpellReleased>,
) {
    let fire_requests: Vec<Entity> = requests.read().map(|request| request.caster).collect();
    let player_releases: Vec<Entity> = players
        .iter()
        .filter(|(_, intent)| !intent.cast)
        .map(|(entity, _)| entity)
        .collect();

    let mut done = HashSet::new();
    for (caster, is_player_release) in fire_requests
        .into_iter()
        .map(|e| (e, false))
        .chain(player_releases.into_iter().map(|e| (e, true)))
    {
        if done.contains(&caster) {
            continue;
        }
        let Ok((mut spell, cycle)) = casters.get_mut(caster) else {
            continue;
        };

        match fire_spell(&mut spell, Some(cycle), &mut tasks) {
            Some(rotation_speed) => {
                released.write(SpellReleased {
                    caster,
                    target: cycle.target,
                    rotation_speed,
                    damage: spell.damage,
                    forced: false,
                });
                crate::log(&format!("🔥 {:?} fired '{}' (speed {:.3})", caster, spell.name, rotation_speed));
            }
            None if is_player_release => {
                // отпустили раньше порога — заряд рассеивается без атаки
                tasks.cancel(cycle.handle);
                spell.reset();
                crate::log(&format!("💨 {:?} charge fizzled", caster));
            }
            None => continue,
        }

        commands.entity(caster).remove::<ChargeCycle>();
        done.insert(caster);
    }
}

/// Добровольный выстрел. None — нет активного цикла или порог не пройден.
pub fn fire_spell(
    spell: &mut CurrentSpell,
    cycle: Option<&ChargeCycle>,
    tasks: &mut TaskRegistry,
) -> Option<f32> {
    let cycle = cycle?;
    if !tasks.is_active(cycle.handle) || !spell.can_fire {
        return None;
    }
    tasks.cancel(cycle.handle);
    Some(release_charge(spell))
}
