//! AI systems: восприятие → решения → приём ответов cover worker'а
//!
//! Порядок (Awareness set):
//! 1. perceive_threats — угроза + LOS (rate-limited per entity)
//! 2. decide_actions — заряд, выстрел, запрос укрытия, блуждание
//! 3. collect_cover_results — ответы worker'а по correlation id
//! 4. forget_cover_on_death

use bevy::prelude::*;

use super::awareness::{detect_critical_charge, detect_threat, AIConfig, Awareness, Opponent};
use super::cover::{CoverRequest, CoverSearchService};
use super::events::{CoverFound, ThreatDetected};
use super::scene::{LevelScene, SceneQuery};
use crate::combat::{ChargeCycle, ChargeRequested, CurrentSpell, Dead, EntityDied, FireRequested};
use crate::components::Actor;
use crate::locomotion::{AnimationLibrary, LocomotionFault};
use crate::navigation::{Level, MoveRequest, PathFollower};
use crate::physics::KinematicBody;

/// AI думает только когда анимации загружены, FSM исправна и entity жив
type ActiveAI = (With<AnimationLibrary>, Without<LocomotionFault>, Without<Dead>);

/// Система: угроза + line of sight
pub fn perceive_threats(
    time: Res<Time>,
    level: Option<Res<Level>>,
    actors: Query<(Entity, &KinematicBody, &CurrentSpell), (With<Actor>, Without<Dead>)>,
    mut observers: Query<(Entity, &AIConfig, &Opponent, &mut Awareness), ActiveAI>,
    mut threats: EventWriter<ThreatDetected>,
) {
    let now = time.elapsed_secs();
    let mut scene: Option<LevelScene> = None;

    for (entity, config, opponent, mut awareness) in observers.iter_mut() {
        let (Ok((_, body, spell)), Ok((_, enemy_body, enemy_spell))) =
            (actors.get(entity), actors.get(opponent.target))
        else {
            // противник мёртв или пропал
            awareness.is_threatened = false;
            awareness.can_see_enemy = false;
            continue;
        };

        let threatened = detect_threat(spell, enemy_spell, config);
        if threatened && !awareness.is_threatened {
            threats.write(ThreatDetected {
                entity,
                enemy: opponent.target,
            });
            crate::log(&format!("⚠️ {:?} feels threatened by {:?}", entity, opponent.target));
        }
        awareness.is_threatened = threatened;

        if !awareness.raycast_due(now, config.raycast_interval) {
            continue;
        }

        // сцену собираем лениво: раз в кадр и только если кому-то нужен raycast
        let scene = scene.get_or_insert_with(|| {
            let mut scene = LevelScene::new(level.as_deref().map(|level| level.geometry.as_ref()));
            for (actor, actor_body, _) in actors.iter() {
                scene.push_body(actor, actor_body);
            }
            scene
        });

        awareness.last_raycast_at = Some(now);
        awareness.can_see_enemy =
            scene.has_line_of_sight(body.eye_position(), enemy_body.eye_position(), opponent.target);
    }
}

/// Система: решения AI
///
/// - нет заряда → начать заряжать на противника
/// - critical заряд и враг виден → выстрел
/// - угроза и нет запроса в полёте → ровно один запрос укрытия
/// - нет укрытия → блуждание (MoveRequest без цели)
pub fn decide_actions(
    level: Option<Res<Level>>,
    mut cover_search: ResMut<CoverSearchService>,
    actors: Query<&KinematicBody, (With<Actor>, Without<Dead>)>,
    mut query: Query<
        (
            Entity,
            &KinematicBody,
            &CurrentSpell,
            &AIConfig,
            &Opponent,
            &mut Awareness,
            Has<ChargeCycle>,
            Has<PathFollower>,
        ),
        ActiveAI,
    >,
    mut charge_requests: EventWriter<ChargeRequested>,
    mut fire_requests: EventWriter<FireRequested>,
    mut move_requests: EventWriter<MoveRequest>,
) {
    for (entity, body, spell, config, opponent, mut awareness, charging, moving) in query.iter_mut() {
        let Ok(enemy_body) = actors.get(opponent.target) else {
            continue;
        };

        if spell.charge == 0.0 && !charging {
            charge_requests.write(ChargeRequested {
                caster: entity,
                target: Some(opponent.target),
            });
        }

        if config.fire_on_critical_charge && awareness.can_see_enemy && detect_critical_charge(spell, config) {
            fire_requests.write(FireRequested { caster: entity });
        }

        if awareness.is_threatened && !awareness.is_awaiting_cover_calculation {
            let Some(level) = level.as_deref() else {
                continue;
            };

            let id = cover_search.next_request_id();
            let request = CoverRequest {
                id,
                entity,
                cover_positions: level.cover_positions.clone(),
                enemy_position: enemy_body.position,
                enemy_half_height: enemy_body.half_height,
                entity_position: body.position,
                entity_half_height: body.half_height,
                geometry: level.geometry.clone(),
            };

            match cover_search.submit(request) {
                Ok(()) => {
                    awareness.is_awaiting_cover_calculation = true;
                    awareness.pending_request = Some(id);
                    crate::log(&format!("🛡️ {:?} requested cover search #{}", entity, id.0));
                }
                Err(error) => {
                    crate::log_error(&format!("❌ Cover search for {:?} failed: {}", entity, error));
                }
            }
        } else if awareness.last_cover_position.is_none() && !moving {
            move_requests.write(MoveRequest {
                entity,
                target: None,
                look_at: Some(opponent.target),
                direct: false,
                interrupt: false,
            });
        }
    }
}

/// Система: ответы worker'а → движение к укрытию / атака / сброс
pub fn collect_cover_results(
    cover_search: Res<CoverSearchService>,
    mut worker_lost: Local<bool>,
    actors: Query<&KinematicBody, (With<Actor>, Without<Dead>)>,
    mut query: Query<(&CurrentSpell, &AIConfig, &Opponent, &mut Awareness), ActiveAI>,
    mut found: EventWriter<CoverFound>,
    mut move_requests: EventWriter<MoveRequest>,
) {
    let responses = match cover_search.poll() {
        Ok(responses) => responses,
        Err(error) => {
            if !*worker_lost {
                crate::log_error(&format!("❌ Cover search unavailable: {}", error));
                *worker_lost = true;
            }
            return;
        }
    };

    for response in responses {
        let Ok((spell, config, opponent, mut awareness)) = query.get_mut(response.entity) else {
            crate::log(&format!("🗑️ Cover result #{} for gone entity {:?} discarded", response.id.0, response.entity));
            continue;
        };

        if awareness.pending_request != Some(response.id) {
            crate::log(&format!(
                "🗑️ Stale cover result #{} for {:?} discarded (pending: {:?})",
                response.id.0, response.entity, awareness.pending_request
            ));
            continue;
        }
        awareness.pending_request = None;

        found.write(CoverFound {
            entity: response.entity,
            position: response.best_cover,
        });

        let Some(cover) = response.best_cover else {
            // укрытия нет — снова блуждаем
            awareness.clear_cover();
            crate::log(&format!("🚫 No cover for {:?}", response.entity));
            continue;
        };

        if detect_critical_charge(spell, config) {
            // заряд почти полный — идём на врага, а не в укрытие
            if let Ok(enemy_body) = actors.get(opponent.target) {
                move_requests.write(MoveRequest {
                    entity: response.entity,
                    target: Some(enemy_body.position),
                    look_at: Some(opponent.target),
                    direct: true,
                    interrupt: true,
                });
                crate::log(&format!("😤 {:?} charges {:?} instead of hiding", response.entity, opponent.target));
            }
            continue;
        }

        awareness.last_cover_position = Some(cover);
        move_requests.write(MoveRequest {
            entity: response.entity,
            target: Some(cover),
            look_at: Some(opponent.target),
            direct: true,
            interrupt: true,
        });
        crate::log(&format!("🛡️ {:?} moves to cover at {:?}", response.entity, cover));
    }
}

/// Система: мёртвый не ждёт укрытия
pub fn forget_cover_on_death(mut died: EventReader<EntityDied>, mut query: Query<&mut Awareness>) {
    for event in died.read() {
        if let Ok(mut awareness) = query.get_mut(event.entity) {
            awareness.clear_cover();
            awareness.is_threatened = false;
            awareness.can_see_enemy = false;
        }
    }
}
