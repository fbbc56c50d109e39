//! Locomotion systems: приём анимаций, сбор input, update FSM

use bevy::prelude::*;
use std::collections::HashSet;

use super::animation::{AnimationLibrary, AnimationMixer};
use super::events::{AnimationsLoaded, LocomotionChanged, LocomotionFault};
use super::machine::{AnimationContext, LocomotionInput, LocomotionRegistry, LocomotionStateMachine, Transition};
use super::states;
use crate::combat::{DamageDealt, Dead};
use crate::components::{Grounding, PlayerIntent};
use crate::error::LocomotionError;
use crate::navigation::PathFollower;
use crate::physics::KinematicBody;

/// Горизонтальная скорость, с которой entity считается "движущимся"
pub const MOVING_SPEED_THRESHOLD: f32 = 0.05;

/// Публикует переход (если он был)
pub fn publish_transition(
    entity: Entity,
    transition: Option<Transition>,
    changed: &mut EventWriter<LocomotionChanged>,
) {
    if let Some(Transition { from, to }) = transition {
        changed.write(LocomotionChanged { entity, from, to });
    }
}

/// Громкий отказ: error в лог + LocomotionFault на entity. Остальные entity не затронуты.
pub fn report_locomotion_fault(commands: &mut Commands, entity: Entity, error: LocomotionError) {
    crate::log_error(&format!("❌ Locomotion FSM failed for {:?}: {}", entity, error));
    commands.entity(entity).insert(LocomotionFault { error });
}

/// Переход по запросу другой подсистемы (навигация, AI)
pub fn request_state(
    entity: Entity,
    name: &str,
    machine: &mut LocomotionStateMachine,
    library: &AnimationLibrary,
    mixer: &mut AnimationMixer,
    registry: &LocomotionRegistry,
    changed: &mut EventWriter<LocomotionChanged>,
) -> Result<(), LocomotionError> {
    let mut anim = AnimationContext { library, mixer };
    let transition = machine.set_state(name, registry, &mut anim)?;
    publish_transition(entity, transition, changed);
    Ok(())
}

/// AnimationsLoaded → библиотека на entity + вход в idle (ровно один раз)
pub fn handle_animations_loaded(
    mut commands: Commands,
    mut events: EventReader<AnimationsLoaded>,
    registry: Res<LocomotionRegistry>,
    mut query: Query<(&mut LocomotionStateMachine, &mut AnimationMixer, Has<AnimationLibrary>)>,
    mut changed: EventWriter<LocomotionChanged>,
) {
    for event in events.read() {
        let Ok((mut machine, mut mixer, already_loaded)) = query.get_mut(event.entity) else {
            crate::log_warning(&format!(
                "⚠️ AnimationsLoaded for {:?} without locomotion components, ignored",
                event.entity
            ));
            continue;
        };

        if already_loaded || machine.is_started() {
            crate::log_warning(&format!(
                "⚠️ Duplicate AnimationsLoaded for {:?}, ignored",
                event.entity
            ));
            continue;
        }

        let library = AnimationLibrary::new(event.clips.iter().cloned());
        let result = {
            let mut anim = AnimationContext {
                library: &library,
                mixer: &mut mixer,
            };
            machine.set_state(states::IDLE, &registry, &mut anim)
        };

        match result {
            Ok(transition) => {
                crate::log(&format!(
                    "🎬 {:?}: {} clips loaded, entering idle",
                    event.entity,
                    library.len()
                ));
                publish_transition(event.entity, transition, &mut changed);
            }
            Err(error) => report_locomotion_fault(&mut commands, event.entity, error),
        }

        commands.entity(event.entity).insert(library);
    }
}

/// Snapshot input на кадр: intent игрока + сигналы физики/боя
pub fn gather_locomotion_input(
    mut damage_events: EventReader<DamageDealt>,
    mut query: Query<(
        Entity,
        &mut LocomotionInput,
        &KinematicBody,
        &Grounding,
        Option<&PlayerIntent>,
        Has<PathFollower>,
        Has<Dead>,
    )>,
) {
    let hit_targets: HashSet<Entity> = damage_events
        .read()
        .filter(|event| event.damage > 0.0)
        .map(|event| event.target)
        .collect();

    for (entity, mut input, body, grounding, intent, navigating, is_dead) in query.iter_mut() {
        let intent = intent.copied().unwrap_or_default();

        *input = LocomotionInput {
            forward: intent.forward,
            backward: intent.backward,
            left: intent.left,
            right: intent.right,
            sprint: intent.sprint,
            jump: intent.jump,
            cast: intent.cast,
            is_moving: navigating && body.horizontal_speed() > MOVING_SPEED_THRESHOLD,
            is_grounded: grounding.is_grounded,
            takeoff: grounding.takeoff_frames > 0,
            is_dead,
            hit: hit_targets.contains(&entity),
        };
    }
}

/// Update FSM + продвижение mixer'а
pub fn update_locomotion(
    mut commands: Commands,
    time: Res<Time>,
    registry: Res<LocomotionRegistry>,
    mut changed: EventWriter<LocomotionChanged>,
    mut query: Query<
        (
            Entity,
            &mut LocomotionStateMachine,
            &mut AnimationMixer,
            &AnimationLibrary,
            &LocomotionInput,
        ),
        Without<LocomotionFault>,
    >,
) {
    let delta = time.delta_secs();

    for (entity, mut machine, mut mixer, library, input) in query.iter_mut() {
        if !machine.is_started() {
            continue;
        }

        let result = {
            let mut anim = AnimationContext {
                library,
                mixer: &mut mixer,
            };
            machine.update(delta, input, &registry, &mut anim)
        };

        match result {
            Ok(transition) => publish_transition(entity, transition, &mut changed),
            Err(error) => {
                report_locomotion_fault(&mut commands, entity, error);
                continue;
            }
        }

        mixer.advance(delta, library);
    }
}
