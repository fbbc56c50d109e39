//! Path follow controller + приём MoveRequest
//!
//! Один PathFollower на entity (TaskKind::PathFollow). Новый запрос при
//! активном пути игнорируется, если не помечен interrupt (укрытие/атака
//! перебивают блуждание). На финальной точке: отмена handle, сброс
//! укрытия, idle, PathFinished ровно один раз.

use bevy::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};

use super::level::Level;
use super::planner::{find_path_to_target, find_random_target_position};
use crate::ai::{AIConfig, Awareness};
use crate::combat::Dead;
use crate::components::{Grounding, Waypoint};
use crate::config::NavigationConfig;
use crate::locomotion::states::{FLY, IDLE, RUN, RUN_BACK, WALK, WALK_BACK};
use crate::locomotion::{
    request_state, report_locomotion_fault, AnimationLibrary, AnimationMixer, LocomotionChanged, LocomotionFault,
    LocomotionRegistry, LocomotionStateMachine,
};
use crate::physics::{calc_movement_vector, facing_rotation, KinematicBody};
use crate::tasks::{TaskHandle, TaskKind, TaskRegistry};
use crate::DeterministicRng;

/// Радиус блуждания для entity без AIConfig
pub const DEFAULT_WANDER_RADIUS: f32 = 25.0;
/// Кадры взлёта, пока grounding игнорируется
pub const TAKEOFF_FRAMES: u32 = 5;

/// Запрос движения
#[derive(Event, Debug, Clone)]
pub struct MoveRequest {
    pub entity: Entity,
    /// None — случайная точка блуждания
    pub target: Option<Vec3>,
    /// Смотреть на entity во время движения (иначе — по ходу)
    pub look_at: Option<Entity>,
    /// Прямая линия к цели, без навмеша
    pub direct: bool,
    /// Перебить активный путь (иначе запрос при движении игнорируется)
    pub interrupt: bool,
}

impl MoveRequest {
    pub fn to(entity: Entity, target: Vec3) -> Self {
        Self {
            entity,
            target: Some(target),
            look_at: None,
            direct: false,
            interrupt: false,
        }
    }

    pub fn wander(entity: Entity) -> Self {
        Self {
            entity,
            target: None,
            look_at: None,
            direct: false,
            interrupt: false,
        }
    }
}

/// Отправка запроса движения снаружи систем (хост, тесты)
pub fn request_move(world: &mut World, request: MoveRequest) {
    world.send_event(request);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOutcome {
    Arrived,
    Interrupted,
}

#[derive(Event, Debug, Clone)]
pub struct PathFinished {
    pub entity: Entity,
    pub handle: TaskHandle,
    pub outcome: PathOutcome,
}

/// Активное следование по пути
#[derive(Component, Debug, Clone)]
pub struct PathFollower {
    pub handle: TaskHandle,
    /// Оставшиеся точки (без текущей)
    pub path: VecDeque<Waypoint>,
    pub current: Option<Waypoint>,
    pub previous: Option<Vec3>,
    pub look_at: Option<Entity>,
}

impl PathFollower {
    /// Финальная цель пути
    pub fn destination(&self) -> Option<Vec3> {
        self.path.back().or(self.current.as_ref()).map(|waypoint| waypoint.position)
    }
}

/// Система: MoveRequest → PathFollower
pub fn process_move_requests(
    mut commands: Commands,
    mut requests: EventReader<MoveRequest>,
    level: Option<Res<Level>>,
    config: Res<NavigationConfig>,
    mut rng: ResMut<DeterministicRng>,
    mut tasks: ResMut<TaskRegistry>,
    query: Query<(&KinematicBody, Option<&PathFollower>, Option<&AIConfig>), Without<Dead>>,
    mut finished: EventWriter<PathFinished>,
) {
    // команды отложены: второй запрос того же кадра ещё не видит нового PathFollower
    let mut started: HashSet<Entity> = HashSet::new();

    for request in requests.read() {
        let Ok((body, follower, ai_config)) = query.get(request.entity) else {
            continue;
        };
        if started.contains(&request.entity) && !request.interrupt {
            continue;
        }
        if follower.is_some() && !request.interrupt {
            continue;
        }

        let destination = match (request.target, level.as_deref()) {
            (Some(target), _) => target,
            (None, Some(level)) => {
                let radius = ai_config.map_or(DEFAULT_WANDER_RADIUS, |config| config.wander_radius);
                find_random_target_position(level, body.position, radius, &mut rng.rng)
            }
            (None, None) => continue,
        };

        let path: Vec<Waypoint> = match level.as_deref() {
            Some(level) if !request.direct => find_path_to_target(level, &config, body.position, destination),
            _ => vec![Waypoint::new(destination)],
        };
        if path.is_empty() {
            crate::log(&format!("🧭 No path for {:?} to {:?}", request.entity, destination));
            continue;
        }

        if let Some(previous) = follower {
            if tasks.cancel(previous.handle) {
                finished.write(PathFinished {
                    entity: request.entity,
                    handle: previous.handle,
                    outcome: PathOutcome::Interrupted,
                });
            }
        }

        let handle = tasks.register(request.entity, TaskKind::PathFollow);
        crate::log(&format!(
            "🧭 {:?} follows {} waypoints to {:?} (direct: {})",
            request.entity,
            path.len(),
            destination,
            request.direct
        ));
        commands.entity(request.entity).insert(PathFollower {
            handle,
            path: VecDeque::from(path),
            current: None,
            previous: None,
            look_at: request.look_at,
        });
        started.insert(request.entity);
    }
}

/// Навигация не перебивает hit/cast/jump/dead
fn navigation_may_override(machine: &LocomotionStateMachine) -> bool {
    [IDLE, WALK, WALK_BACK, RUN, RUN_BACK, FLY]
        .iter()
        .any(|name| machine.is_state(name))
}

/// Доступ follower'а к FSM entity
struct FsmAccess<'a> {
    entity: Entity,
    machine: &'a mut LocomotionStateMachine,
    mixer: &'a mut AnimationMixer,
    library: Option<&'a AnimationLibrary>,
    faulted: bool,
}

impl FsmAccess<'_> {
    fn set(
        &mut self,
        name: &'static str,
        commands: &mut Commands,
        registry: &LocomotionRegistry,
        changed: &mut EventWriter<LocomotionChanged>,
    ) {
        if self.faulted || !navigation_may_override(self.machine) {
            return;
        }
        let Some(library) = self.library else {
            return;
        };
        if let Err(error) = request_state(self.entity, name, self.machine, library, self.mixer, registry, changed) {
            report_locomotion_fault(commands, self.entity, error);
            self.faulted = true;
        }
    }
}

type FollowerQuery = (
    Entity,
    &'static mut PathFollower,
    &'static mut KinematicBody,
    &'static mut Grounding,
    &'static mut LocomotionStateMachine,
    &'static mut AnimationMixer,
    Option<&'static AnimationLibrary>,
    Option<&'static mut Awareness>,
    Has<LocomotionFault>,
);

/// Система: шаг следования по пути
pub fn follow_paths(
    mut commands: Commands,
    time: Res<Time>,
    config: Res<NavigationConfig>,
    registry: Res<LocomotionRegistry>,
    mut tasks: ResMut<TaskRegistry>,
    mut bodies: ParamSet<(
        Query<(Entity, &KinematicBody)>,
        Query<FollowerQuery, Without<Dead>>,
    )>,
    mut changed: EventWriter<LocomotionChanged>,
    mut finished: EventWriter<PathFinished>,
) {
    let delta = time.delta_secs();
    if delta <= 0.0 {
        return;
    }

    let positions: HashMap<Entity, Vec3> = bodies.p0().iter().map(|(entity, body)| (entity, body.position)).collect();

    for (entity, mut follower, mut body, mut grounding, mut machine, mut mixer, library, awareness, faulted) in
        bodies.p1().iter_mut()
    {
        if !tasks.is_active(follower.handle) {
            // handle отменён снаружи
            commands.entity(entity).remove::<PathFollower>();
            finished.write(PathFinished {
                entity,
                handle: follower.handle,
                outcome: PathOutcome::Interrupted,
            });
            continue;
        }

        let mut fsm = FsmAccess {
            entity,
            machine: &mut *machine,
            mixer: &mut *mixer,
            library,
            faulted,
        };

        let existing = follower.current;
        let current = match existing {
            Some(current) => current,
            None => match follower.path.pop_front() {
                Some(next) => {
                    follower.current = Some(next);
                    next
                }
                None => {
                    // пустой путь — сразу прибыли
                    finish_path(
                        entity,
                        &follower,
                        awareness,
                        &mut fsm,
                        &mut commands,
                        &mut tasks,
                        &registry,
                        &mut changed,
                        &mut finished,
                    );
                    continue;
                }
            },
        };

        let target = current.position;
        let agent = body.position;
        let flat_distance = Vec2::new(target.x - agent.x, target.z - agent.z).length();

        if flat_distance <= config.arrival_epsilon {
            if follower.path.is_empty() {
                finish_path(
                    entity,
                    &follower,
                    awareness,
                    &mut fsm,
                    &mut commands,
                    &mut tasks,
                    &registry,
                    &mut changed,
                    &mut finished,
                );
            } else {
                // промежуточная точка: следующая берётся в следующем кадре
                follower.previous = Some(target);
                follower.current = None;
            }
            continue;
        }

        let velocity = (target - agent).normalize_or_zero() * config.base_move_speed;
        let local_velocity = body.rotation.inverse() * velocity;
        let next_translation = calc_movement_vector(&body, local_velocity, delta);

        if current.is_portal {
            // portal = off-navmesh: взлетаем к острову
            let height_diff = target.y - agent.y;
            if (height_diff > 0.1 && grounding.applied_fly_impulse < config.min_fly_impulse)
                || (height_diff > 1.0 && grounding.applied_fly_impulse < config.max_fly_impulse * 0.7)
            {
                grounding.applied_fly_impulse = config.max_fly_impulse;
                grounding.takeoff_frames = TAKEOFF_FRAMES;
                fsm.set(FLY, &mut commands, &registry, &mut changed);
            }

            // планирование вниз
            let previous_height_diff = follower.previous.map_or(f32::MAX, |previous| target.y - previous.y);
            if previous_height_diff < 1.0 {
                grounding.applied_fly_impulse = config.max_fly_impulse * 0.1;
                fsm.set(FLY, &mut commands, &registry, &mut changed);
            }
        }

        match follower.look_at.and_then(|look| positions.get(&look).copied()) {
            Some(look_position) => {
                body.look_at(look_position);
                if !current.is_portal {
                    let facing = body.forward().dot((target - agent).normalize_or_zero());
                    grounding.takeoff_frames = 0;
                    let gait = if facing < 0.0 { RUN_BACK } else { RUN };
                    fsm.set(gait, &mut commands, &registry, &mut changed);
                }
            }
            None => {
                let flat_target = Vec3::new(target.x, agent.y, target.z);
                if let Some(rotation) = facing_rotation(agent, flat_target) {
                    body.set_rotation_smoothed(rotation, config.rotation_smoothing);
                }
                if !current.is_portal {
                    fsm.set(RUN, &mut commands, &registry, &mut changed);
                }
            }
        }

        body.set_next_kinematic_translation(next_translation);
    }
}

#[allow(clippy::too_many_arguments)]
fn finish_path(
    entity: Entity,
    follower: &PathFollower,
    awareness: Option<Mut<Awareness>>,
    fsm: &mut FsmAccess,
    commands: &mut Commands,
    tasks: &mut TaskRegistry,
    registry: &LocomotionRegistry,
    changed: &mut EventWriter<LocomotionChanged>,
    finished: &mut EventWriter<PathFinished>,
) {
    if !tasks.cancel(follower.handle) {
        return;
    }
    commands.entity(entity).remove::<PathFollower>();

    if let Some(mut awareness) = awareness {
        awareness.clear_cover();
    }
    fsm.set(IDLE, commands, registry, changed);

    finished.write(PathFinished {
        entity,
        handle: follower.handle,
        outcome: PathOutcome::Arrived,
    });
    crate::log(&format!("🏁 {:?} reached destination", entity));
}
