//! Spellfire Simulation Core
//!
//! ECS-симуляция на Bevy 0.16: поведенческое ядро action-игры
//! (locomotion FSM, заряд спелла, угроза/укрытия, навигация по островам).
//!
//! Кадр = FixedUpdate, системы сгруппированы в цепочку SimulationSet:
//! Input → Locomotion → Combat → Awareness → Navigation → Physics → Sync.
//! Так каждое поле entity за кадр пишет ровно одна подсистема.

use bevy::ecs::event::event_update_system;
use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

// Публичные модули
pub mod ai;
pub mod combat;
pub mod components;
pub mod config;
pub mod error;
pub mod locomotion;
pub mod logger;
pub mod navigation;
pub mod physics;
pub mod spawn;
pub mod tasks;

// Re-export базовых типов для удобства
pub use ai::{AIConfig, AIPlugin, Awareness, CoverSearchService, Opponent};
pub use combat::{
    ChargeProfile, CombatPlugin, CurrentSpell, DamageDealt, Dead, EntityDied, SpellReleased, MAX_ROTATION_SPEED,
};
pub use components::*;
pub use config::{NavigationConfig, PhysicsBackend, SimulationConfig};
pub use error::SimulationError;
pub use locomotion::{AnimationsLoaded, LocomotionChanged, LocomotionPlugin, LocomotionStateMachine};
pub use logger::{
    init_logger, log, log_error, log_info, log_warning, set_log_level, set_logger, LogLevel, LogPrinter,
};
pub use navigation::{Level, LevelData, MoveRequest, NavigationPlugin, PathFinished, PathFollower};
pub use physics::{KinematicBody, PhysicsPlugin};
pub use spawn::{builtin_clips, despawn_actor, spawn_enemy, spawn_player};
pub use tasks::{TaskHandle, TaskKind, TaskRegistry};

/// Порядок подсистем внутри кадра
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    /// Снимок input + результат прошлого шага физики
    Input,
    Locomotion,
    Combat,
    Awareness,
    Navigation,
    /// Отправка перемещений в физику
    Physics,
    /// Transform для хоста
    Sync,
}

/// Главный plugin симуляции (объединяет все подсистемы)
#[derive(Default)]
pub struct SimulationPlugin {
    pub config: SimulationConfig,
}

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app
            // Fixed timestep для simulation tick
            .insert_resource(Time::<Fixed>::from_hz(self.config.fixed_hz))
            // Детерминистичный RNG (wander targets, выбор острова)
            .insert_resource(DeterministicRng::new(self.config.seed))
            .insert_resource(self.config.clone())
            .init_resource::<NavigationConfig>()
            .init_resource::<TaskRegistry>()
            .configure_sets(
                FixedUpdate,
                (
                    SimulationSet::Input,
                    SimulationSet::Locomotion,
                    SimulationSet::Combat,
                    SimulationSet::Awareness,
                    SimulationSet::Navigation,
                    SimulationSet::Physics,
                    SimulationSet::Sync,
                )
                    .chain(),
            )
            .add_plugins((
                LocomotionPlugin,
                CombatPlugin,
                AIPlugin,
                NavigationPlugin,
                PhysicsPlugin {
                    backend: self.config.physics_backend,
                },
            ));
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Создаёт minimal Bevy App для headless симуляции (без рендера)
pub fn create_headless_app(seed: u64) -> App {
    create_headless_app_with(SimulationConfig {
        seed,
        ..default()
    })
}

/// Headless App с явной конфигурацией (например, Rapier backend)
pub fn create_headless_app_with(config: SimulationConfig) -> App {
    let mut app = App::new();
    init_logger();
    let backend = config.physics_backend;
    app.add_plugins(MinimalPlugins).add_plugins(SimulationPlugin { config });

    // app.update() не зовём: Rapier context спавнится в PreStartup
    if backend == PhysicsBackend::Rapier {
        if let Err(error) = app.world_mut().try_run_schedule(PreStartup) {
            log_error(&format!("❌ Rapier context was not initialized: {}", error));
        }
    }

    app
}

/// Один тик FixedUpdate с ручным шагом времени (детерминизм не зависит от wall clock)
///
/// После тика буферы событий сдвигаются, как в `First` обычного `app.update()`:
/// событие видно в тике отправки и в следующем, потом отбрасывается.
pub fn run_fixed_tick(app: &mut App, delta_secs: f32) {
    let world = app.world_mut();
    world
        .resource_mut::<Time>()
        .advance_by(Duration::from_secs_f32(delta_secs));
    world.run_schedule(FixedUpdate);

    if let Err(error) = world.run_system_cached(event_update_system) {
        log_error(&format!("❌ Event buffers were not updated: {}", error));
    }
}

/// Snapshot мира для сравнения детерминизма
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    entities.sort_by_key(|(entity, _)| entity.index());

    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
