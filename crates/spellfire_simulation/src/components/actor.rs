//! Базовые компоненты акторов: Actor, ActorUuid, Stats (hp/mp/endurance)

use bevy::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::combat::{ChargeProfile, CurrentSpell};
use crate::components::Grounding;
use crate::locomotion::{AnimationMixer, LocomotionInput, LocomotionStateMachine};
use crate::physics::KinematicBody;

/// Закрытый набор вариантов entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub enum ActorKind {
    #[default]
    Player,
    Enemy,
}

/// Актор (игрок или враг) — базовый компонент для живых существ
///
/// Ровно одна FSM и одно тело на entity: всё подключается через Required Components
/// и живёт до despawn.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
#[require(
    Stats,
    CurrentSpell,
    ChargeProfile,
    KinematicBody,
    Grounding,
    LocomotionStateMachine,
    LocomotionInput,
    AnimationMixer,
    ActorUuid
)]
pub struct Actor {
    pub kind: ActorKind,
    /// Stable ID фракции (враги не атакуют своих)
    pub faction_id: u64,
}

static NEXT_ACTOR_UUID: AtomicU64 = AtomicU64::new(1);

/// Стабильный идентификатор актора (переживает пересоздание Entity id хостом)
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
#[reflect(Component)]
pub struct ActorUuid(pub u64);

impl Default for ActorUuid {
    fn default() -> Self {
        Self(NEXT_ACTOR_UUID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Один из ресурсов актора (hp, mp, endurance)
///
/// Инвариант: 0 ≤ current ≤ max. `previous` — значение до последней мутации
/// (UI рисует по нему "след" урона).
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct VitalPool {
    pub current: f32,
    pub previous: f32,
    pub max: f32,
    /// units per second
    pub regen_rate: f32,
}

impl VitalPool {
    pub fn new(max: f32, regen_rate: f32) -> Self {
        Self {
            current: max,
            previous: max,
            max,
            regen_rate,
        }
    }

    /// Единая точка мутации: запоминает previous и клампит в [0, max]
    pub fn apply(&mut self, delta: f32) {
        self.previous = self.current;
        self.current = (self.current + delta).clamp(0.0, self.max);
    }

    pub fn is_empty(&self) -> bool {
        self.current <= 0.0
    }

    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }
}

/// hp/mp/endurance тройки
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Stats {
    pub hp: VitalPool,
    pub mp: VitalPool,
    pub endurance: VitalPool,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            hp: VitalPool::new(100.0, 0.0),
            mp: VitalPool::new(100.0, 0.0),
            endurance: VitalPool::new(100.0, 1.0),
        }
    }
}

impl Stats {
    pub fn deal_damage(&mut self, amount: f32) {
        self.hp.apply(-amount);
    }

    pub fn deal_mp_damage(&mut self, amount: f32) {
        self.mp.apply(-amount);
    }

    pub fn deal_endurance_damage(&mut self, amount: f32) {
        self.endurance.apply(-amount);
    }

    pub fn add_hp(&mut self, amount: f32) {
        self.hp.apply(amount);
    }

    pub fn is_alive(&self) -> bool {
        !self.hp.is_empty()
    }

    /// hp/mp по своим rate; endurance отдельно (зависит от grounding, см. combat::stats)
    pub fn regenerate(&mut self, delta_time: f32) {
        if self.hp.regen_rate > 0.0 && !self.hp.is_full() && self.is_alive() {
            self.hp.apply(self.hp.regen_rate * delta_time);
        }
        if self.mp.regen_rate > 0.0 && !self.mp.is_full() {
            self.mp.apply(self.mp.regen_rate * delta_time);
        }
    }
}
