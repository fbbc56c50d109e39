//! Per-entity task handles
//!
//! Каждое длящееся поведение (зарядка спелла, следование по пути) регистрирует
//! подписку на frame update и получает явный `TaskHandle`.
//! Отмена — явный вызов `cancel(handle)`, без сопоставления строк/uuid.

use bevy::prelude::*;
use std::collections::HashMap;

/// Вид подписки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum TaskKind {
    Charge,
    PathFollow,
}

/// Handle активной подписки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub struct TaskHandle(pub u64);

/// Реестр активных подписок (owned by World, не глобальный)
#[derive(Resource, Debug, Default)]
pub struct TaskRegistry {
    next_id: u64,
    active: HashMap<TaskHandle, (Entity, TaskKind)>,
}

impl TaskRegistry {
    pub fn register(&mut self, entity: Entity, kind: TaskKind) -> TaskHandle {
        self.next_id += 1;
        let handle = TaskHandle(self.next_id);
        self.active.insert(handle, (entity, kind));
        handle
    }

    /// Возвращает true только при первой отмене (повторная — no-op)
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.active.remove(&handle).is_some()
    }

    pub fn is_active(&self, handle: TaskHandle) -> bool {
        self.active.contains_key(&handle)
    }

    pub fn active_count(&self, entity: Entity, kind: TaskKind) -> usize {
        self.active
            .values()
            .filter(|(owner, k)| *owner == entity && *k == kind)
            .count()
    }

    /// Отменяет все подписки entity (despawn/death). Возвращает число отменённых.
    pub fn cancel_all_for(&mut self, entity: Entity) -> usize {
        let before = self.active.len();
        self.active.retain(|_, (owner, _)| *owner != entity);
        before - self.active.len()
    }
}
