//! Movement-related components: waypoints, grounding bookkeeping, player intent

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Точка пути. `is_portal` — выход портала (off-navmesh перелёт на другой остров).
#[derive(Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
pub struct Waypoint {
    pub position: Vec3,
    #[serde(default)]
    pub is_portal: bool,
}

impl Waypoint {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            is_portal: false,
        }
    }

    pub fn portal(position: Vec3) -> Self {
        Self {
            position,
            is_portal: true,
        }
    }
}

/// Сколько entity непрерывно стоит на земле
#[derive(Debug, Clone, Copy, Default, PartialEq, Reflect)]
pub struct GroundedTime {
    /// сек на земле
    pub value: f32,
    /// elapsed_secs момента, когда entity последний раз была в воздухе
    pub last_time_not_grounded: f32,
}

/// Grounding bookkeeping (пишет физика, читают FSM/навигация/stats)
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Grounding {
    pub is_grounded: bool,
    /// Текущий подъёмный импульс полёта (затухает)
    pub applied_fly_impulse: f32,
    pub grounded_time: GroundedTime,
    /// Кадры взлёта, пока grounding игнорируется
    pub takeoff_frames: u32,
}

impl Default for Grounding {
    fn default() -> Self {
        Self {
            is_grounded: true,
            applied_fly_impulse: 0.0,
            grounded_time: GroundedTime::default(),
            takeoff_frames: 0,
        }
    }
}

impl Grounding {
    /// Обновляет grounded_time по текущему флагу
    pub fn track(&mut self, elapsed_secs: f32) {
        if self.is_grounded {
            self.grounded_time.value = elapsed_secs - self.grounded_time.last_time_not_grounded;
        } else {
            self.grounded_time.value = 0.0;
            self.grounded_time.last_time_not_grounded = elapsed_secs;
        }
    }
}

/// Snapshot клавиш игрока (заполняет внешний input collaborator)
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct PlayerIntent {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
    pub jump: bool,
    pub cast: bool,
}
