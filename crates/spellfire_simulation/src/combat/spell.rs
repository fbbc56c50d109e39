//! Spell/charge state + чистая математика заряда
//!
//! charge ∈ [0,1] — нормализованный прогресс зарядки.
//! rotation speed = lerp(INITIAL, MAX, charge), ровно MAX при charge = 1.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub const INITIAL_ROTATION_SPEED: f32 = 0.02;
pub const MAX_ROTATION_SPEED: f32 = 0.2;
/// Порог, после которого выстрел разрешён
pub const MIN_CHARGE_SPEED: f32 = 0.08;
/// Базовая длительность зарядки (сек)
pub const DEFAULT_CHARGE_DURATION: f32 = 8.0;
pub const ENEMY_CHARGE_DURATION: f32 = 6.0;

/// Урон себе при перегрузке
pub const OVERLOAD_SELF_DAMAGE: f32 = 10.0;
/// Отметка "зарядка началась" до первого шага таймера
pub const CHARGE_START_EPSILON: f32 = 0.00001;

/// Текущий спелл entity
#[derive(Component, Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct CurrentSpell {
    pub name: String,
    pub speed: f32,
    pub damage: f32,
    /// [0, 1]
    pub charge: f32,
    pub can_fire: bool,
    pub forced_spell_release: bool,
}

impl Default for CurrentSpell {
    fn default() -> Self {
        Self {
            name: "shot".to_string(),
            speed: 1.0,
            damage: 25.0,
            charge: 0.0,
            can_fire: false,
            forced_spell_release: false,
        }
    }
}

impl CurrentSpell {
    pub fn is_charging(&self) -> bool {
        self.charge > 0.0
    }

    /// Терминальный сброс цикла (выстрел, перегрузка, fizzle, смерть)
    pub fn reset(&mut self) {
        self.charge = 0.0;
        self.can_fire = false;
        self.forced_spell_release = false;
    }
}

/// Индивидуальная длительность зарядки
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct ChargeProfile {
    pub duration_secs: f32,
}

impl Default for ChargeProfile {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_CHARGE_DURATION,
        }
    }
}

impl ChargeProfile {
    pub fn enemy() -> Self {
        Self {
            duration_secs: ENEMY_CHARGE_DURATION,
        }
    }
}

/// Линейный remap value из [in_min, in_max] в [out_min, out_max]
pub fn remap(in_min: f32, in_max: f32, out_min: f32, out_max: f32, value: f32) -> f32 {
    if (in_max - in_min).abs() <= f32::EPSILON {
        return out_max;
    }
    out_min + (value - in_min) * (out_max - out_min) / (in_max - in_min)
}

/// elapsed → нормализованный прогресс [0, 1]
pub fn charge_progress(elapsed_secs: f32, duration_secs: f32) -> f32 {
    if duration_secs <= 0.0 {
        return 1.0;
    }
    remap(0.0, duration_secs, 0.0, 1.0, elapsed_secs).clamp(0.0, 1.0)
}

pub fn rotation_speed(progress: f32) -> f32 {
    if progress >= 1.0 {
        return MAX_ROTATION_SPEED;
    }
    let t = progress.clamp(0.0, 1.0);
    INITIAL_ROTATION_SPEED + (MAX_ROTATION_SPEED - INITIAL_ROTATION_SPEED) * t
}

/// Результат шага таймера зарядки
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChargeStep {
    Charging { rotation_speed: f32 },
    /// Принудительный выстрел на максимальной скорости
    Overload { rotation_speed: f32 },
}

/// Старт цикла: no-op, пока заряд уже идёт (charge > 0)
pub fn begin_charge(spell: &mut CurrentSpell) -> bool {
    if spell.is_charging() {
        return false;
    }
    spell.charge = CHARGE_START_EPSILON;
    spell.can_fire = false;
    spell.forced_spell_release = false;
    true
}

/// Шаг таймера: charge монотонно растёт, canFire — защёлка, MAX → перегрузка
pub fn advance_charge(spell: &mut CurrentSpell, elapsed_secs: f32, duration_secs: f32) -> ChargeStep {
    let progress = charge_progress(elapsed_secs, duration_secs);
    let speed = rotation_speed(progress);
    spell.charge = progress.max(spell.charge);

    if speed > MIN_CHARGE_SPEED && !spell.can_fire {
        spell.can_fire = true;
    }

    if speed >= MAX_ROTATION_SPEED {
        spell.can_fire = false;
        spell.forced_spell_release = true;
        spell.charge = 0.0;
        return ChargeStep::Overload { rotation_speed: speed };
    }

    ChargeStep::Charging { rotation_speed: speed }
}

/// Добровольный выстрел: скорость по текущему charge, затем сброс
pub fn release_charge(spell: &mut CurrentSpell) -> f32 {
    let speed = rotation_speed(spell.charge);
    spell.reset();
    speed
}

/// Урон попадания: базовый урон × доля от максимальной скорости
pub fn spell_damage(base_damage: f32, rotation_speed: f32) -> f32 {
    (base_damage * rotation_speed / MAX_ROTATION_SPEED).round()
}
