//! Awareness: восприятие угрозы, line of sight, флаги укрытия
//!
//! Классификация:
//! - враг "опасен", если его charge > dangerous_charge
//! - сам "опасен", если свой charge > safe_charge (заряжающийся не убегает)
//! - угроза = враг опасен И сам не опасен (LOS не требуется)
//! - critical = can_fire && charge > critical_charge

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::cover::CoverRequestId;
use crate::combat::CurrentSpell;

/// Параметры AI (пороги заряда, частота raycast, радиус блуждания)
#[derive(Component, Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
#[serde(default)]
pub struct AIConfig {
    /// Заряд врага, начиная с которого он опасен
    pub dangerous_charge: f32,
    /// Свой заряд, выше которого не прячемся
    pub safe_charge: f32,
    /// Свой заряд, при котором атакуем вместо отступления
    pub critical_charge: f32,
    /// Не чаще одного LOS raycast за интервал (сек)
    pub raycast_interval: f32,
    /// Радиус поиска случайной точки блуждания (метры)
    pub wander_radius: f32,
    /// Стрелять добровольно при critical заряде и видимом враге
    pub fire_on_critical_charge: bool,
}

impl Default for AIConfig {
    fn default() -> Self {
        Self {
            dangerous_charge: 0.1,
            safe_charge: 0.3,
            critical_charge: 0.7,
            raycast_interval: 0.5,
            wander_radius: 25.0,
            fire_on_critical_charge: true,
        }
    }
}

/// Состояние восприятия + укрытия (только у AI entity)
#[derive(Component, Debug, Clone, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Awareness {
    /// Укрытие, к которому идём (None — блуждаем)
    pub last_cover_position: Option<Vec3>,
    /// Запрос в worker в полёте или идём к найденному укрытию
    pub is_awaiting_cover_calculation: bool,
    /// Correlation id ожидаемого ответа; чужие/старые ответы отбрасываются
    pub pending_request: Option<CoverRequestId>,
    /// elapsed_secs последнего LOS raycast (None — ещё не было)
    pub last_raycast_at: Option<f32>,
    /// Результат последнего raycast (держится между raycast'ами)
    pub can_see_enemy: bool,
    pub is_threatened: bool,
}

impl Awareness {
    /// Пора ли делать новый raycast
    pub fn raycast_due(&self, now: f32, interval: f32) -> bool {
        self.last_raycast_at.map_or(true, |last| now - last >= interval)
    }

    /// Сброс намерения укрыться (отказ worker'а, прибытие, смерть)
    pub fn clear_cover(&mut self) {
        self.last_cover_position = None;
        self.is_awaiting_cover_calculation = false;
        self.pending_request = None;
    }
}

/// Противник, за которым следит AI
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Opponent {
    pub target: Entity,
}

pub fn detect_threat(own: &CurrentSpell, enemy: &CurrentSpell, config: &AIConfig) -> bool {
    let is_enemy_dangerous = enemy.charge > config.dangerous_charge;
    let is_self_dangerous = own.charge > config.safe_charge;
    is_enemy_dangerous && !is_self_dangerous
}

pub fn detect_critical_charge(spell: &CurrentSpell, config: &AIConfig) -> bool {
    spell.can_fire && spell.charge > config.critical_charge
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charged(charge: f32) -> CurrentSpell {
        CurrentSpell {
            charge,
            ..default()
        }
    }

    #[test]
    fn test_threat_requires_dangerous_enemy_and_calm_self() {
        let config = AIConfig::default();

        assert!(detect_threat(&charged(0.05), &charged(0.15), &config));
        assert!(!detect_threat(&charged(0.35), &charged(0.15), &config));
        assert!(!detect_threat(&charged(0.35), &charged(1.0), &config));
        assert!(!detect_threat(&charged(0.0), &charged(0.1), &config));
    }

    #[test]
    fn test_critical_charge_needs_can_fire() {
        let config = AIConfig::default();

        let mut spell = charged(0.8);
        assert!(!detect_critical_charge(&spell, &config));
        spell.can_fire = true;
        assert!(detect_critical_charge(&spell, &config));
        spell.charge = 0.7;
        assert!(!detect_critical_charge(&spell, &config));
    }

    #[test]
    fn test_raycast_rate_limit() {
        let mut awareness = Awareness::default();
        assert!(awareness.raycast_due(0.0, 0.5));

        awareness.last_raycast_at = Some(1.0);
        assert!(!awareness.raycast_due(1.2, 0.5));
        assert!(awareness.raycast_due(1.5, 0.5));
    }
}
