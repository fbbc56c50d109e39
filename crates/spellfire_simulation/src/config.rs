//! Конфигурация симуляции (resources + serde)
//!
//! Per-entity настройки (AIConfig, ChargeProfile) живут в компонентах,
//! здесь только глобальные параметры мира.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Кто двигает kinematic тела
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect, Serialize, Deserialize)]
pub enum PhysicsBackend {
    /// Прямая интеграция next_translation (тесты, headless runner)
    #[default]
    Headless,
    /// Rapier KinematicCharacterController (RapierPhysicsPlugin в FixedUpdate)
    Rapier,
}

/// Глобальная конфигурация симуляции
#[derive(Resource, Debug, Clone, Reflect, Serialize, Deserialize)]
#[reflect(Resource)]
pub struct SimulationConfig {
    /// Частота FixedUpdate (Hz)
    pub fixed_hz: f64,
    /// Seed для DeterministicRng
    pub seed: u64,
    pub physics_backend: PhysicsBackend,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fixed_hz: 60.0,
            seed: 42,
            physics_backend: PhysicsBackend::Headless,
        }
    }
}

/// Параметры навигации и path-follow контроллера
#[derive(Resource, Debug, Clone, Reflect, Serialize, Deserialize)]
#[reflect(Resource)]
pub struct NavigationConfig {
    /// Допуск прибытия на waypoint (ε)
    pub arrival_epsilon: f32,
    /// Базовая скорость движения по навмешу (m/s)
    pub base_move_speed: f32,
    pub min_fly_impulse: f32,
    pub max_fly_impulse: f32,
    /// Спиральный поиск ноды вокруг off-mesh позиции
    pub spiral_start_radius: f32,
    pub spiral_max_radius: f32,
    pub spiral_radius_step: f32,
    pub spiral_angle_step: f32,
    /// Сглаживание поворота к waypoint (slerp factor)
    pub rotation_smoothing: f32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            arrival_epsilon: 0.2,
            base_move_speed: 3.0,
            min_fly_impulse: 2.0,
            max_fly_impulse: 10.0,
            spiral_start_radius: 0.2,
            spiral_max_radius: 1.5,
            spiral_radius_step: 0.2,
            spiral_angle_step: std::f32::consts::FRAC_PI_3,
            rotation_smoothing: 0.2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_json() {
        let json = r#"{ "fixed_hz": 30.0, "seed": 7, "physics_backend": "Rapier" }"#;
        let config: SimulationConfig = serde_json::from_str(json).expect("valid config");

        assert_eq!(config.seed, 7);
        assert_eq!(config.physics_backend, PhysicsBackend::Rapier);
        assert_eq!(config.fixed_hz, 30.0);
    }

    #[test]
    fn test_navigation_defaults() {
        let config = NavigationConfig::default();
        assert_eq!(config.arrival_epsilon, 0.2);
        assert_eq!(config.base_move_speed, 3.0);
        assert!(config.spiral_start_radius < config.spiral_max_radius);
    }
}
