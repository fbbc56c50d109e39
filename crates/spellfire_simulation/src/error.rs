//! Ошибки доменов симуляции (thiserror)
//!
//! Таксономия:
//! - LocomotionError — сломанный precondition (нет клипа/состояния): громкий отказ
//! - NavigationError — ошибки конфигурации навмеша/порталов (ловятся при загрузке уровня)
//! - CoverSearchError — worker недоступен
//! - LevelError — битые данные уровня
//!
//! Runtime-неудачи планирования ошибками НЕ являются: planner деградирует до partial path.

use thiserror::Error;

use crate::navigation::GroupId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocomotionError {
    #[error("unknown locomotion state '{0}'")]
    UnknownState(String),

    #[error("animation clip '{name}' is not loaded")]
    MissingAnimation { name: String },

    #[error("animations are not loaded yet")]
    NotLoaded,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NavigationError {
    #[error("navmesh has no triangles")]
    EmptyNavMesh,

    #[error("navmesh index {index} is out of range ({vertex_count} vertices)")]
    InvalidIndex { index: u32, vertex_count: usize },

    #[error("portal transition {from} -> {to} is missing")]
    MissingTransition { from: GroupId, to: GroupId },

    #[error("portal connection references unknown group {0}")]
    UnknownGroup(GroupId),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoverSearchError {
    #[error("cover search worker disconnected")]
    WorkerDisconnected,
}

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level data is malformed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("index buffer length {0} is not a multiple of 3")]
    IndexBuffer(usize),

    #[error("vertex buffer length {0} is not a multiple of 3")]
    VertexBuffer(usize),

    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

/// Общая ошибка crate (для внешних вызовов: загрузка уровня, ручное управление FSM)
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Locomotion(#[from] LocomotionError),

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    CoverSearch(#[from] CoverSearchError),

    #[error(transparent)]
    Level(#[from] LevelError),
}
