//! Locomotion events + fault marker

use bevy::prelude::*;

use super::animation::AnimationClip;
use crate::error::LocomotionError;

/// Loader закончил загрузку клипов entity (callback, ровно один раз)
#[derive(Event, Debug, Clone)]
pub struct AnimationsLoaded {
    pub entity: Entity,
    pub clips: Vec<(String, AnimationClip)>,
}

/// Реальный переход FSM (no-op переходы не публикуются)
#[derive(Event, Debug, Clone, PartialEq)]
pub struct LocomotionChanged {
    pub entity: Entity,
    pub from: Option<&'static str>,
    pub to: &'static str,
}

/// Entity с нарушенным precondition (нет клипа/состояния): FSM больше не обновляется
#[derive(Component, Debug, Clone)]
pub struct LocomotionFault {
    pub error: LocomotionError,
}
