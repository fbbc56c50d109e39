//! AI events

use bevy::prelude::*;

/// Враг стал угрозой (фронт: не было угрозы → есть)
#[derive(Event, Debug, Clone)]
pub struct ThreatDetected {
    pub entity: Entity,
    pub enemy: Entity,
}

/// Ответ worker'а принят (None — укрытия нет)
#[derive(Event, Debug, Clone)]
pub struct CoverFound {
    pub entity: Entity,
    pub position: Option<Vec3>,
}
