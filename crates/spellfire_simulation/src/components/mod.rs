//! ECS Components для игровых entity
//!
//! Организация по доменам:
//! - actor: базовые характеристики (kind, uuid, hp/mp/endurance)
//! - movement: waypoints, grounding bookkeeping, player intent
//!
//! Доменные компоненты (FSM, заряд, awareness, тело) живут в своих модулях
//! и подключаются к Actor через Required Components.

pub mod actor;
pub mod movement;

pub use actor::*;
pub use movement::*;
