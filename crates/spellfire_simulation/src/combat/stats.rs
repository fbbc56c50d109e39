//! Регенерация hp/mp/endurance

use bevy::prelude::*;

use super::damage::Dead;
use crate::components::{Grounding, Stats};
use crate::locomotion::{states, LocomotionStateMachine};

/// Базовая скорость восстановления endurance (× endurance.regen_rate)
pub const ENDURANCE_REGEN_SPEED: f32 = 5.0;
/// Сколько нужно простоять на земле, чтобы endurance пошла вверх (сек)
pub const ENDURANCE_GROUNDED_DELAY: f32 = 0.5;

/// Endurance восстанавливается только на земле и не в полёте
pub fn can_regenerate_endurance(state: Option<&str>, grounding: &Grounding) -> bool {
    state != Some(states::FLY) && grounding.grounded_time.value > ENDURANCE_GROUNDED_DELAY
}

/// Система регенерации (hp/mp по своим rate, endurance по grounding)
pub fn regenerate_stats(
    mut query: Query<(&mut Stats, &Grounding, &LocomotionStateMachine), Without<Dead>>,
    time: Res<Time>,
) {
    let delta = time.delta_secs();

    for (mut stats, grounding, machine) in query.iter_mut() {
        stats.regenerate(delta);

        if can_regenerate_endurance(machine.current_name(), grounding) && !stats.endurance.is_full() {
            let amount = ENDURANCE_REGEN_SPEED * stats.endurance.regen_rate * delta;
            stats.endurance.apply(amount);
        }
    }
}
