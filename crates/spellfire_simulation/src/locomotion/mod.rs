//! Locomotion domain — FSM анимаций/передвижения
//!
//! Состояния: idle, walk, walk-back, run, run-back, jump, fly, cast, hit, dead
//! (открытый набор через LocomotionRegistry).
//!
//! Systems:
//! - handle_animations_loaded: loader callback → idle (Locomotion set)
//! - gather_locomotion_input: intent + физика + урон → LocomotionInput (Input set)
//! - update_locomotion: один переход за кадр, затем mixer.advance

use bevy::prelude::*;

use crate::SimulationSet;

pub mod animation;
pub mod events;
pub mod machine;
pub mod states;
pub mod systems;

#[cfg(test)]
mod machine_tests;

pub use animation::{ActionState, AnimationClip, AnimationLibrary, AnimationMixer};
pub use events::{AnimationsLoaded, LocomotionChanged, LocomotionFault};
pub use machine::{
    AnimationContext, LocomotionFamily, LocomotionInput, LocomotionRegistry, LocomotionState,
    LocomotionStateMachine, Transition,
};
pub use systems::{request_state, report_locomotion_fault};

/// Locomotion Plugin
pub struct LocomotionPlugin;

impl Plugin for LocomotionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LocomotionRegistry>()
            .add_event::<AnimationsLoaded>()
            .add_event::<LocomotionChanged>()
            .add_systems(
                FixedUpdate,
                systems::gather_locomotion_input.in_set(SimulationSet::Input),
            )
            .add_systems(
                FixedUpdate,
                (systems::handle_animations_loaded, systems::update_locomotion)
                    .chain()
                    .in_set(SimulationSet::Locomotion),
            );
    }
}
