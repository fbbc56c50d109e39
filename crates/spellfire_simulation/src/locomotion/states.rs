//! Встроенные состояния: idle, walk, walk-back, run, run-back, jump, fly, cast, hit, dead
//!
//! Порядок guard'ов в update: dead > hit > (moving gate) > jump > cast > intent.

use super::machine::{
    cross_fade_enter, AnimationContext, LocomotionFamily, LocomotionInput, LocomotionRegistry,
    LocomotionState, AIRBORNE_BLEND_SECS, DEAD_BLEND_SECS, HIT_BLEND_SECS,
};
use crate::error::LocomotionError;

pub const IDLE: &str = "idle";
pub const WALK: &str = "walk";
pub const WALK_BACK: &str = "walk-back";
pub const RUN: &str = "run";
pub const RUN_BACK: &str = "run-back";
pub const JUMP: &str = "jump";
pub const FLY: &str = "fly";
pub const CAST: &str = "cast";
pub const HIT: &str = "hit";
pub const DEAD: &str = "dead";

/// Все встроенные имена (loader должен поставить клип на каждое)
pub const BUILTIN_STATES: [&str; 10] = [IDLE, WALK, WALK_BACK, RUN, RUN_BACK, JUMP, FLY, CAST, HIT, DEAD];

pub fn register_builtin(registry: &mut LocomotionRegistry) {
    registry.register(IDLE, || Box::new(IdleState));
    for name in [WALK, WALK_BACK, RUN, RUN_BACK] {
        registry.register(name, move || Box::new(GaitState { name }));
    }
    registry.register(JUMP, || Box::new(TimedState::new(JUMP)));
    registry.register(HIT, || Box::new(TimedState::new(HIT)));
    registry.register(FLY, || Box::new(FlyState));
    registry.register(CAST, || Box::new(CastState));
    registry.register(DEAD, || Box::new(DeadState));
}

/// Общие guard'ы стоящих/идущих состояний
fn grounded_guards(input: &LocomotionInput) -> Option<Option<&'static str>> {
    if let Some(reactive) = input.reactive_transition() {
        return Some(Some(reactive));
    }
    // навигация сама ставит run/run-back/fly — не перебиваем
    if input.is_moving {
        return Some(None);
    }
    if input.wants_jump() {
        return Some(Some(JUMP));
    }
    if input.cast {
        return Some(Some(CAST));
    }
    None
}

pub struct IdleState;

impl LocomotionState for IdleState {
    fn name(&self) -> &'static str {
        IDLE
    }

    fn update(&mut self, _delta: f32, input: &LocomotionInput) -> Option<&'static str> {
        if let Some(next) = grounded_guards(input) {
            return next;
        }
        input.gait_intent()
    }
}

/// walk / walk-back / run / run-back
pub struct GaitState {
    name: &'static str,
}

impl LocomotionState for GaitState {
    fn name(&self) -> &'static str {
        self.name
    }

    fn family(&self) -> LocomotionFamily {
        LocomotionFamily::Gait
    }

    fn update(&mut self, _delta: f32, input: &LocomotionInput) -> Option<&'static str> {
        if let Some(next) = grounded_guards(input) {
            return next;
        }
        Some(input.gait_intent().unwrap_or(IDLE))
    }
}

/// One-shot состояния (jump, hit): держатся длительность клипа
pub struct TimedState {
    name: &'static str,
    elapsed: f32,
    duration: f32,
}

impl TimedState {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            elapsed: 0.0,
            duration: 0.0,
        }
    }
}

impl LocomotionState for TimedState {
    fn name(&self) -> &'static str {
        self.name
    }

    fn family(&self) -> LocomotionFamily {
        if self.name == JUMP {
            LocomotionFamily::Airborne
        } else {
            LocomotionFamily::Action
        }
    }

    fn blend_in(&self, _previous: &str) -> f32 {
        if self.name == HIT {
            HIT_BLEND_SECS
        } else {
            AIRBORNE_BLEND_SECS
        }
    }

    fn enter(
        &mut self,
        previous: Option<&dyn LocomotionState>,
        anim: &mut AnimationContext,
    ) -> Result<(), LocomotionError> {
        let blend = previous.map(|p| self.blend_in(p.name())).unwrap_or(0.0);
        cross_fade_enter(self.name, self.family(), blend, previous, anim)?;
        self.elapsed = 0.0;
        self.duration = anim.library.get(self.name).map(|c| c.duration).unwrap_or(0.0);
        Ok(())
    }

    fn update(&mut self, delta: f32, input: &LocomotionInput) -> Option<&'static str> {
        if input.is_dead {
            return Some(DEAD);
        }
        if self.name == JUMP && input.hit {
            return Some(HIT);
        }

        self.elapsed += delta;
        if self.elapsed < self.duration {
            return None;
        }
        if self.name == JUMP && !input.is_grounded {
            return None;
        }
        Some(input.gait_intent().unwrap_or(IDLE))
    }
}

/// Полёт через портал (импульс ставит path-follow контроллер)
pub struct FlyState;

impl LocomotionState for FlyState {
    fn name(&self) -> &'static str {
        FLY
    }

    fn family(&self) -> LocomotionFamily {
        LocomotionFamily::Airborne
    }

    fn blend_in(&self, _previous: &str) -> f32 {
        AIRBORNE_BLEND_SECS
    }

    fn update(&mut self, _delta: f32, input: &LocomotionInput) -> Option<&'static str> {
        if let Some(reactive) = input.reactive_transition() {
            return Some(reactive);
        }
        if !input.is_grounded || input.takeoff {
            return None;
        }
        if input.is_moving {
            return Some(RUN);
        }
        Some(input.gait_intent().unwrap_or(IDLE))
    }
}

pub struct CastState;

impl LocomotionState for CastState {
    fn name(&self) -> &'static str {
        CAST
    }

    fn update(&mut self, _delta: f32, input: &LocomotionInput) -> Option<&'static str> {
        if let Some(reactive) = input.reactive_transition() {
            return Some(reactive);
        }
        if input.cast {
            return None;
        }
        Some(input.gait_intent().unwrap_or(IDLE))
    }
}

/// Терминальное состояние
pub struct DeadState;

impl LocomotionState for DeadState {
    fn name(&self) -> &'static str {
        DEAD
    }

    fn blend_in(&self, _previous: &str) -> f32 {
        DEAD_BLEND_SECS
    }

    fn update(&mut self, _delta: f32, _input: &LocomotionInput) -> Option<&'static str> {
        None
    }
}
