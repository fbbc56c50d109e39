use std::sync::atomic::{AtomicUsize, Ordering};

use super::animation::{AnimationClip, AnimationLibrary, AnimationMixer};
use super::machine::*;
use super::states::{self, *};
use crate::error::LocomotionError;

fn full_library() -> AnimationLibrary {
    AnimationLibrary::new(states::BUILTIN_STATES.iter().map(|name| {
        let clip = match *name {
            WALK | WALK_BACK => AnimationClip::looping(1.0),
            RUN | RUN_BACK => AnimationClip::looping(0.5),
            JUMP => AnimationClip::once(0.6),
            HIT => AnimationClip::once(0.3),
            DEAD => AnimationClip::once(1.2),
            _ => AnimationClip::looping(2.0),
        };
        (name.to_string(), clip)
    }))
}

fn started_machine(
    registry: &LocomotionRegistry,
    library: &AnimationLibrary,
    mixer: &mut AnimationMixer,
) -> LocomotionStateMachine {
    let mut machine = LocomotionStateMachine::default();
    let mut anim = AnimationContext { library, mixer };
    machine
        .set_state(IDLE, registry, &mut anim)
        .expect("idle clip is loaded");
    machine
}

static COUNTING_ENTERS: AtomicUsize = AtomicUsize::new(0);
static COUNTING_EXITS: AtomicUsize = AtomicUsize::new(0);

struct CountingState;

impl LocomotionState for CountingState {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn enter(
        &mut self,
        _previous: Option<&dyn LocomotionState>,
        _anim: &mut AnimationContext,
    ) -> Result<(), LocomotionError> {
        COUNTING_ENTERS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exit(&mut self) {
        COUNTING_EXITS.fetch_add(1, Ordering::SeqCst);
    }

    fn update(&mut self, _delta: f32, _input: &LocomotionInput) -> Option<&'static str> {
        None
    }
}

#[test]
fn test_set_state_same_name_is_noop() {
    let mut registry = LocomotionRegistry::default();
    registry.register("counting", || Box::new(CountingState));
    let library = AnimationLibrary::new([("counting".to_string(), AnimationClip::looping(1.0))]);
    let mut mixer = AnimationMixer::default();
    let mut machine = LocomotionStateMachine::default();
    let mut anim = AnimationContext {
        library: &library,
        mixer: &mut mixer,
    };

    let first = machine.set_state("counting", &registry, &mut anim).expect("counting enters");
    assert_eq!(first, Some(Transition { from: None, to: "counting" }));

    for _ in 0..3 {
        let again = machine.set_state("counting", &registry, &mut anim).expect("no-op");
        assert_eq!(again, None);
    }

    assert_eq!(COUNTING_ENTERS.load(Ordering::SeqCst), 1);
    assert_eq!(COUNTING_EXITS.load(Ordering::SeqCst), 0);
}

static RESTORED_ENTERS: AtomicUsize = AtomicUsize::new(0);
static RESTORED_EXITS: AtomicUsize = AtomicUsize::new(0);

struct RestoredState;

impl LocomotionState for RestoredState {
    fn name(&self) -> &'static str {
        "restored"
    }

    fn enter(
        &mut self,
        _previous: Option<&dyn LocomotionState>,
        _anim: &mut AnimationContext,
    ) -> Result<(), LocomotionError> {
        RESTORED_ENTERS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exit(&mut self) {
        RESTORED_EXITS.fetch_add(1, Ordering::SeqCst);
    }

    fn update(&mut self, _delta: f32, _input: &LocomotionInput) -> Option<&'static str> {
        None
    }
}

/// Клип есть, но вход всё равно отказывает
struct BrokenState;

impl LocomotionState for BrokenState {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn enter(
        &mut self,
        _previous: Option<&dyn LocomotionState>,
        _anim: &mut AnimationContext,
    ) -> Result<(), LocomotionError> {
        Err(LocomotionError::NotLoaded)
    }

    fn update(&mut self, _delta: f32, _input: &LocomotionInput) -> Option<&'static str> {
        None
    }
}

#[test]
fn test_failed_enter_reenters_previous_state() {
    let mut registry = LocomotionRegistry::empty();
    registry.register("restored", || Box::new(RestoredState));
    registry.register("broken", || Box::new(BrokenState));
    let library = AnimationLibrary::new([
        ("restored".to_string(), AnimationClip::looping(1.0)),
        ("broken".to_string(), AnimationClip::looping(1.0)),
    ]);
    let mut mixer = AnimationMixer::default();
    let mut machine = LocomotionStateMachine::default();
    let mut anim = AnimationContext {
        library: &library,
        mixer: &mut mixer,
    };

    machine.set_state("restored", &registry, &mut anim).expect("restored enters");
    let result = machine.set_state("broken", &registry, &mut anim);

    assert_eq!(result, Err(LocomotionError::NotLoaded));
    assert!(machine.is_state("restored"));
    // каждому exit соответствует последующий enter
    assert_eq!(RESTORED_EXITS.load(Ordering::SeqCst), 1);
    assert_eq!(RESTORED_ENTERS.load(Ordering::SeqCst), 2);
}

#[test]
fn test_gait_transition_preserves_phase() {
    let registry = LocomotionRegistry::default();
    let library = full_library();
    let mut mixer = AnimationMixer::default();
    let mut machine = started_machine(&registry, &library, &mut mixer);

    {
        let mut anim = AnimationContext { library: &library, mixer: &mut mixer };
        machine.set_state(WALK, &registry, &mut anim).expect("walk");
    }
    mixer.action_mut(WALK).time = 0.4;

    let mut anim = AnimationContext { library: &library, mixer: &mut mixer };
    machine.set_state(RUN, &registry, &mut anim).expect("run");

    // run 0.5s / walk 1.0s × 0.4
    let run_time = mixer.action(RUN).map(|a| a.time).unwrap_or(-1.0);
    assert!((run_time - 0.2).abs() < 1e-5, "run time = {}", run_time);
}

#[test]
fn test_non_gait_transition_resets_time() {
    let registry = LocomotionRegistry::default();
    let library = full_library();
    let mut mixer = AnimationMixer::default();
    let mut machine = started_machine(&registry, &library, &mut mixer);

    mixer.action_mut(CAST).time = 0.9;
    mixer.action_mut(IDLE).time = 1.5;

    let mut anim = AnimationContext { library: &library, mixer: &mut mixer };
    machine.set_state(CAST, &registry, &mut anim).expect("cast");

    assert_eq!(mixer.action(CAST).map(|a| a.time), Some(0.0));
}

#[test]
fn test_hit_uses_short_blend() {
    let registry = LocomotionRegistry::default();
    let library = full_library();
    let mut mixer = AnimationMixer::default();
    let mut machine = started_machine(&registry, &library, &mut mixer);

    let mut anim = AnimationContext { library: &library, mixer: &mut mixer };
    machine.set_state(HIT, &registry, &mut anim).expect("hit");

    let fade = mixer.action(HIT).and_then(|a| a.fade).map(|f| f.duration);
    assert_eq!(fade, Some(HIT_BLEND_SECS));
    let idle_fade = mixer.action(IDLE).and_then(|a| a.fade).map(|f| f.duration);
    assert_eq!(idle_fade, Some(HIT_BLEND_SECS));
}

#[test]
fn test_missing_clip_fails_loudly_and_keeps_state() {
    let registry = LocomotionRegistry::default();
    let library = AnimationLibrary::new([(IDLE.to_string(), AnimationClip::looping(2.0))]);
    let mut mixer = AnimationMixer::default();
    let mut machine = started_machine(&registry, &library, &mut mixer);

    let mut anim = AnimationContext { library: &library, mixer: &mut mixer };
    let result = machine.set_state(RUN, &registry, &mut anim);

    assert_eq!(
        result,
        Err(LocomotionError::MissingAnimation { name: RUN.to_string() })
    );
    assert!(machine.is_state(IDLE));
}

#[test]
fn test_unknown_state_and_not_loaded() {
    let registry = LocomotionRegistry::default();
    let library = full_library();
    let mut mixer = AnimationMixer::default();

    assert!(matches!(
        AnimationContext::new(None, &mut mixer),
        Err(LocomotionError::NotLoaded)
    ));

    let mut machine = LocomotionStateMachine::default();
    let mut anim = AnimationContext { library: &library, mixer: &mut mixer };
    let update = machine.update(0.016, &LocomotionInput::default(), &registry, &mut anim);
    assert_eq!(update, Err(LocomotionError::NotLoaded));

    let unknown = machine.set_state("swim", &registry, &mut anim);
    assert_eq!(unknown, Err(LocomotionError::UnknownState("swim".to_string())));
}

#[test]
fn test_guard_priority_dead_over_hit_over_jump() {
    let registry = LocomotionRegistry::default();
    let library = full_library();
    let mut mixer = AnimationMixer::default();

    let everything = LocomotionInput {
        forward: true,
        jump: true,
        is_grounded: true,
        hit: true,
        is_dead: true,
        ..Default::default()
    };
    let cases = [
        (everything, DEAD),
        (LocomotionInput { is_dead: false, ..everything }, HIT),
        (LocomotionInput { is_dead: false, hit: false, ..everything }, JUMP),
        (
            LocomotionInput { is_dead: false, hit: false, jump: false, ..everything },
            WALK,
        ),
    ];

    for (input, expected) in cases {
        let mut machine = started_machine(&registry, &library, &mut mixer);
        let mut anim = AnimationContext { library: &library, mixer: &mut mixer };
        let transition = machine
            .update(0.016, &input, &registry, &mut anim)
            .expect("transition");
        assert_eq!(transition.map(|t| t.to), Some(expected));
    }
}

#[test]
fn test_moving_gate_suppresses_intent() {
    let registry = LocomotionRegistry::default();
    let library = full_library();
    let mut mixer = AnimationMixer::default();
    let mut machine = started_machine(&registry, &library, &mut mixer);

    let input = LocomotionInput {
        is_moving: true,
        cast: true,
        forward: true,
        is_grounded: true,
        ..Default::default()
    };
    let mut anim = AnimationContext { library: &library, mixer: &mut mixer };

    assert_eq!(machine.update(0.016, &input, &registry, &mut anim), Ok(None));
    assert!(machine.is_state(IDLE));
}

#[test]
fn test_jump_returns_to_idle_after_clip_and_landing() {
    let registry = LocomotionRegistry::default();
    let library = full_library();
    let mut mixer = AnimationMixer::default();
    let mut machine = started_machine(&registry, &library, &mut mixer);
    let mut anim = AnimationContext { library: &library, mixer: &mut mixer };

    let takeoff = LocomotionInput { jump: true, is_grounded: true, ..Default::default() };
    machine.update(0.016, &takeoff, &registry, &mut anim).expect("jump");
    assert!(machine.is_state(JUMP));

    let airborne = LocomotionInput::default();
    for _ in 0..60 {
        machine.update(0.016, &airborne, &registry, &mut anim).expect("airborne");
    }
    assert!(machine.is_state(JUMP), "jump holds until landing");

    let landed = LocomotionInput { is_grounded: true, ..Default::default() };
    let transition = machine.update(0.016, &landed, &registry, &mut anim).expect("land");
    assert_eq!(transition.map(|t| t.to), Some(IDLE));
}
