//! Locomotion FSM: trait состояния, реестр конструкторов, машина
//!
//! Контракт перехода:
//! - `set_state(x)` в состоянии x — no-op (ни exit, ни enter)
//! - иначе exit старого → конструктор нового → enter(старое)
//! - провал enter нового: старое состояние входит заново (enter(None)) и остаётся текущим
//! - за кадр срабатывает максимум один переход (update возвращает одно имя)

use bevy::prelude::*;
use std::collections::HashMap;
use std::fmt;

use super::animation::{AnimationLibrary, AnimationMixer};
use super::states;
use crate::error::LocomotionError;

/// Окно cross-fade по умолчанию (сек)
pub const DEFAULT_BLEND_SECS: f32 = 0.5;
/// Реактивный hit читается как мгновенный
pub const HIT_BLEND_SECS: f32 = 0.05;
/// jump / fly
pub const AIRBORNE_BLEND_SECS: f32 = 0.2;
pub const DEAD_BLEND_SECS: f32 = 0.25;

/// Семейство состояний. Переход внутри Gait сохраняет фазу шага.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocomotionFamily {
    Gait,
    Airborne,
    Action,
}

/// Snapshot входа на кадр: intent (клавиши/AI) + сигналы физики и боя
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct LocomotionInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
    pub jump: bool,
    pub cast: bool,
    /// Навигация двигает тело (горизонтальная скорость > порога)
    pub is_moving: bool,
    pub is_grounded: bool,
    /// Ещё идут takeoff-кадры после fly-импульса
    pub takeoff: bool,
    pub is_dead: bool,
    /// Получен урон в прошлом кадре
    pub hit: bool,
}

impl LocomotionInput {
    /// dead > hit
    pub fn reactive_transition(&self) -> Option<&'static str> {
        if self.is_dead {
            Some(states::DEAD)
        } else if self.hit {
            Some(states::HIT)
        } else {
            None
        }
    }

    pub fn wants_jump(&self) -> bool {
        self.jump && self.is_grounded
    }

    /// Состояние походки по intent (None — стоим)
    pub fn gait_intent(&self) -> Option<&'static str> {
        match (self.forward, self.backward, self.sprint) {
            (true, _, true) => Some(states::RUN),
            (true, _, false) => Some(states::WALK),
            (false, true, true) => Some(states::RUN_BACK),
            (false, true, false) => Some(states::WALK_BACK),
            (false, false, _) => None,
        }
    }
}

/// Доступ состояний к анимациям entity на время перехода
pub struct AnimationContext<'a> {
    pub library: &'a AnimationLibrary,
    pub mixer: &'a mut AnimationMixer,
}

impl<'a> AnimationContext<'a> {
    /// Без библиотеки FSM работать не может: загрузка клипов — precondition
    pub fn new(
        library: Option<&'a AnimationLibrary>,
        mixer: &'a mut AnimationMixer,
    ) -> Result<Self, LocomotionError> {
        let library = library.ok_or(LocomotionError::NotLoaded)?;
        Ok(Self { library, mixer })
    }
}

/// Состояние локомоции (открытый набор: игры регистрируют свои)
pub trait LocomotionState: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn family(&self) -> LocomotionFamily {
        LocomotionFamily::Action
    }

    /// Окно blend'а при входе из `previous`
    fn blend_in(&self, _previous: &str) -> f32 {
        DEFAULT_BLEND_SECS
    }

    fn enter(
        &mut self,
        previous: Option<&dyn LocomotionState>,
        anim: &mut AnimationContext,
    ) -> Result<(), LocomotionError> {
        let blend = previous.map(|p| self.blend_in(p.name())).unwrap_or(0.0);
        cross_fade_enter(self.name(), self.family(), blend, previous, anim)
    }

    fn exit(&mut self) {}

    /// Один вызов на кадр; возвращает имя следующего состояния (первый сработавший guard)
    fn update(&mut self, delta: f32, input: &LocomotionInput) -> Option<&'static str>;
}

/// Стандартный вход: выбрать action, восстановить фазу или сбросить время, cross-fade
pub fn cross_fade_enter(
    name: &'static str,
    family: LocomotionFamily,
    blend: f32,
    previous: Option<&dyn LocomotionState>,
    anim: &mut AnimationContext,
) -> Result<(), LocomotionError> {
    let clip = *anim
        .library
        .get(name)
        .ok_or_else(|| LocomotionError::MissingAnimation { name: name.to_string() })?;

    let Some(previous) = previous else {
        anim.mixer.play(name);
        return Ok(());
    };

    let previous_name = previous.name();
    let keep_phase = family == LocomotionFamily::Gait && previous.family() == LocomotionFamily::Gait;
    let previous_time = anim.mixer.action(previous_name).map(|a| a.time).unwrap_or(0.0);
    let previous_duration = anim.library.get(previous_name).map(|c| c.duration).unwrap_or(0.0);

    let action = anim.mixer.action_mut(name);
    action.enabled = true;
    if keep_phase && previous_duration > 0.0 {
        // фаза шага: newDur/oldDur × oldTime
        action.time = previous_time * clip.duration / previous_duration;
    } else {
        action.time = 0.0;
        action.time_scale = 1.0;
    }

    anim.mixer.cross_fade(previous_name, name, blend);
    Ok(())
}

/// Реальный переход (для LocomotionChanged)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Option<&'static str>,
    pub to: &'static str,
}

type StateConstructor = Box<dyn Fn() -> Box<dyn LocomotionState> + Send + Sync>;

/// name → конструктор состояния
#[derive(Resource)]
pub struct LocomotionRegistry {
    constructors: HashMap<&'static str, StateConstructor>,
}

impl Default for LocomotionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        states::register_builtin(&mut registry);
        registry
    }
}

impl LocomotionRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: &'static str, constructor: F)
    where
        F: Fn() -> Box<dyn LocomotionState> + Send + Sync + 'static,
    {
        self.constructors.insert(name, Box::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn LocomotionState>, LocomotionError> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| LocomotionError::UnknownState(name.to_string()))
    }
}

/// FSM entity. До загрузки анимаций `current` пуст (неопределённое пред-состояние).
#[derive(Component, Default)]
pub struct LocomotionStateMachine {
    current: Option<Box<dyn LocomotionState>>,
}

impl fmt::Debug for LocomotionStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocomotionStateMachine")
            .field("current", &self.current_name())
            .finish()
    }
}

impl LocomotionStateMachine {
    pub fn current_name(&self) -> Option<&'static str> {
        self.current.as_ref().map(|state| state.name())
    }

    pub fn is_state(&self, name: &str) -> bool {
        self.current_name() == Some(name)
    }

    pub fn is_started(&self) -> bool {
        self.current.is_some()
    }

    /// Ok(None) — уже в этом состоянии (no-op)
    pub fn set_state(
        &mut self,
        name: &str,
        registry: &LocomotionRegistry,
        anim: &mut AnimationContext,
    ) -> Result<Option<Transition>, LocomotionError> {
        if self.is_state(name) {
            return Ok(None);
        }

        let mut next = registry.create(name)?;
        let to = next.name();
        // клип проверяем до exit, чтобы не оставить машину без состояния
        if !anim.library.contains(to) {
            return Err(LocomotionError::MissingAnimation { name: to.to_string() });
        }

        let mut previous = self.current.take();
        if let Some(state) = previous.as_mut() {
            state.exit();
        }

        if let Err(err) = next.enter(previous.as_deref(), anim) {
            // exit уже отработал: старое состояние возвращается только через свой enter
            if let Some(state) = previous.as_mut() {
                if let Err(reenter) = state.enter(None, anim) {
                    crate::log_error(&format!(
                        "❌ Locomotion: '{}' failed, '{}' can't be restored: {}",
                        to,
                        state.name(),
                        reenter
                    ));
                    self.current = None;
                    return Err(err);
                }
            }
            self.current = previous;
            return Err(err);
        }

        let from = previous.as_ref().map(|state| state.name());
        self.current = Some(next);
        Ok(Some(Transition { from, to }))
    }

    /// Один кадр: update текущего состояния + максимум один переход
    pub fn update(
        &mut self,
        delta: f32,
        input: &LocomotionInput,
        registry: &LocomotionRegistry,
        anim: &mut AnimationContext,
    ) -> Result<Option<Transition>, LocomotionError> {
        let Some(current) = self.current.as_mut() else {
            return Err(LocomotionError::NotLoaded);
        };

        match current.update(delta, input) {
            Some(next) => self.set_state(next, registry, anim),
            None => Ok(None),
        }
    }
}
