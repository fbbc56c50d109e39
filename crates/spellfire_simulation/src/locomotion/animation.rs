//! Animation collaborator: библиотека клипов + mixer с cross-fade
//!
//! Импорт клипов — внешний loader. Сюда приходят только длительности и флаг looping,
//! mixer ведёт локальное время/вес каждого action.

use bevy::prelude::*;
use std::collections::HashMap;

/// Клип, загруженный внешним loader'ом
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct AnimationClip {
    /// Длительность (сек)
    pub duration: f32,
    pub looping: bool,
}

impl AnimationClip {
    pub fn looping(duration: f32) -> Self {
        Self { duration, looping: true }
    }

    pub fn once(duration: f32) -> Self {
        Self { duration, looping: false }
    }
}

/// name → clip. Появляется на entity один раз, когда loader закончил.
#[derive(Component, Debug, Clone, Default)]
pub struct AnimationLibrary {
    clips: HashMap<String, AnimationClip>,
}

impl AnimationLibrary {
    pub fn new(clips: impl IntoIterator<Item = (String, AnimationClip)>) -> Self {
        Self {
            clips: clips.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AnimationClip> {
        self.clips.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clips.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

/// Линейный fade веса action
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct Fade {
    pub from: f32,
    pub to: f32,
    pub elapsed: f32,
    pub duration: f32,
}

/// Playable action (аналог AnimationAction)
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct ActionState {
    /// Локальное время клипа (сек)
    pub time: f32,
    pub weight: f32,
    pub time_scale: f32,
    pub enabled: bool,
    pub fade: Option<Fade>,
}

impl Default for ActionState {
    fn default() -> Self {
        Self {
            time: 0.0,
            weight: 0.0,
            time_scale: 1.0,
            enabled: false,
            fade: None,
        }
    }
}

impl ActionState {
    fn start_fade(&mut self, to: f32, duration: f32) {
        if duration <= 0.0 {
            self.weight = to;
            self.fade = None;
            self.enabled = to > 0.0;
            return;
        }
        self.fade = Some(Fade {
            from: self.weight,
            to,
            elapsed: 0.0,
            duration,
        });
    }
}

/// Per-entity mixer
#[derive(Component, Debug, Clone, Default)]
pub struct AnimationMixer {
    actions: HashMap<String, ActionState>,
}

impl AnimationMixer {
    pub fn action(&self, name: &str) -> Option<&ActionState> {
        self.actions.get(name)
    }

    pub fn action_mut(&mut self, name: &str) -> &mut ActionState {
        self.actions.entry(name.to_string()).or_default()
    }

    /// Включает action сразу с полным весом (первый вход, без предыдущего состояния)
    pub fn play(&mut self, name: &str) {
        let action = self.action_mut(name);
        action.enabled = true;
        action.time = 0.0;
        action.time_scale = 1.0;
        action.weight = 1.0;
        action.fade = None;
    }

    /// Cross-fade: `to` набирает вес 0→1, `from` гасится 1→0 за `duration`
    pub fn cross_fade(&mut self, from: &str, to: &str, duration: f32) {
        if from != to {
            self.action_mut(from).start_fade(0.0, duration);
        }
        let target = self.action_mut(to);
        target.enabled = true;
        if from != to {
            target.weight = 0.0;
        }
        target.start_fade(1.0, duration);
    }

    /// Продвигает время и fade всех включённых action
    ///
    /// Looping клипы заворачиваются, one-shot клампятся на конце.
    pub fn advance(&mut self, delta: f32, library: &AnimationLibrary) {
        for (name, action) in self.actions.iter_mut() {
            if !action.enabled {
                continue;
            }

            if let Some(clip) = library.get(name) {
                action.time += delta * action.time_scale;
                if clip.duration > 0.0 {
                    if clip.looping {
                        action.time = action.time.rem_euclid(clip.duration);
                    } else {
                        action.time = action.time.min(clip.duration);
                    }
                }
            }

            if let Some(mut fade) = action.fade {
                fade.elapsed += delta;
                let t = (fade.elapsed / fade.duration).clamp(0.0, 1.0);
                action.weight = fade.from + (fade.to - fade.from) * t;
                if t >= 1.0 {
                    action.fade = None;
                    if fade.to <= 0.0 {
                        action.enabled = false;
                    }
                } else {
                    action.fade = Some(fade);
                }
            }
        }
    }

    /// Сумма весов включённых action (для проверок blend'а)
    pub fn total_weight(&self) -> f32 {
        self.actions
            .values()
            .filter(|a| a.enabled)
            .map(|a| a.weight)
            .sum()
    }
}
