//! Общие helpers для integration tests

#![allow(dead_code)]

use bevy::ecs::event::EventCursor;
use bevy::prelude::*;
use spellfire_simulation::run_fixed_tick;

pub const DELTA: f32 = 1.0 / 60.0;

/// Копит события между тиками: буферы Events сдвигаются каждый тик,
/// поэтому читать надо после каждого run_fixed_tick
pub struct EventLog<E: Event + Clone> {
    cursor: EventCursor<E>,
    pub seen: Vec<E>,
}

impl<E: Event + Clone> EventLog<E> {
    pub fn new(app: &App) -> Self {
        Self {
            cursor: app.world().resource::<Events<E>>().get_cursor(),
            seen: Vec::new(),
        }
    }

    /// Новые события с прошлого вызова
    pub fn collect(&mut self, app: &App) -> Vec<E> {
        let events = app.world().resource::<Events<E>>();
        let fresh: Vec<E> = self.cursor.read(events).cloned().collect();
        self.seen.extend(fresh.iter().cloned());
        fresh
    }
}

/// Тик + сбор событий в лог
pub fn tick_logged<E: Event + Clone>(app: &mut App, log: &mut EventLog<E>) -> Vec<E> {
    run_fixed_tick(app, DELTA);
    log.collect(app)
}
