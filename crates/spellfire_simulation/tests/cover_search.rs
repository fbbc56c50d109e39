//! Угроза → запрос укрытия → движение к укрытию → прибытие сбрасывает ожидание

mod common;

use bevy::prelude::*;
use common::{tick_logged, EventLog, DELTA};
use spellfire_simulation::ai::{CoverFound, CoverRequest, CoverRequestId, CoverResponse, CoverSearchBackend};
use spellfire_simulation::error::CoverSearchError;
use spellfire_simulation::navigation::{NavMeshData, PathOutcome};
use spellfire_simulation::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const COVER: Vec3 = Vec3::new(-3.0, 0.0, -1.0);
const STALE_COVER: Vec3 = Vec3::new(6.0, 0.0, 6.0);

/// Отвечает сразу фиксированной точкой (или ничем) и считает запросы
struct FixedCover {
    cover: Option<Vec3>,
    submitted: Arc<AtomicUsize>,
    ready: Mutex<Vec<CoverResponse>>,
}

impl CoverSearchBackend for FixedCover {
    fn submit(&self, request: CoverRequest) -> Result<(), CoverSearchError> {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.ready.lock().expect("mock lock").push(CoverResponse {
            id: request.id,
            entity: request.entity,
            best_cover: self.cover,
        });
        Ok(())
    }

    fn poll(&self) -> Result<Vec<CoverResponse>, CoverSearchError> {
        Ok(std::mem::take(&mut *self.ready.lock().expect("mock lock")))
    }
}

/// Отвечает по сценарию (одна точка на запрос) и может придерживать ответы
struct ScriptedCover {
    answers: Mutex<VecDeque<Option<Vec3>>>,
    /// Сдвиг id в ответе: ответ на чужой (устаревший) запрос
    id_shift: u64,
    held: Arc<AtomicBool>,
    submitted: Arc<AtomicUsize>,
    ready: Mutex<Vec<CoverResponse>>,
}

impl ScriptedCover {
    fn new(answers: &[Option<Vec3>], id_shift: u64) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            id_shift,
            held: Arc::new(AtomicBool::new(false)),
            submitted: Arc::new(AtomicUsize::new(0)),
            ready: Mutex::new(Vec::new()),
        }
    }
}

impl CoverSearchBackend for ScriptedCover {
    fn submit(&self, request: CoverRequest) -> Result<(), CoverSearchError> {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        let best_cover = self.answers.lock().expect("mock lock").pop_front().flatten();
        self.ready.lock().expect("mock lock").push(CoverResponse {
            id: CoverRequestId(request.id.0 + self.id_shift),
            entity: request.entity,
            best_cover,
        });
        Ok(())
    }

    fn poll(&self) -> Result<Vec<CoverResponse>, CoverSearchError> {
        if self.held.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(std::mem::take(&mut *self.ready.lock().expect("mock lock")))
    }
}

/// Воркер, который уже умер
struct DeadWorker;

impl CoverSearchBackend for DeadWorker {
    fn submit(&self, _request: CoverRequest) -> Result<(), CoverSearchError> {
        Err(CoverSearchError::WorkerDisconnected)
    }

    fn poll(&self) -> Result<Vec<CoverResponse>, CoverSearchError> {
        Err(CoverSearchError::WorkerDisconnected)
    }
}

fn arena() -> Level {
    let data = LevelData {
        navmesh: NavMeshData {
            vertices: vec![
                -10.0, 0.0, -10.0, //
                10.0, 0.0, -10.0, //
                10.0, 0.0, 10.0, //
                -10.0, 0.0, 10.0,
            ],
            indices: vec![0, 2, 1, 0, 3, 2],
        },
        cover_positions: vec![COVER],
        ..default()
    };
    Level::from_data(data).expect("arena")
}

/// Игрок с зарядом выше dangerous_charge (без цикла — заряд не меняется) + враг
fn setup(backend: Box<dyn CoverSearchBackend>) -> (App, Entity, Entity) {
    let mut app = create_headless_app(99);
    app.insert_resource(arena());
    app.insert_resource(CoverSearchService::new(backend));

    let (player, enemy) = {
        let mut commands = app.world_mut().commands();
        let player = spawn_player(&mut commands, Vec3::new(5.0, 0.0, 0.0));
        let enemy = spawn_enemy(&mut commands, Vec3::new(0.0, 0.0, 0.0), player);
        (player, enemy)
    };
    app.world_mut().flush();

    if let Some(mut spell) = app.world_mut().get_mut::<CurrentSpell>(player) {
        spell.charge = 0.5;
    }
    for entity in [player, enemy] {
        app.world_mut().send_event(AnimationsLoaded {
            entity,
            clips: builtin_clips(),
        });
    }

    (app, player, enemy)
}

#[test]
fn test_threatened_enemy_runs_to_cover() {
    let submitted = Arc::new(AtomicUsize::new(0));
    let backend = FixedCover {
        cover: Some(COVER),
        submitted: submitted.clone(),
        ready: Mutex::new(Vec::new()),
    };
    let (mut app, player, enemy) = setup(Box::new(backend));

    run_fixed_tick(&mut app, DELTA);

    let awareness = app.world().get::<Awareness>(enemy).expect("awareness");
    assert!(awareness.is_threatened);
    assert!(awareness.is_awaiting_cover_calculation);
    assert_eq!(awareness.last_cover_position, Some(COVER));

    let follower = app.world().get::<PathFollower>(enemy).expect("moving to cover");
    assert_eq!(follower.destination(), Some(COVER));
    assert_eq!(follower.look_at, Some(player));

    let mut finished = EventLog::<PathFinished>::new(&app);
    let mut arrived = None;
    for _ in 0..300 {
        arrived = tick_logged(&mut app, &mut finished)
            .into_iter()
            .find(|event| event.entity == enemy);
        if arrived.is_some() {
            break;
        }
    }

    let arrived = arrived.expect("enemy reached cover");
    assert_eq!(arrived.outcome, PathOutcome::Arrived);

    // пока шли — ровно один запрос в полёте
    assert_eq!(submitted.load(Ordering::SeqCst), 1);

    let awareness = app.world().get::<Awareness>(enemy).expect("awareness");
    assert!(!awareness.is_awaiting_cover_calculation);
    assert!(awareness.last_cover_position.is_none());
    assert!(awareness.pending_request.is_none());

    let body = app.world().get::<KinematicBody>(enemy).expect("body");
    let flat = Vec2::new(body.position.x - COVER.x, body.position.z - COVER.z).length();
    assert!(flat <= NavigationConfig::default().arrival_epsilon + 0.01);
}

#[test]
fn test_no_cover_clears_waiting() {
    let backend = FixedCover {
        cover: None,
        submitted: Arc::new(AtomicUsize::new(0)),
        ready: Mutex::new(Vec::new()),
    };
    let (mut app, _player, enemy) = setup(Box::new(backend));
    let mut found = EventLog::<CoverFound>::new(&app);

    tick_logged(&mut app, &mut found);

    let awareness = app.world().get::<Awareness>(enemy).expect("awareness");
    assert!(!awareness.is_awaiting_cover_calculation);
    assert!(awareness.last_cover_position.is_none());

    let found = found.seen.iter().filter(|event| event.entity == enemy).count();
    assert_eq!(found, 1);
}

fn assert_not_heading_to(app: &App, enemy: Entity, cover: Vec3) {
    let awareness = app.world().get::<Awareness>(enemy).expect("awareness");
    assert_ne!(awareness.last_cover_position, Some(cover));
    if let Some(follower) = app.world().get::<PathFollower>(enemy) {
        assert_ne!(follower.destination(), Some(cover), "enemy follows a stale cover");
    }
}

#[test]
fn test_result_for_other_request_id_is_discarded() {
    let backend = ScriptedCover::new(&[Some(STALE_COVER)], 100);
    let submitted = backend.submitted.clone();
    let (mut app, _player, enemy) = setup(Box::new(backend));
    let mut found = EventLog::<CoverFound>::new(&app);

    for _ in 0..30 {
        tick_logged(&mut app, &mut found);
        assert_not_heading_to(&app, enemy, STALE_COVER);
    }

    // свой ответ так и не пришёл: запрос всё ещё в полёте, нового не отправляли
    let awareness = app.world().get::<Awareness>(enemy).expect("awareness");
    assert!(awareness.is_awaiting_cover_calculation);
    assert!(awareness.pending_request.is_some());
    assert!(awareness.last_cover_position.is_none());
    assert_eq!(submitted.load(Ordering::SeqCst), 1);
    assert!(found.seen.is_empty(), "CoverFound: {:?}", found.seen);
}

#[test]
fn test_result_arriving_after_clear_is_discarded() {
    // первый ответ опоздает, второй (на повторный запрос) — "укрытия нет"
    let backend = ScriptedCover::new(&[Some(STALE_COVER), None], 0);
    let held = backend.held.clone();
    let submitted = backend.submitted.clone();
    held.store(true, Ordering::SeqCst);
    let (mut app, _player, enemy) = setup(Box::new(backend));
    let mut found = EventLog::<CoverFound>::new(&app);

    tick_logged(&mut app, &mut found);
    let first = app
        .world()
        .get::<Awareness>(enemy)
        .and_then(|awareness| awareness.pending_request)
        .expect("first request in flight");

    // ожидание сброшено до ответа (например, прибытием)
    if let Some(mut awareness) = app.world_mut().get_mut::<Awareness>(enemy) {
        awareness.clear_cover();
    }
    held.store(false, Ordering::SeqCst);

    tick_logged(&mut app, &mut found);
    assert_eq!(submitted.load(Ordering::SeqCst), 2);
    assert_not_heading_to(&app, enemy, STALE_COVER);

    let awareness = app.world().get::<Awareness>(enemy).expect("awareness");
    assert_ne!(awareness.pending_request, Some(first));
    assert!(awareness.last_cover_position.is_none());
    assert!(!awareness.is_awaiting_cover_calculation);

    // принят только ответ на второй запрос
    let for_enemy: Vec<&CoverFound> = found.seen.iter().filter(|event| event.entity == enemy).collect();
    assert_eq!(for_enemy.len(), 1, "CoverFound: {:?}", found.seen);
    assert_eq!(for_enemy[0].position, None);
}

#[test]
fn test_dead_worker_does_not_stop_simulation() {
    let (mut app, _player, enemy) = setup(Box::new(DeadWorker));

    for _ in 0..30 {
        run_fixed_tick(&mut app, DELTA);
    }

    let awareness = app.world().get::<Awareness>(enemy).expect("awareness");
    assert!(awareness.is_threatened);
    assert!(!awareness.is_awaiting_cover_calculation);
    assert!(awareness.pending_request.is_none());
}
