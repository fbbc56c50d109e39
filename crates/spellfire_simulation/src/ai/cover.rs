//! Cover search: off-thread worker + request/response по correlation id
//!
//! Протокол:
//! - CoverRequest { id, entity, cover_positions, enemy/entity позиции + half-height, geometry }
//! - CoverResponse { id, entity, best_cover: Option<Vec3> }
//!
//! Main loop никогда не ждёт worker: submit → poll в следующих кадрах.

use bevy::prelude::*;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;

use super::scene::WorldGeometry;
use crate::error::CoverSearchError;

/// Точку укрытия проверяем на высоте груди (не по полу)
pub const COVER_SAMPLE_HEIGHT: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect)]
pub struct CoverRequestId(pub u64);

#[derive(Debug, Clone)]
pub struct CoverRequest {
    pub id: CoverRequestId,
    pub entity: Entity,
    pub cover_positions: Arc<Vec<Vec3>>,
    pub enemy_position: Vec3,
    pub enemy_half_height: f32,
    pub entity_position: Vec3,
    pub entity_half_height: f32,
    pub geometry: Arc<WorldGeometry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverResponse {
    pub id: CoverRequestId,
    pub entity: Entity,
    pub best_cover: Option<Vec3>,
}

/// Ближайшая к entity точка, закрытая геометрией от глаз врага
pub fn find_best_cover(request: &CoverRequest) -> Option<Vec3> {
    let entity_eye = request.entity_position + Vec3::Y * request.entity_half_height;
    let enemy_eye = request.enemy_position + Vec3::Y * request.enemy_half_height;

    let mut candidates: Vec<Vec3> = request.cover_positions.iter().copied().collect();
    candidates.sort_by(|a, b| {
        entity_eye
            .distance_squared(*a)
            .total_cmp(&entity_eye.distance_squared(*b))
    });

    candidates.into_iter().find(|cover| {
        let sample = *cover + Vec3::Y * COVER_SAMPLE_HEIGHT;
        request.geometry.is_occluded(enemy_eye, sample)
    })
}

/// Бэкенд поиска укрытий (threaded в игре, mock в тестах)
pub trait CoverSearchBackend: Send + Sync {
    fn submit(&self, request: CoverRequest) -> Result<(), CoverSearchError>;

    /// Готовые ответы (не блокирует)
    fn poll(&self) -> Result<Vec<CoverResponse>, CoverSearchError>;
}

/// Dedicated std thread + mpsc каналы
pub struct ThreadedCoverSearch {
    requests: Mutex<Sender<CoverRequest>>,
    responses: Mutex<Receiver<CoverResponse>>,
}

impl ThreadedCoverSearch {
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = mpsc::channel::<CoverRequest>();
        let (response_tx, response_rx) = mpsc::channel::<CoverResponse>();

        thread::spawn(move || {
            // worker живёт, пока жив Sender запросов
            while let Ok(request) = request_rx.recv() {
                let best_cover = find_best_cover(&request);
                let response = CoverResponse {
                    id: request.id,
                    entity: request.entity,
                    best_cover,
                };
                if response_tx.send(response).is_err() {
                    break;
                }
            }
        });

        Self {
            requests: Mutex::new(request_tx),
            responses: Mutex::new(response_rx),
        }
    }
}

impl CoverSearchBackend for ThreadedCoverSearch {
    fn submit(&self, request: CoverRequest) -> Result<(), CoverSearchError> {
        let sender = self
            .requests
            .lock()
            .map_err(|_| CoverSearchError::WorkerDisconnected)?;
        sender.send(request).map_err(|_| CoverSearchError::WorkerDisconnected)
    }

    fn poll(&self) -> Result<Vec<CoverResponse>, CoverSearchError> {
        let receiver = self
            .responses
            .lock()
            .map_err(|_| CoverSearchError::WorkerDisconnected)?;

        let mut ready = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(response) => ready.push(response),
                Err(TryRecvError::Empty) => return Ok(ready),
                Err(TryRecvError::Disconnected) => {
                    if ready.is_empty() {
                        return Err(CoverSearchError::WorkerDisconnected);
                    }
                    return Ok(ready);
                }
            }
        }
    }
}

/// Поиск прямо в submit, ответ отдаётся следующим poll (детерминированные прогоны)
#[derive(Default)]
pub struct InlineCoverSearch {
    ready: Mutex<Vec<CoverResponse>>,
}

impl CoverSearchBackend for InlineCoverSearch {
    fn submit(&self, request: CoverRequest) -> Result<(), CoverSearchError> {
        let best_cover = find_best_cover(&request);
        let mut ready = self.ready.lock().map_err(|_| CoverSearchError::WorkerDisconnected)?;
        ready.push(CoverResponse {
            id: request.id,
            entity: request.entity,
            best_cover,
        });
        Ok(())
    }

    fn poll(&self) -> Result<Vec<CoverResponse>, CoverSearchError> {
        let mut ready = self.ready.lock().map_err(|_| CoverSearchError::WorkerDisconnected)?;
        Ok(std::mem::take(&mut *ready))
    }
}

/// Resource: выдаёт correlation id и держит бэкенд
#[derive(Resource)]
pub struct CoverSearchService {
    backend: Box<dyn CoverSearchBackend>,
    next_id: u64,
}

impl CoverSearchService {
    pub fn new(backend: Box<dyn CoverSearchBackend>) -> Self {
        Self { backend, next_id: 0 }
    }

    pub fn threaded() -> Self {
        Self::new(Box::new(ThreadedCoverSearch::spawn()))
    }

    pub fn inline() -> Self {
        Self::new(Box::<InlineCoverSearch>::default())
    }

    pub fn next_request_id(&mut self) -> CoverRequestId {
        self.next_id += 1;
        CoverRequestId(self.next_id)
    }

    pub fn submit(&self, request: CoverRequest) -> Result<(), CoverSearchError> {
        self.backend.submit(request)
    }

    pub fn poll(&self) -> Result<Vec<CoverResponse>, CoverSearchError> {
        self.backend.poll()
    }
}
