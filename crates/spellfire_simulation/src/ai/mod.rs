//! AI domain — восприятие угрозы, укрытия, блуждание
//!
//! Enemy AI (Awareness set, после Combat, до Navigation):
//! - угроза: заряд врага vs свой заряд
//! - line of sight: scene raycast, не чаще raycast_interval
//! - cover search: off-thread worker, не больше одного запроса в полёте на entity
//! - решения превращаются в события: ChargeRequested / FireRequested / MoveRequest

use bevy::prelude::*;

use crate::SimulationSet;

pub mod awareness;
pub mod cover;
pub mod events;
pub mod scene;
pub mod systems;

pub use awareness::{detect_critical_charge, detect_threat, AIConfig, Awareness, Opponent};
pub use cover::{
    find_best_cover, CoverRequest, CoverRequestId, CoverResponse, CoverSearchBackend, CoverSearchService,
    InlineCoverSearch, ThreadedCoverSearch,
};
pub use events::{CoverFound, ThreatDetected};
pub use scene::{LevelScene, SceneHit, SceneObject, SceneQuery, WorldGeometry};

/// AI Plugin
///
/// CoverSearchService по умолчанию — threaded worker; уже вставленный
/// resource (свой бэкенд) не трогаем.
pub struct AIPlugin;

impl Plugin for AIPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<CoverSearchService>() {
            app.insert_resource(CoverSearchService::threaded());
        }

        app.add_event::<ThreatDetected>()
            .add_event::<CoverFound>()
            .add_systems(
                FixedUpdate,
                (
                    systems::perceive_threats,
                    systems::decide_actions,
                    systems::collect_cover_results,
                    systems::forget_cover_on_death,
                )
                    .chain()
                    .in_set(SimulationSet::Awareness),
            );
    }
}
