//! Navigation domain — навмеш с островами, порталы, планировщик, path follow
//!
//! Остров (group) — компонента связности навмеша; между островами только порталы
//! (перелёт). Планирование не падает: нет маршрута → partial path.

use bevy::prelude::*;

use crate::SimulationSet;

pub mod follow;
pub mod funnel;
pub mod level;
pub mod navmesh;
pub mod planner;
pub mod portals;

pub use follow::{request_move, MoveRequest, PathFinished, PathFollower, PathOutcome};
pub use level::{Level, LevelData, NavMeshData, PortalData};
pub use navmesh::{GroupId, NavNode, NavZone, NodeId};
pub use planner::{
    find_closest_node_in_spiral, find_path_between_islands, find_path_to_target, find_random_target_position,
    resolve_start,
};
pub use portals::{PortalConnection, PortalGraph};

/// Navigation Plugin
///
/// Navigation set (после Awareness): MoveRequest → PathFollower → шаг следования.
pub struct NavigationPlugin;

impl Plugin for NavigationPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<MoveRequest>()
            .add_event::<PathFinished>()
            .add_systems(
                FixedUpdate,
                (follow::process_move_requests, follow::follow_paths)
                    .chain()
                    .in_set(SimulationSet::Navigation),
            );
    }
}
