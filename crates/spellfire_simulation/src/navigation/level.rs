//! Данные уровня: навмеш, статическая геометрия, укрытия, порталы
//!
//! LevelData — serde-формат (экспорт редактора), Level — готовый resource.
//! Геометрия и укрытия неизменяемы после загрузки и делятся с worker'ом через Arc.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::navmesh::{GroupId, NavZone};
use super::portals::{PortalConnection, PortalGraph};
use crate::ai::WorldGeometry;
use crate::error::LevelError;

/// Треугольный меш навигации (xyz-тройки + индексы)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavMeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

/// Портал в данных уровня; группы/дистанция выводятся, если не заданы
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalData {
    pub entry_position: Vec3,
    pub exit_position: Vec3,
    #[serde(default)]
    pub entry_group: Option<GroupId>,
    #[serde(default)]
    pub exit_group: Option<GroupId>,
    #[serde(default)]
    pub distance: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    pub navmesh: NavMeshData,
    #[serde(default)]
    pub geometry: WorldGeometry,
    #[serde(default)]
    pub cover_positions: Vec<Vec3>,
    #[serde(default)]
    pub portals: Vec<PortalData>,
    /// from → to → цепочка групп; без неё карта строится BFS по порталам
    #[serde(default)]
    pub transition_map: Option<HashMap<GroupId, HashMap<GroupId, Vec<GroupId>>>>,
    #[serde(default)]
    pub orientation_position: Vec3,
}

impl LevelData {
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Загруженный уровень (resource)
#[derive(Resource, Debug, Clone)]
pub struct Level {
    pub zone: NavZone,
    pub portals: PortalGraph,
    pub geometry: Arc<WorldGeometry>,
    pub cover_positions: Arc<Vec<Vec3>>,
    pub orientation_position: Vec3,
}

impl Level {
    pub fn from_data(data: LevelData) -> Result<Self, LevelError> {
        let LevelData {
            navmesh,
            geometry,
            cover_positions,
            portals,
            transition_map,
            orientation_position,
        } = data;

        if navmesh.vertices.len() % 3 != 0 {
            return Err(LevelError::VertexBuffer(navmesh.vertices.len()));
        }
        if navmesh.indices.len() % 3 != 0 {
            return Err(LevelError::IndexBuffer(navmesh.indices.len()));
        }
        geometry.validate()?;

        let vertices: Vec<Vec3> = navmesh
            .vertices
            .chunks_exact(3)
            .map(|xyz| Vec3::new(xyz[0], xyz[1], xyz[2]))
            .collect();
        let zone = NavZone::from_triangles(&vertices, &navmesh.indices)?;

        let connections: Vec<PortalConnection> = portals
            .into_iter()
            .map(|portal| PortalConnection {
                entry_position: portal.entry_position,
                exit_position: portal.exit_position,
                entry_group: portal
                    .entry_group
                    .unwrap_or_else(|| zone.get_group(portal.entry_position)),
                exit_group: portal
                    .exit_group
                    .unwrap_or_else(|| zone.get_group(portal.exit_position)),
                distance: portal
                    .distance
                    .unwrap_or_else(|| portal.entry_position.distance(portal.exit_position)),
            })
            .collect();

        let group_count = zone.group_count();
        let portals = match transition_map {
            Some(map) => PortalGraph::with_transition_map(connections, map, group_count)?,
            None => PortalGraph::new(connections, group_count)?,
        };

        crate::log_info(&format!(
            "🗺️ Level loaded: {} nav nodes in {} islands, {} portals, {} cover points, {} geometry triangles",
            zone.nodes().len(),
            group_count,
            portals.connections().len(),
            cover_positions.len(),
            geometry.triangle_count()
        ));

        Ok(Self {
            zone,
            portals,
            geometry: Arc::new(geometry),
            cover_positions: Arc::new(cover_positions),
            orientation_position,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        Self::from_data(LevelData::from_json(json)?)
    }
}
