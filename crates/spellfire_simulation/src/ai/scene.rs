//! Scene query: raycast по статической геометрии уровня + телам акторов
//!
//! Контракт: raycast(origin, direction) → список попаданий, ближайшее первое.

use bevy::math::bounding::{Aabb3d, RayCast3d};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{LevelError, NavigationError};
use crate::physics::KinematicBody;

const RAY_EPSILON: f32 = 1e-5;
/// Точка считается не закрытой, если геометрия ближе к ней, чем на это расстояние
const OCCLUSION_TOLERANCE: f32 = 1e-3;

/// Статическая геометрия уровня (сырые буферы: xyz-тройки + индексы треугольников)
///
/// Читается только после загрузки уровня; в worker уходит через Arc.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldGeometry {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl WorldGeometry {
    pub fn validate(&self) -> Result<(), LevelError> {
        if self.vertices.len() % 3 != 0 {
            return Err(LevelError::VertexBuffer(self.vertices.len()));
        }
        if self.indices.len() % 3 != 0 {
            return Err(LevelError::IndexBuffer(self.indices.len()));
        }
        let vertex_count = self.vertices.len() / 3;
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(NavigationError::InvalidIndex { index, vertex_count }.into());
        }
        Ok(())
    }

    pub fn vertex(&self, index: u32) -> Option<Vec3> {
        let start = index as usize * 3;
        let xyz = self.vertices.get(start..start + 3)?;
        Some(Vec3::new(xyz[0], xyz[1], xyz[2]))
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            Some([self.vertex(tri[0])?, self.vertex(tri[1])?, self.vertex(tri[2])?])
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Расстояние до ближайшего треугольника по лучу (обе стороны)
    pub fn raycast(&self, origin: Vec3, direction: Dir3, max_distance: f32) -> Option<f32> {
        self.triangles()
            .filter_map(|triangle| ray_triangle(origin, *direction, triangle))
            .filter(|&t| t <= max_distance)
            .min_by(f32::total_cmp)
    }

    /// Закрыта ли `to` от `from` геометрией уровня
    pub fn is_occluded(&self, from: Vec3, to: Vec3) -> bool {
        let offset = to - from;
        let distance = offset.length();
        let Ok(direction) = Dir3::new(offset) else {
            return false;
        };
        self.raycast(from, direction, distance - OCCLUSION_TOLERANCE).is_some()
    }
}

/// Möller–Trumbore, двусторонний
pub fn ray_triangle(origin: Vec3, direction: Vec3, [a, b, c]: [Vec3; 3]) -> Option<f32> {
    let edge1 = b - a;
    let edge2 = c - a;
    let p = direction.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < 1e-7 {
        return None;
    }
    let inv_det = 1.0 / det;

    let s = origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(q) * inv_det;
    (t > RAY_EPSILON).then_some(t)
}

/// Во что попал луч
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneObject {
    Level,
    Actor(Entity),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHit {
    pub object: SceneObject,
    pub point: Vec3,
    pub distance: f32,
}

/// Scene query collaborator (в тестах можно подменить)
pub trait SceneQuery {
    /// Все попадания в пределах max_distance, ближайшее первое
    fn raycast(&self, origin: Vec3, direction: Dir3, max_distance: f32) -> Vec<SceneHit>;

    /// Видит ли observer target: первое попадание = тело target
    ///
    /// Тело самого observer'а обзор не перекрывает: луч стартует из глаз, внутри его AABB,
    /// и `LevelScene::raycast` пропускает тела, содержащие origin. Иначе первым попаданием
    /// всегда был бы сам observer и враг не видел бы никого.
    fn has_line_of_sight(&self, from: Vec3, to: Vec3, target: Entity) -> bool {
        let offset = to - from;
        let Ok(direction) = Dir3::new(offset) else {
            return false;
        };
        // запас, чтобы луч гарантированно вошёл в тело цели
        let hits = self.raycast(from, direction, offset.length() + 1.0);
        matches!(hits.first(), Some(hit) if hit.object == SceneObject::Actor(target))
    }
}

/// Сцена кадра: геометрия уровня + AABB живых акторов
pub struct LevelScene<'a> {
    geometry: Option<&'a WorldGeometry>,
    bodies: Vec<(Entity, Aabb3d)>,
}

impl<'a> LevelScene<'a> {
    pub fn new(geometry: Option<&'a WorldGeometry>) -> Self {
        Self {
            geometry,
            bodies: Vec::new(),
        }
    }

    pub fn push_body(&mut self, entity: Entity, body: &KinematicBody) {
        let (min, max) = body.bounds();
        self.bodies.push((entity, Aabb3d::new((min + max) * 0.5, (max - min) * 0.5)));
    }
}

fn aabb_contains(aabb: &Aabb3d, point: Vec3) -> bool {
    let point = Vec3A::from(point);
    point.cmpge(aabb.min).all() && point.cmple(aabb.max).all()
}

impl SceneQuery for LevelScene<'_> {
    fn raycast(&self, origin: Vec3, direction: Dir3, max_distance: f32) -> Vec<SceneHit> {
        let mut hits = Vec::new();

        if let Some(geometry) = self.geometry {
            for triangle in geometry.triangles() {
                if let Some(distance) = ray_triangle(origin, *direction, triangle) {
                    if distance <= max_distance {
                        hits.push(SceneHit {
                            object: SceneObject::Level,
                            point: origin + *direction * distance,
                            distance,
                        });
                    }
                }
            }
        }

        let ray = RayCast3d::new(origin, direction, max_distance);
        for (entity, aabb) in &self.bodies {
            // тело, внутри которого стоит луч (сам observer), не считаем
            if aabb_contains(aabb, origin) {
                continue;
            }
            if let Some(distance) = ray.aabb_intersection_at(aabb) {
                hits.push(SceneHit {
                    object: SceneObject::Actor(*entity),
                    point: origin + *direction * distance,
                    distance,
                });
            }
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Вертикальная стена x = 5, z ∈ [-5, 5], y ∈ [0, 4]
    fn wall() -> WorldGeometry {
        WorldGeometry {
            vertices: vec![
                5.0, 0.0, -5.0, //
                5.0, 0.0, 5.0, //
                5.0, 4.0, 5.0, //
                5.0, 4.0, -5.0,
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    #[test]
    fn test_geometry_occludes_behind_wall() {
        let geometry = wall();
        assert!(geometry.validate().is_ok());

        let eye = Vec3::new(0.0, 1.0, 0.0);
        assert!(geometry.is_occluded(eye, Vec3::new(10.0, 1.0, 0.0)));
        assert!(!geometry.is_occluded(eye, Vec3::new(4.0, 1.0, 0.0)));
        // над стеной
        assert!(!geometry.is_occluded(eye, Vec3::new(10.0, 9.0, 0.0)));
    }

    #[test]
    fn test_geometry_validation() {
        let broken = WorldGeometry {
            vertices: vec![0.0, 0.0, 0.0],
            indices: vec![0, 0, 1],
        };
        assert!(matches!(
            broken.validate(),
            Err(LevelError::Navigation(NavigationError::InvalidIndex { index: 1, vertex_count: 1 }))
        ));
    }

    #[test]
    fn test_line_of_sight_first_hit_must_be_target() {
        let geometry = wall();
        let observer = Entity::from_raw(1);
        let target = Entity::from_raw(2);

        let observer_body = KinematicBody::at(Vec3::ZERO, 0.9);
        let open_body = KinematicBody::at(Vec3::new(0.0, 0.0, 4.0), 0.9);

        let mut scene = LevelScene::new(Some(&geometry));
        scene.push_body(observer, &observer_body);
        scene.push_body(target, &open_body);
        assert!(scene.has_line_of_sight(observer_body.eye_position(), open_body.eye_position(), target));

        let hidden_body = KinematicBody::at(Vec3::new(8.0, 0.0, 0.0), 0.9);
        let mut scene = LevelScene::new(Some(&geometry));
        scene.push_body(observer, &observer_body);
        scene.push_body(target, &hidden_body);
        assert!(!scene.has_line_of_sight(observer_body.eye_position(), hidden_body.eye_position(), target));

        let hits = scene.raycast(observer_body.eye_position(), Dir3::X, 100.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].object, SceneObject::Level);
        assert!((hits[0].distance - 5.0).abs() < 1e-4);
        assert_eq!(hits[1].object, SceneObject::Actor(target));
    }
}
