//! Navmesh zone: треугольники → ноды, соседство по общему ребру, острова (groups)
//!
//! Нода = треугольник навмеша. Группа = компонента связности по рёбрам;
//! группы без связи между собой — острова (соединяются только порталами).

use bevy::prelude::*;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use super::funnel::{Channel, PortalEdge};
use crate::error::NavigationError;

pub type GroupId = usize;
pub type NodeId = usize;

/// Допуск по высоте для проверки "точка в полигоне"
pub const POLYGON_HEIGHT_TOLERANCE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct NavNode {
    pub id: NodeId,
    pub centroid: Vec3,
    pub vertex_ids: [u32; 3],
    pub neighbours: Vec<NodeId>,
    pub group: GroupId,
}

#[derive(Debug, Clone, Default)]
pub struct NavZone {
    vertices: Vec<Vec3>,
    nodes: Vec<NavNode>,
    groups: Vec<Vec<NodeId>>,
}

/// Вершины с одинаковой позицией сливаются (экспорт дублирует их по швам)
fn weld_key(v: Vec3) -> (i64, i64, i64) {
    const SCALE: f32 = 10_000.0;
    (
        (v.x * SCALE).round() as i64,
        (v.y * SCALE).round() as i64,
        (v.z * SCALE).round() as i64,
    )
}

impl NavZone {
    /// Строит зону из треугольного навмеша
    pub fn from_triangles(vertices: &[Vec3], indices: &[u32]) -> Result<Self, NavigationError> {
        if indices.len() < 3 {
            return Err(NavigationError::EmptyNavMesh);
        }

        let mut welded: Vec<Vec3> = Vec::new();
        let mut remap: Vec<u32> = Vec::with_capacity(vertices.len());
        let mut seen: HashMap<(i64, i64, i64), u32> = HashMap::new();
        for &v in vertices {
            let id = *seen.entry(weld_key(v)).or_insert_with(|| {
                welded.push(v);
                (welded.len() - 1) as u32
            });
            remap.push(id);
        }

        let mut nodes = Vec::with_capacity(indices.len() / 3);
        for (id, tri) in indices.chunks_exact(3).enumerate() {
            let mut vertex_ids = [0u32; 3];
            for (slot, &index) in tri.iter().enumerate() {
                vertex_ids[slot] = *remap.get(index as usize).ok_or(NavigationError::InvalidIndex {
                    index,
                    vertex_count: vertices.len(),
                })?;
            }
            let [a, b, c] = vertex_ids.map(|v| welded[v as usize]);
            nodes.push(NavNode {
                id,
                centroid: (a + b + c) / 3.0,
                vertex_ids,
                neighbours: Vec::new(),
                group: 0,
            });
        }

        // соседство: общее ребро (пара вершин)
        let mut edges: HashMap<(u32, u32), Vec<NodeId>> = HashMap::new();
        for node in &nodes {
            let [a, b, c] = node.vertex_ids;
            for (u, v) in [(a, b), (b, c), (c, a)] {
                edges.entry((u.min(v), u.max(v))).or_default().push(node.id);
            }
        }
        for shared in edges.values() {
            for &n in shared {
                for &m in shared {
                    if n != m && !nodes[n].neighbours.contains(&m) {
                        nodes[n].neighbours.push(m);
                    }
                }
            }
        }

        // flood fill → группы
        let mut groups: Vec<Vec<NodeId>> = Vec::new();
        let mut assigned = vec![false; nodes.len()];
        for start in 0..nodes.len() {
            if assigned[start] {
                continue;
            }
            let group_id = groups.len();
            let mut members = Vec::new();
            let mut stack = vec![start];
            assigned[start] = true;
            while let Some(current) = stack.pop() {
                nodes[current].group = group_id;
                members.push(current);
                for &next in &nodes[current].neighbours {
                    if !assigned[next] {
                        assigned[next] = true;
                        stack.push(next);
                    }
                }
            }
            members.sort_unstable();
            groups.push(members);
        }

        Ok(Self {
            vertices: welded,
            nodes,
            groups,
        })
    }

    pub fn nodes(&self) -> &[NavNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&NavNode> {
        self.nodes.get(id)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group(&self, group: GroupId) -> &[NodeId] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn triangle(&self, node: &NavNode) -> [Vec3; 3] {
        node.vertex_ids.map(|v| self.vertices[v as usize])
    }

    /// Группа ноды с ближайшим центроидом
    pub fn get_group(&self, position: Vec3) -> GroupId {
        self.nodes
            .iter()
            .min_by(|a, b| {
                a.centroid
                    .distance_squared(position)
                    .total_cmp(&b.centroid.distance_squared(position))
            })
            .map(|node| node.group)
            .unwrap_or(0)
    }

    /// XZ точка-в-треугольнике + y в пределах высоты треугольника ± допуск
    pub fn contains_point(&self, node: &NavNode, position: Vec3) -> bool {
        let [a, b, c] = self.triangle(node);
        let lowest = a.y.min(b.y).min(c.y);
        let highest = a.y.max(b.y).max(c.y);
        if position.y >= highest + POLYGON_HEIGHT_TOLERANCE || position.y <= lowest - POLYGON_HEIGHT_TOLERANCE {
            return false;
        }
        point_in_triangle_xz(position, a, b, c)
    }

    /// Ближайшая нода группы; с check_polygon — только содержащая позицию
    pub fn get_closest_node(&self, position: Vec3, group: GroupId, check_polygon: bool) -> Option<&NavNode> {
        self.group(group)
            .iter()
            .filter_map(|&id| self.nodes.get(id))
            .filter(|node| !check_polygon || self.contains_point(node, position))
            .min_by(|a, b| {
                a.centroid
                    .distance_squared(position)
                    .total_cmp(&b.centroid.distance_squared(position))
            })
    }

    /// Кратчайший путь внутри группы: A* по центроидам + funnel
    ///
    /// Путь без стартовой точки, заканчивается target. None — конец вне навмеша
    /// или маршрута нет.
    pub fn find_path(&self, start: Vec3, target: Vec3, group: GroupId) -> Option<Vec<Vec3>> {
        let start_node = self.get_closest_node(start, group, true)?;
        let target_node = self.get_closest_node(target, group, true)?;

        let route = self.a_star(start_node.id, target_node.id)?;

        let mut channel = Channel::new();
        channel.push_point(start);
        for pair in route.windows(2) {
            let edge = self.portal_between(pair[0], pair[1])?;
            channel.push_edge(edge);
        }
        channel.push_point(target);

        let mut path = channel.string_pull();
        if !path.is_empty() {
            path.remove(0);
        }
        Some(path)
    }

    /// Случайный центроид группы в радиусе от `near`
    pub fn get_random_node<R: Rng>(
        &self,
        group: GroupId,
        near: Vec3,
        radius: f32,
        rng: &mut R,
    ) -> Option<Vec3> {
        let candidates: Vec<Vec3> = self
            .group(group)
            .iter()
            .filter_map(|&id| self.nodes.get(id))
            .map(|node| node.centroid)
            .filter(|centroid| centroid.distance(near) <= radius)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[rng.gen_range(0..candidates.len())])
    }

    /// Общее ребро двух соседних нод, ориентированное left/right относительно `from`
    fn portal_between(&self, from: NodeId, to: NodeId) -> Option<PortalEdge> {
        let a = self.nodes.get(from)?;
        let b = self.nodes.get(to)?;
        let shared: Vec<u32> = a
            .vertex_ids
            .iter()
            .copied()
            .filter(|v| b.vertex_ids.contains(v))
            .collect();
        if shared.len() < 2 {
            return None;
        }
        let p = self.vertices[shared[0] as usize];
        let q = self.vertices[shared[1] as usize];
        Some(PortalEdge::oriented(a.centroid, p, q))
    }

    fn a_star(&self, start: NodeId, goal: NodeId) -> Option<Vec<NodeId>> {
        let goal_centroid = self.nodes.get(goal)?.centroid;
        let mut open = BinaryHeap::new();
        let mut g_score: HashMap<NodeId, f32> = HashMap::new();
        let mut came_from: HashMap<NodeId, NodeId> = HashMap::new();

        g_score.insert(start, 0.0);
        open.push(OpenEntry {
            node: start,
            f: self.nodes[start].centroid.distance(goal_centroid),
        });

        while let Some(OpenEntry { node, .. }) = open.pop() {
            if node == goal {
                let mut route = vec![goal];
                let mut current = goal;
                while let Some(&prev) = came_from.get(&current) {
                    route.push(prev);
                    current = prev;
                }
                route.reverse();
                return Some(route);
            }

            let current_g = g_score.get(&node).copied().unwrap_or(f32::INFINITY);
            for &next in &self.nodes[node].neighbours {
                let step = self.nodes[node].centroid.distance(self.nodes[next].centroid);
                let tentative = current_g + step;
                if tentative < g_score.get(&next).copied().unwrap_or(f32::INFINITY) {
                    g_score.insert(next, tentative);
                    came_from.insert(next, node);
                    open.push(OpenEntry {
                        node: next,
                        f: tentative + self.nodes[next].centroid.distance(goal_centroid),
                    });
                }
            }
        }

        None
    }
}

/// Min-heap запись A* (BinaryHeap — max-heap, поэтому сравнение перевёрнуто)
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    node: NodeId,
    f: f32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.node.cmp(&self.node))
    }
}

fn point_in_triangle_xz(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    let sign = |p1: Vec3, p2: Vec3, p3: Vec3| (p1.x - p3.x) * (p2.z - p3.z) - (p2.x - p3.x) * (p1.z - p3.z);
    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);
    let has_negative = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_positive = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_negative && has_positive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Два квадрата 4x4 без общих рёбер (x ∈ [0,4] и x ∈ [10,14])
    fn two_islands() -> NavZone {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for offset in [0.0, 10.0] {
            let base = vertices.len() as u32;
            vertices.extend([
                Vec3::new(offset, 0.0, 0.0),
                Vec3::new(offset + 4.0, 0.0, 0.0),
                Vec3::new(offset + 4.0, 0.0, 4.0),
                Vec3::new(offset, 0.0, 4.0),
            ]);
            indices.extend([base, base + 2, base + 1, base, base + 3, base + 2]);
        }
        NavZone::from_triangles(&vertices, &indices).expect("valid navmesh")
    }

    #[test]
    fn test_groups_are_connected_components() {
        let zone = two_islands();

        assert_eq!(zone.nodes().len(), 4);
        assert_eq!(zone.group_count(), 2);
        assert_eq!(zone.nodes()[0].neighbours, vec![1]);

        let left = zone.get_group(Vec3::new(1.0, 0.0, 1.0));
        let right = zone.get_group(Vec3::new(12.0, 0.0, 2.0));
        assert_ne!(left, right);
    }

    #[test]
    fn test_path_inside_island_is_string_pulled() {
        let zone = two_islands();
        let group = zone.get_group(Vec3::new(1.0, 0.0, 3.0));

        let path = zone
            .find_path(Vec3::new(1.0, 0.0, 3.0), Vec3::new(3.0, 0.0, 1.0), group)
            .expect("both ends on the island");
        assert_eq!(path, vec![Vec3::new(3.0, 0.0, 1.0)]);

        // другой остров через навмеш недостижим
        assert!(zone
            .find_path(Vec3::new(1.0, 0.0, 3.0), Vec3::new(12.0, 0.0, 2.0), group)
            .is_none());
    }

    #[test]
    fn test_closest_node_polygon_check() {
        let zone = two_islands();
        let group = zone.get_group(Vec3::ZERO);

        assert!(zone.get_closest_node(Vec3::new(7.0, 0.0, 2.0), group, true).is_none());
        assert!(zone.get_closest_node(Vec3::new(7.0, 0.0, 2.0), group, false).is_some());
        // слишком высоко над полигоном
        assert!(zone.get_closest_node(Vec3::new(1.0, 2.0, 3.0), group, true).is_none());
        assert!(zone.get_closest_node(Vec3::new(1.0, 0.3, 3.0), group, true).is_some());
    }

    #[test]
    fn test_random_node_respects_radius() {
        let zone = two_islands();
        let group = zone.get_group(Vec3::ZERO);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for _ in 0..10 {
            let node = zone
                .get_random_node(group, Vec3::ZERO, 25.0, &mut rng)
                .expect("island is in range");
            assert!(node.x <= 4.0);
        }
        assert!(zone.get_random_node(group, Vec3::new(100.0, 0.0, 0.0), 5.0, &mut rng).is_none());
    }

    #[test]
    fn test_empty_and_broken_navmesh() {
        assert_eq!(NavZone::from_triangles(&[], &[]).unwrap_err(), NavigationError::EmptyNavMesh);
        assert_eq!(
            NavZone::from_triangles(&[Vec3::ZERO], &[0, 0, 9]).unwrap_err(),
            NavigationError::InvalidIndex {
                index: 9,
                vertex_count: 1
            }
        );
    }
}
