//! Порталы между островами навмеша + карта переходов
//!
//! transition(from, to) = упорядоченная цепочка групп, через которые идём;
//! первый элемент — сама стартовая группа.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use super::navmesh::GroupId;
use crate::error::NavigationError;

/// Полёт/прыжок между островами
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortalConnection {
    pub entry_position: Vec3,
    pub exit_position: Vec3,
    pub entry_group: GroupId,
    pub exit_group: GroupId,
    pub distance: f32,
}

#[derive(Debug, Clone, Default)]
pub struct PortalGraph {
    connections: Vec<PortalConnection>,
    transitions: HashMap<(GroupId, GroupId), Vec<GroupId>>,
}

impl PortalGraph {
    /// Карта переходов выводится BFS по порталам.
    /// Недостижимая пара → прямой hop [from, to] (планировщик вернёт partial path).
    pub fn new(connections: Vec<PortalConnection>, group_count: usize) -> Result<Self, NavigationError> {
        validate_groups(&connections, group_count)?;

        let mut transitions = HashMap::new();
        for from in 0..group_count {
            let parents = bfs_parents(&connections, from, group_count);
            for to in 0..group_count {
                if from == to {
                    continue;
                }
                let chain = match parents[to] {
                    Some(_) => {
                        let mut chain = vec![to];
                        let mut current = to;
                        while let Some(parent) = parents[current] {
                            if current == from {
                                break;
                            }
                            chain.push(parent);
                            current = parent;
                        }
                        chain.reverse();
                        chain
                    }
                    None => vec![from, to],
                };
                transitions.insert((from, to), chain);
            }
        }

        Ok(Self {
            connections,
            transitions,
        })
    }

    /// Явная карта (как её экспортирует редактор уровня); каждая пара групп обязана быть
    pub fn with_transition_map(
        connections: Vec<PortalConnection>,
        map: HashMap<GroupId, HashMap<GroupId, Vec<GroupId>>>,
        group_count: usize,
    ) -> Result<Self, NavigationError> {
        validate_groups(&connections, group_count)?;

        let mut transitions = HashMap::new();
        for from in 0..group_count {
            for to in 0..group_count {
                if from == to {
                    continue;
                }
                let chain = map
                    .get(&from)
                    .and_then(|row| row.get(&to))
                    .ok_or(NavigationError::MissingTransition { from, to })?;
                if let Some(&bad) = chain.iter().find(|&&group| group >= group_count) {
                    return Err(NavigationError::UnknownGroup(bad));
                }
                transitions.insert((from, to), chain.clone());
            }
        }

        Ok(Self {
            connections,
            transitions,
        })
    }

    pub fn connections(&self) -> &[PortalConnection] {
        &self.connections
    }

    pub fn transition(&self, from: GroupId, to: GroupId) -> Option<&[GroupId]> {
        self.transitions.get(&(from, to)).map(Vec::as_slice)
    }

    /// Ближайший (по входу) портал from → to
    pub fn closest_portal(&self, position: Vec3, from: GroupId, to: GroupId) -> Option<&PortalConnection> {
        self.connections
            .iter()
            .filter(|connection| connection.entry_group == from && connection.exit_group == to)
            .min_by(|a, b| {
                a.entry_position
                    .distance(position)
                    .total_cmp(&b.entry_position.distance(position))
            })
    }
}

fn validate_groups(connections: &[PortalConnection], group_count: usize) -> Result<(), NavigationError> {
    for connection in connections {
        for group in [connection.entry_group, connection.exit_group] {
            if group >= group_count {
                return Err(NavigationError::UnknownGroup(group));
            }
        }
    }
    Ok(())
}

/// parents[g] = группа, из которой BFS пришёл в g (parents[from] = Some(from))
fn bfs_parents(connections: &[PortalConnection], from: GroupId, group_count: usize) -> Vec<Option<GroupId>> {
    let mut parents = vec![None; group_count];
    parents[from] = Some(from);
    let mut queue = VecDeque::from([from]);

    while let Some(current) = queue.pop_front() {
        for connection in connections.iter().filter(|c| c.entry_group == current) {
            if parents[connection.exit_group].is_none() {
                parents[connection.exit_group] = Some(current);
                queue.push_back(connection.exit_group);
            }
        }
    }
    parents
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(entry_group: GroupId, exit_group: GroupId, entry_x: f32) -> PortalConnection {
        PortalConnection {
            entry_position: Vec3::new(entry_x, 0.0, 0.0),
            exit_position: Vec3::new(entry_x + 10.0, 0.0, 0.0),
            entry_group,
            exit_group,
            distance: 10.0,
        }
    }

    #[test]
    fn test_bfs_transition_chain() {
        let graph = PortalGraph::new(vec![link(0, 1, 0.0), link(1, 2, 5.0)], 3).expect("valid groups");

        assert_eq!(graph.transition(0, 1), Some(&[0, 1][..]));
        assert_eq!(graph.transition(0, 2), Some(&[0, 1, 2][..]));
        // обратных порталов нет → прямой hop
        assert_eq!(graph.transition(2, 0), Some(&[2, 0][..]));
    }

    #[test]
    fn test_closest_portal_picks_nearest_entry() {
        let graph = PortalGraph::new(vec![link(0, 1, 0.0), link(0, 1, 20.0)], 2).expect("valid groups");

        let portal = graph.closest_portal(Vec3::new(18.0, 0.0, 0.0), 0, 1).expect("portal exists");
        assert_eq!(portal.entry_position.x, 20.0);
        assert!(graph.closest_portal(Vec3::ZERO, 1, 0).is_none());
    }

    #[test]
    fn test_explicit_map_validation() {
        let mut map = HashMap::new();
        map.insert(0, HashMap::from([(1, vec![0, 1])]));

        let error = PortalGraph::with_transition_map(vec![link(0, 1, 0.0)], map, 2).unwrap_err();
        assert_eq!(error, NavigationError::MissingTransition { from: 1, to: 0 });

        let error = PortalGraph::new(vec![link(0, 3, 0.0)], 2).unwrap_err();
        assert_eq!(error, NavigationError::UnknownGroup(3));
    }
}
