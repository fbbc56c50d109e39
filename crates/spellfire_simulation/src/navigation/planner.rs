//! Планировщик пути: старт-нода (со спиральным поиском), путь внутри острова,
//! путь между островами через порталы.
//!
//! Неудача планирования — не ошибка: возвращается partial path (возможно пустой).

use bevy::prelude::*;
use rand::Rng;
use std::f32::consts::TAU;

use super::level::Level;
use super::navmesh::GroupId;
use crate::components::Waypoint;
use crate::config::NavigationConfig;

/// Угол, после которого круг спирали считается пройденным
const SPIRAL_WRAP_SLACK: f32 = 0.2;

/// Ищет ноду вокруг позиции по расширяющейся спирали
pub fn find_closest_node_in_spiral(level: &Level, config: &NavigationConfig, position: Vec3) -> Option<(GroupId, Vec3)> {
    let mut radius = config.spiral_start_radius;
    let mut angle = 0.0_f32;

    while radius < config.spiral_max_radius {
        let sample = position + Vec3::new(radius * angle.cos(), 0.0, radius * angle.sin());
        let group = level.zone.get_group(sample);
        if let Some(node) = level.zone.get_closest_node(sample, group, true) {
            return Some((group, node.centroid));
        }

        angle += config.spiral_angle_step;
        if angle >= TAU - SPIRAL_WRAP_SLACK {
            angle = 0.0;
            radius += config.spiral_radius_step;
        }
    }
    None
}

/// Группа + точка старта (центроид ноды под entity, спираль, orientation fallback)
pub fn resolve_start(level: &Level, config: &NavigationConfig, position: Vec3) -> (GroupId, Vec3) {
    let group = level.zone.get_group(position);
    if let Some(node) = level.zone.get_closest_node(position, group, true) {
        return (group, node.centroid);
    }
    if let Some(found) = find_closest_node_in_spiral(level, config, position) {
        return found;
    }

    crate::log_warning(&format!(
        "⚠️ {:?} is off the navmesh, falling back to orientation position",
        position
    ));
    let fallback = level.orientation_position;
    (level.zone.get_group(fallback), fallback)
}

/// Полный путь от позиции entity до цели
pub fn find_path_to_target(level: &Level, config: &NavigationConfig, from: Vec3, target: Vec3) -> Vec<Waypoint> {
    let (start_group, start) = resolve_start(level, config, from);
    let direct = level.zone.find_path(start, target, start_group);
    find_path_between_islands(level, direct, start, target, start_group)
}

/// Путь между островами
///
/// Есть прямой путь → он. Иначе по цепочке групп: ближайший подходящий портал,
/// путь до входа, выход портала (is_portal), дальше от выхода. Нет портала на
/// очередном hop'е → возвращаем накопленное.
pub fn find_path_between_islands(
    level: &Level,
    direct: Option<Vec<Vec3>>,
    start: Vec3,
    target: Vec3,
    start_group: GroupId,
) -> Vec<Waypoint> {
    if let Some(path) = direct {
        return path.into_iter().map(Waypoint::new).collect();
    }

    let target_group = level.zone.get_group(target);
    if start_group == target_group {
        return Vec::new();
    }
    let Some(chain) = level.portals.transition(start_group, target_group) else {
        return Vec::new();
    };

    // первая группа в цепочке — стартовая
    let mut hops = chain.iter().skip(1).copied();
    let mut complete: Vec<Waypoint> = Vec::new();
    let mut current_position = start;
    let mut current_group = start_group;

    while current_group != target_group {
        let Some(next_group) = hops.next() else {
            return complete;
        };
        let Some(portal) = level.portals.closest_portal(current_position, current_group, next_group) else {
            crate::log_warning(&format!(
                "⚠️ No portal {} → {}, returning partial path ({} waypoints)",
                current_group,
                next_group,
                complete.len()
            ));
            return complete;
        };

        let segment = level
            .zone
            .find_path(current_position, portal.entry_position, current_group)
            .unwrap_or_default();
        complete.extend(segment.into_iter().map(Waypoint::new));
        complete.push(Waypoint::portal(portal.exit_position));

        current_position = portal.exit_position;
        current_group = portal.exit_group;
    }

    let final_leg = level
        .zone
        .find_path(current_position, target, current_group)
        .unwrap_or_default();
    if final_leg.is_empty() {
        complete.push(Waypoint::new(target));
    }
    complete.extend(final_leg.into_iter().map(Waypoint::new));
    complete
}

/// Случайная точка блуждания: случайный остров, нода в радиусе, иначе orientation
pub fn find_random_target_position<R: Rng>(level: &Level, position: Vec3, radius: f32, rng: &mut R) -> Vec3 {
    let group_count = level.zone.group_count();
    if group_count == 0 {
        return level.orientation_position;
    }
    let group = rng.gen_range(0..group_count);
    level
        .zone
        .get_random_node(group, position, radius, rng)
        .unwrap_or(level.orientation_position)
}
