//! Funnel (string pulling) по цепочке рёбер между нодами
//!
//! Канал = [start, ребро_1, …, ребро_n, target]; каждое ребро ориентировано
//! left/right относительно направления движения (по XZ).

use bevy::prelude::*;

const EQUAL_EPSILON_SQ: f32 = 0.00001;

/// Удвоенная площадь треугольника на плоскости XZ (знак = ориентация)
pub fn triarea2(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    let ax = b.x - a.x;
    let az = b.z - a.z;
    let bx = c.x - a.x;
    let bz = c.z - a.z;
    bx * az - ax * bz
}

fn vequal(a: Vec3, b: Vec3) -> bool {
    a.distance_squared(b) < EQUAL_EPSILON_SQ
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalEdge {
    pub left: Vec3,
    pub right: Vec3,
}

impl PortalEdge {
    /// Ребро (p, q), ориентированное относительно точки `behind` (центроид ноды, из которой идём)
    pub fn oriented(behind: Vec3, p: Vec3, q: Vec3) -> Self {
        if triarea2(behind, p, q) > 0.0 {
            Self { left: p, right: q }
        } else {
            Self { left: q, right: p }
        }
    }

    pub fn point(p: Vec3) -> Self {
        Self { left: p, right: p }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Channel {
    portals: Vec<PortalEdge>,
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_point(&mut self, point: Vec3) {
        self.portals.push(PortalEdge::point(point));
    }

    pub fn push_edge(&mut self, edge: PortalEdge) {
        self.portals.push(edge);
    }

    /// Кратчайшая ломаная через канал (включая стартовую точку)
    pub fn string_pull(&self) -> Vec<Vec3> {
        let Some(first) = self.portals.first() else {
            return Vec::new();
        };

        let mut points = Vec::new();
        let mut apex = first.left;
        let mut portal_left = first.left;
        let mut portal_right = first.right;
        let mut left_index = 0;
        let mut right_index = 0;
        points.push(apex);

        let mut i = 1;
        while i < self.portals.len() {
            let PortalEdge { left, right } = self.portals[i];

            // сужаем справа
            if triarea2(apex, portal_right, right) <= 0.0 {
                if vequal(apex, portal_right) || triarea2(apex, portal_left, right) > 0.0 {
                    portal_right = right;
                    right_index = i;
                } else {
                    // правая граница перехлестнула левую: левая точка = новый apex
                    points.push(portal_left);
                    apex = portal_left;
                    let apex_index = left_index;
                    portal_right = apex;
                    left_index = apex_index;
                    right_index = apex_index;
                    i = apex_index + 1;
                    continue;
                }
            }

            // сужаем слева
            if triarea2(apex, portal_left, left) >= 0.0 {
                if vequal(apex, portal_left) || triarea2(apex, portal_right, left) < 0.0 {
                    portal_left = left;
                    left_index = i;
                } else {
                    points.push(portal_right);
                    apex = portal_right;
                    let apex_index = right_index;
                    portal_left = apex;
                    left_index = apex_index;
                    right_index = apex_index;
                    i = apex_index + 1;
                    continue;
                }
            }

            i += 1;
        }

        if let Some(last) = self.portals.last() {
            if points.last().map_or(true, |p| !vequal(*p, last.left)) {
                points.push(last.left);
            }
        }
        points
    }
}
