//! In-memory host world for demos and tests.
//!
//! `SandboxWorld` implements [`WorldQuery`] and [`MovementHost`] over a
//! rectangular map with flat ground, optional raised platforms, axis-aligned
//! wall boxes and circular terrain zones.  Move orders issued through
//! [`MovementHost::move_to`] are integrated by [`SandboxWorld::step`], which
//! the tick loop calls after the movement manager's update.
//!
//! The agent table sits behind a `Mutex` so the host can be shared by `&`
//! with the manager (and across rayon workers when the manager runs its
//! batch in parallel).

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::sync::lock;
use crate::world::{AgentSnapshot, MovementHost, TerrainKind, WorldQuery};
use crate::{AgentId, Position};

/// Boxes are shrunk by this much on every side so grazing contact along a
/// wall face does not count as a collision.
const CONTACT_TOLERANCE: f32 = 0.01;

/// Ground is reported only this far above the query height.
const GROUND_PROBE_UP: f32 = 2.0;

// ── Geometry ──────────────────────────────────────────────────────────────────

/// Axis-aligned 2-D footprint.  Walls occupy the full vertical extent.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Aabb {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    /// Box of half-size `half` centred on `(x, y)`.
    pub fn around(x: f32, y: f32, half: f32) -> Self {
        Self::new(x - half, y - half, x + half, y + half)
    }

    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    fn shrunk(&self, by: f32) -> Aabb {
        Aabb {
            min_x: self.min_x + by,
            min_y: self.min_y + by,
            max_x: self.max_x - by,
            max_y: self.max_y - by,
        }
    }

    /// Slab test: does the segment `a`–`b` (projected to the plane) touch
    /// the box?
    pub fn intersects_segment(&self, a: Position, b: Position) -> bool {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let mut t0 = 0.0f32;
        let mut t1 = 1.0f32;
        for (origin, delta, lo, hi) in [(a.x, dx, self.min_x, self.max_x), (a.y, dy, self.min_y, self.max_y)] {
            if delta.abs() <= f32::EPSILON {
                if origin < lo || origin > hi {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / delta;
            let (mut near, mut far) = ((lo - origin) * inv, (hi - origin) * inv);
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            t0 = t0.max(near);
            t1 = t1.min(far);
            if t0 > t1 {
                return false;
            }
        }
        true
    }
}

/// Circular region with a non-default terrain classification.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct TerrainZone {
    pub x:      f32,
    pub y:      f32,
    pub radius: f32,
    pub kind:   TerrainKind,
}

impl TerrainZone {
    pub fn new(x: f32, y: f32, radius: f32, kind: TerrainKind) -> Self {
        Self { x, y, radius, kind }
    }

    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        (x - self.x).hypot(y - self.y) <= self.radius
    }
}

// ── Agent table ───────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug)]
struct MoveOrder {
    dest:   Position,
    speed:  f32,
    facing: Option<f32>,
}

#[derive(Clone, Debug)]
struct SandboxAgent {
    snapshot: AgentSnapshot,
    order:    Option<MoveOrder>,
    /// Snagged agents keep their move order but never advance.
    pinned:   bool,
    /// Number of `move_to` calls received.
    orders:   u64,
}

// ── SandboxWorld ──────────────────────────────────────────────────────────────

/// A small deterministic host world.
pub struct SandboxWorld {
    bounds:    Aabb,
    ground_z:  f32,
    platforms: Vec<(Aabb, f32)>,
    walls:     Vec<Aabb>,
    zones:     Vec<TerrainZone>,
    agents:    Mutex<BTreeMap<AgentId, SandboxAgent>>,
}

impl SandboxWorld {
    /// Flat world at height 0 covering `bounds`.
    pub fn new(bounds: Aabb) -> Self {
        Self {
            bounds,
            ground_z:  0.0,
            platforms: Vec::new(),
            walls:     Vec::new(),
            zones:     Vec::new(),
            agents:    Mutex::new(BTreeMap::new()),
        }
    }

    // ── Map construction ──────────────────────────────────────────────────

    pub fn with_ground_height(mut self, z: f32) -> Self {
        self.ground_z = z;
        self
    }

    /// Add an impassable wall box.
    pub fn add_wall(&mut self, wall: Aabb) {
        self.walls.push(wall);
    }

    /// Raise the ground to `height` over `area` (later platforms win).
    pub fn add_platform(&mut self, area: Aabb, height: f32) {
        self.platforms.push((area, height));
    }

    /// Classify a circular region (later zones win).
    pub fn add_zone(&mut self, zone: TerrainZone) {
        self.zones.push(zone);
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn walls(&self) -> &[Aabb] {
        &self.walls
    }

    /// Ground height at `(x, y)` ignoring the search window; `None` outside
    /// the map.
    pub fn surface_height(&self, x: f32, y: f32) -> Option<f32> {
        if !self.bounds.contains(x, y) {
            return None;
        }
        let height = self
            .platforms
            .iter()
            .rev()
            .find(|(area, _)| area.contains(x, y))
            .map_or(self.ground_z, |(_, h)| *h);
        Some(height)
    }

    fn segment_hits_wall(&self, from: Position, to: Position) -> bool {
        self.walls
            .iter()
            .any(|w| w.shrunk(CONTACT_TOLERANCE).intersects_segment(from, to))
    }

    // ── Agents ────────────────────────────────────────────────────────────

    /// Insert (or replace) an agent.
    pub fn spawn(&self, snapshot: AgentSnapshot) {
        lock(&self.agents).insert(
            snapshot.id,
            SandboxAgent { snapshot, order: None, pinned: false, orders: 0 },
        );
    }

    /// Shorthand for spawning a default agent at `pos`.
    pub fn spawn_at(&self, agent: AgentId, pos: Position) {
        self.spawn(AgentSnapshot::new(agent, pos));
    }

    pub fn despawn(&self, agent: AgentId) -> bool {
        lock(&self.agents).remove(&agent).is_some()
    }

    /// Mutate an agent's kinematic record in place.  Returns `false` if the
    /// agent does not exist.
    pub fn update_agent(&self, agent: AgentId, f: impl FnOnce(&mut AgentSnapshot)) -> bool {
        match lock(&self.agents).get_mut(&agent) {
            Some(a) => {
                f(&mut a.snapshot);
                true
            }
            None => false,
        }
    }

    pub fn position(&self, agent: AgentId) -> Option<Position> {
        lock(&self.agents).get(&agent).map(|a| a.snapshot.position)
    }

    /// Destination of the agent's current move order, if any.
    pub fn move_target(&self, agent: AgentId) -> Option<Position> {
        lock(&self.agents).get(&agent).and_then(|a| a.order.map(|o| o.dest))
    }

    /// How many `move_to` calls the agent has received.
    pub fn order_count(&self, agent: AgentId) -> u64 {
        lock(&self.agents).get(&agent).map_or(0, |a| a.orders)
    }

    /// Snag (or release) an agent: it keeps "moving" without advancing.
    pub fn pin(&self, agent: AgentId, pinned: bool) {
        if let Some(a) = lock(&self.agents).get_mut(&agent) {
            a.pinned = pinned;
        }
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        lock(&self.agents).keys().copied().collect()
    }

    // ── Integration ───────────────────────────────────────────────────────

    /// Advance every move order by `dt_ms`.
    ///
    /// An agent whose next step would cross a wall stays where it is with its
    /// moving flag still set, which is what stuck detection looks for.
    pub fn step(&self, dt_ms: u32) {
        let dt = dt_ms as f32 / 1000.0;
        let mut agents = lock(&self.agents);
        for a in agents.values_mut() {
            let Some(order) = a.order else { continue };
            if a.pinned {
                continue;
            }
            let pos = a.snapshot.position;
            let remaining = pos.distance_2d(order.dest);
            let reach = order.speed.max(0.0) * dt;

            let arrived = remaining <= reach;
            let bearing = pos.angle_to(order.dest);
            let mut next = if arrived { order.dest } else { pos.offset(reach, bearing) };

            if self.segment_hits_wall(pos, next) {
                continue;
            }
            next.z = self.surface_height(next.x, next.y).unwrap_or(next.z);

            if arrived {
                let facing = order.facing.unwrap_or(if remaining > f32::EPSILON { bearing } else { pos.o });
                a.snapshot.position = next.with_orientation(facing);
                a.snapshot.is_moving = false;
                a.order = None;
            } else {
                a.snapshot.position = next.with_orientation(bearing);
            }
        }
    }
}

impl WorldQuery for SandboxWorld {
    fn ground_height(&self, x: f32, y: f32, z: f32, max_search: f32) -> Option<f32> {
        let ground = self.surface_height(x, y)?;
        if ground > z + GROUND_PROBE_UP || z - ground > max_search {
            return None;
        }
        Some(ground)
    }

    fn line_of_sight(&self, from: Position, to: Position) -> bool {
        !self.segment_hits_wall(from, to)
    }

    fn terrain_at(&self, pos: Position) -> TerrainKind {
        if !self.bounds.contains(pos.x, pos.y) {
            return TerrainKind::Void;
        }
        self.zones
            .iter()
            .rev()
            .find(|z| z.contains(pos.x, pos.y))
            .map_or(TerrainKind::Ground, |z| z.kind)
    }

    fn is_blocked(&self, from: Position, to: Position) -> bool {
        self.segment_hits_wall(from, to)
            || !self.bounds.contains(from.x, from.y)
            || !self.bounds.contains(to.x, to.y)
    }
}

impl MovementHost for SandboxWorld {
    fn snapshot(&self, agent: AgentId) -> Option<AgentSnapshot> {
        lock(&self.agents).get(&agent).map(|a| a.snapshot)
    }

    fn move_to(&self, agent: AgentId, dest: Position, speed: f32, facing: Option<f32>) {
        if let Some(a) = lock(&self.agents).get_mut(&agent) {
            a.order = Some(MoveOrder { dest, speed, facing });
            a.snapshot.is_moving = true;
            a.orders += 1;
        }
    }

    fn stop(&self, agent: AgentId) {
        if let Some(a) = lock(&self.agents).get_mut(&agent) {
            a.order = None;
            a.snapshot.is_moving = false;
        }
    }

    fn face(&self, agent: AgentId, orientation: f32) {
        if let Some(a) = lock(&self.agents).get_mut(&agent) {
            a.snapshot.position = a.snapshot.position.with_orientation(orientation);
        }
    }

    fn teleport(&self, agent: AgentId, dest: Position) {
        if let Some(a) = lock(&self.agents).get_mut(&agent) {
            a.snapshot.position = dest;
            a.snapshot.is_moving = false;
            a.order = None;
        }
    }
}
