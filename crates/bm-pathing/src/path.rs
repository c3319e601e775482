//! The path data model handed from the adapter to generators.

use bm_core::{Position, TerrainKind, segment_distance};

/// A start within this 2D distance of node 0 leaves a path untouched.
const REJOIN_EPSILON: f32 = 0.05;

/// One waypoint.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathNode {
    pub position:    Position,
    /// Speed to use while travelling *to* this node.
    pub speed:       f32,
    /// Pause after reaching this node, in milliseconds.
    pub delay:       u32,
    pub terrain:     TerrainKind,
    /// Inserted by optimization rather than produced by the search.
    pub is_smoothed: bool,
}

impl PathNode {
    pub fn new(position: Position, speed: f32, terrain: TerrainKind) -> Self {
        Self { position, speed, delay: 0, terrain, is_smoothed: false }
    }

    /// A synthetic node at `position` inheriting `template`'s metadata.
    pub fn smoothed(position: Position, template: &PathNode) -> Self {
        Self { position, delay: 0, is_smoothed: true, ..*template }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathType {
    /// Complete searched path.
    Normal,
    /// Straight line (short distance, forced direct, or a single-polygon
    /// corridor).
    Shortcut,
    /// The search stopped short; the path ends at the closest reachable point.
    Incomplete,
    NoPath,
}

/// An ordered list of waypoints plus its provenance.
///
/// Searched paths start at the agent's (mesh-snapped) position; direct paths
/// hold only the destination.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MovementPath {
    pub nodes:              Vec<PathNode>,
    pub path_type:          PathType,
    pub total_length:       f32,
    /// Wall-clock time spent producing the path, in microseconds.
    pub generation_cost_us: u64,
    pub is_optimized:       bool,
}

impl MovementPath {
    pub fn no_path() -> Self {
        Self {
            nodes:              Vec::new(),
            path_type:          PathType::NoPath,
            total_length:       0.0,
            generation_cost_us: 0,
            is_optimized:       false,
        }
    }

    /// Single-node straight line from `from` to `dest`.
    pub fn direct(from: Position, dest: Position, speed: f32, terrain: TerrainKind) -> Self {
        Self {
            nodes:              vec![PathNode::new(dest, speed, terrain)],
            path_type:          PathType::Shortcut,
            total_length:       from.distance(dest),
            generation_cost_us: 0,
            is_optimized:       false,
        }
    }

    /// Build from searched points; the length is measured along `nodes`.
    pub fn from_nodes(nodes: Vec<PathNode>, path_type: PathType) -> Self {
        let mut path = Self {
            nodes,
            path_type,
            total_length: 0.0,
            generation_cost_us: 0,
            is_optimized: false,
        };
        path.recompute_length();
        path
    }

    /// At least one node and not [`PathType::NoPath`].
    pub fn is_valid(&self) -> bool {
        !self.nodes.is_empty() && self.path_type != PathType::NoPath
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first(&self) -> Option<Position> {
        self.nodes.first().map(|n| n.position)
    }

    pub fn destination(&self) -> Option<Position> {
        self.nodes.last().map(|n| n.position)
    }

    pub fn points(&self) -> Vec<Position> {
        self.nodes.iter().map(|n| n.position).collect()
    }

    pub fn recompute_length(&mut self) {
        self.total_length = polyline_length(self.nodes.iter().map(|n| n.position));
    }

    /// Restart the path at `from`: nodes behind the leg closest to `from`
    /// are dropped and `from` becomes node 0.  Returns `false` when `from`
    /// already is the first node and nothing changed.
    pub fn rejoin(&mut self, from: Position) -> bool {
        let Some(first) = self.nodes.first() else { return false };
        if from.distance_2d(first.position) <= REJOIN_EPSILON {
            return false;
        }
        let mut best = from.distance(first.position);
        let mut next = 0;
        for (k, w) in self.nodes.windows(2).enumerate() {
            let d = segment_distance(from, w[0].position, w[1].position);
            if d < best {
                best = d;
                next = k + 1;
            }
        }
        self.nodes.drain(..next);
        let lead = PathNode { position: from, delay: 0, is_smoothed: false, ..self.nodes[0] };
        self.nodes.insert(0, lead);
        self.recompute_length();
        true
    }
}

/// Sum of 3-D segment lengths along `points`.
pub fn polyline_length(points: impl IntoIterator<Item = Position>) -> f32 {
    let mut iter = points.into_iter();
    let Some(mut prev) = iter.next() else { return 0.0 };
    let mut total = 0.0;
    for p in iter {
        total += prev.distance(p);
        prev = p;
    }
    total
}
