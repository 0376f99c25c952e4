//! Static viewpoint graph.
//!
//! Built once from configuration and never mutated afterwards. Lookups that
//! miss return `None`; the graph has no other failure mode after construction.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::hotspot::{CoordinateSpace, Hotspot, HotspotError};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Back,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Forward,
        Direction::Back,
        Direction::Left,
        Direction::Right,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Back => "back",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a splat asset sits in the scene.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplatPlacement {
    pub position: [f64; 3],
    /// Unit quaternion `[x, y, z, w]`.
    pub rotation: [f64; 4],
    pub scale: [f64; 3],
}

impl Default for SplatPlacement {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0, 1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewpoint {
    pub id: String,
    pub name: String,
    /// Flat image, always present; used when there is no splat.
    pub image_path: String,
    pub splat_path: Option<String>,
    pub splat_placement: SplatPlacement,
    pub connections: BTreeMap<Direction, String>,
    /// Hotspots shipped with the configuration (used to seed/reset stores).
    pub default_hotspots: Vec<Hotspot>,
}

impl Viewpoint {
    pub fn has_splat(&self) -> bool {
        self.splat_path.is_some()
    }

    /// Coordinate space new hotspots on this viewpoint are placed in.
    pub fn placement_space(&self) -> CoordinateSpace {
        if self.has_splat() {
            CoordinateSpace::World
        } else {
            CoordinateSpace::Image
        }
    }

    pub fn connection(&self, direction: Direction) -> Option<&str> {
        self.connections.get(&direction).map(String::as_str)
    }
}

/// One viewpoint as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewpointConfig {
    pub id: String,
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splat: Option<String>,
    #[serde(default)]
    pub splat_placement: SplatPlacement,
    #[serde(default)]
    pub connections: BTreeMap<Direction, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hotspots: Vec<Hotspot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    pub initial: String,
    pub viewpoints: Vec<ViewpointConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    Parse(String),
    Empty,
    EmptyId,
    DuplicateId(String),
    UnknownInitial(String),
    UnknownConnection {
        from: String,
        direction: Direction,
        to: String,
    },
    DuplicateHotspot {
        viewpoint: String,
        hotspot: String,
    },
    InvalidHotspot {
        viewpoint: String,
        source: HotspotError,
    },
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::Parse(msg) => write!(f, "invalid viewpoint configuration: {msg}"),
            GraphError::Empty => write!(f, "configuration defines no viewpoints"),
            GraphError::EmptyId => write!(f, "viewpoint id must not be empty"),
            GraphError::DuplicateId(id) => write!(f, "duplicate viewpoint id: {id}"),
            GraphError::UnknownInitial(id) => write!(f, "initial viewpoint {id} is not defined"),
            GraphError::UnknownConnection {
                from,
                direction,
                to,
            } => write!(f, "{from} connects {direction} to unknown viewpoint {to}"),
            GraphError::DuplicateHotspot { viewpoint, hotspot } => {
                write!(f, "viewpoint {viewpoint} defines hotspot {hotspot} twice")
            }
            GraphError::InvalidHotspot { viewpoint, source } => {
                write!(f, "viewpoint {viewpoint}: {source}")
            }
        }
    }
}

impl std::error::Error for GraphError {}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewpointGraph {
    viewpoints: BTreeMap<String, Viewpoint>,
    // Configuration order, for stable presentation.
    order: Vec<String>,
    initial: String,
}

impl ViewpointGraph {
    pub fn from_json_str(json: &str) -> Result<Self, GraphError> {
        let config: GraphConfig =
            serde_json::from_str(json).map_err(|e| GraphError::Parse(e.to_string()))?;
        Self::from_config(config)
    }

    pub fn from_config(config: GraphConfig) -> Result<Self, GraphError> {
        if config.viewpoints.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut viewpoints = BTreeMap::new();
        let mut order = Vec::with_capacity(config.viewpoints.len());

        for vp in config.viewpoints {
            if vp.id.trim().is_empty() {
                return Err(GraphError::EmptyId);
            }
            if viewpoints.contains_key(&vp.id) {
                return Err(GraphError::DuplicateId(vp.id));
            }

            let mut seen = BTreeSet::new();
            for h in &vp.hotspots {
                h.validate().map_err(|source| GraphError::InvalidHotspot {
                    viewpoint: vp.id.clone(),
                    source,
                })?;
                if !seen.insert(h.id.as_str()) {
                    return Err(GraphError::DuplicateHotspot {
                        viewpoint: vp.id.clone(),
                        hotspot: h.id.clone(),
                    });
                }
            }

            order.push(vp.id.clone());
            viewpoints.insert(
                vp.id.clone(),
                Viewpoint {
                    id: vp.id,
                    name: vp.name,
                    image_path: vp.image,
                    splat_path: vp.splat.filter(|s| !s.trim().is_empty()),
                    splat_placement: vp.splat_placement,
                    connections: vp.connections,
                    default_hotspots: vp.hotspots,
                },
            );
        }

        for vp in viewpoints.values() {
            for (direction, to) in &vp.connections {
                if !viewpoints.contains_key(to) {
                    return Err(GraphError::UnknownConnection {
                        from: vp.id.clone(),
                        direction: *direction,
                        to: to.clone(),
                    });
                }
            }
        }

        if !viewpoints.contains_key(&config.initial) {
            return Err(GraphError::UnknownInitial(config.initial));
        }

        Ok(Self {
            viewpoints,
            order,
            initial: config.initial,
        })
    }

    pub fn get(&self, id: &str) -> Option<&Viewpoint> {
        self.viewpoints.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.viewpoints.contains_key(id)
    }

    /// Neighbours of `id` keyed by direction, or `None` if `id` is unknown.
    pub fn connections_of(&self, id: &str) -> Option<BTreeMap<Direction, &Viewpoint>> {
        let vp = self.get(id)?;
        Some(
            vp.connections
                .iter()
                .filter_map(|(dir, to)| self.get(to).map(|t| (*dir, t)))
                .collect(),
        )
    }

    pub fn neighbor(&self, id: &str, direction: Direction) -> Option<&Viewpoint> {
        let to = self.get(id)?.connection(direction)?;
        self.get(to)
    }

    pub fn initial(&self) -> &Viewpoint {
        // Construction guarantees the initial id is present.
        &self.viewpoints[&self.initial]
    }

    pub fn initial_id(&self) -> &str {
        &self.initial
    }

    /// Viewpoints in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Viewpoint> + '_ {
        self.order.iter().filter_map(|id| self.viewpoints.get(id))
    }

    pub fn len(&self) -> usize {
        self.viewpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewpoints.is_empty()
    }

    /// Configured default hotspots for every viewpoint that has any.
    pub fn default_hotspots(&self) -> BTreeMap<String, Vec<Hotspot>> {
        self.viewpoints
            .values()
            .filter(|vp| !vp.default_hotspots.is_empty())
            .map(|vp| (vp.id.clone(), vp.default_hotspots.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, GraphError, ViewpointGraph};
    use crate::hotspot::CoordinateSpace;
    use pretty_assertions::assert_eq;

    const DEMO: &str = include_str!("../../../assets/viewpoints.json");

    #[test]
    fn loads_demo_configuration() {
        let graph = ViewpointGraph::from_json_str(DEMO).expect("demo config");
        assert_eq!(graph.initial_id(), "storeFront");
        assert_eq!(graph.len(), 7);

        let ids: Vec<&str> = graph.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids[0], "storeFront");

        let front = graph.get("storeFront").expect("front");
        assert!(front.has_splat());
        assert_eq!(front.placement_space(), CoordinateSpace::World);
    }

    #[test]
    fn connections_resolve_to_viewpoints() {
        let graph = ViewpointGraph::from_json_str(DEMO).expect("demo config");
        let conns = graph.connections_of("storeP2").expect("known id");
        let mut dirs: Vec<Direction> = conns.keys().copied().collect();
        dirs.sort();
        assert_eq!(dirs, vec![Direction::Back, Direction::Left, Direction::Right]);
        assert_eq!(conns[&Direction::Left].id, "storeP2Left");

        assert!(graph.connections_of("nowhere").is_none());
        assert!(graph.neighbor("storeFront", Direction::Left).is_none());
        assert_eq!(
            graph
                .neighbor("storeFront", Direction::Forward)
                .map(|v| v.id.as_str()),
            Some("storeP1")
        );
    }

    #[test]
    fn rejects_dangling_connections() {
        let json = r#"{
            "initial": "a",
            "viewpoints": [
                { "id": "a", "name": "A", "image": "/a.png", "connections": { "forward": "zz" } }
            ]
        }"#;
        assert_eq!(
            ViewpointGraph::from_json_str(json),
            Err(GraphError::UnknownConnection {
                from: "a".to_string(),
                direction: Direction::Forward,
                to: "zz".to_string(),
            })
        );
    }

    #[test]
    fn rejects_duplicate_ids_and_unknown_initial() {
        let dup = r#"{
            "initial": "a",
            "viewpoints": [
                { "id": "a", "name": "A", "image": "/a.png" },
                { "id": "a", "name": "A2", "image": "/a2.png" }
            ]
        }"#;
        assert_eq!(
            ViewpointGraph::from_json_str(dup),
            Err(GraphError::DuplicateId("a".to_string()))
        );

        let missing = r#"{ "initial": "b", "viewpoints": [ { "id": "a", "name": "A", "image": "/a.png" } ] }"#;
        assert_eq!(
            ViewpointGraph::from_json_str(missing),
            Err(GraphError::UnknownInitial("b".to_string()))
        );
    }

    #[test]
    fn blank_splat_path_means_flat_viewpoint() {
        let json = r#"{ "initial": "a", "viewpoints": [ { "id": "a", "name": "A", "image": "/a.png", "splat": "" } ] }"#;
        let graph = ViewpointGraph::from_json_str(json).expect("config");
        assert!(!graph.initial().has_splat());
        assert_eq!(graph.initial().placement_space(), CoordinateSpace::Image);
    }

    #[test]
    fn default_hotspots_are_collected_per_viewpoint() {
        let graph = ViewpointGraph::from_json_str(DEMO).expect("demo config");
        let defaults = graph.default_hotspots();
        assert!(!defaults.contains_key("storeFront"));
        assert_eq!(defaults["storeP1Left"].len(), 4);
    }
}
