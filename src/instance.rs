//! Module for parsing and representing symmetric TSP instances.
//!
//! This module handles the TSPLIB format files used for the symmetric TSP.
//! It supports five edge weight types (rounded Euclidean, ceiling Euclidean,
//! geographic, ATT and toroidal) and owns the precomputed distance matrix
//! and the per-city nearest-neighbour candidate lists.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::matrix::SquareMatrix;

/// Largest accepted instance dimension.
pub const MAX_DIMENSION: usize = 10_000;

/// Earth radius used by the TSPLIB geographic distance.
const GEO_RADIUS: f64 = 6378.388;

/// Side length of the torus for the toroidal metric.
const TOROID_SIZE: f64 = 1000.0;

/// Represents a city in the TSP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier (1-indexed in files, 0-indexed internally)
    pub id: usize,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Node {
    pub fn new(id: usize, x: f64, y: f64) -> Self {
        Node { id, x, y }
    }
}

/// Edge weight types supported by the distance provider
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum EdgeWeightType {
    /// Euclidean distance rounded to the nearest integer (EUC_2D)
    Euc2d,
    /// Euclidean distance rounded up (CEIL_2D)
    Ceil2d,
    /// Geographic distance on the sphere (GEO)
    Geo,
    /// Pseudo-Euclidean distance (ATT)
    Att,
    /// Euclidean distance on a 1000 x 1000 torus (TOROID)
    Toroid,
}

impl EdgeWeightType {
    fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "EUC_2D" => Some(EdgeWeightType::Euc2d),
            "CEIL_2D" => Some(EdgeWeightType::Ceil2d),
            "GEO" => Some(EdgeWeightType::Geo),
            "ATT" => Some(EdgeWeightType::Att),
            "TOROID" => Some(EdgeWeightType::Toroid),
            _ => None,
        }
    }

    /// Distance between two nodes under this metric.
    ///
    /// Every metric produces a non-negative integer; `distance(i, i)` is 0.
    pub fn distance(&self, a: &Node, b: &Node) -> i64 {
        match self {
            EdgeWeightType::Euc2d => {
                let dx = a.x - b.x;
                let dy = a.y - b.y;
                ((dx * dx + dy * dy).sqrt() + 0.5) as i64
            }
            EdgeWeightType::Ceil2d => {
                let dx = a.x - b.x;
                let dy = a.y - b.y;
                ((dx * dx + dy * dy).sqrt() + 1e-9) as i64
            }
            EdgeWeightType::Geo => {
                let lat_a = geo_radians(a.x);
                let lon_a = geo_radians(a.y);
                let lat_b = geo_radians(b.x);
                let lon_b = geo_radians(b.y);

                let q1 = (lon_a - lon_b).cos();
                let q2 = (lat_a - lat_b).cos();
                let q3 = (lat_a + lat_b).cos();
                let arg = 0.5 * ((1.0 + q1) * q2 - (1.0 - q1) * q3);
                (GEO_RADIUS * arg.clamp(-1.0, 1.0).acos() + 1.0) as i64
            }
            EdgeWeightType::Att => {
                let dx = a.x - b.x;
                let dy = a.y - b.y;
                let r = ((dx * dx + dy * dy) / 10.0).sqrt();
                let t = r.trunc();
                if t < r {
                    t as i64 + 1
                } else {
                    t as i64
                }
            }
            EdgeWeightType::Toroid => {
                let dx = (a.x - b.x).abs();
                let dy = (a.y - b.y).abs();
                let dx = dx.min(TOROID_SIZE - dx);
                let dy = dy.min(TOROID_SIZE - dy);
                ((dx * dx + dy * dy).sqrt() + 0.5) as i64
            }
        }
    }
}

/// Convert a TSPLIB DDD.MM coordinate into radians.
fn geo_radians(coord: f64) -> f64 {
    let deg = coord.trunc();
    let min = coord - deg;
    std::f64::consts::PI * (deg + 5.0 * min / 3.0) / 180.0
}

/// Represents a complete symmetric TSP instance
#[derive(Debug, Clone)]
pub struct TspInstance {
    /// Name of the instance
    pub name: String,
    /// Comment/description
    pub comment: String,
    /// Number of cities
    pub dimension: usize,
    /// List of all cities
    pub nodes: Vec<Node>,
    /// Selected edge weight type
    pub edge_weight_type: EdgeWeightType,
    /// Precomputed distance matrix
    pub distance: SquareMatrix<i64>,
    /// Per-city candidate lists, nearest first
    pub nn_lists: Vec<Vec<usize>>,
    /// Depth of the candidate lists
    pub nn_depth: usize,
}

impl TspInstance {
    /// Parse a TSP instance from a TSPLIB format file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let file = File::open(&path).map_err(|e| format!("Cannot open file: {}", e))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a TSP instance from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, String> {
        let mut name = String::new();
        let mut comment = String::new();
        let mut dimension = 0usize;
        let mut edge_weight_type: Option<EdgeWeightType> = None;
        let mut coords: Vec<(usize, f64, f64)> = Vec::new();

        let mut in_coords = false;

        for line in reader.lines() {
            let line = line.map_err(|e| format!("Read error: {}", e))?;
            let line = line.trim();

            if line.is_empty() || line == "EOF" {
                continue;
            }

            if let Some(rest) = keyword_value(line, "NAME") {
                name = rest.to_string();
                continue;
            }
            if let Some(rest) = keyword_value(line, "COMMENT") {
                comment = rest.to_string();
                continue;
            }
            if keyword_value(line, "TYPE").is_some() {
                continue;
            }
            if let Some(rest) = keyword_value(line, "DIMENSION") {
                dimension = rest.parse().map_err(|_| "Invalid dimension")?;
                continue;
            }
            if let Some(rest) = keyword_value(line, "EDGE_WEIGHT_TYPE") {
                edge_weight_type = Some(
                    EdgeWeightType::from_keyword(rest)
                        .ok_or_else(|| format!("Unsupported edge weight type: {}", rest))?,
                );
                continue;
            }
            if line.starts_with("NODE_COORD_SECTION") {
                in_coords = true;
                continue;
            }

            if in_coords {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 3 {
                    let id: usize = parts[0].parse().map_err(|_| "Invalid node id")?;
                    let x: f64 = parts[1].parse().map_err(|_| "Invalid x coordinate")?;
                    let y: f64 = parts[2].parse().map_err(|_| "Invalid y coordinate")?;
                    coords.push((id, x, y));
                }
            }
        }

        let edge_weight_type = edge_weight_type.ok_or("Missing EDGE_WEIGHT_TYPE")?;

        if dimension <= 2 || dimension > MAX_DIMENSION {
            return Err(format!(
                "Dimension {} out of bounds (3..={})",
                dimension, MAX_DIMENSION
            ));
        }
        if coords.len() != dimension {
            return Err(format!(
                "Expected {} coordinates, found {}",
                dimension,
                coords.len()
            ));
        }

        let nodes: Vec<Node> = coords
            .into_iter()
            .map(|(id, x, y)| Node::new(id - 1, x, y))
            .collect();

        Ok(Self::from_nodes(name, comment, nodes, edge_weight_type))
    }

    /// Build an instance directly from a list of cities
    pub fn from_nodes(
        name: String,
        comment: String,
        nodes: Vec<Node>,
        edge_weight_type: EdgeWeightType,
    ) -> Self {
        let dimension = nodes.len();
        let distance = Self::compute_distance_matrix(&nodes, edge_weight_type);

        log::debug!(
            "instance {}: {} cities, metric {:?}",
            name,
            dimension,
            edge_weight_type
        );

        TspInstance {
            name,
            comment,
            dimension,
            nodes,
            edge_weight_type,
            distance,
            nn_lists: Vec::new(),
            nn_depth: 0,
        }
    }

    /// Compute the full distance matrix for the selected metric
    fn compute_distance_matrix(nodes: &[Node], metric: EdgeWeightType) -> SquareMatrix<i64> {
        let n = nodes.len();
        let mut matrix = SquareMatrix::filled(n, 0i64);

        for i in 0..n {
            for j in 0..n {
                if i != j {
                    matrix[(i, j)] = metric.distance(&nodes[i], &nodes[j]);
                }
            }
        }

        matrix
    }

    /// Build the candidate lists: for each city the `depth` nearest cities,
    /// ascending by distance, self excluded.
    pub fn build_candidate_lists(&mut self, depth: usize) {
        let n = self.dimension;
        let depth = depth.min(n - 1);

        let mut lists = Vec::with_capacity(n);
        for i in 0..n {
            let mut order: Vec<usize> = (0..n).collect();
            // Force the city itself to the end so it is never selected.
            order.sort_by_key(|&j| if j == i { i64::MAX } else { self.distance[(i, j)] });
            order.truncate(depth);
            lists.push(order);
        }

        self.nn_lists = lists;
        self.nn_depth = depth;
    }

    /// Get the distance between two cities
    #[inline]
    pub fn dist(&self, i: usize, j: usize) -> i64 {
        self.distance[(i, j)]
    }

    /// Calculate total length of a closed tour given as the first n cities
    /// of a cyclic sequence (the edge back to the start is implied).
    pub fn tour_length(&self, cities: &[usize]) -> i64 {
        if cities.len() < 2 {
            return 0;
        }

        let mut length = 0;
        for w in cities.windows(2) {
            length += self.dist(w[0], w[1]);
        }
        length += self.dist(cities[cities.len() - 1], cities[0]);

        length
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let mut distances: Vec<i64> = Vec::new();
        for i in 0..self.dimension {
            for j in i + 1..self.dimension {
                distances.push(self.dist(i, j));
            }
        }
        let avg_distance = distances.iter().sum::<i64>() as f64 / distances.len() as f64;
        let max_distance = distances.iter().copied().max().unwrap_or(0);
        let min_distance = distances.iter().copied().min().unwrap_or(0);

        InstanceStatistics {
            name: self.name.clone(),
            dimension: self.dimension,
            edge_weight_type: self.edge_weight_type,
            avg_distance,
            min_distance,
            max_distance,
        }
    }
}

/// Split a `KEYWORD: value` TSPLIB header line, tolerating missing spaces.
fn keyword_value<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(':')?;
    Some(rest.trim())
}

/// Statistics about a TSP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub dimension: usize,
    pub edge_weight_type: EdgeWeightType,
    pub avg_distance: f64,
    pub min_distance: i64,
    pub max_distance: i64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Cities: {}", self.dimension)?;
        writeln!(f, "  Metric: {:?}", self.edge_weight_type)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Min distance: {}", self.min_distance)?;
        writeln!(f, "  Max distance: {}", self.max_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_instance() -> TspInstance {
        let nodes = vec![
            Node::new(0, 0.0, 0.0),
            Node::new(1, 3.0, 0.0),
            Node::new(2, 3.0, 4.0),
            Node::new(3, 0.0, 4.0),
        ];
        TspInstance::from_nodes(
            "grid".to_string(),
            String::new(),
            nodes,
            EdgeWeightType::Euc2d,
        )
    }

    #[test]
    fn test_euc2d_rounding() {
        let a = Node::new(0, 0.0, 0.0);
        let b = Node::new(1, 3.0, 4.0);
        let c = Node::new(2, 1.0, 1.0);

        assert_eq!(EdgeWeightType::Euc2d.distance(&a, &b), 5);
        // sqrt(2) = 1.414... rounds down
        assert_eq!(EdgeWeightType::Euc2d.distance(&a, &c), 1);
        assert_eq!(EdgeWeightType::Euc2d.distance(&a, &a), 0);
    }

    #[test]
    fn test_ceil2d_truncates_after_epsilon() {
        let a = Node::new(0, 0.0, 0.0);
        let b = Node::new(1, 1.0, 1.0);
        let c = Node::new(2, 3.0, 4.0);

        // sqrt(2) = 1.414... truncates to 1 under the epsilon rule
        assert_eq!(EdgeWeightType::Ceil2d.distance(&a, &b), 1);
        // exact integers survive the epsilon
        assert_eq!(EdgeWeightType::Ceil2d.distance(&a, &c), 5);
    }

    #[test]
    fn test_att_rounds_up_on_remainder() {
        let a = Node::new(0, 0.0, 0.0);
        let b = Node::new(1, 10.0, 0.0);
        // r = sqrt(100/10) = sqrt(10) = 3.16..., rounds up to 4
        assert_eq!(EdgeWeightType::Att.distance(&a, &b), 4);

        let c = Node::new(2, 0.0, 0.0);
        assert_eq!(EdgeWeightType::Att.distance(&a, &c), 0);
    }

    #[test]
    fn test_geo_known_pair() {
        // Frankfurt and Berlin in DDD.MM encoding.
        let frankfurt = Node::new(0, 50.07, 8.41);
        let berlin = Node::new(1, 52.32, 13.25);
        let d = EdgeWeightType::Geo.distance(&frankfurt, &berlin);
        // ~ 420-430 km under the TSPLIB sphere model
        assert!((400..460).contains(&d), "geo distance was {}", d);
        assert_eq!(
            d,
            EdgeWeightType::Geo.distance(&berlin, &frankfurt),
            "geo distance must be symmetric"
        );
    }

    #[test]
    fn test_toroid_wraps() {
        let a = Node::new(0, 10.0, 0.0);
        let b = Node::new(1, 990.0, 0.0);
        // straight-line gap is 980, wrapped gap is 20
        assert_eq!(EdgeWeightType::Toroid.distance(&a, &b), 20);
    }

    #[test]
    fn test_matrix_symmetric() {
        let instance = grid_instance();
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(instance.dist(i, j), instance.dist(j, i));
            }
        }
        assert_eq!(instance.dist(0, 2), 5);
    }

    #[test]
    fn test_candidate_lists_sorted_without_self() {
        let mut instance = grid_instance();
        instance.build_candidate_lists(10);

        assert_eq!(instance.nn_depth, 3);
        for (i, list) in instance.nn_lists.iter().enumerate() {
            assert_eq!(list.len(), 3);
            assert!(!list.contains(&i), "city {} appears in its own list", i);
            for w in list.windows(2) {
                assert!(instance.dist(i, w[0]) <= instance.dist(i, w[1]));
            }
        }
        // City 0: nearest is 1 (d=3), then 3 (d=4), then 2 (d=5)
        assert_eq!(instance.nn_lists[0], vec![1, 3, 2]);
    }

    #[test]
    fn test_tour_length_closes_cycle() {
        let instance = grid_instance();
        assert_eq!(instance.tour_length(&[0, 1, 2, 3]), 14);
    }

    #[test]
    fn test_parser_roundtrip() {
        let text = "\
NAME: toy4
COMMENT: four cities on a rectangle
TYPE: TSP
DIMENSION: 4
EDGE_WEIGHT_TYPE: EUC_2D
NODE_COORD_SECTION
1 0.0 0.0
2 3.0 0.0
3 3.0 4.0
4 0.0 4.0
EOF
";
        let instance = TspInstance::from_reader(text.as_bytes()).unwrap();
        assert_eq!(instance.name, "toy4");
        assert_eq!(instance.dimension, 4);
        assert_eq!(instance.edge_weight_type, EdgeWeightType::Euc2d);
        assert_eq!(instance.dist(0, 2), 5);
    }

    #[test]
    fn test_parser_rejects_unknown_metric() {
        let text = "\
NAME: bad
DIMENSION: 3
EDGE_WEIGHT_TYPE: EXPLICIT
NODE_COORD_SECTION
1 0 0
2 1 0
3 0 1
EOF
";
        assert!(TspInstance::from_reader(text.as_bytes()).is_err());
    }

    #[test]
    fn test_parser_rejects_tiny_dimension() {
        let text = "\
NAME: tiny
DIMENSION: 2
EDGE_WEIGHT_TYPE: EUC_2D
NODE_COORD_SECTION
1 0 0
2 1 0
EOF
";
        assert!(TspInstance::from_reader(text.as_bytes()).is_err());
    }
}
