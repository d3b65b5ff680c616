use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TB")]
    TopToBottom,
    #[serde(rename = "LR")]
    LeftToRight,
    #[serde(rename = "BT")]
    BottomToTop,
    #[serde(rename = "RL")]
    RightToLeft,
}

impl Direction {
    /// Parses a direction keyword (`TB`, `TD`, `LR`, `BT`, `RL`), ignoring case.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "TB" | "TD" => Some(Direction::TopToBottom),
            "LR" => Some(Direction::LeftToRight),
            "BT" => Some(Direction::BottomToTop),
            "RL" => Some(Direction::RightToLeft),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::TopToBottom => "TB",
            Direction::LeftToRight => "LR",
            Direction::BottomToTop => "BT",
            Direction::RightToLeft => "RL",
        }
    }

    /// Layers run along the x axis.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftToRight | Direction::RightToLeft)
    }

    /// Layer order is flipped along the primary axis.
    pub fn is_reversed(self) -> bool {
        matches!(self, Direction::BottomToTop | Direction::RightToLeft)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Rectangle,
    Rounded,
    Stadium,
    Diamond,
    Circle,
    Hexagon,
    Parallelogram,
    Cylinder,
    Subroutine,
    Asymmetric,
    Trapezoid,
}

impl Shape {
    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Rectangle => "rectangle",
            Shape::Rounded => "rounded",
            Shape::Stadium => "stadium",
            Shape::Diamond => "diamond",
            Shape::Circle => "circle",
            Shape::Hexagon => "hexagon",
            Shape::Parallelogram => "parallelogram",
            Shape::Cylinder => "cylinder",
            Shape::Subroutine => "subroutine",
            Shape::Asymmetric => "asymmetric",
            Shape::Trapezoid => "trapezoid",
        }
    }

    /// Shapes whose bounding box must stay square.
    pub fn is_square(self) -> bool {
        matches!(self, Shape::Circle | Shape::Diamond)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    #[default]
    Arrow,
    Open,
    Bidirectional,
    Dotted,
    Thick,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::Arrow => "arrow",
            EdgeType::Open => "open",
            EdgeType::Bidirectional => "bidirectional",
            EdgeType::Dotted => "dotted",
            EdgeType::Thick => "thick",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    #[default]
    None,
    Arrow,
    Circle,
    Cross,
}

impl Marker {
    pub fn as_str(self) -> &'static str {
        match self {
            Marker::None => "none",
            Marker::Arrow => "arrow",
            Marker::Circle => "circle",
            Marker::Cross => "cross",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RGBA color packed as `0xRRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba(pub u32);

impl Rgba {
    pub const WHITE: Rgba = Rgba(0xFFFF_FFFF);
    pub const BLACK: Rgba = Rgba(0x0000_00FF);
    pub const LIGHT_GRAY: Rgba = Rgba(0xF0F0_F0FF);
    /// Used by `style` statements whose color value cannot be read.
    pub const FALLBACK_GRAY: Rgba = Rgba(0xE0E0_E0FF);

    /// Parses `#RGB`, `#RRGGBB` or `#RRGGBBAA`.
    pub fn parse_hex(s: &str) -> Option<Rgba> {
        let hex = s.strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            3 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                let r = ((v >> 8) & 0xF) * 17;
                let g = ((v >> 4) & 0xF) * 17;
                let b = (v & 0xF) * 17;
                Some(Rgba((r << 24) | (g << 16) | (b << 8) | 0xFF))
            }
            6 => u32::from_str_radix(hex, 16).ok().map(|v| Rgba((v << 8) | 0xFF)),
            8 => u32::from_str_radix(hex, 16).ok().map(Rgba),
            _ => None,
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08x}", self.0)
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rgba::parse_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid color `{s}`")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub shape: Shape,
    pub label: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub fill_color: Rgba,
    pub stroke_color: Rgba,
    pub stroke_width: f32,
    /// Innermost subgraph containing this node.
    pub subgraph: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, shape: Shape, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            shape,
            label: label.into(),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            fill_color: Rgba::WHITE,
            stroke_color: Rgba::BLACK,
            stroke_width: 1.0,
            subgraph: None,
        }
    }

    /// Rectangle node labelled with its own id.
    pub fn implicit(id: &str) -> Self {
        Self::new(id, Shape::Rectangle, id)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub edge_type: EdgeType,
    pub start_marker: Marker,
    pub end_marker: Marker,
    /// Empty until routed; two points (source center, target center) once routed.
    pub path: Vec<Point>,
    pub label_position: Option<Point>,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, edge_type: EdgeType) -> Self {
        let (start_marker, end_marker) = match edge_type {
            EdgeType::Open => (Marker::None, Marker::None),
            EdgeType::Bidirectional => (Marker::Arrow, Marker::Arrow),
            EdgeType::Arrow | EdgeType::Dotted | EdgeType::Thick => (Marker::None, Marker::Arrow),
        };
        Self {
            from: from.into(),
            to: to.into(),
            label: None,
            edge_type,
            start_marker,
            end_marker,
            path: Vec::new(),
            label_position: None,
        }
    }

    pub fn is_routed(&self) -> bool {
        self.path.len() >= 2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub id: String,
    pub title: String,
    /// Overrides the inherited layout direction for member nodes.
    pub direction: Option<Direction>,
    pub parent: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub background_color: Rgba,
    pub border_color: Rgba,
}

impl Subgraph {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            direction: None,
            parent: None,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            background_color: Rgba::LIGHT_GRAY,
            border_color: Rgba::BLACK,
        }
    }

    /// A subgraph without member nodes keeps zero bounds and should not be drawn.
    pub fn has_bounds(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub node_spacing: f32,
    pub rank_spacing: f32,
    pub subgraph_padding: f32,
    pub font_size: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_spacing: 20.0,
            rank_spacing: 40.0,
            subgraph_padding: 40.0,
            font_size: 14.0,
        }
    }
}

/// Sizes recorded by the last layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutMetrics {
    pub computed: bool,
    pub viewport_width: f32,
    pub viewport_height: f32,
    /// Unscaled extent including the outer padding.
    pub natural_width: f32,
    pub natural_height: f32,
    pub content_width: f32,
    pub content_height: f32,
    pub content_offset_x: f32,
    pub content_offset_y: f32,
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeIndex(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubgraphIndex(pub usize);

/// Root aggregate owning every node, edge and subgraph of one diagram.
///
/// Registries keep insertion order. Index handles stay valid for the life of
/// the flowchart because records are only ever appended (finalization is the
/// one exception and runs before handles are handed out).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flowchart {
    pub(crate) direction: Direction,
    #[serde(default)]
    pub(crate) config: LayoutConfig,
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) subgraphs: Vec<Subgraph>,
    #[serde(default)]
    pub(crate) metrics: LayoutMetrics,
}

impl Flowchart {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            config: LayoutConfig::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
            subgraphs: Vec::new(),
            metrics: LayoutMetrics::default(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
        self.invalidate_layout();
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: LayoutConfig) {
        self.config = config;
        self.invalidate_layout();
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn subgraphs(&self) -> &[Subgraph] {
        &self.subgraphs
    }

    pub fn metrics(&self) -> &LayoutMetrics {
        &self.metrics
    }

    pub fn is_layout_computed(&self) -> bool {
        self.metrics.computed
    }

    pub fn invalidate_layout(&mut self) {
        self.metrics.computed = false;
    }

    pub fn register_node(&mut self, node: Node) -> NodeIndex {
        self.nodes.push(node);
        self.invalidate_layout();
        NodeIndex(self.nodes.len() - 1)
    }

    pub fn register_edge(&mut self, edge: Edge) -> EdgeIndex {
        self.edges.push(edge);
        self.invalidate_layout();
        EdgeIndex(self.edges.len() - 1)
    }

    pub fn register_subgraph(&mut self, subgraph: Subgraph) -> SubgraphIndex {
        self.subgraphs.push(subgraph);
        self.invalidate_layout();
        SubgraphIndex(self.subgraphs.len() - 1)
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0]
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        self.invalidate_layout();
        &mut self.nodes[index.0]
    }

    pub fn edge(&self, index: EdgeIndex) -> &Edge {
        &self.edges[index.0]
    }

    pub fn edge_mut(&mut self, index: EdgeIndex) -> &mut Edge {
        self.invalidate_layout();
        &mut self.edges[index.0]
    }

    pub fn subgraph(&self, index: SubgraphIndex) -> &Subgraph {
        &self.subgraphs[index.0]
    }

    pub fn subgraph_mut(&mut self, index: SubgraphIndex) -> &mut Subgraph {
        self.invalidate_layout();
        &mut self.subgraphs[index.0]
    }

    pub fn find_node_index(&self, id: &str) -> Option<NodeIndex> {
        self.nodes.iter().position(|n| n.id == id).map(NodeIndex)
    }

    pub fn find_node_by_id(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Mutable lookup for in-place restyling; invalidates the layout.
    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        let index = self.find_node_index(id)?;
        Some(self.node_mut(index))
    }

    /// Applies the given style overrides to node `id`. Returns false if no
    /// such node exists.
    pub fn set_node_style(
        &mut self,
        id: &str,
        fill: Option<Rgba>,
        stroke: Option<Rgba>,
        stroke_width: Option<f32>,
    ) -> bool {
        let Some(node) = self.find_node_mut(id) else {
            return false;
        };
        if let Some(fill) = fill {
            node.fill_color = fill;
        }
        if let Some(stroke) = stroke {
            node.stroke_color = stroke;
        }
        if let Some(width) = stroke_width {
            node.stroke_width = width;
        }
        true
    }

    pub fn find_subgraph_index(&self, id: &str) -> Option<SubgraphIndex> {
        self.subgraphs.iter().position(|s| s.id == id).map(SubgraphIndex)
    }

    pub fn find_subgraph_by_id(&self, id: &str) -> Option<&Subgraph> {
        self.subgraphs.iter().find(|s| s.id == id)
    }

    /// True if a node or a subgraph already uses `id`.
    pub fn contains_id(&self, id: &str) -> bool {
        self.find_node_by_id(id).is_some() || self.find_subgraph_by_id(id).is_some()
    }

    pub fn child_subgraphs<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Subgraph> + 'a {
        self.subgraphs
            .iter()
            .filter(move |s| s.parent.as_deref() == Some(id))
    }

    /// Ids of `id` and every subgraph nested below it, parents first.
    pub fn subgraph_subtree(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_subtree(id, &mut out);
        out
    }

    fn collect_subtree(&self, id: &str, out: &mut Vec<String>) {
        if out.iter().any(|seen| seen == id) {
            return;
        }
        out.push(id.to_string());
        let children: Vec<String> = self.child_subgraphs(id).map(|s| s.id.clone()).collect();
        for child in children {
            self.collect_subtree(&child, out);
        }
    }

    /// Post-parse pass: drops duplicate node ids (first definition wins),
    /// synthesizes missing edge endpoints and marks the layout stale.
    ///
    /// Endpoints naming a subgraph are left alone; such edges stay unrouted.
    pub fn finalize(&mut self) {
        let mut seen = HashSet::new();
        self.nodes.retain(|n| seen.insert(n.id.clone()));

        let mut missing: Vec<String> = Vec::new();
        for edge in &self.edges {
            for id in [&edge.from, &edge.to] {
                if !self.contains_id(id) && !missing.contains(id) {
                    missing.push(id.clone());
                }
            }
        }
        for id in missing {
            self.nodes.push(Node::implicit(&id));
        }

        self.invalidate_layout();
    }

    /// Moves a subgraph, its nested subgraphs, their member nodes and every
    /// edge lying entirely inside them by `(dx, dy)`.
    ///
    /// Operates on computed geometry and leaves the layout flag untouched; a
    /// later recompute discards the offset. Returns false for unknown ids.
    pub fn translate_subgraph(&mut self, id: &str, dx: f32, dy: f32) -> bool {
        if self.find_subgraph_index(id).is_none() {
            return false;
        }
        let subtree = self.subgraph_subtree(id);
        let inside = |node: &Node| {
            node.subgraph
                .as_ref()
                .is_some_and(|sg| subtree.iter().any(|s| s == sg))
        };
        let inner_nodes: HashSet<&str> = self
            .nodes
            .iter()
            .filter(|n| inside(*n))
            .map(|n| n.id.as_str())
            .collect();
        let inner_edges: Vec<usize> = self
            .edges
            .iter()
            .enumerate()
            .filter(|(_, e)| inner_nodes.contains(e.from.as_str()) && inner_nodes.contains(e.to.as_str()))
            .map(|(i, _)| i)
            .collect();

        for i in inner_edges {
            let edge = &mut self.edges[i];
            for p in &mut edge.path {
                p.x += dx;
                p.y += dy;
            }
            if let Some(p) = &mut edge.label_position {
                p.x += dx;
                p.y += dy;
            }
        }
        for node in self.nodes.iter_mut().filter(|n| inside(&**n)) {
            node.x += dx;
            node.y += dy;
        }
        for sg in self
            .subgraphs
            .iter_mut()
            .filter(|sg| subtree.contains(&sg.id))
        {
            if sg.has_bounds() {
                sg.x += dx;
                sg.y += dy;
            }
        }
        true
    }
}
