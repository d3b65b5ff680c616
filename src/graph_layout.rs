use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::graph_ast::*;
use crate::text_metrics::{HeuristicMeasurer, TextMeasurer};

const MIN_NODE_WIDTH: f32 = 40.0;
const MIN_NODE_HEIGHT: f32 = 24.0;
const LABEL_PADDING_X: f32 = 32.0;
const LABEL_PADDING_Y: f32 = 20.0;
const EMPTY_LABEL_WIDTH: f32 = 50.0;
const LINE_HEIGHT_FACTOR: f32 = 1.2;

const TITLE_BAR_HEIGHT: f32 = 30.0;
const OUTER_PADDING: f32 = 20.0;
const MIN_SCALE: f32 = 0.6;
const EMPTY_CONTENT_SIZE: f32 = 100.0;

/// Lays out `flowchart` for a viewport of `available_width` x
/// `available_height`, measuring labels with [`HeuristicMeasurer`].
pub fn compute_layout(flowchart: &mut Flowchart, available_width: f32, available_height: f32) {
    compute_layout_with(
        flowchart,
        available_width,
        available_height,
        &HeuristicMeasurer::default(),
    );
}

/// Runs every layout phase, writing geometry into the flowchart's nodes,
/// edges and subgraphs.
///
/// A second call with the same viewport while the layout is still valid does
/// nothing. Any mutation through the model API invalidates the layout.
pub fn compute_layout_with(
    flowchart: &mut Flowchart,
    available_width: f32,
    available_height: f32,
    measurer: &dyn TextMeasurer,
) {
    let metrics = flowchart.metrics;
    if metrics.computed
        && metrics.viewport_width == available_width
        && metrics.viewport_height == available_height
    {
        trace!("layout unchanged, skipping");
        return;
    }

    clear_geometry(flowchart);

    if flowchart.nodes.is_empty() {
        debug!("empty flowchart, using minimum content size");
        flowchart.metrics = LayoutMetrics {
            computed: true,
            viewport_width: available_width,
            viewport_height: available_height,
            natural_width: EMPTY_CONTENT_SIZE + 2.0 * OUTER_PADDING,
            natural_height: EMPTY_CONTENT_SIZE + 2.0 * OUTER_PADDING,
            content_width: EMPTY_CONTENT_SIZE,
            content_height: EMPTY_CONTENT_SIZE,
            content_offset_x: 0.0,
            content_offset_y: 0.0,
            scale: 1.0,
        };
        return;
    }

    let font_size = flowchart.config.font_size;
    for node in &mut flowchart.nodes {
        size_node(node, font_size, measurer);
    }

    let layers = assign_layers(&flowchart.nodes, &flowchart.edges);
    debug!(
        nodes = flowchart.nodes.len(),
        edges = flowchart.edges.len(),
        layers = layers.iter().max().map_or(0, |l| l + 1),
        "assigned layers"
    );

    position_nodes(flowchart, &layers);
    route_edges(&flowchart.nodes, &mut flowchart.edges);

    let mut metrics = fit_viewport(flowchart, available_width, available_height);
    compute_subgraph_bounds(flowchart);

    metrics.computed = true;
    flowchart.metrics = metrics;
}

fn clear_geometry(flowchart: &mut Flowchart) {
    for edge in &mut flowchart.edges {
        edge.path.clear();
        edge.label_position = None;
    }
    for sg in &mut flowchart.subgraphs {
        sg.x = 0.0;
        sg.y = 0.0;
        sg.width = 0.0;
        sg.height = 0.0;
    }
}

fn size_node(node: &mut Node, font_size: f32, measurer: &dyn TextMeasurer) {
    let (text_width, text_height) = if node.label.is_empty() {
        (EMPTY_LABEL_WIDTH, font_size * LINE_HEIGHT_FACTOR)
    } else {
        let metrics = measurer.measure(&node.label, font_size);
        (metrics.width, metrics.height)
    };

    // Diamonds, circles and hexagons lose usable area to their outline.
    let factor = match node.shape {
        Shape::Diamond => 2.0,
        Shape::Circle | Shape::Hexagon => 1.5,
        _ => 1.0,
    };

    let mut width = (text_width + LABEL_PADDING_X * factor).max(MIN_NODE_WIDTH);
    let mut height = (text_height + LABEL_PADDING_Y * factor).max(MIN_NODE_HEIGHT);
    if node.shape.is_square() {
        let side = width.max(height);
        width = side;
        height = side;
    }
    node.width = width;
    node.height = height;
}

/// Longest-path layering that tolerates cycles.
///
/// A node is placed once all of its predecessors are placed. When a sweep
/// makes no progress the remaining nodes sit on cycles: the first one with a
/// placed predecessor goes one layer below it, and if there is none the first
/// unplaced node is forced onto layer 0.
fn assign_layers(nodes: &[Node], edges: &[Edge]) -> Vec<usize> {
    let count = nodes.len();
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); count];
    for edge in edges {
        let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
        else {
            continue;
        };
        if from != to && !predecessors[to].contains(&from) {
            predecessors[to].push(from);
        }
    }

    let mut layers: Vec<Option<usize>> = predecessors
        .iter()
        .map(|p| p.is_empty().then_some(0))
        .collect();
    if count > 0 && layers.iter().all(Option::is_none) {
        layers[0] = Some(0);
    }

    let mut iterations = 0;
    while iterations < 2 * count && layers.iter().any(Option::is_none) {
        iterations += 1;

        let mut progress = false;
        for i in 0..count {
            if layers[i].is_some() {
                continue;
            }
            let placed: Option<Vec<usize>> = predecessors[i].iter().map(|&p| layers[p]).collect();
            if let Some(placed) = placed {
                layers[i] = Some(placed.into_iter().max().map_or(0, |l| l + 1));
                progress = true;
            }
        }
        if progress {
            continue;
        }

        let entry = (0..count).find(|&i| {
            layers[i].is_none() && predecessors[i].iter().any(|&p| layers[p].is_some())
        });
        if let Some(i) = entry {
            let deepest = predecessors[i].iter().filter_map(|&p| layers[p]).max();
            layers[i] = Some(deepest.map_or(0, |l| l + 1));
            trace!(node = %nodes[i].id, "broke cycle");
        } else if let Some(i) = layers.iter().position(Option::is_none) {
            layers[i] = Some(0);
        }
    }

    layers.into_iter().map(|l| l.unwrap_or(0)).collect()
}

/// Nearest direction override up the subgraph chain, else the flowchart's.
fn effective_direction(flowchart: &Flowchart, node: &Node) -> Direction {
    let mut current = node.subgraph.as_deref();
    let mut depth = 0;
    while let Some(id) = current {
        let Some(sg) = flowchart.find_subgraph_by_id(id) else {
            break;
        };
        if let Some(direction) = sg.direction {
            return direction;
        }
        depth += 1;
        if depth > flowchart.subgraphs.len() {
            break;
        }
        current = sg.parent.as_deref();
    }
    flowchart.direction
}

/// Places every node on a uniform grid whose cell is the largest node in the
/// whole graph. Within a layer, nodes sharing a subgraph (or all top-level
/// nodes) are centered as a group.
fn position_nodes(flowchart: &mut Flowchart, layers: &[usize]) {
    let config = flowchart.config;
    let flow = flowchart.direction;
    let directions: Vec<Direction> = {
        let fc = &*flowchart;
        fc.nodes.iter().map(|n| effective_direction(fc, n)).collect()
    };

    let slot_width = flowchart
        .nodes
        .iter()
        .map(|n| n.width)
        .fold(MIN_NODE_WIDTH, f32::max);
    let slot_height = flowchart
        .nodes
        .iter()
        .map(|n| n.height)
        .fold(MIN_NODE_HEIGHT, f32::max);

    let max_layer = layers.iter().copied().max().unwrap_or(0);
    let mut layer_sizes = vec![0usize; max_layer + 1];
    for &layer in layers {
        layer_sizes[layer] += 1;
    }
    let widest_layer = layer_sizes.iter().copied().max().unwrap_or(0);
    let mut next_in_layer = vec![0usize; max_layer + 1];

    for i in 0..flowchart.nodes.len() {
        let layer = layers[i];
        let direction = directions[i];
        let group = flowchart.nodes[i].subgraph.as_deref();
        let same_group = |j: &usize| {
            layers[*j] == layer && flowchart.nodes[*j].subgraph.as_deref() == group
        };

        let pos = if direction == flow {
            let pos = next_in_layer[layer];
            next_in_layer[layer] += 1;
            pos
        } else {
            (0..i).filter(same_group).count()
        };
        let group_size = (0..flowchart.nodes.len()).filter(same_group).count();

        let (across, along) = if direction.is_horizontal() {
            (slot_height, slot_width)
        } else {
            (slot_width, slot_height)
        };
        let rank = if direction.is_reversed() {
            max_layer - layer
        } else {
            layer
        };
        let start = (widest_layer - group_size) as f32 * (across + config.node_spacing) / 2.0;
        let primary = rank as f32 * (along + config.rank_spacing);
        let secondary = start + pos as f32 * (across + config.node_spacing);

        let node = &mut flowchart.nodes[i];
        if direction.is_horizontal() {
            node.x = primary + (slot_width - node.width) / 2.0;
            node.y = secondary + (slot_height - node.height) / 2.0;
        } else {
            node.x = secondary + (slot_width - node.width) / 2.0;
            node.y = primary + (slot_height - node.height) / 2.0;
        }
        trace!(node = %node.id, layer, pos, x = node.x, y = node.y, "positioned node");
    }
}

fn route_edges(nodes: &[Node], edges: &mut [Edge]) {
    for edge in edges {
        let from = nodes.iter().find(|n| n.id == edge.from);
        let to = nodes.iter().find(|n| n.id == edge.to);
        match (from, to) {
            (Some(from), Some(to)) => {
                let (start, end) = (from.center(), to.center());
                edge.path = vec![start, end];
                edge.label_position = Some(start.midpoint(end));
            }
            _ => trace!(from = %edge.from, to = %edge.to, "edge endpoint unresolved"),
        }
    }
}

/// Scales positions (never sizes) so the diagram fits the viewport, down to
/// [`MIN_SCALE`], then offsets everything by the outer padding.
fn fit_viewport(flowchart: &mut Flowchart, available_width: f32, available_height: f32) -> LayoutMetrics {
    let mut extent_x: f32 = 0.0;
    let mut extent_y: f32 = 0.0;
    for node in &flowchart.nodes {
        extent_x = extent_x.max(node.x + node.width);
        extent_y = extent_y.max(node.y + node.height);
    }
    for point in flowchart.edges.iter().flat_map(|e| &e.path) {
        extent_x = extent_x.max(point.x);
        extent_y = extent_y.max(point.y);
    }

    let padding = OUTER_PADDING;
    let natural_width = extent_x + 2.0 * padding;
    let natural_height = extent_y + 2.0 * padding;

    let axis_scale = |available: f32, natural: f32| {
        if available > 0.0 && natural > available && natural > 2.0 * padding {
            (available - 2.0 * padding) / (natural - 2.0 * padding)
        } else {
            1.0
        }
    };
    let scale = axis_scale(available_width, natural_width)
        .min(axis_scale(available_height, natural_height))
        .max(MIN_SCALE);

    let transform = |v: f32| {
        if scale < 1.0 {
            padding + v * scale
        } else {
            v + padding
        }
    };
    for node in &mut flowchart.nodes {
        node.x = transform(node.x);
        node.y = transform(node.y);
    }
    for edge in &mut flowchart.edges {
        for point in edge.path.iter_mut().chain(edge.label_position.as_mut()) {
            point.x = transform(point.x);
            point.y = transform(point.y);
        }
    }

    debug!(natural_width, natural_height, scale, "fitted viewport");

    LayoutMetrics {
        computed: false,
        viewport_width: available_width,
        viewport_height: available_height,
        natural_width,
        natural_height,
        content_width: natural_width - 2.0 * padding,
        content_height: natural_height - 2.0 * padding,
        content_offset_x: 0.0,
        content_offset_y: 0.0,
        scale,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Bounds {
    fn of_node(node: &Node) -> Self {
        Self {
            min_x: node.x,
            min_y: node.y,
            max_x: node.x + node.width,
            max_y: node.y + node.height,
        }
    }

    fn of_subgraph(sg: &Subgraph) -> Self {
        Self {
            min_x: sg.x,
            min_y: sg.y,
            max_x: sg.x + sg.width,
            max_y: sg.y + sg.height,
        }
    }

    fn union(self, other: Bounds) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

fn compute_subgraph_bounds(flowchart: &mut Flowchart) {
    let roots: Vec<String> = flowchart
        .subgraphs
        .iter()
        .filter(|sg| {
            sg.parent
                .as_deref()
                .is_none_or(|p| flowchart.find_subgraph_by_id(p).is_none())
        })
        .map(|sg| sg.id.clone())
        .collect();

    let mut visited = HashSet::new();
    for root in roots {
        subgraph_bounds(flowchart, &root, &mut visited);
    }
}

/// Bottom-up: children first, then the union of direct members and child
/// boxes grown by the padding and the title bar.
fn subgraph_bounds(
    flowchart: &mut Flowchart,
    id: &str,
    visited: &mut HashSet<String>,
) -> Option<Bounds> {
    if !visited.insert(id.to_string()) {
        return None;
    }

    let children: Vec<String> = flowchart.child_subgraphs(id).map(|s| s.id.clone()).collect();
    let mut bounds = children
        .iter()
        .filter_map(|child| subgraph_bounds(flowchart, child, visited))
        .reduce(Bounds::union);

    for node in flowchart
        .nodes
        .iter()
        .filter(|n| n.subgraph.as_deref() == Some(id))
    {
        let b = Bounds::of_node(node);
        bounds = Some(bounds.map_or(b, |acc| acc.union(b)));
    }

    let inner = bounds?;
    let padding = flowchart.config.subgraph_padding;
    let index = flowchart.find_subgraph_index(id)?;
    let sg = &mut flowchart.subgraphs[index.0];
    sg.x = inner.min_x - padding;
    sg.y = inner.min_y - padding - TITLE_BAR_HEIGHT;
    sg.width = inner.max_x - inner.min_x + 2.0 * padding;
    sg.height = inner.max_y - inner.min_y + 2.0 * padding + TITLE_BAR_HEIGHT;
    trace!(subgraph = %sg.id, x = sg.x, y = sg.y, width = sg.width, height = sg.height, "bounded subgraph");
    Some(Bounds::of_subgraph(sg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_parser::parse_graph;
    use pretty_assertions::assert_eq;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn laid_out(input: &str, width: f32, height: f32) -> Flowchart {
        let mut fc = parse_graph(input).unwrap();
        compute_layout(&mut fc, width, height);
        fc
    }

    fn node<'a>(fc: &'a Flowchart, id: &str) -> &'a Node {
        fc.find_node_by_id(id).unwrap()
    }

    fn layers_of(input: &str) -> HashMap<String, usize> {
        let fc = parse_graph(input).unwrap();
        let layers = assign_layers(fc.nodes(), fc.edges());
        fc.nodes()
            .iter()
            .zip(layers)
            .map(|(n, l)| (n.id.clone(), l))
            .collect()
    }

    #[test]
    fn size_single_char_rectangle() {
        let mut n = Node::implicit("A");
        size_node(&mut n, 14.0, &HeuristicMeasurer::default());
        assert!(close(n.width, 40.4), "width {}", n.width);
        assert!(close(n.height, 36.8), "height {}", n.height);
    }

    #[test]
    fn size_floor_applies() {
        let mut n = Node::implicit("A");
        size_node(&mut n, 2.0, &HeuristicMeasurer::default());
        assert_eq!((n.width, n.height), (MIN_NODE_WIDTH, MIN_NODE_HEIGHT));
    }

    #[test]
    fn size_empty_label() {
        let mut n = Node::new("A", Shape::Rectangle, "");
        size_node(&mut n, 10.0, &HeuristicMeasurer::default());
        assert!(close(n.width, 82.0));
        assert!(close(n.height, 32.0));
    }

    #[test]
    fn size_squares_circle_and_diamond() {
        for shape in [Shape::Circle, Shape::Diamond] {
            let mut n = Node::new("A", shape, "A much longer label");
            size_node(&mut n, 14.0, &HeuristicMeasurer::default());
            assert_eq!(n.width, n.height, "{shape}");
        }
    }

    #[test]
    fn size_diamond_pads_more_than_rectangle() {
        let measurer = HeuristicMeasurer::default();
        let mut rect = Node::new("A", Shape::Rectangle, "Check");
        let mut diamond = Node::new("A", Shape::Diamond, "Check");
        let mut hexagon = Node::new("A", Shape::Hexagon, "Check");
        size_node(&mut rect, 14.0, &measurer);
        size_node(&mut diamond, 14.0, &measurer);
        size_node(&mut hexagon, 14.0, &measurer);
        assert!(diamond.width > hexagon.width);
        assert!(hexagon.width > rect.width);
    }

    #[test]
    fn size_multiline_label_is_taller() {
        let measurer = HeuristicMeasurer::default();
        let mut one = Node::new("A", Shape::Rectangle, "Line");
        let mut two = Node::new("A", Shape::Rectangle, "Line\nLine");
        size_node(&mut one, 14.0, &measurer);
        size_node(&mut two, 14.0, &measurer);
        assert_eq!(one.width, two.width);
        assert!(close(two.height - one.height, 16.8));
    }

    #[test]
    fn size_uses_injected_measurer() {
        struct Fixed;
        impl TextMeasurer for Fixed {
            fn measure(&self, _text: &str, _font_size: f32) -> crate::text_metrics::TextMetrics {
                crate::text_metrics::TextMetrics {
                    width: 100.0,
                    height: 10.0,
                }
            }
        }
        let mut fc = parse_graph("graph TD\nA").unwrap();
        compute_layout_with(&mut fc, 800.0, 600.0, &Fixed);
        assert_eq!(node(&fc, "A").width, 132.0);
        assert_eq!(node(&fc, "A").height, 30.0);
    }

    #[test]
    fn layer_linear_chain() {
        let layers = layers_of("graph TD\n    A --> B\n    B --> C\n");
        assert_eq!(layers["A"], 0);
        assert_eq!(layers["B"], 1);
        assert_eq!(layers["C"], 2);
    }

    #[test]
    fn layer_fan_out() {
        let layers = layers_of("graph TD\n    A --> B\n    A --> C\n");
        assert_eq!(layers["B"], 1);
        assert_eq!(layers["C"], 1);
    }

    #[test]
    fn layer_fan_in() {
        let layers = layers_of("graph TD\n    A --> C\n    B --> C\n");
        assert_eq!(layers["A"], 0);
        assert_eq!(layers["B"], 0);
        assert_eq!(layers["C"], 1);
    }

    #[test]
    fn layer_longest_path_wins() {
        let layers = layers_of("graph TD\nA --> B --> C\nA --> C");
        assert_eq!(layers["C"], 2);
    }

    #[test]
    fn layer_pure_cycle_seeds_first_node() {
        let layers = layers_of("flowchart TB\nA-->B-->C-->A");
        assert_eq!(layers["A"], 0);
        assert_eq!(layers["B"], 1);
        assert_eq!(layers["C"], 2);
    }

    #[test]
    fn layer_cycle_entered_from_outside() {
        let layers = layers_of("flowchart TB\nS-->A\nA-->B-->C-->A");
        assert_eq!(layers["S"], 0);
        assert_eq!(layers["A"], 1);
        assert_eq!(layers["B"], 2);
        assert_eq!(layers["C"], 3);
    }

    #[test]
    fn layer_ignores_self_loop() {
        let layers = layers_of("flowchart TB\nA-->A\nA-->B");
        assert_eq!(layers["A"], 0);
        assert_eq!(layers["B"], 1);
    }

    #[test]
    fn layer_disconnected_components() {
        let layers = layers_of("flowchart TB\nA-->B\nC\nD-->E");
        assert_eq!(layers["A"], 0);
        assert_eq!(layers["C"], 0);
        assert_eq!(layers["D"], 0);
        assert_eq!(layers["E"], 1);
    }

    #[test]
    fn layout_tb_two_nodes() {
        let fc = laid_out("flowchart TB\nA-->B", 800.0, 600.0);
        let (a, b) = (node(&fc, "A"), node(&fc, "B"));
        assert!(close(a.x, 20.0) && close(a.y, 20.0));
        assert!(close(b.x, 20.0));
        assert!(close(b.y, 96.8), "b.y {}", b.y);
    }

    #[test]
    fn layout_bt_reverses_rows() {
        let fc = laid_out("flowchart BT\nA-->B", 800.0, 600.0);
        assert!(node(&fc, "A").y > node(&fc, "B").y);
    }

    #[test]
    fn layout_lr_and_rl_use_columns() {
        let lr = laid_out("flowchart LR\nA-->B", 800.0, 600.0);
        assert!(node(&lr, "B").x > node(&lr, "A").x);
        assert_eq!(node(&lr, "A").y, node(&lr, "B").y);

        let rl = laid_out("flowchart RL\nA-->B", 800.0, 600.0);
        assert!(node(&rl, "B").x < node(&rl, "A").x);
    }

    #[test]
    fn layout_fan_out_side_by_side() {
        let fc = laid_out("graph TD\n    A --> B\n    A --> C\n", 800.0, 600.0);
        let (a, b, c) = (node(&fc, "A"), node(&fc, "B"), node(&fc, "C"));
        assert_eq!(b.y, c.y);
        assert!(b.y > a.y);
        assert!(b.x < c.x);
        let a_center = a.center().x;
        assert!(close(a_center, (b.center().x + c.center().x) / 2.0));
    }

    #[test]
    fn layout_uses_uniform_slots() {
        let fc = laid_out("graph TD\nA[A very wide label here] --> B\nA --> C", 800.0, 600.0);
        let (a, b, c) = (node(&fc, "A"), node(&fc, "B"), node(&fc, "C"));
        let slot = a.width;
        assert!(close(c.center().x - b.center().x, slot + 20.0));
    }

    #[test]
    fn directional_subgraph_uses_its_own_axis() {
        let fc = laid_out("flowchart TB\nsubgraph s\ndirection LR\nA-->B\nend", 800.0, 600.0);
        let (a, b) = (node(&fc, "A"), node(&fc, "B"));
        assert!(b.x > a.x);
        assert_eq!(a.y, b.y);
    }

    #[test]
    fn nested_subgraph_inherits_override() {
        let fc = parse_graph(
            "flowchart TB\nsubgraph outer\ndirection LR\nsubgraph inner\nA-->B\nend\nend",
        )
        .unwrap();
        let a = fc.find_node_by_id("A").unwrap();
        assert_eq!(effective_direction(&fc, a), Direction::LeftToRight);
    }

    #[test]
    fn edges_run_between_centers() {
        let fc = laid_out("flowchart TB\nA-->|go|B", 800.0, 600.0);
        let edge = &fc.edges()[0];
        assert_eq!(edge.path.len(), 2);
        for (point, id) in edge.path.iter().zip(["A", "B"]) {
            let center = node(&fc, id).center();
            assert!(close(point.x, center.x) && close(point.y, center.y), "{id}");
        }
        let mid = edge.label_position.unwrap();
        assert!(close(mid.x, 40.2) && close(mid.y, 76.8));
    }

    #[test]
    fn edge_to_subgraph_stays_unrouted() {
        let fc = laid_out("flowchart TB\nsubgraph s\nA\nend\nB --> s", 800.0, 600.0);
        assert!(!fc.edges()[0].is_routed());
        assert_eq!(fc.edges()[0].label_position, None);
    }

    #[test]
    fn subgraph_bounds_wrap_members() {
        let fc = laid_out("flowchart TB\nsubgraph s1[Group]\nA-->B\nend\nC-->A", 800.0, 600.0);
        let sg = fc.find_subgraph_by_id("s1").unwrap();
        let (a, b) = (node(&fc, "A"), node(&fc, "B"));
        assert!(sg.has_bounds());
        assert!(close(sg.x, a.x - 40.0));
        assert!(close(sg.y, a.y - 70.0));
        assert!(close(sg.width, a.width + 80.0));
        assert!(close(sg.height, b.y + b.height - a.y + 110.0));
    }

    #[test]
    fn nested_bounds_contain_children() {
        let fc = laid_out(
            "flowchart TB\nsubgraph outer\nA\nsubgraph inner\nB\nend\nend\nA-->B",
            800.0,
            600.0,
        );
        let outer = fc.find_subgraph_by_id("outer").unwrap();
        let inner = fc.find_subgraph_by_id("inner").unwrap();
        assert!(inner.has_bounds());
        assert!(outer.x <= inner.x);
        assert!(outer.y < inner.y);
        assert!(outer.x + outer.width >= inner.x + inner.width);
        assert!(outer.y + outer.height >= inner.y + inner.height);
    }

    #[test]
    fn empty_subgraph_has_no_bounds() {
        let fc = laid_out("flowchart TB\nsubgraph e\nend\nA", 800.0, 600.0);
        let sg = fc.find_subgraph_by_id("e").unwrap();
        assert!(!sg.has_bounds());
        assert_eq!((sg.x, sg.y, sg.width, sg.height), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn fit_natural_and_content_sizes() {
        let fc = laid_out("flowchart TB\nA-->B", 800.0, 600.0);
        let m = fc.metrics();
        assert!(m.computed);
        assert_eq!(m.scale, 1.0);
        assert!(close(m.natural_width, 80.4));
        assert!(close(m.natural_height, 153.6));
        assert!(close(m.content_width, 40.4));
        assert!(close(m.content_height, 113.6));
    }

    #[test]
    fn fit_scales_positions_not_sizes() {
        let fc = laid_out("flowchart TB\nA-->B-->C", 800.0, 200.0);
        let scale = fc.metrics().scale;
        assert!(scale < 1.0 && scale > MIN_SCALE, "scale {scale}");
        assert!(close(scale, 160.0 / 190.4));
        let (a, b) = (node(&fc, "A"), node(&fc, "B"));
        assert!(close(a.y, 20.0));
        assert!(close(b.y, 20.0 + 76.8 * scale));
        assert!(close(b.width, 40.4));
    }

    #[test]
    fn fit_clamps_to_min_scale() {
        let source: String = std::iter::once("flowchart TB".to_string())
            .chain((0..30).map(|i| format!("N{i}-->N{}", i + 1)))
            .collect::<Vec<_>>()
            .join("\n");
        let fc = laid_out(&source, 100.0, 100.0);
        assert_eq!(fc.metrics().scale, MIN_SCALE);
    }

    #[test]
    fn empty_flowchart_gets_minimum_content() {
        let fc = laid_out("flowchart TB\n", 800.0, 600.0);
        let m = fc.metrics();
        assert!(m.computed);
        assert_eq!((m.content_width, m.content_height), (100.0, 100.0));
        assert_eq!((m.natural_width, m.natural_height), (140.0, 140.0));
        assert_eq!(m.scale, 1.0);
    }

    #[test]
    fn layout_is_idempotent() {
        let mut fc = laid_out("flowchart LR\nA-->B & C\nsubgraph s\nC-->D\nend", 800.0, 600.0);
        let first = fc.clone();
        compute_layout(&mut fc, 800.0, 600.0);
        assert_eq!(fc, first);
    }

    #[test]
    fn mutation_triggers_recompute() {
        let mut fc = laid_out("flowchart TB\nA-->B", 800.0, 600.0);
        let before = node(&fc, "B").y;
        fc.register_node(Node::implicit("C"));
        let c = fc.find_node_index("C").unwrap();
        fc.register_edge(Edge::new("B", "C", EdgeType::Arrow));
        assert!(!fc.is_layout_computed());
        compute_layout(&mut fc, 800.0, 600.0);
        assert!(fc.is_layout_computed());
        assert_eq!(node(&fc, "B").y, before);
        assert!(fc.node(c).y > before);
    }

    #[test]
    fn new_viewport_recomputes_from_scratch() {
        let mut fc = laid_out("flowchart TB\nA-->B-->C", 800.0, 200.0);
        compute_layout(&mut fc, 800.0, 600.0);
        assert_eq!(fc.metrics().scale, 1.0);
        assert!(close(node(&fc, "B").y, 96.8));
    }
}
