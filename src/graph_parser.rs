use std::collections::HashSet;

use tracing::debug;
use winnow::ascii::{space0, till_line_ending};
use winnow::combinator::{alt, delimited, not, opt, terminated};
use winnow::prelude::*;
use winnow::token::{one_of, take_till, take_until, take_while};

use crate::display_width::normalize_html;
use crate::graph_ast::*;

/// Cheap probe: does the text start (after blank and `%%` comment lines)
/// with a `flowchart` or `graph` header?
pub fn is_mermaid(input: &str) -> bool {
    let mut input = input;
    skip_trivia(&mut input);
    header_keyword(&mut input).is_ok()
}

/// Parses Mermaid flowchart text into an unlaid-out [`Flowchart`].
///
/// Returns `None` only when the header keyword is missing. Every other
/// malformed line is skipped and parsing continues with the next line.
pub fn parse_graph(input: &str) -> Option<Flowchart> {
    let mut input = input;
    skip_trivia(&mut input);
    let direction = header.parse_next(&mut input).ok()?;

    let mut builder = GraphBuilder::new(direction);
    loop {
        skip_trivia(&mut input);
        if input.is_empty() {
            break;
        }
        let mut line = next_line(&mut input);
        builder.line(&mut line);
    }
    Some(builder.finish())
}

/// Skips whitespace, blank lines and `%%` comment lines.
fn skip_trivia(input: &mut &str) {
    loop {
        *input = input.trim_start();
        if input.starts_with("%%") {
            next_line(input);
        } else {
            break;
        }
    }
}

fn next_line<'s>(input: &mut &'s str) -> &'s str {
    let s: &'s str = *input;
    let (line, remainder) = s.split_once('\n').unwrap_or((s, ""));
    *input = remainder;
    line.strip_suffix('\r').unwrap_or(line)
}

fn skip_space(input: &mut &str) {
    let _: winnow::Result<&str> = space0.parse_next(input);
}

fn header_keyword(input: &mut &str) -> winnow::Result<()> {
    identifier
        .verify(|w: &str| w.eq_ignore_ascii_case("flowchart") || w.eq_ignore_ascii_case("graph"))
        .void()
        .parse_next(input)
}

fn header(input: &mut &str) -> winnow::Result<Direction> {
    header_keyword.parse_next(input)?;
    space0.parse_next(input)?;
    let direction = opt(direction).parse_next(input)?.unwrap_or_default();
    till_line_ending.void().parse_next(input)?;
    Ok(direction)
}

fn direction(input: &mut &str) -> winnow::Result<Direction> {
    identifier.verify_map(Direction::from_keyword).parse_next(input)
}

fn is_id_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn identifier<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., is_id_char).parse_next(input)
}

fn number(input: &mut &str) -> winnow::Result<f32> {
    take_while(1.., |c: char| c.is_ascii_digit() || c == '.')
        .try_map(str::parse::<f32>)
        .parse_next(input)
}

fn starts_shape(input: &str) -> bool {
    input.starts_with(['[', '(', '{', '>'])
}

fn starts_link(input: &str) -> bool {
    input.starts_with(['-', '=', '<'])
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

/// Label text up to the `stop` character that closes the opening bracket.
///
/// Nested `nest` characters raise the depth so `[a [b] c]` keeps its inner
/// brackets. A leading `"` switches to a quoted string in which brackets are
/// literal.
fn label_text(
    nest: Option<char>,
    stop: Option<char>,
) -> impl FnMut(&mut &str) -> winnow::Result<String> {
    move |input: &mut &str| -> winnow::Result<String> {
        skip_space(input);
        if input.starts_with('"') {
            let quoted = delimited('"', take_till(0.., '"'), opt('"')).parse_next(input)?;
            skip_space(input);
            return Ok(normalize_html(quoted.trim()));
        }

        let mut depth = 0usize;
        let mut end = input.len();
        for (i, c) in input.char_indices() {
            if Some(c) == stop {
                if depth == 0 {
                    end = i;
                    break;
                }
                depth -= 1;
            } else if Some(c) == nest {
                depth += 1;
            }
        }
        let (text, remainder) = input.split_at(end);
        *input = remainder;
        Ok(normalize_html(text.trim()))
    }
}

fn wrapped(
    mut open: &'static str,
    nest: Option<char>,
    close: &'static str,
    shape: Shape,
) -> impl FnMut(&mut &str) -> winnow::Result<(Shape, String)> {
    move |input: &mut &str| -> winnow::Result<(Shape, String)> {
        open.parse_next(input)?;
        let text = label_text(nest, close.chars().next()).parse_next(input)?;
        opt(close).parse_next(input)?;
        Ok((shape, text))
    }
}

/// `[/text/]` parallelogram or `[/text\]` trapezoid.
fn slanted(input: &mut &str) -> winnow::Result<(Shape, String)> {
    "[/".parse_next(input)?;
    let text = take_till(0.., ['/', '\\']).parse_next(input)?;
    let shape = alt((
        '/'.value(Shape::Parallelogram),
        '\\'.value(Shape::Trapezoid),
    ))
    .parse_next(input)?;
    opt(']').parse_next(input)?;
    Ok((shape, normalize_html(text.trim())))
}

fn shape_definition(input: &mut &str) -> winnow::Result<(Shape, String)> {
    alt((
        wrapped("[[", Some('['), "]]", Shape::Subroutine),
        wrapped("[(", Some('('), ")]", Shape::Cylinder),
        slanted,
        wrapped("[", Some('['), "]", Shape::Rectangle),
        wrapped("((", Some('('), "))", Shape::Circle),
        wrapped("([", Some('['), "])", Shape::Stadium),
        wrapped("(", Some('('), ")", Shape::Rounded),
        wrapped("{{", Some('{'), "}}", Shape::Hexagon),
        wrapped("{", Some('{'), "}", Shape::Diamond),
        wrapped(">", None, "]", Shape::Asymmetric),
    ))
    .parse_next(input)
}

#[derive(Debug, Clone, PartialEq)]
struct Link {
    edge_type: EdgeType,
    start: Marker,
    end: Marker,
    label: Option<String>,
}

impl Link {
    fn new(edge_type: EdgeType, start: Marker, end: Marker) -> Self {
        Self {
            edge_type,
            start,
            end,
            label: None,
        }
    }

    fn arrow() -> Self {
        Self::new(EdgeType::Arrow, Marker::None, Marker::Arrow)
    }

    fn open() -> Self {
        Self::new(EdgeType::Open, Marker::None, Marker::None)
    }
}

/// Link operators, longest match first.
fn link(input: &mut &str) -> winnow::Result<Link> {
    alt((
        ('<', take_while(2.., '-'), '>')
            .value(Link::new(EdgeType::Bidirectional, Marker::Arrow, Marker::Arrow)),
        ('-', take_while(1.., '.'), "->")
            .value(Link::new(EdgeType::Dotted, Marker::None, Marker::Arrow)),
        ('-', take_while(1.., '.'), '-')
            .value(Link::new(EdgeType::Dotted, Marker::None, Marker::None)),
        (take_while(2.., '='), '>').value(Link::new(EdgeType::Thick, Marker::None, Marker::Arrow)),
        take_while(3.., '=').value(Link::new(EdgeType::Thick, Marker::None, Marker::None)),
        (take_while(2.., '-'), '>').value(Link::arrow()),
        terminated((take_while(2.., '-'), one_of(['o', 'x'])), not(one_of(is_id_char))).map(
            |(_, tip): (&str, char)| {
                let end = if tip == 'o' { Marker::Circle } else { Marker::Cross };
                Link::new(EdgeType::Arrow, Marker::None, end)
            },
        ),
        take_while(3.., '-').value(Link::open()),
        inline_label_link,
    ))
    .parse_next(input)
}

/// `-- text -->` or `-- text ---`.
fn inline_label_link(input: &mut &str) -> winnow::Result<Link> {
    "--".parse_next(input)?;
    space0.parse_next(input)?;
    not(one_of(['-', '=', '.'])).parse_next(input)?;
    let text = take_until(1.., "--").parse_next(input)?;
    let mut link = alt((
        (take_while(2.., '-'), '>').value(Link::arrow()),
        take_while(3.., '-').value(Link::open()),
    ))
    .parse_next(input)?;
    let text = text.trim();
    if !text.is_empty() {
        link.label = Some(text.to_string());
    }
    Ok(link)
}

/// `|label|` after a link operator.
fn pipe_label(input: &mut &str) -> winnow::Result<String> {
    delimited('|', take_till(0.., '|'), '|')
        .map(|s: &str| unquote(s.trim()).to_string())
        .parse_next(input)
}

struct GraphBuilder {
    flowchart: Flowchart,
    /// Open subgraphs, innermost last.
    stack: Vec<SubgraphIndex>,
    /// Ids that already received a shape definition.
    explicit: HashSet<String>,
    anonymous_subgraphs: usize,
}

impl GraphBuilder {
    fn new(direction: Direction) -> Self {
        Self {
            flowchart: Flowchart::new(direction),
            stack: Vec::new(),
            explicit: HashSet::new(),
            anonymous_subgraphs: 0,
        }
    }

    fn finish(mut self) -> Flowchart {
        if !self.stack.is_empty() {
            debug!(open = self.stack.len(), "subgraphs left open at end of input");
        }
        self.flowchart.finalize();
        debug!(
            nodes = self.flowchart.nodes().len(),
            edges = self.flowchart.edges().len(),
            subgraphs = self.flowchart.subgraphs().len(),
            direction = %self.flowchart.direction(),
            "parsed flowchart"
        );
        self.flowchart
    }

    fn current_subgraph_id(&self) -> Option<String> {
        self.stack
            .last()
            .map(|&index| self.flowchart.subgraph(index).id.clone())
    }

    fn line(&mut self, input: &mut &str) {
        let Ok(head) = identifier.parse_next(input) else {
            debug!(line = *input, "skipping unparseable line");
            return;
        };

        match head.to_ascii_lowercase().as_str() {
            "subgraph" => self.subgraph(input),
            "end" => self.end(),
            "style" => self.style(input),
            "classdef" | "class" | "linkstyle" | "click" => {
                debug!(keyword = head, "ignoring statement");
            }
            "direction" => {
                let checkpoint = *input;
                skip_space(input);
                match direction.parse_next(input) {
                    Ok(dir) => self.set_direction(dir),
                    Err(_) => {
                        *input = checkpoint;
                        self.statement(head, input);
                    }
                }
            }
            _ => self.statement(head, input),
        }
    }

    fn subgraph(&mut self, input: &mut &str) {
        skip_space(input);
        let id = identifier.parse_next(input).ok();
        skip_space(input);

        let title = if input.starts_with('[') {
            delimited('[', label_text(Some('['), Some(']')), opt(']'))
                .parse_next(input)
                .ok()
        } else if input.starts_with('"') {
            label_text(None, None).parse_next(input).ok()
        } else {
            None
        };

        let trailing = input.trim();
        let (id, title) = match (id, title) {
            (Some(id), Some(title)) => (id.to_string(), title),
            (Some(id), None) if trailing.is_empty() => (id.to_string(), id.to_string()),
            (Some(id), None) => (id.to_string(), trailing.to_string()),
            (None, Some(title)) => (slug(&title), title),
            (None, None) => {
                self.anonymous_subgraphs += 1;
                let id = format!("subgraph{}", self.anonymous_subgraphs);
                (id.clone(), id)
            }
        };

        if let Some(index) = self.flowchart.find_subgraph_index(&id) {
            debug!(subgraph = %id, "reopening subgraph");
            self.stack.push(index);
            return;
        }

        let mut subgraph = Subgraph::new(id, title);
        subgraph.parent = self.current_subgraph_id();
        let index = self.flowchart.register_subgraph(subgraph);
        self.stack.push(index);
    }

    fn end(&mut self) {
        if self.stack.pop().is_none() {
            debug!("`end` without an open subgraph");
        }
    }

    fn set_direction(&mut self, direction: Direction) {
        match self.stack.last() {
            Some(&index) => self.flowchart.subgraph_mut(index).direction = Some(direction),
            None => debug!(%direction, "ignoring `direction` outside a subgraph"),
        }
    }

    fn style(&mut self, input: &mut &str) {
        skip_space(input);
        let Ok(id) = identifier.parse_next(input) else {
            return;
        };

        let (mut fill, mut stroke, mut stroke_width) = (None, None, None);
        for property in input.split(',') {
            let Some((key, value)) = property.split_once(':') else {
                continue;
            };
            let mut value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "fill" => fill = Some(Rgba::parse_hex(value).unwrap_or(Rgba::FALLBACK_GRAY)),
                "stroke" => stroke = Some(Rgba::parse_hex(value).unwrap_or(Rgba::FALLBACK_GRAY)),
                "stroke-width" => stroke_width = Some(number.parse_next(&mut value).unwrap_or(2.0)),
                other => debug!(key = other, "ignoring style property"),
            }
        }

        if !self.flowchart.set_node_style(id, fill, stroke, stroke_width) {
            debug!(node = id, "style for unknown node");
        }
    }

    fn statement<'s>(&mut self, id: &'s str, input: &mut &'s str) {
        skip_space(input);
        match input.chars().next() {
            Some('[' | '(' | '{' | '>') => {
                self.define_node(id, input);
                skip_space(input);
                if starts_link(input) {
                    self.edge(&[id], input);
                }
            }
            Some('-' | '=' | '<') => {
                self.mention_node(id);
                self.edge(&[id], input);
            }
            Some('&') => {
                debug!(node = id, "node list reduced to its first id");
                self.mention_node(id);
            }
            None | Some(';') => self.mention_node(id),
            Some(_) => debug!(line = *input, "skipping unparseable line"),
        }
    }

    /// Creates `id` as an implicit node in the current scope, or pulls an
    /// existing top-level node into the current subgraph.
    fn mention_node(&mut self, id: &str) {
        let scope = self.current_subgraph_id();
        match self.flowchart.find_node_index(id) {
            Some(index) => {
                if scope.is_some() && self.flowchart.node(index).subgraph.is_none() {
                    self.flowchart.node_mut(index).subgraph = scope;
                }
            }
            None if self.flowchart.find_subgraph_by_id(id).is_some() => {}
            None => {
                let mut node = Node::implicit(id);
                node.subgraph = scope;
                self.flowchart.register_node(node);
            }
        }
    }

    fn define_node(&mut self, id: &str, input: &mut &str) {
        let Ok((shape, label)) = shape_definition.parse_next(input) else {
            debug!(node = id, "unreadable shape definition");
            return;
        };
        self.mention_node(id);
        let Some(index) = self.flowchart.find_node_index(id) else {
            debug!(node = id, "shape definition on a subgraph id ignored");
            return;
        };
        if !self.explicit.insert(id.to_string()) {
            debug!(node = id, "duplicate node definition absorbed");
            return;
        }
        let node = self.flowchart.node_mut(index);
        node.shape = shape;
        node.label = if label.is_empty() { id.to_string() } else { label };
    }

    /// Parses `<link> [|label|] target [shape] [& target ...]` and recurses
    /// for chained links, using the targets as the next sources.
    fn edge<'s>(&mut self, sources: &[&str], input: &mut &'s str) {
        skip_space(input);
        let Ok(mut parsed) = link.parse_next(input) else {
            debug!(line = *input, "unrecognized link operator");
            return;
        };
        skip_space(input);
        if let Ok(Some(label)) = opt(pipe_label).parse_next(input) {
            parsed.label = Some(label).filter(|l| !l.is_empty());
        }

        let mut targets: Vec<&'s str> = Vec::new();
        loop {
            skip_space(input);
            let Ok(target) = identifier.parse_next(input) else {
                break;
            };
            for &source in sources {
                self.connect(source, target, &parsed);
            }
            skip_space(input);
            if starts_shape(input) {
                self.define_node(target, input);
                skip_space(input);
            }
            targets.push(target);

            if input.starts_with('&') {
                *input = &input[1..];
            } else {
                break;
            }
        }

        if targets.is_empty() {
            debug!("link without a target");
            return;
        }
        if starts_link(input) {
            self.edge(&targets, input);
        }
    }

    fn connect(&mut self, from: &str, to: &str, link: &Link) {
        self.mention_node(to);
        let mut edge = Edge::new(from, to, link.edge_type);
        edge.start_marker = link.start;
        edge.end_marker = link.end;
        edge.label = link.label.clone();
        self.flowchart.register_edge(edge);
    }
}

fn slug(title: &str) -> String {
    title.replace(' ', "_").to_lowercase()
}
