pub mod display_width;
pub mod error;
pub mod graph_ast;
pub mod graph_json;
pub mod graph_layout;
pub mod graph_parser;
pub mod text_metrics;

pub use error::{Error, Result};
pub use graph_ast::{Flowchart, LayoutConfig};

/// Parses `input` and lays it out for the given viewport with the default
/// spacing.
pub fn layout(input: &str, width: f32, height: f32) -> Result<Flowchart> {
    layout_with_config(input, width, height, LayoutConfig::default())
}

pub fn layout_with_config(
    input: &str,
    width: f32,
    height: f32,
    config: LayoutConfig,
) -> Result<Flowchart> {
    let mut flowchart =
        graph_parser::parse_graph(input).ok_or_else(|| Error::not_a_flowchart(input))?;
    flowchart.set_config(config);
    graph_layout::compute_layout(&mut flowchart, width, height);
    Ok(flowchart)
}

/// [`layout`] followed by [`graph_json::to_json`].
pub fn layout_to_json(input: &str, width: f32, height: f32) -> Result<String> {
    graph_json::to_json(&layout(input, width, height)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_unknown_diagram_type_returns_error() {
        let err = layout("classDiagram\n  Foo\n", 800.0, 600.0).unwrap_err();
        assert!(
            err.to_string().contains("unknown diagram type"),
            "error should mention unknown diagram type, got: {err}"
        );
        assert!(err.to_string().contains("classDiagram"), "got: {err}");
    }

    #[test]
    fn layout_empty_input_returns_error() {
        let err = layout("", 800.0, 600.0).unwrap_err();
        assert!(matches!(err, Error::NotAFlowchart { .. }), "got: {err}");
    }

    #[test]
    fn layout_graph_diagram_works() {
        let fc = layout("graph TD\n    A --> B\n", 800.0, 600.0).unwrap();
        assert!(fc.is_layout_computed());
        assert_eq!(fc.nodes().len(), 2);
    }

    #[test]
    fn layout_with_config_applies_spacing() {
        let config = LayoutConfig {
            rank_spacing: 100.0,
            ..LayoutConfig::default()
        };
        let fc = layout_with_config("graph TD\nA --> B", 800.0, 600.0, config).unwrap();
        let a = fc.find_node_by_id("A").unwrap();
        let b = fc.find_node_by_id("B").unwrap();
        assert!((b.y - a.y - (a.height + 100.0)).abs() < 1e-3);
    }

    #[test]
    fn layout_to_json_emits_document() {
        let json = layout_to_json("flowchart LR\nA-->B", 800.0, 600.0).unwrap();
        assert!(json.starts_with('{'));
        assert!(json.contains("\"direction\":\"LR\""));
    }
}
