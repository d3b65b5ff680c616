use crate::display_width::{line_count, multiline_width};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub width: f32,
    pub height: f32,
}

/// Font measurement capability handed to the sizing phase.
///
/// Implementations must be deterministic: the same text and size always
/// yield the same metrics.
pub trait TextMeasurer {
    fn measure(&self, text: &str, font_size: f32) -> TextMetrics;
}

/// Width estimate used when no real font metrics are available:
/// `columns * font_size * char_width_factor` for the widest line and
/// `font_size * line_height_factor` per line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicMeasurer {
    pub char_width_factor: f32,
    pub line_height_factor: f32,
}

impl Default for HeuristicMeasurer {
    fn default() -> Self {
        Self {
            char_width_factor: 0.6,
            line_height_factor: 1.2,
        }
    }
}

impl TextMeasurer for HeuristicMeasurer {
    fn measure(&self, text: &str, font_size: f32) -> TextMetrics {
        let columns = multiline_width(text) as f32;
        let lines = line_count(text) as f32;
        TextMetrics {
            width: columns * font_size * self.char_width_factor,
            height: lines * font_size * self.line_height_factor,
        }
    }
}
