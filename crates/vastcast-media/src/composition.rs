//! Composition plan for the promo layout.
//!
//! The plan is a pure description of the filter graph: a fixed canvas with
//! the ad video on the left, the QR code on the right and three captions.
//! Inputs are referenced by position (`0` background, `1` QR code, `2` ad
//! video), so the same captions always produce an identical graph.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::text::{display_url, escape_drawtext, escape_filter_args, escape_option_value};

/// Call-to-action caption under the QR code.
pub const DEFAULT_CTA_TEXT: &str = "SCAN QR CODE FOR MORE.";

/// Default font family when no font file is configured.
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

const TEXT_COLOR: &str = "white";

const BACKGROUND_INPUT: usize = 0;
const QR_INPUT: usize = 1;
const AD_VIDEO_INPUT: usize = 2;

/// Label of the stream the encoder maps to the output.
pub const FINAL_OUTPUT_LABEL: &str = "final_output";

/// Pixel geometry of a rectangle on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Position and size of one caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextPlacement {
    pub x: u32,
    pub y: u32,
    pub font_size: u32,
}

/// Canvas layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompositionLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub ad_video: Placement,
    pub qr_code: Placement,
    pub brand: TextPlacement,
    pub url: TextPlacement,
    pub cta: TextPlacement,
}

impl Default for CompositionLayout {
    fn default() -> Self {
        Self {
            canvas_width: 1920,
            canvas_height: 1080,
            ad_video: Placement { x: 80, y: 163, width: 1164, height: 654 },
            qr_code: Placement { x: 1317, y: 163, width: 530, height: 530 },
            brand: TextPlacement { x: 80, y: 857, font_size: 45 },
            url: TextPlacement { x: 80, y: 917, font_size: 30 },
            cta: TextPlacement { x: 1332, y: 723, font_size: 38 },
        }
    }
}

/// Font used for every caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FontSpec {
    /// Font file on disk
    File(PathBuf),
    /// Font family resolved by fontconfig
    Family(String),
}

impl Default for FontSpec {
    fn default() -> Self {
        FontSpec::Family(DEFAULT_FONT_FAMILY.to_string())
    }
}

impl FontSpec {
    fn to_option(&self) -> String {
        match self {
            FontSpec::File(path) => {
                format!("fontfile={}", escape_option_value(&path.to_string_lossy()))
            }
            FontSpec::Family(family) => format!("font={}", escape_option_value(family)),
        }
    }
}

/// Caption values for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionText {
    /// Brand line
    pub brand: String,
    /// Destination URL, formatted with [`display_url`] before drawing
    pub destination: String,
    /// Call to action under the QR code
    pub cta: String,
    pub font: FontSpec,
}

impl CompositionText {
    pub fn new(brand: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            destination: destination.into(),
            cta: DEFAULT_CTA_TEXT.to_string(),
            font: FontSpec::default(),
        }
    }

    pub fn with_cta(mut self, cta: impl Into<String>) -> Self {
        self.cta = cta.into();
        self
    }

    pub fn with_font(mut self, font: FontSpec) -> Self {
        self.font = font;
        self
    }
}

/// A stream reference inside the filter graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamRef {
    /// Video stream of the numbered input
    Input(usize),
    /// Output of an earlier operation
    Label(String),
}

impl StreamRef {
    fn label(name: &str) -> Self {
        StreamRef::Label(name.to_string())
    }
}

impl fmt::Display for StreamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamRef::Input(index) => write!(f, "[{index}:v]"),
            StreamRef::Label(name) => write!(f, "[{name}]"),
        }
    }
}

/// One drawtext layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextLayer {
    /// Literal text, escaped when the graph is rendered
    pub text: String,
    pub font: FontSpec,
    pub color: String,
    pub placement: TextPlacement,
}

impl TextLayer {
    /// Text is escaped for drawtext expansion, then as an option value, then
    /// once more for the graph. No level relies on quoting.
    fn to_filter(&self) -> String {
        let options = [
            self.font.to_option(),
            format!("text={}", escape_option_value(&escape_drawtext(&self.text))),
            format!("fontcolor={}", escape_option_value(&self.color)),
            format!("fontsize={}", self.placement.font_size),
            format!("x={}", self.placement.x),
            format!("y={}", self.placement.y),
        ];
        format!("drawtext={}", escape_filter_args(&options.join(":")))
    }
}

/// One operation of the filter graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterOp {
    Scale {
        input: StreamRef,
        width: u32,
        height: u32,
        output: String,
    },
    Overlay {
        base: StreamRef,
        top: StreamRef,
        x: u32,
        y: u32,
        /// End when the shorter input ends
        shortest: bool,
        output: String,
    },
    /// Text layers drawn in order, later layers on top
    DrawText {
        input: StreamRef,
        layers: Vec<TextLayer>,
        output: String,
    },
}

impl FilterOp {
    fn to_filter(&self) -> String {
        match self {
            FilterOp::Scale { input, width, height, output } => {
                format!("{input}scale={width}:{height}[{output}]")
            }
            FilterOp::Overlay { base, top, x, y, shortest, output } => {
                let shortest = if *shortest { ":shortest=1" } else { "" };
                format!("{base}{top}overlay=x={x}:y={y}{shortest}[{output}]")
            }
            FilterOp::DrawText { input, layers, output } => {
                let chain: Vec<String> = layers.iter().map(TextLayer::to_filter).collect();
                format!("{input}{}[{output}]", chain.join(","))
            }
        }
    }

    /// Label this operation produces.
    pub fn output(&self) -> &str {
        match self {
            FilterOp::Scale { output, .. }
            | FilterOp::Overlay { output, .. }
            | FilterOp::DrawText { output, .. } => output,
        }
    }
}

/// Ordered filter operations for one render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositionPlan {
    operations: Vec<FilterOp>,
}

impl CompositionPlan {
    pub fn operations(&self) -> &[FilterOp] {
        &self.operations
    }

    /// Label of the final composited stream.
    pub fn output_label(&self) -> &str {
        self.operations
            .last()
            .map(FilterOp::output)
            .unwrap_or(FINAL_OUTPUT_LABEL)
    }

    /// `-map` argument selecting the composited stream.
    pub fn output_map(&self) -> String {
        format!("[{}]", self.output_label())
    }

    /// Render the `-filter_complex` graph.
    pub fn to_filter_complex(&self) -> String {
        self.operations
            .iter()
            .map(FilterOp::to_filter)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Build the composition plan for the given captions.
///
/// Pure: identical inputs always yield an identical plan.
pub fn plan_composition(text: &CompositionText, layout: &CompositionLayout) -> CompositionPlan {
    let layers = vec![
        caption(&text.brand, &text.font, layout.brand),
        caption(&display_url(&text.destination), &text.font, layout.url),
        caption(&text.cta, &text.font, layout.cta),
    ];

    let operations = vec![
        FilterOp::Scale {
            input: StreamRef::Input(BACKGROUND_INPUT),
            width: layout.canvas_width,
            height: layout.canvas_height,
            output: "base_bg".to_string(),
        },
        FilterOp::Scale {
            input: StreamRef::Input(QR_INPUT),
            width: layout.qr_code.width,
            height: layout.qr_code.height,
            output: "scaled_qr".to_string(),
        },
        FilterOp::Scale {
            input: StreamRef::Input(AD_VIDEO_INPUT),
            width: layout.ad_video.width,
            height: layout.ad_video.height,
            output: "scaled_ad_video".to_string(),
        },
        FilterOp::Overlay {
            base: StreamRef::label("base_bg"),
            top: StreamRef::label("scaled_ad_video"),
            x: layout.ad_video.x,
            y: layout.ad_video.y,
            shortest: false,
            output: "video_on_bg".to_string(),
        },
        FilterOp::Overlay {
            base: StreamRef::label("video_on_bg"),
            top: StreamRef::label("scaled_qr"),
            x: layout.qr_code.x,
            y: layout.qr_code.y,
            shortest: true,
            output: "with_qr".to_string(),
        },
        FilterOp::DrawText {
            input: StreamRef::label("with_qr"),
            layers,
            output: FINAL_OUTPUT_LABEL.to_string(),
        },
    ];

    CompositionPlan { operations }
}

fn caption(text: &str, font: &FontSpec, placement: TextPlacement) -> TextLayer {
    TextLayer {
        text: text.to_string(),
        font: font.clone(),
        color: TEXT_COLOR.to_string(),
        placement,
    }
}
