//! Configuration types for the MicroSynth editor.
//!
//! This module provides the settings that shape how the graph engine
//! behaves. All types implement [`serde::Deserialize`] with every field
//! defaulted, so a configuration file only needs to mention what it changes.
//!
//! # Overview
//!
//! - [`EditorConfig`] - Top-level configuration combining the sections below.
//! - [`GraphConfig`] - Structural policy, such as whether self-loops are allowed.
//! - [`RoutingConfig`] - Bend offsets for parallel edges and self-loop geometry.
//! - [`LayoutConfig`] - Spacing handed to the layout engine and reflow animation timing.
//!
//! # Example
//!
//! ```
//! # use microsynth::config::EditorConfig;
//! let config = EditorConfig::default();
//! assert!(!config.graph().loop_connections_enabled());
//! assert_eq!(config.routing().bend_offset(), 20.0);
//! assert!(config.validate().is_ok());
//! ```

use serde::Deserialize;

use crate::error::MicrosynthError;

/// Top-level editor configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditorConfig {
    /// Graph policy section.
    #[serde(default)]
    graph: GraphConfig,

    /// Edge routing section.
    #[serde(default)]
    routing: RoutingConfig,

    /// Layout and animation section.
    #[serde(default)]
    layout: LayoutConfig,
}

impl EditorConfig {
    /// Creates a new [`EditorConfig`] from its sections.
    pub fn new(graph: GraphConfig, routing: RoutingConfig, layout: LayoutConfig) -> Self {
        Self {
            graph,
            routing,
            layout,
        }
    }

    /// Returns the graph configuration.
    pub fn graph(&self) -> &GraphConfig {
        &self.graph
    }

    /// Returns the routing configuration.
    pub fn routing(&self) -> &RoutingConfig {
        &self.routing
    }

    /// Returns the layout configuration.
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Checks that numeric settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`MicrosynthError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), MicrosynthError> {
        let routing = &self.routing;
        let layout = &self.layout;

        let non_negative = [
            ("routing.bend_offset", routing.bend_offset),
            ("routing.loop_offset", routing.loop_offset),
            ("routing.loop_scale", routing.loop_scale),
            ("layout.node_spacing", layout.node_spacing),
            ("layout.layer_spacing", layout.layer_spacing),
            ("layout.edge_spacing", layout.edge_spacing),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(MicrosynthError::Config(format!(
                    "{field} must be a non-negative number, got {value}"
                )));
            }
        }

        if !(layout.viewport_width > 0.0 && layout.viewport_height > 0.0) {
            return Err(MicrosynthError::Config(
                "layout.viewport_width and layout.viewport_height must be positive".to_string(),
            ));
        }
        if !(layout.zoom_factor > 0.0 && layout.zoom_factor <= 1.0) {
            return Err(MicrosynthError::Config(format!(
                "layout.zoom_factor must be in (0, 1], got {}",
                layout.zoom_factor
            )));
        }
        Ok(())
    }
}

/// Structural graph policy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphConfig {
    /// Whether a connection may start and end on the same node.
    #[serde(default)]
    loop_connections_enabled: bool,
}

impl GraphConfig {
    /// Creates a new [`GraphConfig`].
    pub fn new(loop_connections_enabled: bool) -> Self {
        Self {
            loop_connections_enabled,
        }
    }

    /// Returns whether self-loop connections are allowed.
    pub fn loop_connections_enabled(&self) -> bool {
        self.loop_connections_enabled
    }
}

/// Geometry knobs for edge paths.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Perpendicular distance of the bend point for parallel edges.
    #[serde(default = "default_bend_offset")]
    bend_offset: f32,

    /// Grow the bend with the sibling index instead of using one fixed offset.
    #[serde(default)]
    fan_out: bool,

    /// Pixel distance of the self-loop control points from the node border.
    #[serde(default = "default_loop_offset")]
    loop_offset: f32,

    /// Share of the node size used to place the self-loop control points.
    #[serde(default = "default_loop_scale")]
    loop_scale: f32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            bend_offset: default_bend_offset(),
            fan_out: false,
            loop_offset: default_loop_offset(),
            loop_scale: default_loop_scale(),
        }
    }
}

impl RoutingConfig {
    /// Returns the perpendicular bend distance.
    pub fn bend_offset(&self) -> f32 {
        self.bend_offset
    }

    /// Returns whether bends fan out by sibling index.
    pub fn fan_out(&self) -> bool {
        self.fan_out
    }

    /// Sets whether bends fan out by sibling index.
    pub fn with_fan_out(mut self, fan_out: bool) -> Self {
        self.fan_out = fan_out;
        self
    }

    /// Returns the self-loop pixel offset.
    pub fn loop_offset(&self) -> f32 {
        self.loop_offset
    }

    /// Returns the self-loop size proportion.
    pub fn loop_scale(&self) -> f32 {
        self.loop_scale
    }
}

/// Layout spacing and reflow animation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_spacing")]
    node_spacing: f32,

    #[serde(default = "default_spacing")]
    layer_spacing: f32,

    #[serde(default = "default_edge_spacing")]
    edge_spacing: f32,

    /// Duration of the reflow animation in milliseconds.
    #[serde(default = "default_transition_ms")]
    transition_ms: u64,

    #[serde(default = "default_viewport_width")]
    viewport_width: f32,

    #[serde(default = "default_viewport_height")]
    viewport_height: f32,

    /// Share of the viewport the fitted diagram may occupy.
    #[serde(default = "default_zoom_factor")]
    zoom_factor: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_spacing: default_spacing(),
            layer_spacing: default_spacing(),
            edge_spacing: default_edge_spacing(),
            transition_ms: default_transition_ms(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            zoom_factor: default_zoom_factor(),
        }
    }
}

impl LayoutConfig {
    /// Returns the spacing between sibling nodes.
    pub fn node_spacing(&self) -> f32 {
        self.node_spacing
    }

    /// Returns the spacing between layers.
    pub fn layer_spacing(&self) -> f32 {
        self.layer_spacing
    }

    /// Returns the spacing between parallel edges.
    pub fn edge_spacing(&self) -> f32 {
        self.edge_spacing
    }

    /// Returns the reflow animation duration in milliseconds.
    pub fn transition_ms(&self) -> u64 {
        self.transition_ms
    }

    /// Sets the reflow animation duration in milliseconds.
    pub fn with_transition_ms(mut self, transition_ms: u64) -> Self {
        self.transition_ms = transition_ms;
        self
    }

    /// Returns the viewport width in pixels.
    pub fn viewport_width(&self) -> f32 {
        self.viewport_width
    }

    /// Returns the viewport height in pixels.
    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    /// Returns the zoom factor used when fitting the diagram.
    pub fn zoom_factor(&self) -> f32 {
        self.zoom_factor
    }
}

fn default_bend_offset() -> f32 {
    20.0
}

fn default_loop_offset() -> f32 {
    65.0
}

fn default_loop_scale() -> f32 {
    0.65
}

fn default_spacing() -> f32 {
    180.0
}

fn default_edge_spacing() -> f32 {
    40.0
}

fn default_transition_ms() -> u64 {
    500
}

fn default_viewport_width() -> f32 {
    1280.0
}

fn default_viewport_height() -> f32 {
    720.0
}

fn default_zoom_factor() -> f32 {
    0.9
}
