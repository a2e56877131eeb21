//! FFmpeg command builder.

use std::path::{Path, PathBuf};

use crate::composition::CompositionPlan;

/// Builder for FFmpeg command lines with several inputs.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in graph order
    inputs: Vec<String>,
    output: PathBuf,
    filter_complex: Option<String>,
    maps: Vec<String>,
    /// Codec and container arguments, after the mappings
    output_args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            filter_complex: None,
            maps: Vec::new(),
            output_args: Vec::new(),
        }
    }

    /// Add an input. Inputs are numbered in the order they are added.
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    /// Add a local file input.
    pub fn input_path(self, path: impl AsRef<Path>) -> Self {
        let input = path.as_ref().to_string_lossy().into_owned();
        self.input(input)
    }

    pub fn filter_complex(mut self, graph: impl Into<String>) -> Self {
        self.filter_complex = Some(graph.into());
        self
    }

    /// Apply a composition plan: its graph plus a mapping of its output.
    pub fn composition(self, plan: &CompositionPlan) -> Self {
        self.filter_complex(plan.to_filter_complex())
            .map(plan.output_map())
    }

    /// Add a `-map` selector.
    pub fn map(mut self, selector: impl Into<String>) -> Self {
        self.maps.push(selector.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments. Existing output files are overwritten.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string()];

        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.clone());
        }

        if let Some(graph) = &self.filter_complex {
            args.push("-filter_complex".to_string());
            args.push(graph.clone());
        }

        for selector in &self.maps {
            args.push("-map".to_string());
            args.push(selector.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());

        args
    }
}
