//! Aggregated estimation results and their renderings.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerReport {
    pub index: usize,
    pub op: String,
    pub macs: u64,
    /// Activation bytes resident while this layer executes.
    pub live_bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub macs: u64,
    pub rom_bytes: usize,
    pub ram_best_bytes: usize,
    pub ram_worst_bytes: usize,
    pub peak_layer: Option<usize>,
    pub layers: Vec<LayerReport>,
}

impl Report {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Same report without the per-layer breakdown.
    pub fn totals(&self) -> Report {
        Report {
            layers: Vec::new(),
            ..self.clone()
        }
    }

    /// One line per layer: index, operator, MACs and live activation bytes.
    pub fn layer_table(&self) -> String {
        let op_width = self
            .layers
            .iter()
            .map(|layer| layer.op.len())
            .max()
            .unwrap_or(0)
            .max("op".len());

        let mut out = format!(
            "{:>5}  {:<op_width$}  {:>12}  {:>10}\n",
            "layer", "op", "macs", "live_bytes"
        );
        for layer in &self.layers {
            let marker = if Some(layer.index) == self.peak_layer {
                "  <- peak"
            } else {
                ""
            };
            out.push_str(&format!(
                "{:>5}  {:<op_width$}  {:>12}  {:>10}{}\n",
                layer.index, layer.op, layer.macs, layer.live_bytes, marker
            ));
        }
        out
    }
}

/// Key/value lines: `ROM`, `RAM_BC`, `RAM_WC`, `MACS`.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ROM={}", self.rom_bytes)?;
        writeln!(f, "RAM_BC={}", self.ram_best_bytes)?;
        writeln!(f, "RAM_WC={}", self.ram_worst_bytes)?;
        write!(f, "MACS={}", self.macs)
    }
}

/// Write `contents` to `path`, newline terminated.
pub fn write_to(path: &Path, contents: &str) -> Result<()> {
    let mut text = contents.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    fs::write(path, text).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}
