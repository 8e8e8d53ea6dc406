//! Resource estimation: MACs, ROM and activation RAM of a lowered graph.
//!
//! Validation happens first and any failure aborts the run; a [`Report`] is
//! either complete or not produced at all. The MAC pass carries the shape
//! checks, so it completes before ROM and RAM, which then run side by side
//! on the rayon pool.

pub mod macs;
pub mod ram;
pub mod report;
pub mod rom;
pub mod validate;

pub use macs::{
    conv2d_macs, depthwise_conv2d_macs, estimate_macs, estimate_model_macs,
    fully_connected_macs, layer_macs, total_macs,
};
pub use ram::{estimate_ram, plan_ram, Liveness, RamPlan};
pub use report::{LayerReport, Report};
pub use rom::estimate_rom;

use crate::error::Result;
use crate::ir::Graph;
use crate::parse::{lower, ModelSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimateOptions {
    /// Run the estimators concurrently.
    pub parallel: bool,
    /// Reject graphs that are not a single sequential chain.
    pub check_topology: bool,
}

impl Default for EstimateOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            check_topology: true,
        }
    }
}

/// Validate, lower and estimate a model.
pub fn estimate_model(source: &dyn ModelSource, options: &EstimateOptions) -> Result<Report> {
    validate::check_structure(source)?;
    let graph = lower(source)?;
    log::info!(
        "Lowered {} tensors and {} layers",
        graph.tensors.len(),
        graph.layers.len()
    );
    estimate_graph(&graph, options)
}

/// Estimate an already lowered graph.
pub fn estimate_graph(graph: &Graph, options: &EstimateOptions) -> Result<Report> {
    validate::check_io(graph)?;
    validate::check_operators(graph)?;
    validate::check_sizes(graph)?;
    if options.check_topology {
        validate::check_topology(graph)?;
    } else {
        log::warn!("Topology check disabled, RAM figures assume the layer order is a valid schedule");
    }

    let macs = layer_macs(graph)?;
    let total = total_macs(&macs)?;

    let (rom_bytes, plan) = if options.parallel {
        rayon::join(
            || estimate_rom(&graph.tensors),
            || plan_ram(&graph.tensors, &graph.layers),
        )
    } else {
        (
            estimate_rom(&graph.tensors),
            plan_ram(&graph.tensors, &graph.layers),
        )
    };

    let layers = graph
        .layers
        .iter()
        .zip(&macs)
        .zip(&plan.live_bytes)
        .map(|((layer, &macs), &live_bytes)| LayerReport {
            index: layer.index,
            op: layer.op.to_string(),
            macs,
            live_bytes,
        })
        .collect();

    let report = Report {
        macs: total,
        rom_bytes,
        ram_best_bytes: plan.best_case,
        ram_worst_bytes: plan.worst_case,
        peak_layer: plan.peak_layer,
        layers,
    };
    log::info!(
        "Estimated {} MACs, {} ROM bytes, {}..{} RAM bytes",
        report.macs,
        report.rom_bytes,
        report.ram_best_bytes,
        report.ram_worst_bytes
    );
    Ok(report)
}
