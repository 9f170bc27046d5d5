//! Scenario inspection: sizes, sparsity and connectivity, no solving.

use crate::scenario_file::load_scenario;
use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use tabwriter::TabWriter;

#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub name: String,
    pub regions: usize,
    pub nodes: usize,
    pub edges: usize,
    pub goods: usize,
    pub variables: usize,
    pub constraints: usize,
    pub jacobian_nnz: usize,
    pub hessian_nnz: usize,
    pub connected: bool,
    pub components: usize,
}

pub fn inspect(path: &Path) -> Result<InspectReport> {
    let file = load_scenario(path)?;
    let problem = file.problem()?;
    let topology = problem.topology();

    Ok(InspectReport {
        name: file.display_name(path),
        regions: topology.region_count(),
        nodes: topology.node_count(),
        edges: topology.edge_count(),
        goods: problem.params().n_goods(),
        variables: problem.n_var(),
        constraints: problem.n_con(),
        jacobian_nnz: problem.jacobian_pattern().nnz(),
        hessian_nnz: problem.hessian_pattern().nnz(),
        connected: topology.is_connected(),
        components: topology.component_count(),
    })
}

pub fn handle(path: &Path, json: bool) -> Result<()> {
    let report = inspect(path)?;
    if !report.connected {
        tracing::warn!(
            components = report.components,
            "topology is not connected; components trade in autarky"
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "Scenario\t{}", report.name)?;
    writeln!(writer, "Regions\t{}", report.regions)?;
    writeln!(writer, "Nodes\t{}", report.nodes)?;
    writeln!(writer, "Edges\t{}", report.edges)?;
    writeln!(writer, "Goods\t{}", report.goods)?;
    writeln!(writer, "Variables\t{}", report.variables)?;
    writeln!(writer, "Constraints\t{}", report.constraints)?;
    writeln!(writer, "Jacobian nonzeros\t{}", report.jacobian_nnz)?;
    writeln!(writer, "Hessian nonzeros\t{}", report.hessian_nnz)?;
    writeln!(
        writer,
        "Connected\t{} ({} component{})",
        report.connected,
        report.components,
        if report.components == 1 { "" } else { "s" }
    )?;
    writer.flush()?;
    Ok(())
}
