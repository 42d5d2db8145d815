//! Read-only inspection commands: validate, show, specs.

use std::path::Path;

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::json;

use spindle_types::config::SerializerConfig;
use spindle_types::graph::{SpecRepair, WorkflowSpec};
use spindle_types::task::Task;
use spindle_types::tree::TreeBuilder;
use spindle_types::workflow::Workflow;

use super::read_workflow;

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

pub fn validate(file: &Path, config: &SerializerConfig, json: bool) -> Result<()> {
    let workflow = read_workflow(file, config)?;
    let spec = &workflow.spec;
    let edges = spec.check_edges();
    let unreachable = spec.unreachable();
    let flagged = spec.repairs().iter().filter(|r| r.is_flagged()).count();

    if json {
        let out = json!({
            "file": file.display().to_string(),
            "spec": spec.name,
            "tasks": workflow.task_tree.count(),
            "task_specs": spec.named_len(),
            "repairs": spec.repairs().iter().map(describe_repair).collect::<Vec<_>>(),
            "flagged_repairs": flagged,
            "edges_consistent": edges.is_ok(),
            "unreachable": unreachable,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} '{}' from {}",
            style("Workflow").bold(),
            style(&spec.name).cyan(),
            file.display()
        );
        println!(
            "  {} tasks, {} task specs",
            workflow.task_tree.count(),
            spec.named_len()
        );
        if spec.repairs().is_empty() {
            println!("  {} No repairs needed", style("✓").green());
        } else {
            println!("  {} {} repair(s) applied:", style("!").yellow(), spec.repairs().len());
            for repair in spec.repairs() {
                let marker = if repair.is_flagged() {
                    style("flagged").red().to_string()
                } else {
                    style("ok").dim().to_string()
                };
                println!("      [{marker}] {}", describe_repair(repair));
            }
        }
        match &edges {
            Ok(()) => println!("  {} Edges consistent", style("✓").green()),
            Err(e) => println!("  {} {e}", style("✗").red()),
        }
        if !unreachable.is_empty() {
            println!(
                "  {} Unreachable from Start: {}",
                style("!").yellow(),
                unreachable.join(", ")
            );
        }
        println!();
    }

    if let Err(e) = edges {
        bail!("{} failed validation: {e}", file.display());
    }
    Ok(())
}

fn describe_repair(repair: &SpecRepair) -> String {
    match repair {
        SpecRepair::SuffixedClone { name, template } => {
            format!("cloned '{template}' as '{name}'")
        }
        SpecRepair::RuntimeFanOut { name, id, runtimes } => {
            let id = id.as_ref().map(|id| id.to_string()).unwrap_or_default();
            format!("fan-out clone of '{name}' (id {id}) for {runtimes} runtimes")
        }
        SpecRepair::GatewayClone { name, bare } => {
            format!("gateway clone of '{bare}' as '{name}' without edges")
        }
    }
}

// ---------------------------------------------------------------------------
// Show
// ---------------------------------------------------------------------------

pub fn show(file: &Path, config: &SerializerConfig, json: bool) -> Result<()> {
    let workflow = read_workflow(file, config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tree_json(&workflow.spec, &workflow.task_tree))?);
    } else {
        println!();
        for line in render_tree(&workflow) {
            println!("  {line}");
        }
        println!();
    }
    Ok(())
}

fn tree_json(spec: &WorkflowSpec, root: &Task) -> serde_json::Value {
    let mut builder = TreeBuilder::new();
    let mut stack = vec![(root, None)];
    while let Some((task, parent)) = stack.pop() {
        let node = json!({
            "id": task.id.to_string(),
            "spec": spec[task.task_spec].name,
            "state": task.state.to_string(),
        });
        let index = builder.push(node, parent);
        stack.extend(task.children.iter().rev().map(|child| (child, Some(index))));
    }
    builder
        .finish(|node, children| node["children"] = serde_json::Value::Array(children))
        .unwrap_or_default()
}

/// One line per task, indented by depth: `<spec> [<state>] <id>`. The last
/// acted-upon task is marked with `*`.
pub fn render_tree(workflow: &Workflow) -> Vec<String> {
    let mut lines = Vec::new();
    let mut stack = vec![(&workflow.task_tree, 0)];
    while let Some((task, depth)) = stack.pop() {
        let marker = if workflow.last_task == Some(task.id) { " *" } else { "" };
        lines.push(format!(
            "{}{} [{}] {}{marker}",
            "  ".repeat(depth),
            workflow.spec_of(task).name,
            task.state,
            task.id
        ));
        stack.extend(task.children.iter().rev().map(|child| (child, depth + 1)));
    }
    lines
}

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

pub fn specs(file: &Path, config: &SerializerConfig, json: bool) -> Result<()> {
    let workflow = read_workflow(file, config)?;
    let spec = &workflow.spec;

    if json {
        let out: Vec<_> = spec
            .named()
            .map(|(name, handle)| {
                let node = &spec[handle];
                json!({
                    "name": name,
                    "class": node.class_name(),
                    "inputs": spec.names_of(&node.inputs).collect::<Vec<_>>(),
                    "outputs": spec.names_of(&node.outputs).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Class").fg(Color::White),
        Cell::new("Inputs").fg(Color::White),
        Cell::new("Outputs").fg(Color::White),
    ]);
    for (name, handle) in spec.named() {
        let node = &spec[handle];
        table.add_row(vec![
            Cell::new(name).fg(Color::Cyan),
            Cell::new(node.class_name()),
            Cell::new(spec.names_of(&node.inputs).collect::<Vec<_>>().join(", ")).fg(Color::DarkGrey),
            Cell::new(spec.names_of(&node.outputs).collect::<Vec<_>>().join(", ")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!(
        "  Task specs for '{}' ({} entries)",
        style(&spec.name).cyan(),
        spec.named_len()
    );
    println!();
    println!("{table}");
    println!();
    Ok(())
}
