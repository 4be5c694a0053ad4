//! CLI handlers for the plan commands.
//!
//! Implements:
//! - `fmfplan ls <tree>`                 -- list plans and whether they are enabled
//! - `fmfplan show <tree> <plan>`        -- print one resolved plan
//! - `fmfplan export <tree>`             -- JSON for every plan
//! - `fmfplan discover <tree> <plan>`    -- tests a plan selects from a test tree
//! - `fmfplan check <tree>`              -- load and validate a tree

use std::io::Write;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::Serialize;
use tracing::warn;

use fmfplan_core::{Context, PlanTree, ResolvedPlan, TestCatalog, TestMeta};

use crate::config::OutputFormat;
use crate::render;

fn load_tree(path: &Path) -> Result<PlanTree> {
    PlanTree::load(path).with_context(|| format!("failed to load plans from {}", path.display()))
}

fn resolve(tree: &PlanTree, plan: &str, context: &Context) -> Result<ResolvedPlan> {
    tree.resolve(plan, context)
        .with_context(|| format!("failed to resolve plan {plan}"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

// -----------------------------------------------------------------------
// fmfplan ls
// -----------------------------------------------------------------------

pub fn cmd_ls(tree_path: &Path, context: &Context, all: bool, format: OutputFormat) -> Result<()> {
    let tree = load_tree(tree_path)?;
    let plans = tree.resolve_all(context)?;
    let shown: Vec<&ResolvedPlan> = plans.iter().filter(|p| all || p.enabled).collect();

    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Entry<'a> {
                name: &'a str,
                enabled: bool,
                #[serde(skip_serializing_if = "Option::is_none")]
                summary: Option<&'a str>,
            }
            let entries: Vec<Entry<'_>> = shown
                .iter()
                .map(|p| Entry {
                    name: &p.name,
                    enabled: p.enabled,
                    summary: p.summary.as_deref(),
                })
                .collect();
            print_json(&entries)
        }
        OutputFormat::Text => {
            if shown.is_empty() {
                let hidden = plans.len();
                if hidden > 0 {
                    println!("No enabled plans ({hidden} disabled). Use --all to list them.");
                } else {
                    println!("No plans found.");
                }
                return Ok(());
            }
            print!("{}", render::plan_table(&shown));
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// fmfplan show
// -----------------------------------------------------------------------

pub fn cmd_show(
    tree_path: &Path,
    plan: &str,
    context: &Context,
    format: OutputFormat,
    show_skipped: bool,
) -> Result<()> {
    let tree = load_tree(tree_path)?;
    let resolved = resolve(&tree, plan, context)?;
    match format {
        OutputFormat::Json => print_json(&resolved),
        OutputFormat::Text => {
            print!("{}", render::plan_text(&resolved, show_skipped));
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// fmfplan export
// -----------------------------------------------------------------------

#[derive(Serialize)]
struct Export<'a> {
    origin: &'a str,
    context: &'a Context,
    plans: Vec<ExportedPlan>,
}

#[derive(Serialize)]
struct ExportedPlan {
    #[serde(flatten)]
    plan: ResolvedPlan,
    fingerprint: String,
}

pub fn cmd_export(tree_path: &Path, context: &Context, output: Option<&Path>) -> Result<()> {
    let tree = load_tree(tree_path)?;
    let plans: Vec<ExportedPlan> = tree
        .resolve_all(context)?
        .into_iter()
        .map(|plan| ExportedPlan {
            fingerprint: plan.fingerprint(),
            plan,
        })
        .collect();
    let count = plans.len();
    let export = Export {
        origin: tree.origin(),
        context,
        plans,
    };
    let json = serde_json::to_string_pretty(&export).context("failed to serialize export")?;

    let mut writer: Box<dyn Write> = if let Some(path) = output {
        Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("cannot create output file: {}", path.display()))?,
        )
    } else {
        Box::new(std::io::stdout().lock())
    };
    writeln!(writer, "{json}")?;

    if let Some(path) = output {
        println!("Exported {count} plans to {}", path.display());
    }
    Ok(())
}

// -----------------------------------------------------------------------
// fmfplan discover
// -----------------------------------------------------------------------

pub fn cmd_discover(
    tree_path: &Path,
    plan: &str,
    tests_path: &Path,
    context: &Context,
    format: OutputFormat,
) -> Result<()> {
    let tree = load_tree(tree_path)?;
    let resolved = resolve(&tree, plan, context)?;
    if !resolved.enabled {
        warn!(plan = %resolved.name, "plan is disabled in this context");
    }

    let catalog = TestCatalog::load(tests_path)
        .with_context(|| format!("failed to load tests from {}", tests_path.display()))?;
    let selected: Vec<&TestMeta> = catalog.select(&resolved);

    match format {
        OutputFormat::Json => print_json(&selected),
        OutputFormat::Text => {
            if selected.is_empty() {
                println!("No tests match plan {}.", resolved.name);
            } else {
                print!("{}", render::test_list(&selected));
            }
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// fmfplan check
// -----------------------------------------------------------------------

pub fn cmd_check(tree_path: &Path) -> Result<()> {
    let tree = load_tree(tree_path)?;
    let plans = tree.plans();
    println!("{}: {} plans OK", tree.origin(), plans.len());
    let dimensions: Vec<String> = tree.dimensions().into_iter().collect();
    if !dimensions.is_empty() {
        println!("Context dimensions used: {}", dimensions.join(", "));
    }
    Ok(())
}
