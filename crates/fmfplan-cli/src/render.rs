//! Text rendering of resolved plans and discovered tests.

use std::fmt::Write as _;

use fmfplan_core::{ResolvedPlan, TestMeta};

/// Render a resolved plan for terminal output.
///
/// # Panics
///
/// Panics if formatting into the output `String` fails, which only
/// happens when a `Display` impl reports an error.
pub fn plan_text(plan: &ResolvedPlan, show_skipped: bool) -> String {
    let mut out = String::new();
    write_plan(&mut out, plan, show_skipped).expect("writing to a String cannot fail");
    out
}

fn write_plan(out: &mut String, plan: &ResolvedPlan, show_skipped: bool) -> std::fmt::Result {
    writeln!(out, "{}", plan.name)?;
    if let Some(summary) = &plan.summary {
        writeln!(out, "  summary:   {summary}")?;
    }
    writeln!(out, "  enabled:   {}", if plan.enabled { "yes" } else { "no" })?;

    writeln!(out, "  discover:  {}", plan.discover.how)?;
    for filter in &plan.discover.filters {
        writeln!(out, "    filter:  {filter}")?;
    }
    for test in &plan.discover.tests {
        writeln!(out, "    test:    {test}")?;
    }
    writeln!(out, "  execute:   {}", plan.execute.how)?;

    if plan.prepare.is_empty() {
        writeln!(out, "  prepare:   (none)")?;
    } else {
        writeln!(out, "  prepare:")?;
        for (index, step) in plan.prepare.iter().enumerate() {
            writeln!(out, "    {}. {} ({})", index + 1, step.name, step.how())?;
            for item in step.items() {
                writeln!(out, "         {item}")?;
            }
        }
    }

    if !plan.environment.is_empty() {
        writeln!(out, "  environment:")?;
        for (key, value) in &plan.environment {
            writeln!(out, "    {key}={value}")?;
        }
    }

    if !plan.adjustments.is_empty() {
        writeln!(out, "  adjusted:")?;
        for applied in &plan.adjustments {
            match &applied.because {
                Some(because) => writeln!(out, "    - when {} ({because})", applied.when)?,
                None => writeln!(out, "    - when {}", applied.when)?,
            }
        }
    }

    if !plan.skipped.is_empty() {
        if show_skipped {
            writeln!(out, "  skipped:")?;
            for skipped in &plan.skipped {
                writeln!(
                    out,
                    "    - {} ({}) when {}",
                    skipped.step.name,
                    skipped.step.how(),
                    skipped.when.join(" or ")
                )?;
            }
        } else {
            let noun = if plan.skipped.len() == 1 { "step" } else { "steps" };
            writeln!(
                out,
                "  skipped:   {} {noun} (use --show-skipped)",
                plan.skipped.len()
            )?;
        }
    }
    Ok(())
}

/// One line per plan: name, state and summary, in aligned columns.
pub fn plan_table(plans: &[&ResolvedPlan]) -> String {
    let name_w = plans.iter().map(|p| p.name.len()).max().unwrap_or(4).max(4);
    let mut out = String::new();
    for plan in plans {
        let state = if plan.enabled { "enabled" } else { "disabled" };
        let summary = plan.summary.as_deref().unwrap_or("");
        let line = format!("{:<name_w$}  {state:<8}  {summary}", plan.name);
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// One line per test: name and summary.
pub fn test_list(tests: &[&TestMeta]) -> String {
    let name_w = tests.iter().map(|t| t.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for test in tests {
        let line = format!(
            "{:<name_w$}  {}",
            test.name,
            test.summary.as_deref().unwrap_or("")
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
