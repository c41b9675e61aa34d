use std::io::Write;

use anyhow::Result;

use crate::{
    classify::{is_konflux_nudge, is_on_hold, status_icon},
    enrich::{EnrichedPr, MergeFlag},
    sort::Sortable,
    text::{Style, format_pr_link, pad, terminal_columns, title_width_for, truncate},
    types::Repo,
};

const COLUMN_SEPARATOR: &str = " ";

const STATUS_ICON_WIDTH: usize = 2;
const PR_WIDTH: usize = 6;
const AUTHOR_WIDTH: usize = 16;
const BRANCH_WIDTH: usize = 14;
const TARGET_WIDTH: usize = 12;
const STATE_WIDTH: usize = 10;
const REVIEWED_WIDTH: usize = 8;
const REBASE_WIDTH: usize = 6;
const BLOCKED_WIDTH: usize = 7;
const NUDGE_WIDTH: usize = 5;
const TEKTON_WIDTH: usize = 6;

const ICON_YES: &str = "✅";
const ICON_NO: &str = "❌";
const ICON_REBASE: &str = "🔄";
const ICON_BLOCKED: &str = "🚫";
const ICON_NUDGE: &str = "👉";
const ICON_MIGRATION: &str = "🚨";
const NOT_APPLICABLE: &str = "-";

/// Column headers and widths; TITLE is sized at render time.
fn columns(title_width: usize, konflux: bool) -> Vec<(&'static str, usize)> {
    let mut columns = vec![
        ("ST", STATUS_ICON_WIDTH),
        ("PR", PR_WIDTH),
        ("TITLE", title_width),
        ("AUTHOR", AUTHOR_WIDTH),
        ("BRANCH", BRANCH_WIDTH),
        ("TARGET", TARGET_WIDTH),
        ("STATUS", STATE_WIDTH),
        ("REVIEWED", REVIEWED_WIDTH),
        ("REBASE", REBASE_WIDTH),
        ("BLOCKED", BLOCKED_WIDTH),
        ("NUDGE", NUDGE_WIDTH),
    ];
    if konflux {
        columns.push(("TEKTON", TEKTON_WIDTH));
    }
    columns
}

/// Width of every column except TITLE, separators included.
fn fixed_width(konflux: bool) -> usize {
    let columns = columns(0, konflux);
    columns.iter().map(|(_, width)| width).sum::<usize>()
        + COLUMN_SEPARATOR.len() * (columns.len() - 1)
}

/// TITLE width for the current terminal, or the default when stdout is
/// not a terminal.
pub fn title_width(konflux: bool) -> usize {
    title_width_for(terminal_columns(), fixed_width(konflux))
}

pub fn write_legend<W: Write>(konflux: bool, writer: &mut W) -> Result<()> {
    writeln!(writer, "Legend:")?;
    writeln!(
        writer,
        "  Status: 🟢 open  🟡 draft  🔶 on hold  🔴 closed  🟣 merged"
    )?;
    writeln!(writer, "  Reviewed: ✅ approved  ❌ not approved")?;
    writeln!(
        writer,
        "  Rebase: 🔄 needs rebase  - N/A (on hold)  (empty = up to date)"
    )?;
    writeln!(
        writer,
        "  Blocked: 🚫 blocked from merging  - N/A (on hold)  (empty = not blocked)"
    )?;
    writeln!(writer, "  Nudge: 👉 konflux nudge PR  (empty = not a nudge)")?;
    if konflux {
        writeln!(
            writer,
            "  Tekton: ✅ exclusively Tekton files  ❌ mixed/other files"
        )?;
        writeln!(writer, "  🚨 = migration warning")?;
    }
    writeln!(writer)?;
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { ICON_YES } else { ICON_NO }
}

fn merge_flag_cell(flag: MergeFlag, icon: &str) -> String {
    match flag {
        MergeFlag::NotApplicable => NOT_APPLICABLE.to_string(),
        MergeFlag::Known(true) => icon.to_string(),
        MergeFlag::Known(false) | MergeFlag::Unknown => String::new(),
    }
}

fn state_text(item: &EnrichedPr) -> String {
    let pr = item.pr();
    let mut state = if pr.draft {
        "draft".to_string()
    } else if is_on_hold(pr) {
        "on hold".to_string()
    } else {
        pr.state.clone()
    };
    if item.migration {
        state.push(' ');
        state.push_str(ICON_MIGRATION);
    }
    state
}

fn row_cells(
    item: &EnrichedPr,
    repo: &Repo,
    title_width: usize,
    konflux: bool,
    style: Style,
) -> Vec<String> {
    let pr = item.pr();
    let mut cells = vec![
        status_icon(pr).to_string(),
        format_pr_link(&repo.pull_url(pr.number), pr.number, style),
        truncate(&pr.title, title_width),
        truncate(&pr.user.login, AUTHOR_WIDTH),
        truncate(&pr.head.ref_name, BRANCH_WIDTH),
        truncate(&pr.base.ref_name, TARGET_WIDTH),
        truncate(&state_text(item), STATE_WIDTH),
        yes_no(item.reviewed).to_string(),
        merge_flag_cell(item.needs_rebase, ICON_REBASE),
        merge_flag_cell(item.blocked, ICON_BLOCKED),
        is_konflux_nudge(pr)
            .then_some(ICON_NUDGE)
            .unwrap_or_default()
            .to_string(),
    ];
    if konflux {
        cells.push(yes_no(item.tekton_exclusive()).to_string());
    }
    cells
}

fn write_cells<W: Write>(
    cells: &[String],
    columns: &[(&str, usize)],
    writer: &mut W,
) -> Result<()> {
    let line = cells
        .iter()
        .zip(columns)
        .map(|(cell, (_, width))| pad(cell, *width))
        .collect::<Vec<_>>()
        .join(COLUMN_SEPARATOR);
    writeln!(writer, "{line}")?;
    Ok(())
}

/// Legend, header, separator and one row per PR. Writes nothing for an
/// empty list.
pub fn write_table<W: Write>(
    items: &[EnrichedPr],
    repo: &Repo,
    konflux: bool,
    style: Style,
    title_width: usize,
    writer: &mut W,
) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    write_legend(konflux, writer)?;

    let columns = columns(title_width, konflux);
    let headers: Vec<String> = columns.iter().map(|(name, _)| name.to_string()).collect();
    write_cells(&headers, &columns, writer)?;
    let separators: Vec<String> = columns.iter().map(|(_, width)| "-".repeat(*width)).collect();
    write_cells(&separators, &columns, writer)?;

    for item in items {
        let cells = row_cells(item, repo, title_width, konflux, style);
        write_cells(&cells, &columns, writer)?;
    }
    Ok(())
}
