use std::fmt::Write as _;

use admin_core::{render::species_label, DashboardStats, DisplayRow, PageInfo, ReportTally};
use shared::domain::Breed;

/// Lays rows out as a plain-text table.
pub fn render_table(rows: &[DisplayRow]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };

    let mut header: Vec<String> = vec!["ID".into(), "NAME".into(), "DETAIL".into()];
    header.extend(first.columns.iter().map(|(key, _)| key.to_uppercase()));
    header.extend(["STATUS".into(), "CREATED".into()]);

    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let mut cells = vec![row.id.clone(), row.title.clone(), row.subtitle.clone()];
            cells.extend(row.columns.iter().map(|(_, value)| value.clone()));
            cells.push(
                row.badges
                    .iter()
                    .map(|badge| badge.label.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            cells.push(format!("{} ({})", row.created, row.created_relative));
            cells
        })
        .collect();

    layout(&header, &body)
}

/// Breed catalogue table; retired breeds are marked instead of hidden.
pub fn render_breeds(breeds: &[Breed]) -> String {
    if breeds.is_empty() {
        return "No breeds configured.\n".to_string();
    }

    let header: Vec<String> = ["ID", "NAME", "SPECIES", "ACTIVE"]
        .into_iter()
        .map(String::from)
        .collect();
    let body: Vec<Vec<String>> = breeds
        .iter()
        .map(|breed| {
            vec![
                breed.id.to_string(),
                breed.name.clone().unwrap_or_default(),
                species_label(breed.species.as_deref()),
                if breed.is_active() { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();

    layout(&header, &body)
}

/// Column widths follow the widest cell, header included.
fn layout(header: &[String], body: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|cell| cell.chars().count()).collect();
    for cells in body {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    write_line(&mut out, header, &widths);
    for cells in body {
        write_line(&mut out, cells, &widths);
    }
    out
}

fn write_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "{}", line.trim_end());
}

pub fn render_footer(info: &PageInfo) -> String {
    if info.total_items == 0 {
        return String::new();
    }
    let mut footer = format!(
        "Showing {}-{} of {} (page {}/{})",
        info.first, info.last, info.total_items, info.page, info.total_pages
    );
    if info.has_prev {
        footer.push_str(&format!("  prev: --page {}", info.page - 1));
    }
    if info.has_next {
        footer.push_str(&format!("  next: --page {}", info.page + 1));
    }
    footer
}

/// Table plus footer, or the empty-state line when nothing matches.
pub fn render_list(noun: &str, rows: &[DisplayRow], info: &PageInfo) -> String {
    if info.total_items == 0 {
        return format!("No {noun} match the current filters.\n");
    }
    format!("{}{}\n", render_table(rows), render_footer(info))
}

pub fn render_stats(stats: &DashboardStats) -> String {
    let cards = stats.cards();
    let width = cards
        .iter()
        .map(|(label, _)| label.len())
        .max()
        .unwrap_or_default();
    let mut out = String::new();
    for (label, value) in cards {
        let _ = writeln!(out, "{label:<width$}  {value}");
    }
    out
}

pub fn render_tally(tally: &ReportTally) -> String {
    format!(
        "pending: {}  resolved: {}  dismissed: {}",
        tally.pending, tally.resolved, tally.dismissed
    )
}

#[cfg(test)]
#[path = "tests/output_tests.rs"]
mod tests;
