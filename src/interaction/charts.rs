use std::collections::BTreeSet;

use crate::base::types::{ChartsData, Heatmap, ProjectData};

/// Bars (and heatmap rows) shown per assignee chart.
const TOP_ASSIGNEES: usize = 10;

/// Build the chart series for a project snapshot.
pub fn build_charts(data: &ProjectData) -> ChartsData {
    let metrics = &data.metrics;

    let by_type = vec![
        ("Epics".to_string(), data.epics.len()),
        ("Stories".to_string(), data.stories.len()),
        ("Tasks".to_string(), data.tasks.len()),
    ];

    let by_status = metrics.status_counts.iter().map(|(status, count)| (status.clone(), *count)).collect();

    let mut by_assignee = metrics.assignee_counts.iter().map(|(assignee, count)| (assignee.clone(), *count)).collect::<Vec<_>>();
    by_assignee.sort_by(|a, b| b.1.cmp(&a.1));
    by_assignee.truncate(TOP_ASSIGNEES);

    ChartsData {
        by_type,
        by_status,
        by_assignee,
        by_assignee_and_status: heatmap(data),
    }
}

/// Assignee x status grid: rows are the first assignees in sorted order,
/// columns are every status seen, missing cells are zero.
fn heatmap(data: &ProjectData) -> Heatmap {
    let matrix = &data.metrics.status_assignee_matrix;

    let statuses = matrix.values().flat_map(|row| row.keys().cloned()).collect::<BTreeSet<_>>().into_iter().collect::<Vec<_>>();
    let assignees = matrix.keys().take(TOP_ASSIGNEES).cloned().collect::<Vec<_>>();

    let counts = assignees
        .iter()
        .map(|assignee| {
            let row = &matrix[assignee];
            statuses.iter().map(|status| row.get(status).copied().unwrap_or(0)).collect()
        })
        .collect();

    Heatmap { assignees, statuses, counts }
}
