//! Jobs & Requests page

use super::{require_columns, AI_ASSISTANT_PATTERN, DEMO_OR_EVENT_PATTERN};
use crate::aggregate::{self, Reduction};
use crate::error::Result;
use crate::kpi::{self, NOT_AVAILABLE};
use crate::pages::PageId;
use crate::table::{columns, EventTable};
use crate::view::{bucket_points, group_points, Chart, ChartKind, Kpi, PageView, TableView};
use regex::Regex;

const RECENT_AI_REQUESTS: usize = 10;

pub fn render(table: &EventTable) -> Result<PageView> {
    let mut view = PageView::new(PageId::JobsAndRequests, table.height());
    view.push(vec![
        Kpi::new("Total Requests", kpi::format_count(table.height())),
        Kpi::new(
            "Unique Customers",
            kpi::format_count(kpi::unique_count(table, columns::IP_ADDRESS)?),
        ),
        Kpi::new(
            "Distinct Job Types Requested",
            kpi::format_count(kpi::unique_count(table, columns::JOB_TYPE_REQUESTED)?),
        ),
    ]);

    if require_columns(&mut view, table, &[columns::JOB_TYPE_REQUESTED]) {
        let requested = aggregate::excluding(table, columns::JOB_TYPE_REQUESTED, NOT_AVAILABLE)?;
        let job_counts = group_points(&aggregate::value_counts(&requested, columns::JOB_TYPE_REQUESTED)?);
        view.push(Chart::new("Distribution of Job Types Requested", ChartKind::Donut).series("Requests", job_counts.clone()));
        view.push(
            Chart::new("Job Types Requested", ChartKind::Bar)
                .axes("Job Type", "Number of Requests")
                .series("Requests", job_counts),
        );
    }

    if require_columns(&mut view, table, &[columns::TIMESTAMP]) {
        let per_month = aggregate::monthly(table, columns::TIMESTAMP, &Reduction::Rows)?;
        view.push(
            Chart::new("Monthly Requests Over Time", ChartKind::Line)
                .axes("Month", "Number of Requests")
                .series("Requests", bucket_points(&per_month)),
        );
    }

    if require_columns(&mut view, table, &[columns::CUSTOMER_INTERACTION]) {
        let demos = aggregate::matching(table, columns::CUSTOMER_INTERACTION, &Regex::new(DEMO_OR_EVENT_PATTERN)?)?;
        view.push(
            Chart::new("Scheduled Demos and Promotional Events Requests", ChartKind::Bar)
                .axes("Interaction Type", "Number of Requests")
                .series("Requests", group_points(&aggregate::value_counts(&demos, columns::CUSTOMER_INTERACTION)?)),
        );

        let ai_requests = aggregate::matching(table, columns::CUSTOMER_INTERACTION, &Regex::new(AI_ASSISTANT_PATTERN)?)?;
        view.push(vec![Kpi::new(
            "Total AI Assistant Requests",
            kpi::format_count(ai_requests.height()),
        )]);
        let recent = ai_requests
            .most_recent(columns::TIMESTAMP, RECENT_AI_REQUESTS)?
            .select_present(&[
                columns::TIMESTAMP,
                columns::IP_ADDRESS,
                columns::CUSTOMER_COUNTRY,
                columns::SALESPERSON,
            ])?;
        let mut preview = TableView::from_table("Requests for AI-powered Virtual Assistant", &recent, RECENT_AI_REQUESTS)?;
        preview.total_rows = ai_requests.height();
        view.push(preview);
    }

    Ok(view)
}
