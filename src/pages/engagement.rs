//! Customer Engagement page

use super::{require_columns, PageContext, PageOptions};
use crate::aggregate::{self, Reduction};
use crate::error::Result;
use crate::kpi;
use crate::pages::PageId;
use crate::table::{columns, EventTable};
use crate::view::{bucket_points, group_points, Chart, ChartKind, Kpi, PageView, TableView};

const TOP_COUNTRIES: usize = 10;

pub fn render(ctx: &PageContext<'_>, table: &EventTable, options: &PageOptions) -> Result<PageView> {
    let mut view = PageView::new(PageId::CustomerEngagement, table.height());
    view.push(vec![
        Kpi::new("Total Engagements", kpi::format_count(table.height())),
        Kpi::new(
            "Unique Customers",
            kpi::format_count(kpi::unique_count(table, columns::IP_ADDRESS)?),
        ),
        Kpi::new(
            "Engagement Types",
            kpi::format_count(kpi::unique_count(table, columns::CUSTOMER_INTERACTION)?),
        ),
    ]);

    if require_columns(&mut view, table, &[columns::DATE_OF_SALE, columns::CUSTOMER_INTERACTION]) {
        let per_month = aggregate::monthly(
            table,
            columns::DATE_OF_SALE,
            &Reduction::count(columns::CUSTOMER_INTERACTION),
        )?;
        view.push(
            Chart::new("Engagements Over Time", ChartKind::Line)
                .axes("Month", "Number of Engagements")
                .series("Engagements", bucket_points(&per_month)),
        );
        let by_type = aggregate::value_counts(table, columns::CUSTOMER_INTERACTION)?;
        view.push(Chart::new("Engagement by Type", ChartKind::Donut).series("Engagements", group_points(&by_type)));
    }

    let top_countries = aggregate::top_n(aggregate::value_counts(table, columns::CUSTOMER_COUNTRY)?, TOP_COUNTRIES);
    view.push(
        Chart::new("Top Countries by Engagement", ChartKind::HorizontalBar)
            .axes("Number of Engagements", "Country")
            .series("Engagements", group_points(&top_countries)),
    );

    if require_columns(&mut view, table, &[columns::PRODUCT_SOLD, columns::CUSTOMER_INTERACTION]) {
        let by_product = aggregate::group_by(
            table,
            columns::PRODUCT_SOLD,
            &Reduction::count(columns::CUSTOMER_INTERACTION),
        )?;
        view.push(
            Chart::new("Engagement by Product", ChartKind::Bar)
                .axes("Product", "Number of Engagements")
                .series("Engagements", group_points(&by_product)),
        );
    }

    // Optional in older exports; skipped silently
    if table.has_column(columns::JOB_TYPE_REQUESTED) {
        let by_job = aggregate::value_counts(table, columns::JOB_TYPE_REQUESTED)?;
        view.push(
            Chart::new("Engagement by Job Type", ChartKind::Bar)
                .axes("Job Type", "Number of Engagements")
                .series("Engagements", group_points(&by_job)),
        );
    }

    view.push(TableView::from_table("Raw Engagement Data", table, ctx.preview_rows(options))?);
    Ok(view)
}
