//! Overview page: headline KPIs, distribution charts, map and raw data

use super::{push_map, require_columns, PageContext, PageOptions};
use crate::aggregate::{self, Reduction};
use crate::error::Result;
use crate::kpi::{self, NOT_AVAILABLE};
use crate::pages::PageId;
use crate::table::{columns, EventTable};
use crate::time::PeriodWindow;
use crate::view::{bucket_points, group_points, Chart, ChartKind, Kpi, PageView, TableView};

pub async fn render(ctx: &PageContext<'_>, table: &EventTable, options: &PageOptions) -> Result<PageView> {
    let mut view = PageView::new(PageId::Overview, table.height());
    view.push(kpis(ctx, table)?);

    if require_columns(&mut view, table, &[columns::DATE_OF_SALE, columns::COST]) {
        let monthly = aggregate::monthly(table, columns::DATE_OF_SALE, &Reduction::sum(columns::COST))?;
        view.push(
            Chart::new("Monthly Sales Over Time", ChartKind::Line)
                .axes("Month", "Revenue")
                .series("Revenue", bucket_points(&monthly)),
        );
    }

    let by_country = aggregate::value_counts(table, columns::CUSTOMER_COUNTRY)?;
    view.push(
        Chart::new("Customer Country Distribution", ChartKind::Bar)
            .axes("Country", "Interactions")
            .series("Interactions", group_points(&by_country)),
    );

    if require_columns(&mut view, table, &[columns::CUSTOMER_INTERACTION]) {
        let top = aggregate::top_n(aggregate::value_counts(table, columns::CUSTOMER_INTERACTION)?, 5);
        view.push(
            Chart::new("Top 5 Customer Interaction Types", ChartKind::Bar)
                .axes("Interaction Type", "Count")
                .series("Interactions", group_points(&top)),
        );
    }

    if require_columns(&mut view, table, &[columns::PRODUCT_SOLD]) {
        let products = aggregate::value_counts(table, columns::PRODUCT_SOLD)?;
        view.push(Chart::new("Product Popularity", ChartKind::Pie).series("Products", group_points(&products)));
    }

    if require_columns(&mut view, table, &[columns::SALESPERSON, columns::COST]) {
        let by_salesperson = aggregate::group_by(table, columns::SALESPERSON, &Reduction::sum(columns::COST))?;
        view.push(
            Chart::new("Sales Distribution by Salesperson", ChartKind::Bar)
                .axes("Salesperson", "Revenue")
                .series("Revenue", group_points(&by_salesperson)),
        );
    }

    push_map(&mut view, "Customer Locations Map", &by_country, ctx.geocoder).await;
    view.push(TableView::from_table("Raw Data", table, ctx.preview_rows(options))?);
    Ok(view)
}

fn kpis(ctx: &PageContext<'_>, table: &EventTable) -> Result<Vec<Kpi>> {
    let total = kpi::total_sum(table, columns::COST)?;
    let vs_target = kpi::delta_vs_target(total, ctx.config.sales_target);

    let current = aggregate::within_window(table, columns::DATE_OF_SALE, &PeriodWindow::year_to_date(ctx.today))?;
    let prior = aggregate::within_window(
        table,
        columns::DATE_OF_SALE,
        &PeriodWindow::prior_year_to_date(ctx.today),
    )?;
    let interactions_delta = kpi::percent_delta(current.height() as f64, prior.height() as f64);
    let current_customers = kpi::unique_count(&current, columns::IP_ADDRESS)?;
    let prior_customers = kpi::unique_count(&prior, columns::IP_ADDRESS)?;
    let customers_delta = kpi::percent_delta(current_customers as f64, prior_customers as f64);

    let products = aggregate::group_by(table, columns::PRODUCT_SOLD, &Reduction::sum(columns::COST))?;
    let best = kpi::best_entity(&products);
    let best_delta = match (best.is_available(), best.lead_over_next()) {
        (false, _) => NOT_AVAILABLE.to_string(),
        (true, Some(lead)) => format!("{} vs Next", kpi::format_signed_percent(lead)),
        (true, None) => "Top Product".to_string(),
    };

    Ok(vec![
        Kpi::new("Total Revenue", kpi::format_currency(total))
            .with_delta(format!("{} vs Target", kpi::format_signed_percent(vs_target))),
        Kpi::new("YTD Interactions", kpi::format_count(current.height()))
            .with_delta(format!("{} vs LY", kpi::format_signed_percent(interactions_delta))),
        Kpi::new("YTD Unique Customers", kpi::format_count(current_customers))
            .with_delta(format!("{} vs LY", kpi::format_signed_percent(customers_delta))),
        Kpi::new(
            "Unique Countries",
            kpi::format_count(kpi::unique_count(table, columns::CUSTOMER_COUNTRY)?),
        ),
        Kpi::new("Best Performing Product", best.name).with_delta(best_delta),
    ])
}
