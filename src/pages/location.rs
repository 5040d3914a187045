//! Location Analysis page

use super::{push_map, require_columns, PageContext, PageOptions};
use crate::aggregate::{self, Reduction};
use crate::error::Result;
use crate::kpi;
use crate::pages::PageId;
use crate::table::{columns, EventTable};
use crate::view::{group_points, Chart, ChartKind, Kpi, Notice, PageView, TableView};

pub async fn render(ctx: &PageContext<'_>, table: &EventTable, options: &PageOptions) -> Result<PageView> {
    let mut view = PageView::new(PageId::Location, table.height());
    view.push(vec![
        Kpi::new("Total Revenue", kpi::format_currency(kpi::total_sum(table, columns::COST)?)),
        Kpi::new(
            "Countries",
            kpi::format_count(kpi::unique_count(table, columns::CUSTOMER_COUNTRY)?),
        ),
        Kpi::new("Total Transactions", kpi::format_count(table.height())),
    ]);

    let revenue = aggregate::group_by(table, columns::CUSTOMER_COUNTRY, &Reduction::sum(columns::COST))?;
    view.push(
        Chart::new("Revenue by Country", ChartKind::HorizontalBar)
            .axes("Revenue", "Country")
            .series("Revenue", group_points(&revenue)),
    );

    let engagements = aggregate::value_counts(table, columns::CUSTOMER_COUNTRY)?;
    view.push(
        Chart::new("Engagements by Country", ChartKind::HorizontalBar)
            .axes("Number of Engagements", "Country")
            .series("Engagements", group_points(&engagements)),
    );

    // Defaults to the top-revenue country
    let focus = options
        .focus_country
        .clone()
        .or_else(|| revenue.first().map(|g| g.key.clone()));
    if let Some(country) = focus {
        if require_columns(&mut view, table, &[columns::PRODUCT_SOLD]) {
            let in_country = aggregate::equal_to(table, columns::CUSTOMER_COUNTRY, &country)?;
            let products = aggregate::value_counts(&in_country, columns::PRODUCT_SOLD)?;
            if products.is_empty() {
                view.push(Notice::info("No product data available for this country."));
            } else {
                view.push(
                    Chart::new(&format!("Top Products in {}", country), ChartKind::Bar)
                        .axes("Product", "Count")
                        .series("Products", group_points(&products)),
                );
            }
        }
    }

    push_map(&mut view, "Customer Locations Map", &engagements, ctx.geocoder).await;
    view.push(TableView::from_table("Raw Location Data", table, ctx.preview_rows(options))?);
    Ok(view)
}
