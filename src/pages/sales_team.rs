//! Sales Team Performance page
//!
//! Mixes three inputs: the filtered table (KPIs, this-year/last-year chart),
//! the unfiltered table minus unassigned sales (salesperson summary, recent
//! sales) and the pre-computed forecast files.

use super::{require_columns, PageContext, PageOptions};
use crate::aggregate::{self, GroupValue, Reduction};
use crate::error::Result;
use crate::forecast::ForecastPoint;
use crate::kpi::{self, NOT_AVAILABLE};
use crate::pages::PageId;
use crate::table::{columns, EventTable};
use crate::view::{group_points, Chart, ChartKind, ChartPoint, Kpi, Notice, PageView, TableView};
use chrono::Datelike;
use std::collections::HashMap;
use tracing::{debug, warn};

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const RECENT_ACTUAL_WEEKS: usize = 8;
const UPCOMING_FORECAST_WEEKS: usize = 4;
const RECENT_SALES_ROWS: usize = 20;

/// One row of the salesperson summary
#[derive(Debug, Clone, PartialEq)]
pub struct SalespersonSummary {
    pub salesperson: String,
    pub total_sales: f64,
    pub number_of_sales: usize,
    pub average_sale: f64,
}

/// Totals per salesperson over all assigned sales, highest total first
pub fn salesperson_summary(source: &EventTable) -> Result<Vec<SalespersonSummary>> {
    let assigned = assigned_sales(source)?;
    let totals = aggregate::group_by(&assigned, columns::SALESPERSON, &Reduction::sum(columns::COST))?;
    let counts = lookup(aggregate::group_by(&assigned, columns::SALESPERSON, &Reduction::count(columns::COST))?);
    let means = lookup(aggregate::group_by(&assigned, columns::SALESPERSON, &Reduction::mean(columns::COST))?);

    Ok(totals
        .into_iter()
        .map(|g| SalespersonSummary {
            number_of_sales: counts.get(&g.key).copied().unwrap_or(0.0) as usize,
            average_sale: means.get(&g.key).copied().unwrap_or(0.0),
            salesperson: g.key,
            total_sales: g.value,
        })
        .collect())
}

fn lookup(groups: Vec<GroupValue>) -> HashMap<String, f64> {
    groups.into_iter().map(|g| (g.key, g.value)).collect()
}

fn assigned_sales(source: &EventTable) -> Result<EventTable> {
    aggregate::excluding(source, columns::SALESPERSON, NOT_AVAILABLE)
}

pub fn render(ctx: &PageContext<'_>, table: &EventTable, options: &PageOptions) -> Result<PageView> {
    let mut view = PageView::new(PageId::SalesTeam, table.height());
    view.push(kpis(ctx, table)?);

    if require_columns(&mut view, table, &[columns::DATE_OF_SALE, columns::COST]) {
        view.push(year_over_year(ctx, table, options)?);
    }

    if require_columns(&mut view, ctx.source, &[columns::SALESPERSON, columns::COST]) {
        let summary = salesperson_summary(ctx.source)?;
        push_summary(&mut view, ctx, &summary);
    }

    push_monthly_forecast(&mut view, ctx, options);
    push_weekly_forecast(&mut view, ctx);

    if ctx.source.has_column(columns::SALESPERSON) {
        let mut sales = assigned_sales(ctx.source)?;
        if let Some(name) = &options.recent_salesperson {
            sales = aggregate::equal_to(&sales, columns::SALESPERSON, name)?;
        }
        let recent = sales.most_recent(columns::TIMESTAMP, RECENT_SALES_ROWS)?.select_present(&[
            columns::TIMESTAMP,
            columns::PRODUCT_SOLD,
            columns::COST,
            columns::CUSTOMER_COUNTRY,
            columns::JOB_TYPE_REQUESTED,
        ])?;
        let mut preview = TableView::from_table("Filter Sales Forecast", &recent, RECENT_SALES_ROWS)?;
        preview.total_rows = sales.height();
        view.push(preview);
    }

    Ok(view)
}

fn kpis(ctx: &PageContext<'_>, table: &EventTable) -> Result<Vec<Kpi>> {
    let comparison = aggregate::period_comparison(table, columns::DATE_OF_SALE, columns::COST, ctx.today)?;
    let best = kpi::best_entity(&aggregate::group_by(
        table,
        columns::SALESPERSON,
        &Reduction::sum(columns::COST),
    )?);

    Ok(vec![
        Kpi::new("Year to Date Revenue", kpi::format_currency(comparison.current.sum))
            .with_delta(kpi::format_signed_percent(comparison.sum_percent_delta())),
        Kpi::new("Year to Date Number of Sales", kpi::format_count(comparison.current.count))
            .with_delta(format!("{:+}", comparison.count_delta())),
        Kpi::new("Best Salesperson", best.name),
        Kpi::new("Forecast Model Accuracy", format!("{:.2}%", ctx.config.forecast_accuracy)),
    ])
}

/// Current year against last year, month by month
fn year_over_year(ctx: &PageContext<'_>, table: &EventTable, options: &PageOptions) -> Result<Chart> {
    let scoped = match &options.product {
        Some(product) if table.has_column(columns::PRODUCT_SOLD) => {
            aggregate::equal_to(table, columns::PRODUCT_SOLD, product)?
        }
        _ => table.clone(),
    };
    let current_year = ctx.today.year();
    let last_year = current_year - 1;
    let this_year = aggregate::monthly_by_year(&scoped, columns::DATE_OF_SALE, columns::COST, current_year)?;
    let previous = aggregate::monthly_by_year(&scoped, columns::DATE_OF_SALE, columns::COST, last_year)?;
    let target = previous.iter().sum::<f64>() / previous.len() as f64;
    let elapsed = ctx.today.month() as usize;

    let points = |values: &[f64], visible: usize| -> Vec<ChartPoint> {
        MONTH_LABELS
            .iter()
            .zip(values)
            .enumerate()
            .map(|(i, (label, value))| ChartPoint {
                label: label.to_string(),
                value: (i < visible).then_some(*value),
            })
            .collect()
    };

    Ok(Chart::new(
        &format!("Monthly Sales: {} vs {}", current_year, last_year),
        ChartKind::Line,
    )
    .axes("Month", "Total Sales")
    .series(&format!("{} Sales", last_year), points(&previous, 12))
    .series(&format!("{} Sales", current_year), points(&this_year, elapsed))
    .reference("Sales Target (Last Year Avg)", target))
}

fn push_summary(view: &mut PageView, ctx: &PageContext<'_>, summary: &[SalespersonSummary]) {
    let totals: Vec<GroupValue> = summary
        .iter()
        .map(|s| GroupValue {
            key: s.salesperson.clone(),
            value: s.total_sales,
        })
        .collect();
    let mut chart = Chart::new("Total Sales by Salesperson", ChartKind::Bar)
        .axes("Salesperson", "Total Sales Amount")
        .series("Total Sales", group_points(&totals));
    if !summary.is_empty() {
        let mean_total = summary.iter().map(|s| s.total_sales).sum::<f64>() / summary.len() as f64;
        let target = mean_total * ctx.config.salesperson_target_uplift;
        chart = chart.reference(&format!("Sales Target ({})", kpi::format_currency(target.round())), target);
    }
    view.push(chart);

    view.push(TableView {
        title: "Salesperson Performance".to_string(),
        columns: vec![
            "salesperson".to_string(),
            "total_sales".to_string(),
            "number_of_sales".to_string(),
            "average_sale".to_string(),
        ],
        rows: summary
            .iter()
            .map(|s| {
                vec![
                    s.salesperson.clone(),
                    format!("{:.2}", s.total_sales),
                    s.number_of_sales.to_string(),
                    format!("{:.2}", s.average_sale),
                ]
            })
            .collect(),
        total_rows: summary.len(),
    });
}

fn forecast_points(points: &[ForecastPoint]) -> Vec<ChartPoint> {
    points
        .iter()
        .map(|p| ChartPoint {
            label: p.period_start.format("%Y-%m-%d").to_string(),
            value: Some(p.value),
        })
        .collect()
}

fn push_monthly_forecast(view: &mut PageView, ctx: &PageContext<'_>, options: &PageOptions) {
    let salesperson = options.forecast_salesperson.as_deref();
    let start = ctx.config.forecast_window_start;
    let end = ctx.config.forecast_window_end;
    let monthly = match ctx.forecasts.load_monthly(salesperson, start, end) {
        Ok(Some(monthly)) => monthly,
        Ok(None) => {
            view.push(Notice::warning(match salesperson {
                Some(_) => "Not enough data for this salesperson's forecast.",
                None => "Not enough data for overall forecast.",
            }));
            return;
        }
        Err(e) => {
            warn!("Monthly forecast unavailable: {}", e);
            view.push(Notice::error("Monthly forecast files could not be read."));
            return;
        }
    };

    let window = format!("{}-{}", start.format("%b"), end.format("%b %Y"));
    let mut chart = Chart::new(&format!("Monthly Sales: Actual vs Forecast ({})", window), ChartKind::Line)
        .axes("Month", "Sales")
        .series("Actual Sales", forecast_points(&monthly.actuals));
    if !monthly.forecast.is_empty() {
        chart = chart.series(&format!("Forecast ({})", window), forecast_points(&monthly.forecast));
    }
    view.push(chart);
}

fn push_weekly_forecast(view: &mut PageView, ctx: &PageContext<'_>) {
    let weekly = match ctx.forecasts.load_weekly(RECENT_ACTUAL_WEEKS, UPCOMING_FORECAST_WEEKS) {
        Ok(Some(weekly)) => weekly,
        Ok(None) => {
            view.push(Notice::info("Weekly forecast data not available."));
            return;
        }
        Err(e) => {
            warn!("Weekly forecast unavailable: {}", e);
            view.push(Notice::error("Weekly forecast files could not be read."));
            return;
        }
    };
    debug!(
        "Weekly forecast: {} actual weeks, {} upcoming",
        weekly.recent_actuals.len(),
        weekly.upcoming.len()
    );

    view.push(
        Chart::new("Weekly Sales Forecast (Next 4 Weeks)", ChartKind::Line)
            .axes("Week", "Sales")
            .series("Actual", forecast_points(&weekly.recent_actuals))
            .series("Forecast", forecast_points(&weekly.upcoming)),
    );
    view.push(TableView {
        title: "Upcoming 4 Weeks Forecast".to_string(),
        columns: vec!["Week".to_string(), "Forecast Sales".to_string()],
        rows: weekly
            .upcoming
            .iter()
            .map(|p| vec![p.period.clone(), format!("{:.2}", p.value)])
            .collect(),
        total_rows: weekly.upcoming.len(),
    });
    if let Some(next) = weekly.next_week() {
        view.push(vec![Kpi::new("Next Week Forecast", kpi::format_currency(next.value))]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_csv_str, LoadOptions};

    #[test]
    fn test_salesperson_summary_skips_unassigned() {
        let csv = "\
customer_country,salesperson,cost
US,Alice,100
US,Bob,50
UK,Alice,300
UK,N/A,999
DE,Bob,
";
        let table = load_csv_str(csv, &LoadOptions::default()).unwrap();
        let summary = salesperson_summary(&table).unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(
            summary[0],
            SalespersonSummary {
                salesperson: "Alice".into(),
                total_sales: 400.0,
                number_of_sales: 2,
                average_sale: 200.0,
            }
        );
        assert_eq!(summary[1].salesperson, "Bob");
        assert_eq!(summary[1].number_of_sales, 1);
    }
}
