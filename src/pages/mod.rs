//! Dashboard pages
//!
//! Each page is a pure function of the filtered event table plus a few page
//! options. `render_page` applies the sidebar filters and dispatches.

pub mod engagement;
pub mod jobs;
pub mod location;
pub mod overview;
pub mod sales_team;

use crate::aggregate::GroupValue;
use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use crate::filter::{apply_filters, FilterSelection};
use crate::forecast::ForecastStore;
use crate::geocode::{locate, Geocoder};
use crate::table::{columns, EventTable};
use crate::view::{MapView, Notice, PageView};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Interaction types counted as demo/event requests
pub const DEMO_OR_EVENT_PATTERN: &str = "(?i)demo|event";
/// Interaction types counted as AI assistant requests
pub const AI_ASSISTANT_PATTERN: &str = "(?i)ai assistant";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageId {
    Overview,
    JobsAndRequests,
    SalesTeam,
    CustomerEngagement,
    Location,
}

impl PageId {
    pub const ALL: [PageId; 5] = [
        PageId::Overview,
        PageId::JobsAndRequests,
        PageId::SalesTeam,
        PageId::CustomerEngagement,
        PageId::Location,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            PageId::Overview => "Overview",
            PageId::JobsAndRequests => "Jobs & Requests",
            PageId::SalesTeam => "Sales Team Performance",
            PageId::CustomerEngagement => "Customer Engagement",
            PageId::Location => "Location Analysis",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            PageId::Overview => "overview",
            PageId::JobsAndRequests => "jobs",
            PageId::SalesTeam => "sales-team",
            PageId::CustomerEngagement => "engagement",
            PageId::Location => "location",
        }
    }

    pub fn from_slug(slug: &str) -> Result<Self> {
        let wanted = slug.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.slug() == wanted || p.title().to_ascii_lowercase() == wanted)
            .ok_or_else(|| DashboardError::Config(format!("unknown page '{}'", slug)))
    }

    /// Columns offered as sidebar filters on this page
    pub fn filter_columns(&self) -> &'static [&'static str] {
        match self {
            PageId::Overview | PageId::SalesTeam => &[columns::CUSTOMER_COUNTRY, columns::SALESPERSON],
            PageId::JobsAndRequests | PageId::CustomerEngagement | PageId::Location => &[columns::CUSTOMER_COUNTRY],
        }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// Per-page widget choices that are not table filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageOptions {
    /// Product for the this-year/last-year chart; all products when unset
    pub product: Option<String>,
    /// Country for the location page's product breakdown
    pub focus_country: Option<String>,
    /// Per-salesperson monthly forecast files
    pub forecast_salesperson: Option<String>,
    /// Salesperson for the recent sales table
    pub recent_salesperson: Option<String>,
    /// Overrides the configured preview length
    pub preview_rows: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub page: PageId,
    pub filters: FilterSelection,
    pub options: PageOptions,
}

impl PageRequest {
    /// Request with every filter column fully selected
    pub fn unfiltered(page: PageId, table: &EventTable) -> Result<Self> {
        Ok(Self {
            page,
            filters: default_filters(page, table)?,
            options: PageOptions::default(),
        })
    }
}

/// Everything a page reads besides its request
pub struct PageContext<'a> {
    /// The full, unfiltered table
    pub source: &'a EventTable,
    pub config: &'a DashboardConfig,
    pub forecasts: &'a ForecastStore,
    pub geocoder: &'a dyn Geocoder,
    /// Anchor for year-to-date windows
    pub today: NaiveDate,
}

impl PageContext<'_> {
    fn preview_rows(&self, options: &PageOptions) -> usize {
        options.preview_rows.unwrap_or(self.config.preview_rows)
    }
}

/// Sidebar defaults: every value of every filter column selected
pub fn default_filters(page: PageId, table: &EventTable) -> Result<FilterSelection> {
    FilterSelection::select_all(table, page.filter_columns())
}

pub async fn render_page(ctx: &PageContext<'_>, request: &PageRequest) -> Result<PageView> {
    let start = Instant::now();
    let filtered = apply_filters(ctx.source, &request.filters)?;
    debug!(
        "{}: {} of {} rows after filters",
        request.page,
        filtered.height(),
        ctx.source.height()
    );

    let view = match request.page {
        PageId::Overview => overview::render(ctx, &filtered, &request.options).await?,
        PageId::JobsAndRequests => jobs::render(&filtered)?,
        PageId::SalesTeam => sales_team::render(ctx, &filtered, &request.options)?,
        PageId::CustomerEngagement => engagement::render(ctx, &filtered, &request.options)?,
        PageId::Location => location::render(ctx, &filtered, &request.options).await?,
    };
    info!(
        "Rendered '{}' with {} sections in {:?}",
        request.page,
        view.sections.len(),
        start.elapsed()
    );
    Ok(view)
}

/// Geocoded map of `groups`, or a warning when nothing could be placed
pub(crate) async fn map_section(
    title: &str,
    groups: &[GroupValue],
    geocoder: &dyn Geocoder,
) -> std::result::Result<MapView, Notice> {
    let points = locate(groups, geocoder).await;
    if points.is_empty() {
        Err(Notice::warning("Could not geocode any countries for the map."))
    } else {
        Ok(MapView {
            title: title.to_string(),
            points,
        })
    }
}

/// Push either the map or its warning
pub(crate) async fn push_map(view: &mut PageView, title: &str, groups: &[GroupValue], geocoder: &dyn Geocoder) {
    match map_section(title, groups, geocoder).await {
        Ok(map) => view.push(map),
        Err(notice) => view.push(notice),
    }
}

/// Push a missing-column warning for each absent column; true when all exist
pub(crate) fn require_columns(view: &mut PageView, table: &EventTable, wanted: &[&str]) -> bool {
    let mut all_present = true;
    for column in wanted {
        if !table.has_column(column) {
            view.push(Notice::missing_column(column));
            all_present = false;
        }
    }
    all_present
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_slugs_round_trip() {
        for page in PageId::ALL {
            assert_eq!(PageId::from_slug(page.slug()).unwrap(), page);
            assert_eq!(PageId::from_slug(page.title()).unwrap(), page);
        }
        assert!(PageId::from_slug("billing").is_err());
    }

    #[test]
    fn test_filter_columns_per_page() {
        assert_eq!(PageId::Overview.filter_columns(), &["customer_country", "salesperson"]);
        assert_eq!(PageId::SalesTeam.filter_columns().len(), 2);
        assert_eq!(PageId::Location.filter_columns(), &["customer_country"]);
    }
}
