//! Presentation view models
//!
//! Pages produce these serializable structures; drawing them is the
//! renderer's job.

use crate::aggregate::{BucketValue, GroupValue};
use crate::error::Result;
use crate::geocode::MapPoint;
use crate::pages::PageId;
use crate::table::EventTable;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub page: PageId,
    pub title: String,
    /// Rows left after the sidebar filters
    pub filtered_rows: usize,
    pub sections: Vec<Section>,
}

impl PageView {
    pub fn new(page: PageId, filtered_rows: usize) -> Self {
        Self {
            page,
            title: page.title().to_string(),
            filtered_rows,
            sections: Vec::new(),
        }
    }

    pub fn push(&mut self, section: impl Into<Section>) {
        self.sections.push(section.into());
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.sections.iter().filter_map(|s| match s {
            Section::Notice(n) => Some(n),
            _ => None,
        })
    }

    pub fn charts(&self) -> impl Iterator<Item = &Chart> {
        self.sections.iter().filter_map(|s| match s {
            Section::Chart(c) => Some(c),
            _ => None,
        })
    }

    pub fn chart(&self, title: &str) -> Option<&Chart> {
        self.charts().find(|c| c.title == title)
    }

    pub fn kpi(&self, label: &str) -> Option<&Kpi> {
        self.sections
            .iter()
            .filter_map(|s| match s {
                Section::Kpis(kpis) => Some(kpis),
                _ => None,
            })
            .flatten()
            .find(|k| k.label == label)
    }

    pub fn table(&self, title: &str) -> Option<&TableView> {
        self.sections.iter().find_map(|s| match s {
            Section::Table(t) if t.title == title => Some(t),
            _ => None,
        })
    }

    pub fn map(&self) -> Option<&MapView> {
        self.sections.iter().find_map(|s| match s {
            Section::Map(m) => Some(m),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum Section {
    Kpis(Vec<Kpi>),
    Chart(Chart),
    Table(TableView),
    Map(MapView),
    Notice(Notice),
}

impl From<Chart> for Section {
    fn from(chart: Chart) -> Self {
        Section::Chart(chart)
    }
}

impl From<TableView> for Section {
    fn from(table: TableView) -> Self {
        Section::Table(table)
    }
}

impl From<MapView> for Section {
    fn from(map: MapView) -> Self {
        Section::Map(map)
    }
}

impl From<Notice> for Section {
    fn from(notice: Notice) -> Self {
        Section::Notice(notice)
    }
}

impl From<Vec<Kpi>> for Section {
    fn from(kpis: Vec<Kpi>) -> Self {
        Section::Kpis(kpis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub label: String,
    pub value: String,
    pub delta: Option<String>,
}

impl Kpi {
    pub fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
            delta: None,
        }
    }

    pub fn with_delta(mut self, delta: impl Into<String>) -> Self {
        self.delta = Some(delta.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    HorizontalBar,
    Pie,
    Donut,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    /// `None` leaves a gap
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceLine {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub title: String,
    pub kind: ChartKind,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<ChartSeries>,
    pub reference: Option<ReferenceLine>,
}

impl Chart {
    pub fn new(title: &str, kind: ChartKind) -> Self {
        Self {
            title: title.to_string(),
            kind,
            x_label: String::new(),
            y_label: String::new(),
            series: Vec::new(),
            reference: None,
        }
    }

    pub fn axes(mut self, x_label: &str, y_label: &str) -> Self {
        self.x_label = x_label.to_string();
        self.y_label = y_label.to_string();
        self
    }

    pub fn series(mut self, name: &str, points: Vec<ChartPoint>) -> Self {
        self.series.push(ChartSeries {
            name: name.to_string(),
            points,
        });
        self
    }

    pub fn reference(mut self, label: &str, value: f64) -> Self {
        self.reference = Some(ReferenceLine {
            label: label.to_string(),
            value,
        });
        self
    }

    /// Points of the first series
    pub fn points(&self) -> &[ChartPoint] {
        self.series.first().map(|s| s.points.as_slice()).unwrap_or(&[])
    }
}

pub fn group_points(groups: &[GroupValue]) -> Vec<ChartPoint> {
    groups
        .iter()
        .map(|g| ChartPoint {
            label: g.key.clone(),
            value: Some(g.value),
        })
        .collect()
}

pub fn bucket_points(buckets: &[BucketValue]) -> Vec<ChartPoint> {
    buckets
        .iter()
        .map(|b| ChartPoint {
            label: b.label(),
            value: Some(b.value),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows before truncation
    pub total_rows: usize,
}

impl TableView {
    /// First `max_rows` rows of `table`
    pub fn from_table(title: &str, table: &EventTable, max_rows: usize) -> Result<Self> {
        Ok(Self {
            title: title.to_string(),
            columns: table.column_names(),
            rows: table.head(max_rows).formatted_rows()?,
            total_rows: table.height(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub title: String,
    pub points: Vec<MapPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// Standard message for a visualization skipped over an absent column
    pub fn missing_column(column: &str) -> Self {
        Self::warning(format!("The '{}' column is missing from the dataset.", column))
    }
}
