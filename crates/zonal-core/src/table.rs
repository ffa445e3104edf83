//! Dense per-polygon result relation.
//!
//! Rows are appended in polygon input order while the run is in flight.
//! The run-global class set is only known at the end, so densification
//! (filling zero for classes a polygon never touched) happens in
//! [`TableBuilder::finish`] and nowhere else.

use std::collections::BTreeSet;
use std::io::{self, Write};

use serde::Serialize;

use crate::accumulate::ClassCountMap;
use crate::area::cells_to_area;
use crate::grid::ClassLabel;

/// How a successfully processed polygon related to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneStatus {
    /// At least one included cell.
    Counted,
    /// No cell center of the grid falls in the polygon's bounding box.
    NoOverlap,
    /// Overlapping window, but no cell center inside the polygon.
    EmptyAccumulation,
}

impl ZoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneStatus::Counted => "counted",
            ZoneStatus::NoOverlap => "no_overlap",
            ZoneStatus::EmptyAccumulation => "empty_accumulation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub id: String,
    pub status: ZoneStatus,
    /// Cell counts aligned with [`ResultTable::classes`].
    pub cells: Vec<u64>,
    /// Areas aligned with [`ResultTable::classes`].
    pub areas: Vec<f64>,
}

impl ResultRow {
    pub fn total_cells(&self) -> u64 {
        self.cells.iter().sum()
    }

    pub fn total_area(&self) -> f64 {
        self.areas.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultTable {
    classes: Vec<ClassLabel>,
    rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Every class observed in the run, ascending. No-data never appears.
    pub fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, id: &str) -> Option<&ResultRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    /// Area of `class` in the row with `id`. `None` if either is unknown;
    /// a known class the polygon never touched reads as 0.
    pub fn area_of(&self, id: &str, class: ClassLabel) -> Option<f64> {
        let col = self.classes.binary_search(&class).ok()?;
        self.row(id).map(|r| r.areas[col])
    }

    /// Copy with every area multiplied by `factor`, e.g. `1e-4` for m² → ha.
    pub fn scaled(&self, factor: f64) -> ResultTable {
        let rows = self
            .rows
            .iter()
            .map(|r| ResultRow { areas: r.areas.iter().map(|a| a * factor).collect(), ..r.clone() })
            .collect();
        ResultTable { classes: self.classes.clone(), rows }
    }

    /// `id,status,<class>...` header, then one line of areas per row.
    pub fn write_csv<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "id,status")?;
        for class in &self.classes {
            write!(out, ",{class}")?;
        }
        writeln!(out)?;
        for row in &self.rows {
            write!(out, "{},{}", csv_field(&row.id), row.status.as_str())?;
            for area in &row.areas {
                write!(out, ",{area}")?;
            }
            writeln!(out)?;
        }
        out.flush()
    }
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

struct PendingRow {
    id: String,
    status: ZoneStatus,
    counts: ClassCountMap,
}

/// Collects sparse per-polygon counts, in order, until the run is done.
pub struct TableBuilder {
    cell_area: f64,
    pending: Vec<PendingRow>,
}

impl TableBuilder {
    pub fn new(cell_area: f64) -> Self {
        Self { cell_area, pending: Vec::new() }
    }

    pub fn with_capacity(cell_area: f64, rows: usize) -> Self {
        Self { cell_area, pending: Vec::with_capacity(rows) }
    }

    pub fn push(&mut self, id: impl Into<String>, status: ZoneStatus, counts: ClassCountMap) {
        self.pending.push(PendingRow { id: id.into(), status, counts });
    }

    /// Densify every row against the global class set.
    pub fn finish(self) -> ResultTable {
        let classes: Vec<ClassLabel> = self
            .pending
            .iter()
            .flat_map(|r| r.counts.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let rows = self
            .pending
            .into_iter()
            .map(|p| {
                let cells: Vec<u64> =
                    classes.iter().map(|c| p.counts.get(c).copied().unwrap_or(0)).collect();
                let areas = cells.iter().map(|&n| cells_to_area(n, self.cell_area)).collect();
                ResultRow { id: p.id, status: p.status, cells, areas }
            })
            .collect();
        ResultTable { classes, rows }
    }
}
