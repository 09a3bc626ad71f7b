//! Date-to-column layout.
//!
//! Each calendar date present in the loaded note set owns one vertical column.
//! Column 0 is today, or the first date after today when today has no notes.
//! Inside a column, notes that are not manually positioned start at the band of
//! their hour and slide down one row at a time until they stop overlapping.

use crate::model::Note;
use chrono::{FixedOffset, NaiveDate, Timelike};
use log::warn;
use std::collections::{BTreeMap, HashMap};

pub const TODAY_X: f64 = 400.0;
pub const COLUMN_SPACING: f64 = 240.0;
pub const NOTE_WIDTH: f64 = 180.0;
pub const NOTE_HEIGHT: f64 = 50.0;
pub const ROW_HEIGHT: f64 = 60.0;
pub const HOUR_BAND: f64 = 120.0;
pub const TOP_Y: f64 = 0.0;

/// Calendar date to column index, built once per load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateColumnMap {
    columns: BTreeMap<NaiveDate, i32>,
}

impl DateColumnMap {
    pub fn build<I>(dates: I, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut distinct: Vec<NaiveDate> = dates.into_iter().collect();
        distinct.sort();
        distinct.dedup();
        let anchor = distinct.partition_point(|d| *d < today) as i32;
        let columns = distinct
            .into_iter()
            .enumerate()
            .map(|(pos, date)| (date, pos as i32 - anchor))
            .collect();
        DateColumnMap { columns }
    }

    pub fn from_notes(notes: &[Note], today: NaiveDate, offset: &FixedOffset) -> Self {
        Self::build(notes.iter().map(|n| n.local_date(offset)), today)
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<i32> {
        self.columns.get(&date).copied()
    }

    /// Columns keyed by their `YYYY-MM-DD` label, in date order.
    pub fn labels(&self) -> Vec<(String, i32)> {
        self.columns
            .iter()
            .map(|(date, idx)| (date.format("%Y-%m-%d").to_string(), *idx))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

pub fn column_x(index: i32) -> f64 {
    TODAY_X + index as f64 * COLUMN_SPACING
}

/// Inverse of [`column_x`] for coordinates that sit exactly on a column.
pub fn column_at_x(x: f64) -> Option<i32> {
    let raw = (x - TODAY_X) / COLUMN_SPACING;
    let rounded = raw.round();
    if (raw - rounded).abs() < 1e-6 {
        Some(rounded as i32)
    } else {
        None
    }
}

pub fn preferred_y(hour: u32) -> f64 {
    TOP_Y + hour as f64 * HOUR_BAND
}

/// Claimed `(y, height)` intervals of one column, sorted by `y`.
#[derive(Debug, Clone, Default)]
pub struct ColumnOccupancy {
    intervals: Vec<(f64, f64)>,
}

impl ColumnOccupancy {
    /// Finds the first free row at or below `preferred` and claims it.
    pub fn claim(&mut self, preferred: f64, height: f64) -> f64 {
        let mut y = preferred;
        for &(start, len) in &self.intervals {
            if start + len <= y {
                continue;
            }
            if start >= y + height {
                break;
            }
            while start + len > y {
                y += height;
            }
        }
        self.reserve(y, height);
        y
    }

    /// Records an interval without searching.
    pub fn reserve(&mut self, y: f64, height: f64) {
        let at = self.intervals.partition_point(|&(start, _)| start <= y);
        self.intervals.insert(at, (y, height));
    }

    pub fn intervals(&self) -> &[(f64, f64)] {
        &self.intervals
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    /// `None` for manually positioned notes.
    pub column: Option<i32>,
}

/// Column map plus the ephemeral occupancy of the current layout pass.
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    columns: DateColumnMap,
    today: NaiveDate,
    offset: FixedOffset,
    occupancy: HashMap<i32, ColumnOccupancy>,
}

impl ColumnLayout {
    pub fn new(columns: DateColumnMap, today: NaiveDate, offset: FixedOffset) -> Self {
        ColumnLayout {
            columns,
            today,
            offset,
            occupancy: HashMap::new(),
        }
    }

    pub fn columns(&self) -> &DateColumnMap {
        &self.columns
    }

    /// Column of `date`. Dates missing from the map fall back to the raw day
    /// difference to today and are reported.
    pub fn column_index(&self, date: NaiveDate) -> i32 {
        if let Some(idx) = self.columns.index_of(date) {
            return idx;
        }
        let fallback = (date - self.today).num_days() as i32;
        warn!(
            "event=column_fallback module=layout status=anomaly date={} column={}",
            date, fallback
        );
        fallback
    }

    pub fn preferred_y_for(&self, note: &Note) -> f64 {
        preferred_y(note.date.with_timezone(&self.offset).hour())
    }

    /// Clears the occupancy. Called at the start of every full pass.
    pub fn begin_pass(&mut self) {
        self.occupancy.clear();
    }

    pub fn reserve(&mut self, column: i32, y: f64) {
        self.occupancy
            .entry(column)
            .or_default()
            .reserve(y, ROW_HEIGHT);
    }

    /// Places one note against the current occupancy.
    pub fn place(&mut self, note: &Note) -> Placement {
        if note.manually_positioned {
            return Placement {
                x: note.x,
                y: note.y,
                column: None,
            };
        }
        let column = self.column_index(note.local_date(&self.offset));
        let preferred = self.preferred_y_for(note);
        let y = self
            .occupancy
            .entry(column)
            .or_default()
            .claim(preferred, ROW_HEIGHT);
        Placement {
            x: column_x(column),
            y,
            column: Some(column),
        }
    }

    /// Full layout pass in time order. Returns placements in input order.
    pub fn layout_all(&mut self, notes: &[Note]) -> Vec<Placement> {
        self.begin_pass();
        let mut order: Vec<usize> = (0..notes.len()).collect();
        order.sort_by(|&a, &b| {
            notes[a]
                .date
                .cmp(&notes[b].date)
                .then_with(|| notes[a].id.cmp(&notes[b].id))
        });
        let mut placements = vec![
            Placement {
                x: 0.0,
                y: 0.0,
                column: None,
            };
            notes.len()
        ];
        for idx in order {
            placements[idx] = self.place(&notes[idx]);
        }
        placements
    }
}
