//! Side-by-side comparison of server history and the local journal.
//!
//! [`ReconciliationView`] pairs the server's instant-channel records with
//! the client's journal entries. It is a diagnostic aid: with the default
//! [`Alignment::Position`], row *i* holds the *i*-th record of each side,
//! which drifts out of step as soon as one delivery is lost or duplicated.
//! [`Alignment::Sequence`] keys rows by `seq` instead.

use std::collections::BTreeMap;
use std::fmt;

use chrono::SecondsFormat;
use eventline_types::{InstantRecord, JournalEntry};

/// How server records and local entries are paired into rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    /// Row *i* pairs the *i*-th server record with the *i*-th local entry.
    #[default]
    Position,
    /// Rows are keyed by `seq`; duplicates of one `seq` get extra rows.
    Sequence,
}

/// One row of the view. Either side may be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationRow {
    /// Server record, if any.
    pub server: Option<InstantRecord>,
    /// Local journal entry, if any.
    pub local: Option<JournalEntry>,
}

impl ReconciliationRow {
    /// Rendered server cell (empty when there is no server record).
    pub fn server_cell(&self) -> String {
        self.server.as_ref().map(server_cell).unwrap_or_default()
    }

    /// Rendered local cell (empty when there is no local entry).
    pub fn local_cell(&self) -> String {
        self.local.as_ref().map(local_cell).unwrap_or_default()
    }
}

/// Paired rows of server and local history.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationView {
    alignment: Alignment,
    rows: Vec<ReconciliationRow>,
}

impl ReconciliationView {
    /// Pair `server` records with `local` entries.
    ///
    /// Produces `max(server.len(), local.len())` rows under positional
    /// alignment, padding the shorter side with empty cells.
    pub fn build(server: &[InstantRecord], local: &[JournalEntry], alignment: Alignment) -> Self {
        let rows = match alignment {
            Alignment::Position => pair_by_position(server, local),
            Alignment::Sequence => pair_by_sequence(server, local),
        };
        Self { alignment, rows }
    }

    /// The alignment used to build the rows.
    pub const fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Rows in display order.
    pub fn rows(&self) -> &[ReconciliationRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether neither side had anything.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows where only one side is present.
    pub fn unmatched(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.server.is_none() || row.local.is_none())
            .count()
    }
}

fn pair_by_position(server: &[InstantRecord], local: &[JournalEntry]) -> Vec<ReconciliationRow> {
    let mut server = server.iter();
    let mut local = local.iter();
    let mut rows = Vec::with_capacity(server.len().max(local.len()));
    loop {
        let row = ReconciliationRow {
            server: server.next().cloned(),
            local: local.next().cloned(),
        };
        if row.server.is_none() && row.local.is_none() {
            return rows;
        }
        rows.push(row);
    }
}

fn pair_by_sequence(server: &[InstantRecord], local: &[JournalEntry]) -> Vec<ReconciliationRow> {
    let mut groups: BTreeMap<u64, (Vec<&InstantRecord>, Vec<&JournalEntry>)> = BTreeMap::new();
    for record in server {
        groups.entry(record.seq).or_default().0.push(record);
    }
    for entry in local {
        groups.entry(entry.seq).or_default().1.push(entry);
    }

    groups
        .into_values()
        .flat_map(|(records, entries)| {
            let records: Vec<InstantRecord> = records.into_iter().cloned().collect();
            let entries: Vec<JournalEntry> = entries.into_iter().cloned().collect();
            pair_by_position(&records, &entries)
        })
        .collect()
}

/// `#<seq> <server local time> client:<client time> <message>`, skipping
/// empty parts.
pub fn server_cell(record: &InstantRecord) -> String {
    let seq = format!("#{}", record.seq);
    let time = if record.time.server_time_local.is_empty() {
        record
            .time
            .server_time
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    } else {
        record.time.server_time_local.clone()
    };
    let client = record
        .client_time
        .as_ref()
        .map(|t| format!("client:{t}"))
        .unwrap_or_default();
    join_parts(&[&seq, &time, &client, &record.message])
}

/// `#<seq> <local time> <message>`, skipping empty parts.
pub fn local_cell(entry: &JournalEntry) -> String {
    let seq = format!("#{}", entry.seq);
    join_parts(&[&seq, &entry.local_time, &entry.message])
}

fn join_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for ReconciliationView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return writeln!(f, "No events recorded.");
        }

        let cells: Vec<(String, String)> = self
            .rows
            .iter()
            .map(|row| (row.server_cell(), row.local_cell()))
            .collect();
        let width = cells
            .iter()
            .map(|(server, _)| server.chars().count())
            .chain(std::iter::once("SERVER".len()))
            .max()
            .unwrap_or(0);

        writeln!(f, "{:<width$} | LOCAL", "SERVER")?;
        writeln!(f, "{:-<width$}-+-{:-<5}", "", "")?;
        for (server, local) in &cells {
            writeln!(f, "{server:<width$} | {local}")?;
        }
        Ok(())
    }
}
