//! 📊 progress.rs: "Are we there yet?" Every pipeline, every time, forever.
//!
//! Three things live here:
//! - [`ProgressCounter`]: a per-object running total of entries that actually made it
//!   to the sink. Atomic, cloneable, shared between the batch worker and the pipeline.
//! - [`RunProgress`]: an `indicatif` bar ticking once per finished object.
//! - [`RunSummary`]: what the whole run accomplished, and a `comfy-table` to brag with.
//!
//! ⚠️ Watching the progress bar will not make it go faster. We've tried. Science says no.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use indicatif::{ProgressBar, ProgressStyle};

use crate::common::ObjectRef;

/// 🔢 Formats a number with commas for the 3 people in the audience who like readability.
/// "1000000" → "1,000,000". You're welcome, eyes.
pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// 🧮 Entries successfully shipped for one object.
///
/// Clones share the same total. Created per object pipeline, bumped after each successful
/// flush, read once when the pipeline is done, then dropped with the rest of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounter {
    total: Arc<AtomicU64>,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, count: u64) {
        self.total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// 🎨 Run-level progress bar over objects. Draws to stderr, and indicatif quietly
/// skips drawing when stderr isn't a terminal, so CI logs stay clean.
#[derive(Clone)]
pub struct RunProgress {
    progress_bar: ProgressBar,
}

impl std::fmt::Debug for RunProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- ProgressBar is a diva and doesn't do Debug, so we speak for it
        f.debug_struct("RunProgress")
            .field("position", &self.progress_bar.position())
            .field("length", &self.progress_bar.length())
            .finish()
    }
}

impl RunProgress {
    pub fn new(total_objects: u64) -> Self {
        let progress_bar = ProgressBar::new(total_objects);
        // -- the template is a literal, but we still don't unwrap in library code
        let the_style = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} objects {msg}",
        )
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(the_style);
        Self { progress_bar }
    }

    /// 🙈 Same API, draws nothing. For tests and for people who prefer mystery.
    pub fn hidden() -> Self {
        Self {
            progress_bar: ProgressBar::hidden(),
        }
    }

    /// ✅ One more object done.
    pub fn object_finished(&self, object: &ObjectRef, entries: u64) {
        self.progress_bar
            .set_message(format!("{} ({} entries)", object, format_number(entries)));
        self.progress_bar.inc(1);
    }

    /// ❌ One more object done, badly. It still counts toward the bar.
    pub fn object_failed(&self, what: &str) {
        self.progress_bar.set_message(format!("{} (failed)", what));
        self.progress_bar.inc(1);
    }

    /// 📍 Objects finished so far, failed ones included.
    pub fn position(&self) -> u64 {
        self.progress_bar.position()
    }

    pub fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }
}

/// 🏁 What a whole run shipped, object by object, in the order the objects were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub objects: Vec<(ObjectRef, u64)>,
}

impl RunSummary {
    pub fn total_entries(&self) -> u64 {
        self.objects.iter().map(|(_, entries)| entries).sum()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// 🍽️ One row per object plus a TOTAL row. Numbers right-aligned, like accountants intended.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["object", "entries shipped"]);

        for (object, entries) in &self.objects {
            table.add_row(vec![
                Cell::new(object.to_string()),
                Cell::new(format_number(*entries)).set_alignment(CellAlignment::Right),
            ]);
        }
        table.add_row(vec![
            Cell::new(format!("TOTAL ({} objects)", self.object_count())),
            Cell::new(format_number(self.total_entries())).set_alignment(CellAlignment::Right),
        ]);
        table
    }
}
