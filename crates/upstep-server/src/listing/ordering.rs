//! Canonical ordering of a file listing.
//!
//! Files whose name starts with a digit come first, by their leading
//! number (`2_x` before `10_x`). The rest follow alphabetically by display
//! name, ignoring case. Ties fall back to the filename so the order is
//! total.

use std::cmp::Ordering;

use upstep_core::FileInfo;

fn starts_with_digit(filename: &str) -> bool {
    filename.starts_with(|c: char| c.is_ascii_digit())
}

/// Leading integer of a filename; 0 when it does not parse.
fn leading_number(filename: &str) -> u64 {
    let end = filename
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(filename.len());
    filename[..end].parse().unwrap_or(0)
}

fn by_number(a: &FileInfo, b: &FileInfo) -> Ordering {
    leading_number(&a.filename)
        .cmp(&leading_number(&b.filename))
        .then_with(|| a.filename.cmp(&b.filename))
}

fn by_display_name(a: &FileInfo, b: &FileInfo) -> Ordering {
    a.display_name
        .to_lowercase()
        .cmp(&b.display_name.to_lowercase())
        .then_with(|| a.display_name.cmp(&b.display_name))
        .then_with(|| a.filename.cmp(&b.filename))
}

pub fn canonical_order(files: Vec<FileInfo>) -> Vec<FileInfo> {
    let (mut numbered, mut named): (Vec<_>, Vec<_>) = files
        .into_iter()
        .partition(|f| starts_with_digit(&f.filename));

    numbered.sort_by(by_number);
    named.sort_by(by_display_name);
    numbered.extend(named);
    numbered
}
