//! Conflation: collapse atomic per-slot facts into the smallest set of
//! entries a human would read as "one course, on these days/weeks/periods".
//!
//! Four passes, each a pure function over an owned list:
//! 1. expand every occurrence into deduplicated atomic `(day, week, section)`
//!    slots,
//! 2. merge courses meeting simultaneously in one slot,
//! 3. grow contiguous section runs,
//! 4. union the weeks of otherwise identical entries.

use std::collections::BTreeSet;

use crate::schedule::{AtomicSlot, MergedSlot, RawOccurrence, ScheduleEntry};

/// Run all four passes. Deterministic for fixed input; empty input yields
/// empty output.
pub fn conflate(occurrences: &[RawOccurrence]) -> Vec<ScheduleEntry> {
    let atoms = expand(occurrences);
    let merged = merge_concurrent(atoms);
    let contracted = merge_sections(merged);
    let mut entries = merge_weeks(contracted);
    entries.sort_by(|a, b| {
        (a.day, a.sections.first(), a.weeks.first(), &a.names)
            .cmp(&(b.day, b.sections.first(), b.weeks.first(), &b.names))
    });
    entries.into_iter().map(ScheduleEntry::from).collect()
}

/// Pass 1, expansion. Cross product of each occurrence's weeks and sections,
/// with set semantics: identical facts from overlapping extraction passes
/// must not double-count. The `BTreeSet` also fixes the walk order for the
/// later passes.
fn expand(occurrences: &[RawOccurrence]) -> Vec<AtomicSlot> {
    let mut atoms = BTreeSet::new();
    for occurrence in occurrences {
        let occurrence = occurrence.clone().normalized();
        for &week in &occurrence.weeks {
            for &section in &occurrence.sections {
                atoms.insert(AtomicSlot {
                    day: occurrence.day,
                    week,
                    section,
                    name: occurrence.name.clone(),
                    teacher: occurrence.teacher.clone(),
                    room: occurrence.room.clone(),
                });
            }
        }
    }
    atoms.into_iter().collect()
}

/// Pass 2, concurrent merge. Slots sharing `(day, week, section)` are
/// courses meeting simultaneously (elective groups) and become one slot
/// with parallel name/teacher/room arrays, first-seen order preserved.
/// A slot whose name is already present is the same logical course taught
/// by another teacher or in another room: its teacher/room are appended
/// comma-joined at the existing name's position instead of opening a new
/// parallel slot.
fn merge_concurrent(atoms: Vec<AtomicSlot>) -> Vec<MergedSlot> {
    let mut merged: Vec<MergedSlot> = Vec::new();
    for atom in atoms {
        if let Some(slot) = merged.last_mut() {
            if slot.day == atom.day
                && slot.weeks[0] == atom.week
                && slot.sections[0] == atom.section
            {
                absorb_concurrent(slot, atom);
                continue;
            }
        }
        merged.push(MergedSlot {
            day: atom.day,
            weeks: vec![atom.week],
            sections: vec![atom.section],
            names: vec![atom.name],
            teachers: vec![atom.teacher],
            rooms: vec![atom.room],
        });
    }
    merged
}

fn absorb_concurrent(slot: &mut MergedSlot, atom: AtomicSlot) {
    match slot.names.iter().position(|name| *name == atom.name) {
        Some(index) => {
            append_variant(&mut slot.teachers[index], &atom.teacher);
            append_variant(&mut slot.rooms[index], &atom.room);
        }
        None => {
            slot.names.push(atom.name);
            slot.teachers.push(atom.teacher);
            slot.rooms.push(atom.room);
        }
    }
}

/// Comma-join a differing teacher/room onto an existing position; equal
/// values collapse silently.
fn append_variant(existing: &mut String, candidate: &str) {
    if existing.split(',').all(|part| part != candidate) {
        existing.push(',');
        existing.push_str(candidate);
    }
}

/// Pass 3, section contiguity. Within one `(day, week)` and identical
/// identity, absorb the next slot while its first section extends the
/// accumulated run by exactly one; the first gap starts a new entry.
fn merge_sections(slots: Vec<MergedSlot>) -> Vec<MergedSlot> {
    let mut contracted: Vec<MergedSlot> = Vec::new();
    for slot in slots {
        if let Some(acc) = contracted.last_mut() {
            let contiguous = acc
                .sections
                .last()
                .map(|&last| last + 1 == slot.sections[0])
                .unwrap_or(false);
            if acc.day == slot.day
                && acc.weeks[0] == slot.weeks[0]
                && acc.identity() == slot.identity()
                && contiguous
            {
                acc.sections.extend(slot.sections);
                continue;
            }
        }
        contracted.push(slot);
    }
    contracted
}

/// Pass 4, week union. Entries on the same day with identical sections
/// and identity are one course that skips weeks: collect every week into
/// the first-seen entry, contiguous or not.
fn merge_weeks(slots: Vec<MergedSlot>) -> Vec<MergedSlot> {
    let mut result: Vec<MergedSlot> = Vec::new();
    for slot in slots {
        match result.iter_mut().find(|acc| {
            acc.day == slot.day
                && acc.sections == slot.sections
                && acc.identity() == slot.identity()
        }) {
            Some(acc) => acc.weeks.extend(&slot.weeks),
            None => result.push(slot),
        }
    }
    for slot in &mut result {
        slot.weeks.sort_unstable();
        slot.weeks.dedup();
    }
    result
}
