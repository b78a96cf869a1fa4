//! Section linking
//!
//! Groups aligned events under the section marker that precedes them in the
//! score. Markers consume no time: a section starts at its first aligned
//! event and ends at its last. Events before the first marker form an
//! unlabelled section; sections without aligned events are dropped.

use super::{AlignmentLink, SectionLink};
use crate::score::{EventKind, ScoreEvent};
use std::collections::HashMap;

/// Group aligned links into sections
pub fn link_sections(events: &[ScoreEvent], links: &[AlignmentLink]) -> Vec<SectionLink> {
    let by_index: HashMap<u32, &AlignmentLink> =
        links.iter().map(|l| (l.score_index, l)).collect();

    let mut sections = Vec::new();
    let mut current = SectionLink {
        label: None,
        marker_index: None,
        note_indices: Vec::new(),
        start_time: 0.0,
        end_time: 0.0,
    };

    for event in events {
        if event.kind == EventKind::Section {
            let next = SectionLink {
                label: event.label.clone(),
                marker_index: Some(event.index),
                note_indices: Vec::new(),
                start_time: 0.0,
                end_time: 0.0,
            };
            let finished = std::mem::replace(&mut current, next);
            if !finished.note_indices.is_empty() {
                sections.push(finished);
            }
            continue;
        }

        if let Some(link) = by_index.get(&event.index) {
            if current.note_indices.is_empty() {
                current.start_time = link.start_time;
            }
            current.note_indices.push(link.score_index);
            current.end_time = link.end_time;
        }
    }
    if !current.note_indices.is_empty() {
        sections.push(current);
    }

    log::debug!("Linked {} sections", sections.len());
    sections
}
