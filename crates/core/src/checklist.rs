use crate::model::{ChecklistKind, Subtask};

const MONTHLY_ITEMS: &[&str] = &[
    "Test smoke and CO detectors",
    "Clean kitchen extractor filter",
    "Run water in unused taps and showers",
    "Check boiler pressure",
    "Inspect sink and bath seals for mould",
    "Empty and clean dehumidifier trays",
    "Check fire extinguisher gauge",
];

const QUARTERLY_ITEMS: &[&str] = &[
    "Bleed radiators",
    "Clear gutters and downpipes",
    "Test RCD trip switches in the fuse box",
    "Descale showerheads and taps",
    "Vacuum fridge and freezer coils",
    "Check window locks and door hinges",
    "Inspect roof and attic for leaks",
    "Read and record utility meters",
];

/// Fixed item texts for a cadence, in display order.
pub fn template(kind: ChecklistKind) -> &'static [&'static str] {
    match kind {
        ChecklistKind::Monthly => MONTHLY_ITEMS,
        ChecklistKind::Quarterly => QUARTERLY_ITEMS,
    }
}

/// Fresh, incomplete subtasks for every template item.
pub fn instantiate(kind: ChecklistKind) -> Vec<Subtask> {
    template(kind).iter().map(|text| Subtask::new(*text)).collect()
}
