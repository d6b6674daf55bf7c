use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::store::primary::PrimaryIndex;
use crate::store::MetadataStore;

pub fn run<P: PrimaryIndex>(store: &MetadataStore<P>) -> Result<CmdResult> {
    let report = store.doctor()?;
    let mut result = CmdResult::default();

    if !report.primary_reachable {
        result.add_message(CmdMessage::warning(format!(
            "Primary store ({}) not reachable; checked backup index only.",
            store.primary().describe()
        )));
    }

    if report.is_clean() {
        result.add_message(CmdMessage::success("No inconsistencies found."));
        return Ok(result.with_report(report));
    }

    result.add_message(CmdMessage::warning("Inconsistencies found:"));
    if !report.corrupt.is_empty() {
        let ids: Vec<String> = report.corrupt.iter().map(|id| id.to_string()).collect();
        result.add_message(CmdMessage::error(format!(
            "  - {} record(s) indexed without a snapshot (left in place): {}",
            report.corrupt.len(),
            ids.join(", ")
        )));
    }
    let counts = [
        (report.adopted_from_primary, "adopted from primary into backup index"),
        (report.recovered_snapshots, "recovered from orphan snapshots"),
        (report.backfilled_primary, "copied from backup index into primary"),
        (report.pruned_primary, "pruned from primary (already deleted)"),
        (report.removed_stray_payloads, "stray uploaded file(s) removed"),
        (report.evicted.len(), "evicted over retention cap"),
    ];
    for (count, what) in counts {
        if count > 0 {
            result.add_message(CmdMessage::info(format!("  - {} {}.", count, what)));
        }
    }

    Ok(result.with_report(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::MessageLevel;
    use crate::model::Upload;
    use crate::store::primary::memory::MemoryIndex;
    use crate::test_utils::{rows, TestEnv};
    use std::fs;

    #[test]
    fn clean_store() {
        let env = TestEnv::new();
        let result = run(&env.store).unwrap();
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].level, MessageLevel::Success);
    }

    #[test]
    fn reports_corruption_and_outage() {
        let env = TestEnv::with_primary(MemoryIndex::unavailable());
        let created = env
            .store
            .ingest(Upload::new("a.csv", vec![1], rows(1), vec!["region".into()]))
            .unwrap();
        fs::remove_file(&created.snapshot_path).unwrap();

        let result = run(&env.store).unwrap();
        assert_eq!(result.messages[0].level, MessageLevel::Warning);
        assert!(result.has_errors());
        assert_eq!(result.report.unwrap().corrupt, vec![created.id()]);
    }
}
