use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::store::primary::PrimaryIndex;
use crate::store::MetadataStore;

pub fn run<P: PrimaryIndex>(store: &MetadataStore<P>, limit: usize) -> Result<CmdResult> {
    let listed = store.list_recent(limit)?;
    let mut result = CmdResult::default();
    if listed.is_empty() {
        result.add_message(CmdMessage::info("No records stored."));
    }
    Ok(result.with_listed(listed))
}
