use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::model::RecordId;
use crate::store::primary::PrimaryIndex;
use crate::store::MetadataStore;

/// Deletes each id in turn. A missing id is reported as an error message and
/// does not stop the others.
pub fn run<P: PrimaryIndex>(store: &MetadataStore<P>, ids: &[RecordId]) -> Result<CmdResult> {
    let mut result = CmdResult::default();

    for &id in ids {
        match store.delete_by_id(id) {
            Ok(()) => result.add_message(CmdMessage::success(format!("Record deleted: {}", id))),
            Err(e) if e.is_not_found() => {
                result.add_message(CmdMessage::error(format!("Record not found: {}", id)))
            }
            Err(e) => return Err(e),
        }
    }

    Ok(result)
}
