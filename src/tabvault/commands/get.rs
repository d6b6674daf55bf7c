use crate::commands::CmdResult;
use crate::error::Result;
use crate::model::RecordId;
use crate::store::primary::PrimaryIndex;
use crate::store::MetadataStore;

pub fn run<P: PrimaryIndex>(store: &MetadataStore<P>, id: RecordId) -> Result<CmdResult> {
    let record = store.fetch_by_id(id)?;
    Ok(CmdResult::default().with_records(vec![record]))
}
