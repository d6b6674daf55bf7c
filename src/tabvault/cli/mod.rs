mod print;

pub(crate) use print::{print_config, print_messages, print_record, print_summaries};
