use crate::output::print_json;
use dockhand_core::listing::{render_chunks, ListFilter};
use std::path::Path;

pub fn run(root: &Path, filter: ListFilter, json: bool) -> anyhow::Result<()> {
    let orch = super::open(root)?;
    let workloads = super::block_on(orch.list(filter))??;

    if json {
        return print_json(&workloads);
    }
    if workloads.is_empty() {
        println!("{}", filter.empty_message());
        return Ok(());
    }

    let chunks = render_chunks(&workloads, orch.containers_per_message());
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("Docker Container List ({filter})");
        println!("{chunk}");
    }
    Ok(())
}
