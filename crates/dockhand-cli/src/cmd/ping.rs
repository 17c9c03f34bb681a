use crate::output::print_json;

pub fn run(json: bool) -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    if json {
        print_json(&serde_json::json!({ "pong": true, "version": version }))
    } else {
        println!("Pong! dockhand {version}");
        Ok(())
    }
}
