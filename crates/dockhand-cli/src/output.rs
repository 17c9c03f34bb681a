use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Print a titled block of names, or nothing if `names` is empty.
pub fn print_section<'a, I>(title: &str, names: I)
where
    I: IntoIterator<Item = &'a String>,
{
    let names: Vec<&str> = names.into_iter().map(String::as_str).collect();
    if names.is_empty() {
        return;
    }
    println!("{title}:");
    for name in names {
        println!("  {name}");
    }
}
