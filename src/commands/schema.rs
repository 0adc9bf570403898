// ABOUTME: Schema command implementation.
// ABOUTME: Prints the language-neutral resource schema as pretty JSON.

use productionapp::error::Result;
use productionapp::resource;

pub fn schema() -> Result<()> {
    let json = serde_json::to_string_pretty(&resource::schema())?;
    println!("{json}");
    Ok(())
}
