//! Housekeeping commands.

use std::path::PathBuf;

use anyhow::Result;

use crate::formatting::{print_key_value, print_success};

use super::Session;

pub fn cmd_clean(root: PathBuf) -> Result<()> {
    let session = Session::load(&root)?;
    let states = session.state_store();

    states.clear_saved_state()?;

    print_key_value("State directory", &states.state_dir().display().to_string());
    print_success("Saved build and publish state cleared");
    println!();

    Ok(())
}
