//! `snello todo` — Direct access to the to-do list.

use snello_core::ItemStore;
use snello_store::SqliteItemStore;
use std::io::Write;

use super::load_config;

async fn open_store() -> Result<SqliteItemStore, Box<dyn std::error::Error>> {
    let config = load_config()?;
    Ok(SqliteItemStore::new(config.database_path()).await?)
}

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store().await?;
    let items = store.list_items().await?;
    println!("{}", snello_tools::list_items::render_list(&items));
    Ok(())
}

pub async fn clear(yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store().await?;

    if !yes {
        let count = store.list_items().await?.len();
        print!("Remove all {count} item(s) from the to-do list? [y/N] ");
        std::io::stdout().flush()?;

        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.clear_all().await?;
    println!("To-do list cleared.");
    Ok(())
}
