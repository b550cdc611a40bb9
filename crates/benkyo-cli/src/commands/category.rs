use clap::Subcommand;

use benkyo_core::Database;

#[derive(Subcommand)]
pub enum CategoryAction {
    /// List categories
    List,
    /// Add a category
    Add {
        /// Category name
        name: String,
    },
    /// Remove a category
    Remove {
        /// Category name
        name: String,
    },
}

pub fn run(action: CategoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        CategoryAction::List => {
            for category in db.list_categories()? {
                println!("{}", category.name);
            }
        }
        CategoryAction::Add { name } => {
            let name = name.trim();
            if name.is_empty() {
                eprintln!("category name cannot be empty");
                std::process::exit(1);
            }
            if db.list_categories()?.iter().any(|c| c.name == name) {
                eprintln!("category already exists: {name}");
                std::process::exit(1);
            }
            db.add_category(name)?;
            println!("added category: {name}");
        }
        CategoryAction::Remove { name } => {
            if db.remove_category(&name)? {
                println!("removed category: {name}");
            } else {
                eprintln!("no such category: {name}");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
