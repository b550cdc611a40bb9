//! Profile management commands.
//!
//! The profile is the name sessions are recorded under. The timer refuses
//! to start without one, so `profile set` is the first thing a new install
//! runs.

use clap::Subcommand;

use benkyo_core::{Config, IdentityProvider};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show the active profile
    Show,
    /// Set the active profile name
    Set {
        /// Name sessions are recorded under
        name: String,
    },
    /// Clear the active profile
    Clear,
}

pub fn run(action: ProfileAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ProfileAction::Show => {
            let config = Config::load()?;
            match config.current_identity() {
                Some(user) => println!("{user}"),
                None => println!("no profile set"),
            }
        }
        ProfileAction::Set { name } => {
            let name = name.trim();
            if name.is_empty() {
                eprintln!("profile name cannot be empty");
                std::process::exit(1);
            }
            let mut config = Config::load()?;
            config.profile.name = Some(name.to_string());
            config.save()?;
            println!("profile set: {name}");
        }
        ProfileAction::Clear => {
            let mut config = Config::load()?;
            config.profile.name = None;
            config.save()?;
            println!("profile cleared");
        }
    }
    Ok(())
}
