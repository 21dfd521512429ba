//! Non-interactive maintenance commands over a clinic home directory.

mod commands;
pub mod output;

use std::path::PathBuf;

use strsim::levenshtein;

use crate::{
    errors::{CliError, VetcareResult},
    ClinicApp,
};

/// Environment variable relocating the clinic home directory.
pub const HOME_ENV: &str = "VETCARE_HOME";

pub type CommandResult = Result<(), CliError>;
pub type CommandHandler = fn(&mut CliContext, &[String]) -> CommandResult;

#[derive(Clone)]
pub struct CommandEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    pub handler: CommandHandler,
}

impl CommandEntry {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        usage: &'static str,
        handler: CommandHandler,
    ) -> Self {
        Self {
            name,
            description,
            usage,
            handler,
        }
    }
}

/// State shared by command handlers. The clinic is opened on first use so
/// `help` and `version` work without touching the disk.
pub struct CliContext {
    home: PathBuf,
    app: Option<ClinicApp>,
    registry: Vec<CommandEntry>,
}

impl CliContext {
    pub fn new(home: PathBuf) -> Self {
        Self {
            home,
            app: None,
            registry: commands::definitions(),
        }
    }

    pub fn home(&self) -> &PathBuf {
        &self.home
    }

    pub fn app(&mut self) -> VetcareResult<&mut ClinicApp> {
        let app = match self.app.take() {
            Some(app) => app,
            None => {
                let app = ClinicApp::open(self.home.clone())?;
                if !app.config().ui_color_enabled {
                    output::disable_colors();
                }
                app
            }
        };
        Ok(self.app.insert(app))
    }

    pub fn command(&self, name: &str) -> Option<&CommandEntry> {
        self.registry.iter().find(|entry| entry.name == name)
    }

    pub fn commands(&self) -> &[CommandEntry] {
        &self.registry
    }

    /// Closest registered command within an edit distance of 3.
    pub fn suggest(&self, input: &str) -> Option<&'static str> {
        self.registry
            .iter()
            .map(|entry| (levenshtein(entry.name, input), entry.name))
            .min_by_key(|(distance, _)| *distance)
            .filter(|(distance, _)| *distance <= 3)
            .map(|(_, name)| name)
    }
}

/// Clinic home from `VETCARE_HOME`, else the default documents folder.
pub fn resolve_home() -> PathBuf {
    std::env::var_os(HOME_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(vetcare_config::default_home)
}

/// Dispatches one command line (without the program name).
pub fn run(context: &mut CliContext, args: &[String]) -> CommandResult {
    let Some((command, rest)) = args.split_first() else {
        return dispatch(context, "help", &[]);
    };
    dispatch(context, &command.to_lowercase(), rest)
}

fn dispatch(context: &mut CliContext, name: &str, args: &[String]) -> CommandResult {
    match context.command(name).map(|entry| entry.handler) {
        Some(handler) => handler(context, args),
        None => {
            if let Some(best) = context.suggest(name) {
                output::info(format!("Suggestion: `{}`?", best));
            }
            Err(CliError::UnknownCommand(name.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misspelled_commands_get_a_suggestion() {
        let context = CliContext::new(PathBuf::from("."));
        assert_eq!(context.suggest("backpus"), Some("backups"));
        assert_eq!(context.suggest("reminder"), Some("reminders"));
        assert_eq!(context.suggest("completely-unrelated"), None);
    }

    #[test]
    fn unknown_command_is_an_error() {
        let mut context = CliContext::new(PathBuf::from("."));
        let err = run(&mut context, &["frobnicate".to_string()]).expect_err("unknown");
        assert!(matches!(err, CliError::UnknownCommand(name) if name == "frobnicate"));
    }
}
