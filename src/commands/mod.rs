//! Editing commands runnable through [`crate::command::CommandExecutor`].

mod export;
pub mod fillet;

pub use export::ExportCommand;
pub use fillet::FilletSolidCommand;
