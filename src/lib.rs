pub mod camera;
pub mod cli;
pub mod command;
pub mod commands;
pub mod config;
pub mod editor;
pub mod error;
pub mod factory;
pub mod geometry;
pub mod gizmo;
pub mod helpers;
pub mod input;
pub mod io;
pub mod logging;
pub mod modifiers;
pub mod picker;
pub mod raycast;
pub mod scope;
pub mod selection;
pub mod session;
pub mod signals;
pub mod spatial;
pub mod task;
pub mod viewport;

pub use command::{Agent, Command, CommandExecutor, CommandLike, CommandState};
pub use editor::Editor;
pub use error::{Fault, FaultKind};
pub use scope::{Disposable, Disposer, ResourceScope};
pub use session::{run_headless, SessionPlan, SessionReport};
pub use task::{Completion, TaskHandle};
