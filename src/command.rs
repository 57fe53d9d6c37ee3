use crate::editor::Editor;
use crate::error::Fault;
use crate::scope::{Disposable, ResourceScope};
use crate::signals::{CommandEnded, EditorSignals};
use crate::task::{Completion, TaskHandle};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agent {
    User,
    Automated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Running,
    Finished,
    Cancelled,
    Failed,
}

impl CommandState {
    pub fn is_terminal(self) -> bool {
        self != CommandState::Running
    }
}

type FinishHook = Box<dyn FnOnce() -> Result<(), Fault>>;

struct CommandInner {
    id: Uuid,
    name: String,
    agent: Agent,
    state: Cell<CommandState>,
    scope: ResourceScope,
    completion: Completion<()>,
    signals: EditorSignals,
    finish_hooks: RefCell<Vec<FinishHook>>,
}

/// A cancellable unit of interactive work.
///
/// Everything acquired through `resource`/`ensure` is released exactly once, newest first,
/// when the command finishes, is cancelled or fails. The state flips before the release so
/// a cleanup that calls back into the command sees it terminated.
#[derive(Clone)]
pub struct Command {
    inner: Rc<CommandInner>,
}

#[derive(Clone)]
pub struct WeakCommand {
    inner: Weak<CommandInner>,
}

impl WeakCommand {
    pub fn upgrade(&self) -> Option<Command> {
        self.inner.upgrade().map(|inner| Command { inner })
    }
}

impl Command {
    pub fn new(name: impl Into<String>, agent: Agent, signals: EditorSignals) -> Self {
        let name = name.into();
        let id = Uuid::new_v4();
        tracing::debug!(command = %name, %id, ?agent, "command started");
        Self {
            inner: Rc::new(CommandInner {
                id,
                scope: ResourceScope::new(name.clone()),
                name,
                agent,
                state: Cell::new(CommandState::Running),
                completion: Completion::new(),
                signals,
                finish_hooks: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn agent(&self) -> Agent {
        self.inner.agent
    }

    pub fn state(&self) -> CommandState {
        self.inner.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.state() == CommandState::Running
    }

    pub fn scope(&self) -> &ResourceScope {
        &self.inner.scope
    }

    pub fn completion(&self) -> Completion<()> {
        self.inner.completion.clone()
    }

    pub fn downgrade(&self) -> WeakCommand {
        WeakCommand { inner: Rc::downgrade(&self.inner) }
    }

    /// Registers `resource` for release at command end and hands it back for chaining.
    pub fn resource<D: Disposable + Clone + 'static>(&self, resource: D) -> D {
        self.inner.scope.register(resource.clone());
        resource
    }

    pub fn ensure(&self, cleanup: impl FnOnce() + 'static) {
        self.inner.scope.ensure(cleanup);
    }

    /// Commit step run by `finish()` before teardown. A failing hook fails the command.
    pub fn on_finish(&self, hook: impl FnOnce() -> Result<(), Fault> + 'static) {
        self.inner.finish_hooks.borrow_mut().push(Box::new(hook));
    }

    /// Binds a child task to this command's lifetime.
    pub fn attach_task<T: Clone + 'static>(&self, task: &TaskHandle<T>) {
        let control = task.clone();
        self.inner.scope.ensure(move || control.cancel());
        let command = self.downgrade();
        let recovered = task.is_recovered();
        task.completion().on_settled(move |outcome| {
            let Err(fault) = outcome else { return };
            if fault.is_cancellation() || recovered.get() {
                return;
            }
            if let Some(command) = command.upgrade() {
                command.fail(fault.clone());
            }
        });
    }

    pub fn finish(&self) {
        if !self.is_running() {
            return;
        }
        loop {
            let hook = {
                let mut hooks = self.inner.finish_hooks.borrow_mut();
                if hooks.is_empty() {
                    break;
                }
                hooks.remove(0)
            };
            if let Err(fault) = hook() {
                tracing::warn!(command = %self.inner.name, error = %fault, "commit failed");
                self.fail(fault);
                return;
            }
            if !self.is_running() {
                return;
            }
        }
        self.terminate(CommandState::Finished, Ok(()));
    }

    pub fn cancel(&self) {
        self.terminate(CommandState::Cancelled, Err(Fault::Cancelled));
    }

    pub fn fail(&self, fault: Fault) {
        if fault.is_cancellation() {
            self.cancel();
        } else {
            self.terminate(CommandState::Failed, Err(fault));
        }
    }

    fn terminate(&self, state: CommandState, outcome: Result<(), Fault>) {
        if !self.is_running() {
            return;
        }
        self.inner.state.set(state);
        self.inner.finish_hooks.borrow_mut().clear();
        let released = self.inner.scope.release();
        tracing::debug!(command = %self.inner.name, ?state, released, "command ended");
        self.inner.signals.command_ended.dispatch(&CommandEnded {
            id: self.inner.id,
            name: self.inner.name.clone(),
            state,
        });
        self.inner.completion.settle(outcome);
    }

    /// Runs `body`; an error unwinds everything registered so far before it propagates.
    pub fn run(&self, body: impl FnOnce(&Command) -> Result<(), Fault>) -> Completion<()> {
        if let Err(fault) = body(self) {
            self.fail(fault);
        }
        self.completion()
    }
}

impl<T: Clone + 'static> TaskHandle<T> {
    /// Ties this task to `command`: cancelled with it, failing it on unrecovered errors.
    pub fn resource(self, command: &Command) -> Self {
        command.attach_task(&self);
        self
    }
}

/// An editing operation the executor can run inside a fresh `Command`.
pub trait CommandLike {
    fn name(&self) -> &'static str;

    fn execute(self: Box<Self>, command: &Command, editor: &Editor) -> Result<(), Fault>;
}

struct Queued {
    body: Box<dyn CommandLike>,
    agent: Agent,
    completion: Completion<()>,
}

#[derive(Default)]
struct ExecutorInner {
    active: RefCell<Option<Command>>,
    queue: RefCell<VecDeque<Queued>>,
    started: Cell<u64>,
}

/// Runs commands one at a time; `interrupt` cancels whatever is active first.
#[derive(Clone, Default)]
pub struct CommandExecutor {
    inner: Rc<ExecutorInner>,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<Command> {
        self.inner.active.borrow().clone().filter(Command::is_running)
    }

    pub fn queued(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    pub fn started(&self) -> u64 {
        self.inner.started.get()
    }

    pub fn enqueue(
        &self,
        editor: &Editor,
        body: Box<dyn CommandLike>,
        agent: Agent,
        interrupt: bool,
    ) -> Completion<()> {
        let completion = Completion::new();
        self.inner.queue.borrow_mut().push_back(Queued { body, agent, completion: completion.clone() });
        if interrupt {
            self.cancel_active();
        }
        self.pump(editor);
        completion
    }

    /// Drops every queued command, rejecting their completions as cancelled.
    pub fn clear_queue(&self) -> usize {
        let dropped: Vec<Queued> = self.inner.queue.borrow_mut().drain(..).collect();
        for queued in &dropped {
            queued.completion.reject(Fault::Cancelled);
        }
        dropped.len()
    }

    pub fn cancel_active(&self) -> bool {
        match self.active() {
            Some(command) => {
                command.cancel();
                true
            }
            None => false,
        }
    }

    pub fn finish_active(&self) -> bool {
        match self.active() {
            Some(command) => {
                command.finish();
                true
            }
            None => false,
        }
    }

    /// Starts the next queued command when nothing is running.
    pub fn pump(&self, editor: &Editor) {
        if self.active().is_some() {
            return;
        }
        let Some(next) = self.inner.queue.borrow_mut().pop_front() else {
            self.inner.active.borrow_mut().take();
            return;
        };
        let command = Command::new(next.body.name(), next.agent, editor.signals.clone());
        *self.inner.active.borrow_mut() = Some(command.clone());
        self.inner.started.set(self.inner.started.get() + 1);

        let executor = self.clone();
        let host = editor.clone();
        let forward = next.completion;
        let id = command.id();
        command.completion().on_settled(move |outcome| {
            {
                let mut active = executor.inner.active.borrow_mut();
                if active.as_ref().map(Command::id) == Some(id) {
                    active.take();
                }
            }
            forward.settle(outcome.clone());
            executor.pump(&host);
        });

        let body = next.body;
        command.run(|command| body.execute(command, editor));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Command {
        Command::new("test", Agent::Automated, EditorSignals::new())
    }

    #[test]
    fn cleanup_registered_after_termination_runs_immediately() {
        let cmd = command();
        cmd.finish();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        cmd.ensure(move || flag.set(true));
        assert!(ran.get());
        assert_eq!(cmd.state(), CommandState::Finished);
    }

    #[test]
    fn failing_hook_fails_the_command() {
        let cmd = command();
        cmd.on_finish(|| Err(Fault::validation("nothing to commit")));
        cmd.finish();
        assert_eq!(cmd.state(), CommandState::Failed);
        assert_eq!(cmd.completion().outcome(), Some(Err(Fault::validation("nothing to commit"))));
    }
}
