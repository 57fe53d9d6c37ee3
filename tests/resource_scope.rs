use kestrel_modeler::command::{Agent, Command, CommandState};
use kestrel_modeler::scope::{Disposable, Disposer, ResourceScope, ScopeState};
use kestrel_modeler::signals::EditorSignals;
use kestrel_modeler::task::{Completion, TaskCore, TaskHandle, TaskControl};
use kestrel_modeler::Fault;
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<usize>>>;

fn tracked(log: &Log, index: usize) -> Disposer {
    let log = Rc::clone(log);
    Disposer::new(move || log.borrow_mut().push(index))
}

fn command(signals: &EditorSignals) -> Command {
    Command::new("test-command", Agent::User, signals.clone())
}

struct CoreControl(Rc<TaskCore<u32>>);

impl TaskControl for CoreControl {
    fn cancel(&self) {
        self.0.reject(Fault::Cancelled);
    }

    fn finish(&self) {
        self.0.resolve(0);
    }
}

fn child_task() -> (Rc<TaskCore<u32>>, TaskHandle<u32>) {
    let core = Rc::new(TaskCore::new("child"));
    let handle = TaskHandle::new(core.completion(), Rc::new(CoreControl(Rc::clone(&core))));
    (core, handle)
}

proptest! {
    #[test]
    fn release_is_reverse_order_and_exactly_once(count in 0usize..24, extra_releases in 1usize..4) {
        let scope = ResourceScope::new("prop");
        let log: Log = Rc::default();
        for index in 0..count {
            scope.register(tracked(&log, index));
        }
        prop_assert_eq!(scope.release(), count);
        for _ in 0..extra_releases {
            prop_assert_eq!(scope.release(), 0);
        }
        let expected: Vec<usize> = (0..count).rev().collect();
        prop_assert_eq!(log.borrow().clone(), expected);
        let stats = scope.stats();
        prop_assert_eq!(stats.registered, count);
        prop_assert_eq!(stats.released, count);
    }

    #[test]
    fn every_exit_path_releases_each_resource_once(count in 1usize..12, exit in 0u8..3) {
        let signals = EditorSignals::new();
        let cmd = command(&signals);
        let log: Log = Rc::default();
        for index in 0..count {
            cmd.resource(Rc::new(RefCell::new(tracked(&log, index))));
        }
        match exit {
            0 => cmd.finish(),
            1 => cmd.cancel(),
            _ => cmd.fail(Fault::validation("bad input")),
        }
        cmd.finish();
        cmd.cancel();
        let expected: Vec<usize> = (0..count).rev().collect();
        prop_assert_eq!(log.borrow().clone(), expected);
    }
}

#[test]
fn late_registration_is_disposed_immediately() {
    let scope = ResourceScope::new("late");
    scope.release();
    assert_eq!(scope.state(), ScopeState::Released);
    let log: Log = Rc::default();
    scope.register(tracked(&log, 7));
    assert_eq!(*log.borrow(), vec![7]);
    assert_eq!(scope.pending(), 0);
}

#[test]
fn disposer_is_idempotent() {
    let log: Log = Rc::default();
    let mut disposer = tracked(&log, 1);
    disposer.dispose();
    disposer.dispose();
    assert!(disposer.is_disposed());
    assert_eq!(*log.borrow(), vec![1]);
}

#[test]
fn cleanup_registering_during_release_still_runs() {
    let scope = ResourceScope::new("reentrant");
    let log: Log = Rc::default();
    let (inner_scope, inner_log) = (scope.clone(), Rc::clone(&log));
    scope.ensure(move || {
        inner_log.borrow_mut().push(1);
        inner_scope.register(tracked(&inner_log, 2));
    });
    scope.release();
    assert_eq!(*log.borrow(), vec![1, 2]);
}

#[test]
fn cancel_rejects_completion_and_announces_the_end() {
    let signals = EditorSignals::new();
    let ended = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&ended);
    let _subscription = signals.command_ended.add(move |event| seen.borrow_mut().push(event.state));
    let cmd = command(&signals);
    cmd.cancel();
    assert_eq!(cmd.state(), CommandState::Cancelled);
    assert_eq!(pollster::block_on(cmd.completion()), Err(Fault::Cancelled));
    assert_eq!(*ended.borrow(), vec![CommandState::Cancelled]);
}

#[test]
fn cleanup_that_cancels_its_own_command_is_a_no_op() {
    let signals = EditorSignals::new();
    let cmd = command(&signals);
    let weak = cmd.downgrade();
    cmd.ensure(move || {
        if let Some(cmd) = weak.upgrade() {
            cmd.cancel();
        }
    });
    cmd.finish();
    assert_eq!(cmd.state(), CommandState::Finished);
    assert_eq!(cmd.completion().outcome(), Some(Ok(())));
}

#[test]
fn finish_hooks_run_in_order_before_release() {
    let signals = EditorSignals::new();
    let cmd = command(&signals);
    let order = Rc::new(RefCell::new(Vec::new()));
    let released = Rc::clone(&order);
    cmd.ensure(move || released.borrow_mut().push("release"));
    let (first, second) = (Rc::clone(&order), Rc::clone(&order));
    cmd.on_finish(move || {
        first.borrow_mut().push("commit-1");
        Ok(())
    });
    cmd.on_finish(move || {
        second.borrow_mut().push("commit-2");
        Ok(())
    });
    cmd.finish();
    assert_eq!(*order.borrow(), vec!["commit-1", "commit-2", "release"]);
}

#[test]
fn run_unwinds_resources_when_the_body_fails() {
    let signals = EditorSignals::new();
    let cmd = command(&signals);
    let log: Log = Rc::default();
    let registered = Rc::clone(&log);
    let completion = cmd.run(move |cmd| {
        cmd.resource(Rc::new(RefCell::new(tracked(&registered, 1))));
        cmd.resource(Rc::new(RefCell::new(tracked(&registered, 2))));
        Err(Fault::state("picker unavailable"))
    });
    assert_eq!(*log.borrow(), vec![2, 1]);
    assert_eq!(cmd.state(), CommandState::Failed);
    assert_eq!(completion.outcome(), Some(Err(Fault::state("picker unavailable"))));
}

#[test]
fn pending_child_task_is_cancelled_with_its_command() {
    let signals = EditorSignals::new();
    let cmd = command(&signals);
    let (core, handle) = child_task();
    let log: Log = Rc::default();
    core.scope().register(tracked(&log, 9));
    let handle = handle.resource(&cmd);
    cmd.cancel();
    assert_eq!(handle.outcome(), Some(Err(Fault::Cancelled)));
    assert_eq!(*log.borrow(), vec![9]);
}

#[test]
fn child_failure_fails_the_command_unless_caught() {
    let signals = EditorSignals::new();
    let cmd = command(&signals);
    let (core, handle) = child_task();
    let _handle = handle.resource(&cmd);
    core.reject(Fault::external("kernel", "degenerate edge"));
    assert_eq!(cmd.state(), CommandState::Failed);

    let recovering = command(&signals);
    let (core, handle) = child_task();
    let caught = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&caught);
    let _handle = handle.catch(move |fault| *sink.borrow_mut() = Some(fault.kind())).resource(&recovering);
    core.reject(Fault::validation("too small"));
    assert!(recovering.is_running());
    assert!(caught.borrow().is_some());
}

#[test]
fn completion_future_resolves_once_settled() {
    let completion = Completion::<u32>::new();
    completion.resolve(3);
    completion.reject(Fault::Cancelled);
    assert_eq!(pollster::block_on(completion), Ok(3));
}
