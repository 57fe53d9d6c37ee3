use kestrel_modeler::scope::{Disposable, ResourceScope};
use kestrel_modeler::signals::{EditorSignals, Signal};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn dispatch_without_subscribers_is_a_no_op() {
    let signals = EditorSignals::new();
    signals.scene_graph_changed.dispatch(&());
    assert!(signals.scene_graph_changed.is_empty());
}

#[test]
fn subscribers_run_in_registration_order_and_duplicates_fire() {
    let signal = Signal::<u32>::new("ordered");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let shared: Rc<dyn Fn(&u32)> = {
        let seen = Rc::clone(&seen);
        Rc::new(move |value| seen.borrow_mut().push(("shared", *value)))
    };
    let first = Rc::clone(&seen);
    signal.add(move |value| first.borrow_mut().push(("first", *value)));
    signal.add_rc(Rc::clone(&shared));
    signal.add_rc(shared);
    signal.dispatch(&5);
    assert_eq!(*seen.borrow(), vec![("first", 5), ("shared", 5), ("shared", 5)]);
}

#[test]
fn add_once_fires_once_across_back_to_back_dispatches() {
    let signal = Signal::<()>::new("once");
    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    signal.add_once(move |_| counter.set(counter.get() + 1));
    signal.dispatch(&());
    signal.dispatch(&());
    assert_eq!(hits.get(), 1);
    assert!(signal.is_empty());
}

#[test]
fn add_once_survives_nested_redispatch() {
    let signal = Signal::<u32>::new("nested");
    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    let again = signal.clone();
    signal.add_once(move |depth| {
        counter.set(counter.get() + 1);
        if *depth == 0 {
            again.dispatch(&1);
        }
    });
    signal.dispatch(&0);
    assert_eq!(hits.get(), 1);
}

#[test]
fn removal_during_dispatch_applies_to_the_next_dispatch() {
    let signal = Signal::<()>::new("removal");
    let later_hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&later_hits);
    let later_id = Rc::new(Cell::new(None));
    let (remover, target) = (signal.clone(), Rc::clone(&later_id));
    signal.add(move |_| {
        if let Some(id) = target.get() {
            remover.remove(id);
        }
    });
    let later = signal.add(move |_| counter.set(counter.get() + 1));
    later_id.set(Some(later.id()));

    signal.dispatch(&());
    assert_eq!(later_hits.get(), 1, "in-flight snapshot still delivers");
    signal.dispatch(&());
    assert_eq!(later_hits.get(), 1);
    assert_eq!(signal.len(), 1);
}

#[test]
fn subscription_added_mid_dispatch_waits_for_the_next_one() {
    let signal = Signal::<()>::new("late");
    let hits = Rc::new(Cell::new(0));
    let (adder, counter) = (signal.clone(), Rc::clone(&hits));
    signal.add_once(move |_| {
        let counter = Rc::clone(&counter);
        adder.add(move |_| counter.set(counter.get() + 1));
    });
    signal.dispatch(&());
    assert_eq!(hits.get(), 0);
    signal.dispatch(&());
    assert_eq!(hits.get(), 1);
}

#[test]
fn subscriptions_unsubscribe_when_their_scope_releases() {
    let signals = EditorSignals::new();
    let scope = ResourceScope::new("panel");
    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    scope.register(signals.gizmo_changed.add(move |_| counter.set(counter.get() + 1)));
    signals.gizmo_changed.dispatch(&());
    scope.release();
    signals.gizmo_changed.dispatch(&());
    assert_eq!(hits.get(), 1);

    let mut orphan = signals.history_changed.add(|_| {});
    drop(signals);
    orphan.dispose();
}

#[test]
fn debug_output_names_the_signal_and_counts_subscribers() {
    let signal = Signal::<String>::new("renamed");
    let _first = signal.add(|_| {});
    let _second = signal.add(|_| {});
    let rendered = format!("{signal:?}");
    assert!(rendered.contains("renamed"));
    assert!(rendered.contains("subscribers: 2"));
}
