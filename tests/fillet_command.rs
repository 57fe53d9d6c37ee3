use anyhow::bail;
use glam::Vec3;
use kestrel_modeler::command::{Agent, CommandState};
use kestrel_modeler::commands::fillet::{FilletKernel, FilletMode, FilletRequest};
use kestrel_modeler::commands::FilletSolidCommand;
use kestrel_modeler::config::ModelerConfig;
use kestrel_modeler::geometry::{CreatorKind, EdgeId, ItemRef, SolidId, SolidShape};
use kestrel_modeler::input::InputEvent;
use kestrel_modeler::raycast::Ray;
use kestrel_modeler::task::Completion;
use kestrel_modeler::{Editor, Fault};
use std::cell::RefCell;
use std::rc::Rc;

const X0: EdgeId = EdgeId(1);
const X2: EdgeId = EdgeId(3);

#[derive(Debug, Clone, PartialEq)]
struct Call {
    edges: Vec<String>,
    distance: f32,
    mode: FilletMode,
}

/// Shrinks the solid slightly and records what it was asked; radii above 1 fail.
#[derive(Default)]
struct FakeKernel {
    calls: RefCell<Vec<Call>>,
}

impl FilletKernel for FakeKernel {
    fn fillet(&self, request: &FilletRequest<'_>) -> anyhow::Result<SolidShape> {
        self.calls.borrow_mut().push(Call {
            edges: request.edges.to_vec(),
            distance: request.params.distance1,
            mode: request.params.mode,
        });
        if request.params.distance1 > 1.0 {
            bail!("radius {} exceeds the adjacent faces", request.params.distance1);
        }
        let inset = Vec3::splat(request.params.distance1 * 0.1);
        let mut shape = SolidShape::cuboid(format!("{}-filleted", request.solid.name), request.solid.min + inset, request.solid.max - inset);
        shape.creators = request.solid.creators.clone();
        Ok(shape)
    }
}

struct Fixture {
    editor: Editor,
    kernel: Rc<FakeKernel>,
}

impl Fixture {
    fn new() -> Self {
        let editor = Editor::new(ModelerConfig::default());
        editor.add_shape(SolidShape::cuboid("box", Vec3::ZERO, Vec3::ONE));
        editor.selection.add(ItemRef::Edge(X0), "test");
        Self { editor, kernel: Rc::new(FakeKernel::default()) }
    }

    fn start(&self, agent: Agent) -> Completion<()> {
        let kernel: Rc<dyn FilletKernel> = self.kernel.clone();
        self.editor.enqueue(Box::new(FilletSolidCommand::new(kernel)), agent, false)
    }

    fn send(&self, event: InputEvent) {
        self.editor.dispatch_input(&event);
    }

    fn edit_distance(&self, value: f32) {
        self.send(InputEvent::DialogEdit { field: "distance1".into(), value });
    }

    fn click(&self, x: f32, z: f32) {
        self.send(InputEvent::PointerDown { ray: Ray::new(Vec3::new(x, -5.0, z), Vec3::Y) });
    }

    fn state(&self) -> Option<CommandState> {
        self.editor.executor.active().map(|command| command.state())
    }
}

#[test]
fn cancel_restores_selection_and_geometry_exactly() {
    let fixture = Fixture::new();
    let db_before = fixture.editor.db.borrow().clone();
    let selection_before = fixture.editor.selection.snapshot();

    let completion = fixture.start(Agent::User);
    assert_eq!(fixture.state(), Some(CommandState::Running));
    assert_eq!(fixture.editor.highlighter.temporary_depth(), 1);
    fixture.edit_distance(0.2);
    assert_eq!(fixture.editor.db.borrow().phantoms().len(), 1);

    fixture.send(InputEvent::Abort);
    assert_eq!(completion.outcome(), Some(Err(Fault::Cancelled)));
    assert_eq!(*fixture.editor.db.borrow(), db_before);
    assert_eq!(fixture.editor.selection.snapshot(), selection_before);
    assert!(fixture.editor.input.is_empty(), "listeners left behind: {:?}", fixture.editor.input.labels());
    assert!(fixture.editor.helpers.is_empty());
    assert_eq!(fixture.editor.highlighter.temporary_depth(), 0);
}

#[test]
fn dialog_cancel_cancels_the_command() {
    let fixture = Fixture::new();
    let ended = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&ended);
    let _subscription = fixture.editor.signals.command_ended.add(move |event| sink.borrow_mut().push(event.state));
    let completion = fixture.start(Agent::Automated);
    fixture.send(InputEvent::DialogCancel);
    assert_eq!(completion.outcome(), Some(Err(Fault::Cancelled)));
    assert_eq!(*ended.borrow(), vec![CommandState::Cancelled]);
    assert!(fixture.editor.input.is_empty());
}

#[test]
fn submit_commits_the_fillet_and_selects_the_result() {
    let fixture = Fixture::new();
    let completion = fixture.start(Agent::User);
    fixture.edit_distance(0.25);
    fixture.send(InputEvent::DialogSubmit);

    assert_eq!(pollster::block_on(completion), Ok(()));
    let db = fixture.editor.db.borrow();
    assert_eq!(db.solid_count(), 1);
    assert!(db.solid(SolidId(1)).is_none(), "original solid replaced");
    let result = db.solid(SolidId(2)).expect("filleted solid");
    let creator = result.creators.last().expect("fillet creator");
    assert_eq!(creator.kind, CreatorKind::Fillet);
    assert_eq!(creator.parameters.get("distance1"), Some(&0.25));
    assert!(db.phantoms().is_empty());
    assert_eq!(fixture.editor.selection.snapshot().items(), &[ItemRef::Solid(SolidId(2))]);
    assert!(fixture.editor.input.is_empty());
}

#[test]
fn failed_preview_keeps_parameters_for_a_retry() {
    let fixture = Fixture::new();
    let completion = fixture.start(Agent::Automated);
    fixture.edit_distance(0.5);
    fixture.edit_distance(3.0);
    assert_eq!(fixture.state(), Some(CommandState::Running), "a failed preview is not fatal");
    assert_eq!(fixture.editor.db.borrow().phantoms().len(), 1, "last good preview stays up");

    fixture.edit_distance(0.75);
    let calls = fixture.kernel.calls.borrow().clone();
    assert_eq!(calls.iter().map(|call| call.distance).collect::<Vec<_>>(), vec![0.5, 3.0, 0.75]);
    assert!(calls.iter().all(|call| call.edges == vec!["x0".to_string()]));
    fixture.send(InputEvent::DialogSubmit);
    assert_eq!(completion.outcome(), Some(Ok(())));
}

#[test]
fn commit_failure_fails_the_command_and_still_cleans_up() {
    let fixture = Fixture::new();
    let completion = fixture.start(Agent::Automated);
    fixture.edit_distance(2.0);
    fixture.send(InputEvent::DialogSubmit);
    let outcome = completion.outcome().expect("settled");
    assert!(matches!(outcome, Err(Fault::External { ref context, .. }) if context == "fillet"));
    assert_eq!(fixture.editor.db.borrow().solid_count(), 1);
    assert!(fixture.editor.input.is_empty());
}

#[test]
fn toggle_key_switches_to_chamfer() {
    let fixture = Fixture::new();
    let completion = fixture.start(Agent::Automated);
    fixture.edit_distance(0.1);
    fixture.send(InputEvent::key_down("t"));
    assert_eq!(fixture.kernel.calls.borrow().last().map(|call| call.mode), Some(FilletMode::Chamfer));
    fixture.send(InputEvent::DialogSubmit);
    assert_eq!(completion.outcome(), Some(Ok(())));
    let db = fixture.editor.db.borrow();
    let kinds: Vec<CreatorKind> = db.solids().flat_map(|solid| solid.creators.iter().map(|c| c.kind)).collect();
    assert_eq!(kinds, vec![CreatorKind::ElementarySolid, CreatorKind::Chamfer]);
}

#[test]
fn quasimode_extends_the_edge_set_of_a_running_fillet() {
    let fixture = Fixture::new();
    let completion = fixture.start(Agent::User);
    fixture.edit_distance(0.1);

    fixture.send(InputEvent::key_down("ctrl"));
    fixture.click(0.5, 1.0);
    fixture.send(InputEvent::key_up("ctrl"));
    fixture.edit_distance(0.2);

    let last = fixture.kernel.calls.borrow().last().cloned().expect("kernel called");
    assert_eq!(last.edges, vec!["x0".to_string(), "x2".to_string()]);
    fixture.send(InputEvent::DialogSubmit);
    assert_eq!(completion.outcome(), Some(Ok(())));
    assert!(fixture.editor.db.borrow().edge(X2).is_none());
}

#[test]
fn add_variable_key_places_a_radius_handle_on_a_target_edge() {
    let fixture = Fixture::new();
    let completion = fixture.start(Agent::Automated);
    fixture.edit_distance(0.1);
    let helpers_before = fixture.editor.helpers.len();

    fixture.send(InputEvent::key_down("a"));
    fixture.click(0.5, 0.0);
    assert_eq!(fixture.editor.helpers.len(), helpers_before + 1);

    fixture.send(InputEvent::DialogSubmit);
    assert_eq!(completion.outcome(), Some(Ok(())));
    assert!(fixture.editor.helpers.is_empty());
}
