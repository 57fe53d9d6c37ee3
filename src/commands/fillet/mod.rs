//! Interactive fillet/chamfer over selected edges.
//!
//! The dialog decides the outcome: submit finishes the command (committing the preview),
//! cancel rejects it. Everything else (pickers, gizmos, keyboard, highlight overrides, the
//! phantom preview) is a resource of the command and unwinds with it.

mod dialog;
mod factory;
mod gizmo;
mod keyboard;

pub use dialog::{DialogView, FilletDialog};
pub use factory::{FilletKernel, FilletMode, FilletParams, FilletRequest, MultiFilletFactory, RadiusFunction};
pub use gizmo::{FilletGizmo, VariableHandle};
pub use keyboard::{FilletKeyboardGizmo, KeyboardCommand};

use crate::command::{Agent, Command, CommandLike, WeakCommand};
use crate::editor::Editor;
use crate::error::Fault;
use crate::factory::GeometryFactory;
use crate::geometry::ItemRef;
use crate::gizmo::GizmoMode;
use crate::picker::{ObjectPicker, PointPicker, Quasimode};
use crate::raycast::RaycasterParams;
use crate::scope::Disposable;
use crate::selection::{PickerCapabilities, Selection, SelectionMode};
use glam::Vec3;
use std::rc::Rc;

pub struct FilletSolidCommand {
    pub point: Option<Vec3>,
    kernel: Rc<dyn FilletKernel>,
}

impl FilletSolidCommand {
    pub fn new(kernel: Rc<dyn FilletKernel>) -> Self {
        Self { point: None, kernel }
    }

    pub fn at(mut self, point: Vec3) -> Self {
        self.point = Some(point);
        self
    }
}

/// Shared handles the later stages of the command need.
#[derive(Clone)]
struct FilletSession {
    command: WeakCommand,
    editor: Editor,
    factory: MultiFilletFactory,
    gizmo: FilletGizmo,
    keyboard: Rc<FilletKeyboardGizmo>,
    dialog: Rc<FilletDialog>,
    object_picker: ObjectPicker,
}

impl FilletSession {
    fn update_preview(&self) {
        if let Err(fault) = self.factory.update() {
            tracing::warn!(error = %fault, "fillet preview update failed; parameters kept for retry");
        }
    }

    fn sync_mode(&self) {
        let mode = self.factory.mode();
        self.keyboard.toggle(mode);
        self.gizmo.toggle(mode);
        self.dialog.toggle(mode);
        self.dialog.render();
    }

    fn retarget(&self, selection: &Selection) {
        self.factory.set_edges(selection.edges());
        self.gizmo.show_edges();
    }

    fn on_edges_selected(&self, selection: Selection) {
        let Some(command) = self.command.upgrade() else { return };
        self.factory.set_edges(selection.edges());

        let config = &self.editor.config.picker;
        let mut variable = PointPicker::new(&self.editor);
        let restriction = variable.restrict_to_edges(&self.factory.edges());
        variable.raycaster_params = RaycasterParams {
            line_threshold: config.variable_line_threshold,
            points_threshold: config.variable_points_threshold,
        };
        let variable = Rc::new(variable);

        let session = self.clone();
        self.keyboard
            .execute(move |key| {
                let Some(command) = session.command.upgrade() else { return };
                match key {
                    KeyboardCommand::Add => {
                        let (session, restriction) = (session.clone(), Rc::clone(&restriction));
                        variable.execute().resource(&command).then(
                            move |picked| {
                                let Some(matched) = picked.matched.or_else(|| restriction.current_match()) else {
                                    return;
                                };
                                let Some(command) = session.command.upgrade() else { return };
                                let t = matched.t(picked.point);
                                let added = session.gizmo.add_variable(picked.point, matched.model.clone(), t);
                                let (name, changed) = (matched.name.clone(), session.clone());
                                added
                                    .execute(
                                        move |value| {
                                            changed.factory.insert_value(&name, t, value);
                                            changed.update_preview();
                                        },
                                        GizmoMode::Persistent,
                                    )
                                    .resource(&command);
                            },
                            |_| {},
                        );
                    }
                    KeyboardCommand::ToggleMode => {
                        session.factory.toggle_mode();
                        session.sync_mode();
                        session.update_preview();
                    }
                }
            })
            .resource(&command);

        let session = self.clone();
        self.gizmo
            .execute(move |_| {
                session.sync_mode();
                session.update_preview();
            })
            .resource(&command);
        self.gizmo.show_edges();

        let session = self.clone();
        command.resource(self.factory.changed().add_once(move |_| {
            let Some(command) = session.command.upgrade() else { return };
            let quasi_picker =
                ObjectPicker::new(&session.editor, Some(session.object_picker.selection()), "viewport-selector[quasimode]")
                    .with_capabilities(PickerCapabilities::QUASIMODE);
            quasi_picker.set_mode(SelectionMode::CURVE_EDGE);
            let quasimode = Quasimode::new("modify-selection", &session.editor, quasi_picker);
            let retarget = session.clone();
            quasimode.execute(move |selection| retarget.retarget(selection), 1, usize::MAX).resource(&command);
        }));

        if command.agent() == Agent::User {
            let retarget = self.clone();
            let task = self
                .object_picker
                .execute(move |selection| retarget.retarget(selection), 1, usize::MAX)
                .resource(&command);
            command.resource(self.factory.changed().add_once(move |_| task.finish()));
        }
    }
}

impl CommandLike for FilletSolidCommand {
    fn name(&self) -> &'static str {
        "fillet-solid"
    }

    fn execute(self: Box<Self>, command: &Command, editor: &Editor) -> Result<(), Fault> {
        let factory = command.resource(MultiFilletFactory::new(editor, Rc::clone(&self.kernel)));
        let gizmo = command.resource(FilletGizmo::new(editor, &factory, self.point));
        let keyboard = Rc::new(FilletKeyboardGizmo::new(editor));
        let dialog = Rc::new(FilletDialog::new(editor, &factory));

        let object_picker = ObjectPicker::new(editor, None, "viewport-selector");
        let session = FilletSession {
            command: command.downgrade(),
            editor: editor.clone(),
            factory: factory.clone(),
            gizmo: gizmo.clone(),
            keyboard,
            dialog: Rc::clone(&dialog),
            object_picker: object_picker.clone(),
        };

        let preview = session.clone();
        let (finished, cancelled) = (command.downgrade(), command.downgrade());
        dialog
            .execute(move |params| {
                preview.sync_mode();
                preview.gizmo.render(params.distance1);
                preview.update_preview();
            })
            .resource(command)
            .then(
                move |_| {
                    if let Some(command) = finished.upgrade() {
                        command.finish();
                    }
                },
                move |_| {
                    if let Some(command) = cancelled.upgrade() {
                        command.cancel();
                    }
                },
            );

        let mut revert = editor.highlighter.use_temporary(object_picker.selection());
        command.ensure(move || revert.dispose());

        object_picker.set_mode(SelectionMode::CURVE_EDGE);
        object_picker.copy(&editor.selection.snapshot());

        let committing = (factory.clone(), editor.clone());
        command.on_finish(move || {
            let (factory, editor) = committing;
            let results = factory.commit()?;
            editor.selection.retain_existing(&editor.db.borrow(), "fillet");
            for id in results {
                editor.selection.add(ItemRef::Solid(id), "fillet");
            }
            Ok(())
        });

        let next = session.clone();
        object_picker
            .slice(SelectionMode::CURVE_EDGE, 1, usize::MAX)
            .resource(command)
            .then(move |edges| next.on_edges_selected(edges), |_| {});
        Ok(())
    }
}
