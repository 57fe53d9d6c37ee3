use crate::geometry::{ItemRef, PhantomObject};
use crate::helpers::HelperObject;

#[derive(Debug, Clone, PartialEq)]
pub enum SceneNode {
    Item(ItemRef),
    Phantom(PhantomObject),
    Helper(HelperObject),
}

/// A dedicated parent the compositor draws in one pass.
#[derive(Debug, Default)]
pub struct SceneRoot {
    children: Vec<SceneNode>,
}

impl SceneRoot {
    pub fn attach(&mut self, nodes: impl IntoIterator<Item = SceneNode>) {
        self.children.extend(nodes);
    }

    pub fn detach_all(&mut self) -> usize {
        let count = self.children.len();
        self.children.clear();
        count
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Per-purpose roots the live objects are re-parented into for one frame.
#[derive(Debug, Default)]
pub struct SceneRoots {
    pub base: SceneRoot,
    pub phantoms: SceneRoot,
    pub helpers: SceneRoot,
}

impl SceneRoots {
    pub fn attached(&self) -> usize {
        self.base.len() + self.phantoms.len() + self.helpers.len()
    }

    pub fn detach_all(&mut self) -> usize {
        self.base.detach_all() + self.phantoms.detach_all() + self.helpers.detach_all()
    }
}
