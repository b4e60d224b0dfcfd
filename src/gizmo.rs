use crate::render_graph::NodeId;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum GizmoMode {
    Translate,
    Rotate,
}

impl Default for GizmoMode {
    fn default() -> Self {
        GizmoMode::Translate
    }
}

/// Binding state for the external transform-manipulation widget. The widget
/// itself lives in the host UI; the engine only tracks what it is attached to
/// and whether a drag is in flight.
#[derive(Default)]
pub struct GizmoBinding {
    attached: Option<NodeId>,
    mode: GizmoMode,
    dragging: bool,
}

impl GizmoBinding {
    pub fn attach(&mut self, node: NodeId) {
        self.attached = Some(node);
    }

    pub fn detach(&mut self) {
        self.attached = None;
        self.dragging = false;
    }

    pub fn attached(&self) -> Option<NodeId> {
        self.attached
    }

    pub fn mode(&self) -> GizmoMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: GizmoMode) {
        self.mode = mode;
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging && self.attached.is_some();
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }
}
