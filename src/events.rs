use std::fmt;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    EntityAdded { id: String },
    EntityRemoved { id: String },
    EntitySelected { id: String },
    EntityDeselected { id: String },
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::EntityAdded { id } => write!(f, "EntityAdded id={id}"),
            EngineEvent::EntityRemoved { id } => write!(f, "EntityRemoved id={id}"),
            EngineEvent::EntitySelected { id } => write!(f, "EntitySelected id={id}"),
            EngineEvent::EntityDeselected { id } => write!(f, "EntityDeselected id={id}"),
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    events: Vec<EngineEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }
}
