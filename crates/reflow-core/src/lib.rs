pub mod descriptor;
pub mod dom;
pub mod event;
pub mod flow;
pub mod resolver;

pub use descriptor::{describe, ElementDescriptor, TEXT_CAP, VALUE_CAP};
pub use dom::{DomNode, DomSnapshot, NodeId};
pub use event::{EventKind, InteractionEvent};
pub use flow::RecordedSequence;
pub use resolver::{resolve, ResolveError};
