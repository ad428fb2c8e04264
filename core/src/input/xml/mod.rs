pub use element_event::ElementEvent;
pub use tree_builder::{ClosedElement, TreeBuilder};

mod element_event;
mod tree_builder;
