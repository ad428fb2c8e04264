use crate::input::xml::ClosedElement;

pub mod dtd;
pub mod xml;

/// Consumes element events one at a time
pub trait EventConsumer<E> {
    /// Will be called on every element event. Returns the element that has
    /// just been closed or [`None`] if the event did not close an element.
    fn on_event(&mut self, event: E) -> Option<ClosedElement>;
}
