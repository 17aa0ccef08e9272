//! The capability every bus participant implements.

use std::cell::RefCell;
use std::rc::Rc;

use crate::{BusState, HalfCycles};

/// Something attached to the bus.
///
/// The bus calls `signal` whenever the component's condition asks for it.
/// `internal` holds the lines this component is currently driving and is
/// updated in place; lines the component leaves high are undriven.
/// `external` is the composite bus state as seen by this component.
pub trait Component {
    fn signal(
        &mut self,
        internal: &mut BusState,
        external: BusState,
        condition_true: bool,
        half_cycles: HalfCycles,
    );
}

/// Lets the host keep a handle on a component the bus also drives.
impl<C: Component + ?Sized> Component for Rc<RefCell<C>> {
    fn signal(
        &mut self,
        internal: &mut BusState,
        external: BusState,
        condition_true: bool,
        half_cycles: HalfCycles,
    ) {
        self.borrow_mut()
            .signal(internal, external, condition_true, half_cycles);
    }
}

/// A component built from a closure. See [`from_fn`].
pub struct FnComponent<F>(F);

impl<F> Component for FnComponent<F>
where
    F: FnMut(&mut BusState, BusState, bool, HalfCycles),
{
    fn signal(
        &mut self,
        internal: &mut BusState,
        external: BusState,
        condition_true: bool,
        half_cycles: HalfCycles,
    ) {
        (self.0)(internal, external, condition_true, half_cycles);
    }
}

/// Wrap a closure as a component. The closure's captures are its context.
pub fn from_fn<F>(handler: F) -> FnComponent<F>
where
    F: FnMut(&mut BusState, BusState, bool, HalfCycles),
{
    FnComponent(handler)
}

/// Remaps the bus state a component observes.
pub type Prefilter = Box<dyn Fn(BusState) -> BusState>;
