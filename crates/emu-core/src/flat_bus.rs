//! A single-level bus that dispatches line changes to its components.
//!
//! Components are split into three partitions by the shape of their
//! condition so that a stimulus only scans the members that could care:
//!
//! - **clocked**: observes exactly the clock line; run on every clock edge.
//! - **edge-only**: asked never to hear about falling conditions; run only
//!   when their test becomes true (or a change line toggles while true).
//! - **level-edge**: everything else; run whenever their test flips.
//!
//! Each partition keeps the wired-AND of its members' outputs, so the bus
//! state seen by anyone is the host's external lines ANDed with the three
//! partition composites.

use std::fmt;

use tracing::{debug, trace};

use crate::component::{Component, Prefilter};
use crate::lines::CLOCK;
use crate::{BusError, BusState, Condition, HalfCycles, Observable, Value};

/// Which dispatch group a component landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Clocked,
    EdgeOnly,
    LevelEdge,
}

impl Partition {
    /// Placement is decided purely by the condition's shape.
    #[must_use]
    pub const fn of(condition: &Condition) -> Self {
        if condition.is_clocked() {
            Self::Clocked
        } else if condition.edge_only() {
            Self::EdgeOnly
        } else {
            Self::LevelEdge
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clocked => write!(f, "clocked"),
            Self::EdgeOnly => write!(f, "edge-only"),
            Self::LevelEdge => write!(f, "level-edge"),
        }
    }
}

/// Handle to a registered component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId {
    partition: Partition,
    index: usize,
}

impl ComponentId {
    #[must_use]
    pub const fn partition(self) -> Partition {
        self.partition
    }
}

struct Member {
    condition: Condition,
    output_lines: u64,
    component: Box<dyn Component>,
    prefilter: Option<Prefilter>,
    internal: BusState,
    last_result: bool,
    last_delivered: BusState,
}

impl Member {
    fn invoke(&mut self, total: BusState, condition_true: bool, half_cycles: HalfCycles) {
        let delivered = self.prefilter.as_ref().map_or(total, |filter| filter(total));
        self.last_delivered = delivered;
        self.component
            .signal(&mut self.internal, delivered, condition_true, half_cycles);
        // Lines the component never declared stay undriven.
        self.internal.set_inactive(!self.output_lines);
    }
}

#[derive(Default)]
struct Group {
    members: Vec<Member>,
    set_lines: u64,
    reset_lines: u64,
    change_lines: u64,
    state: BusState,
    last_external: BusState,
}

impl Group {
    fn recompute_interest(&mut self) {
        self.set_lines = 0;
        self.reset_lines = 0;
        self.change_lines = 0;
        for member in &self.members {
            let condition = member.condition;
            self.set_lines |= condition.mask() & condition.values();
            self.reset_lines |= condition.mask() & !condition.values();
            self.change_lines |= condition.changed_lines() & !condition.mask();
        }
    }

    /// Returns `(changed, interested)` and records `total` as last seen.
    fn observe(&mut self, total: BusState) -> (u64, bool) {
        let changed = self.last_external.raw() ^ total.raw();
        self.last_external = total;
        let set = total.raw() & changed;
        let reset = !total.raw() & changed;
        let interested = self.set_lines & set != 0
            || self.reset_lines & reset != 0
            || self.change_lines & changed != 0;
        (changed, interested)
    }

    fn dispatch_edges(&mut self, total: BusState, half_cycles: HalfCycles) {
        let (changed, interested) = self.observe(total);
        if !interested {
            return;
        }

        self.state = BusState::IDLE;
        for member in &mut self.members {
            let condition = member.condition;
            let now = condition.evaluate(total.raw());
            let watched = (condition.mask() | condition.changed_lines()) & changed;
            if now && watched != 0 {
                member.invoke(total, true, half_cycles);
            }
            member.last_result = now;
            self.state &= member.internal;
        }
    }

    fn dispatch_levels(&mut self, total: BusState, half_cycles: HalfCycles) {
        let (changed, interested) = self.observe(total);

        if interested {
            self.state = BusState::IDLE;
            for member in &mut self.members {
                let condition = member.condition;
                let now = condition.evaluate(total.raw());
                let toggled = now && condition.changed_lines() & changed != 0;
                if now != member.last_result || toggled {
                    member.invoke(total, now, half_cycles);
                    member.last_result = now;
                }
                self.state &= member.internal;
            }
        } else if (self.set_lines | self.reset_lines) & changed != 0 {
            // A watched line moved the "wrong" way, which can only turn a
            // true condition false.
            self.state = BusState::IDLE;
            for member in &mut self.members {
                if member.last_result && !member.condition.evaluate(total.raw()) {
                    member.invoke(total, false, half_cycles);
                    member.last_result = false;
                }
                self.state &= member.internal;
            }
        }
    }

    fn dispatch_clock(&mut self, total: BusState, half_cycles: HalfCycles) {
        if (self.last_external.raw() ^ total.raw()) & CLOCK == 0 {
            return;
        }
        self.last_external = total;

        self.state = BusState::IDLE;
        for member in &mut self.members {
            let now = member.condition.evaluate(total.raw());
            if now || !member.condition.edge_only() {
                member.invoke(total, now, half_cycles);
            }
            member.last_result = now;
            self.state &= member.internal;
        }
    }
}

/// The dispatch engine.
#[derive(Default)]
pub struct FlatBus {
    clocked: Group,
    edge_only: Group,
    level_edge: Group,
    internal: BusState,
}

impl FlatBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a component.
    ///
    /// Returns `Ok(None)` when the condition can never be satisfied; such
    /// components are dropped rather than stored.
    pub fn register(
        &mut self,
        condition: Condition,
        output_lines: u64,
        component: impl Component + 'static,
    ) -> Result<Option<ComponentId>, BusError> {
        self.attach(condition, output_lines, None, Box::new(component))
    }

    /// Attach a component whose view of the bus is remapped by `prefilter`.
    pub fn register_filtered(
        &mut self,
        condition: Condition,
        output_lines: u64,
        prefilter: impl Fn(BusState) -> BusState + 'static,
        component: impl Component + 'static,
    ) -> Result<Option<ComponentId>, BusError> {
        self.attach(
            condition,
            output_lines,
            Some(Box::new(prefilter)),
            Box::new(component),
        )
    }

    fn attach(
        &mut self,
        condition: Condition,
        output_lines: u64,
        prefilter: Option<Prefilter>,
        component: Box<dyn Component>,
    ) -> Result<Option<ComponentId>, BusError> {
        if condition.is_impossible() {
            trace!(?condition, "dropping component with impossible condition");
            return Ok(None);
        }

        let partition = Partition::of(&condition);
        let group = self.group_mut(partition);
        if let Err(err) = group.members.try_reserve(1) {
            debug!(%partition, %err, "component registration failed");
            return Err(BusError::Allocation { partition });
        }

        let index = group.members.len();
        group.members.push(Member {
            condition,
            output_lines,
            component,
            prefilter,
            internal: BusState::IDLE,
            last_result: false,
            last_delivered: BusState::IDLE,
        });
        group.recompute_interest();

        trace!(
            %partition,
            index,
            observed = format_args!("{:#018x}", condition.observed_lines()),
            outputs = format_args!("{output_lines:#018x}"),
            "component registered"
        );
        Ok(Some(ComponentId { partition, index }))
    }

    /// Deliver one stimulus and return the bus's own composite output.
    pub fn propagate(&mut self, external: BusState, half_cycles: HalfCycles) -> BusState {
        let total = self.composite(external);
        self.edge_only.dispatch_edges(total, half_cycles);

        let total = self.composite(external);
        self.level_edge.dispatch_levels(total, half_cycles);

        let total = self.composite(external);
        self.clocked.dispatch_clock(total, half_cycles);

        self.internal = self.clocked.state & self.edge_only.state & self.level_edge.state;
        self.internal
    }

    /// The state every component sees: `external` ANDed with all outputs.
    #[must_use]
    pub fn composite(&self, external: BusState) -> BusState {
        external & self.clocked.state & self.edge_only.state & self.level_edge.state
    }

    /// Wired-AND of every component's output after the last stimulus.
    #[must_use]
    pub const fn internal_state(&self) -> BusState {
        self.internal
    }

    /// Lines a single component is currently driving.
    #[must_use]
    pub fn component_output(&self, id: ComponentId) -> Option<BusState> {
        self.group(id.partition)
            .members
            .get(id.index)
            .map(|member| member.internal)
    }

    /// The bus state last handed to a component, after any pre-filter.
    #[must_use]
    pub fn last_delivered(&self, id: ComponentId) -> Option<BusState> {
        self.group(id.partition)
            .members
            .get(id.index)
            .map(|member| member.last_delivered)
    }

    #[must_use]
    pub fn partition_len(&self, partition: Partition) -> usize {
        self.group(partition).members.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clocked.members.len() + self.edge_only.members.len() + self.level_edge.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A condition covering every line any component observes, for
    /// registering this bus on a parent bus.
    #[must_use]
    pub fn condition(&self) -> Condition {
        Condition::change(self.fold_members(|member| member.condition.observed_lines()))
    }

    /// Union of every component's declared outputs.
    #[must_use]
    pub fn output_lines(&self) -> u64 {
        self.fold_members(|member| member.output_lines)
    }

    fn fold_members(&self, lines: impl Fn(&Member) -> u64) -> u64 {
        [&self.clocked, &self.edge_only, &self.level_edge]
            .into_iter()
            .flat_map(|group| group.members.iter())
            .fold(0, |acc, member| acc | lines(member))
    }

    const fn group(&self, partition: Partition) -> &Group {
        match partition {
            Partition::Clocked => &self.clocked,
            Partition::EdgeOnly => &self.edge_only,
            Partition::LevelEdge => &self.level_edge,
        }
    }

    fn group_mut(&mut self, partition: Partition) -> &mut Group {
        match partition {
            Partition::Clocked => &mut self.clocked,
            Partition::EdgeOnly => &mut self.edge_only,
            Partition::LevelEdge => &mut self.level_edge,
        }
    }
}

/// A whole bus can sit on a parent bus as one component.
impl Component for FlatBus {
    fn signal(
        &mut self,
        internal: &mut BusState,
        external: BusState,
        _condition_true: bool,
        half_cycles: HalfCycles,
    ) {
        *internal = self.propagate(external, half_cycles);
    }
}

const FLAT_BUS_QUERY_PATHS: &[&str] = &[
    "internal",
    "components",
    "components.clocked",
    "components.edge_only",
    "components.level_edge",
];

impl Observable for FlatBus {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "internal" => Some(self.internal.raw().into()),
            "components" => Some((self.len() as u64).into()),
            "components.clocked" => Some((self.clocked.members.len() as u64).into()),
            "components.edge_only" => Some((self.edge_only.members.len() as u64).into()),
            "components.level_edge" => Some((self.level_edge.members.len() as u64).into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        FLAT_BUS_QUERY_PATHS
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;
    use crate::component::from_fn;

    const LINE_A: u64 = 1 << 40;
    const LINE_B: u64 = 1 << 41;
    const LINE_C: u64 = 1 << 42;

    type Calls = Rc<RefCell<Vec<bool>>>;

    /// A component that records every invocation's `condition_true`.
    fn recorder() -> (Calls, impl Component + 'static) {
        let calls: Calls = Rc::default();
        let log = Rc::clone(&calls);
        let component = from_fn(move |_: &mut BusState, _: BusState, now, _| {
            log.borrow_mut().push(now);
        });
        (calls, component)
    }

    /// External state with exactly `active` lines pulled low.
    fn driven(active: u64) -> BusState {
        let mut state = BusState::IDLE;
        state.set_active(active);
        state
    }

    #[rstest]
    #[case(Condition::reset(CLOCK, false), Partition::Clocked)]
    #[case(Condition::change(CLOCK), Partition::Clocked)]
    #[case(Condition::reset(LINE_A, true), Partition::EdgeOnly)]
    #[case(Condition::change(LINE_A), Partition::EdgeOnly)]
    #[case(Condition::reset(LINE_A, false), Partition::LevelEdge)]
    #[case(Condition::reset(CLOCK | LINE_A, false), Partition::LevelEdge)]
    fn components_land_in_one_partition(#[case] condition: Condition, #[case] expected: Partition) {
        let mut bus = FlatBus::new();
        let (_, component) = recorder();
        let id = bus.register(condition, 0, component).unwrap().unwrap();
        assert_eq!(id.partition(), expected);
        assert_eq!(bus.partition_len(expected), 1);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn impossible_components_are_never_stored() {
        let mut bus = FlatBus::new();
        let (calls, component) = recorder();
        assert_eq!(bus.register(Condition::impossible(), !0, component), Ok(None));
        assert!(bus.is_empty());

        for active in [0, LINE_A, CLOCK, !0] {
            bus.propagate(driven(active), HalfCycles::ZERO);
        }
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn level_edge_members_hear_both_transitions() {
        let mut bus = FlatBus::new();
        let (calls, component) = recorder();
        bus.register(Condition::reset(LINE_A, false), 0, component).unwrap();

        bus.propagate(driven(LINE_A), HalfCycles::new(0));
        bus.propagate(driven(LINE_A | LINE_B), HalfCycles::new(1));
        bus.propagate(driven(0), HalfCycles::new(2));

        assert_eq!(*calls.borrow(), [true, false]);
    }

    #[test]
    fn edge_only_members_never_hear_falling_conditions() {
        let mut bus = FlatBus::new();
        let (calls, component) = recorder();
        bus.register(Condition::reset(LINE_A, true), 0, component).unwrap();

        for step in 0..6 {
            let active = if step % 2 == 0 { LINE_A } else { 0 };
            bus.propagate(driven(active), HalfCycles::new(step));
        }

        assert_eq!(*calls.borrow(), [true, true, true]);
    }

    #[test]
    fn change_lines_fire_while_true() {
        let mut bus = FlatBus::new();
        let (calls, component) = recorder();
        bus.register(Condition::new(LINE_B, LINE_A, 0, false), 0, component)
            .unwrap();

        bus.propagate(driven(LINE_A), HalfCycles::new(0));
        bus.propagate(driven(LINE_A | LINE_B), HalfCycles::new(1));
        bus.propagate(driven(LINE_A), HalfCycles::new(2));
        // B toggling while A is released must not fire.
        bus.propagate(driven(0), HalfCycles::new(3));
        bus.propagate(driven(LINE_B), HalfCycles::new(4));

        assert_eq!(*calls.borrow(), [true, true, true, false]);
    }

    #[test]
    fn clocked_members_run_on_every_clock_edge() {
        let mut bus = FlatBus::new();
        let (level_calls, level) = recorder();
        let (edge_calls, edge) = recorder();
        bus.register(Condition::reset(CLOCK, false), 0, level).unwrap();
        bus.register(Condition::reset(CLOCK, true), 0, edge).unwrap();

        let mut external = BusState::IDLE;
        for step in 0..4 {
            external.0 ^= CLOCK;
            bus.propagate(external, HalfCycles::new(step));
            // Unrelated line activity between edges is ignored.
            bus.propagate(external & driven(LINE_C), HalfCycles::new(step));
        }

        assert_eq!(*level_calls.borrow(), [true, false, true, false]);
        assert_eq!(*edge_calls.borrow(), [true, true]);
    }

    #[test]
    fn a_component_output_can_turn_another_condition_false() {
        let mut bus = FlatBus::new();
        // Pulls line B low while line A is low.
        bus.register(
            Condition::reset(LINE_A, false),
            LINE_B,
            from_fn(|internal: &mut BusState, _: BusState, now, _| {
                internal.set_lines(LINE_B, now);
            }),
        )
        .unwrap();
        // Interested in B being high.
        let (calls, watcher) = recorder();
        bus.register(Condition::set(LINE_B, false), 0, watcher).unwrap();

        bus.propagate(driven(LINE_C), HalfCycles::new(0));
        bus.propagate(driven(LINE_A), HalfCycles::new(1));
        bus.propagate(driven(LINE_A), HalfCycles::new(2));

        assert_eq!(*calls.borrow(), [true, false]);
        assert!(bus.composite(driven(0)).is_active(LINE_B));
    }

    #[test]
    fn undeclared_outputs_stay_undriven() {
        let mut bus = FlatBus::new();
        let id = bus
            .register(
                Condition::reset(LINE_A, false),
                LINE_B,
                from_fn(|internal: &mut BusState, _: BusState, _, _| {
                    internal.set_active(LINE_B | LINE_C);
                }),
            )
            .unwrap()
            .unwrap();

        bus.propagate(driven(LINE_A), HalfCycles::ZERO);

        let output = bus.component_output(id).unwrap();
        assert!(output.is_active(LINE_B));
        assert!(!output.any_active(LINE_C));
    }

    #[test]
    fn prefilter_remaps_what_the_component_sees() {
        let mut bus = FlatBus::new();
        let (calls, component) = recorder();
        let id = bus
            .register_filtered(
                Condition::reset(LINE_A, false),
                0,
                |mut state: BusState| {
                    state.set_address(state.address() & 0x3fff);
                    state
                },
                component,
            )
            .unwrap()
            .unwrap();

        let mut external = driven(LINE_A);
        external.set_address(0xc123);
        bus.propagate(external, HalfCycles::ZERO);

        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(bus.last_delivered(id).unwrap().address(), 0x0123);
    }

    #[test]
    fn nested_bus_acts_as_one_component() {
        let mut child = FlatBus::new();
        child
            .register(
                Condition::reset(LINE_A, false),
                LINE_B,
                from_fn(|internal: &mut BusState, _: BusState, now, _| {
                    internal.set_lines(LINE_B, now);
                }),
            )
            .unwrap();
        assert_eq!(child.output_lines(), LINE_B);
        assert_eq!(child.condition().observed_lines(), LINE_A);

        let mut parent = FlatBus::new();
        let condition = child.condition();
        let outputs = child.output_lines();
        parent.register(condition, outputs, child).unwrap();

        parent.propagate(driven(LINE_A), HalfCycles::ZERO);
        assert!(parent.internal_state().is_active(LINE_B));
    }

    #[test]
    fn observable_reports_membership() {
        let mut bus = FlatBus::new();
        let (_, component) = recorder();
        bus.register(Condition::reset(CLOCK, false), 0, component).unwrap();
        assert_eq!(bus.query("components"), Some(Value::U64(1)));
        assert_eq!(bus.query("components.clocked"), Some(Value::U64(1)));
        assert_eq!(bus.query("components.level_edge"), Some(Value::U64(0)));
        assert_eq!(bus.query("nonsense"), None);
    }

    /// A bus of arbitrary level, edge and change components. Returns the
    /// call logs of the edge-only members.
    fn build_random_bus(seeds: &[(u8, u64, u64)]) -> (FlatBus, Vec<ComponentId>, Vec<Calls>) {
        let mut bus = FlatBus::new();
        let mut ids = Vec::new();
        let mut edge_logs = Vec::new();
        for &(kind, mask, pattern) in seeds {
            let mask = mask & 0xff << 40;
            let outputs = pattern & 0xffff;
            let condition = match kind % 3 {
                0 => Condition::test(mask, pattern & mask, false),
                1 => Condition::test(mask, pattern & mask, true),
                _ => Condition::change(mask | CLOCK),
            };
            let edge_only = condition.edge_only() && condition.mask() != 0;
            let calls: Calls = Rc::default();
            let log = Rc::clone(&calls);
            let component = from_fn(move |internal: &mut BusState, _: BusState, now, _| {
                log.borrow_mut().push(now);
                internal.0 = if now { !outputs } else { !0 };
            });
            if let Some(id) = bus.register(condition, outputs, component).unwrap() {
                ids.push(id);
                if edge_only {
                    edge_logs.push(calls);
                }
            }
        }
        (bus, ids, edge_logs)
    }

    proptest! {
        #[test]
        fn composite_is_always_the_wired_and_of_every_output(
            seeds in prop::collection::vec((any::<u8>(), any::<u64>(), any::<u64>()), 1..8),
            stimuli in prop::collection::vec(any::<u64>(), 1..32),
        ) {
            let (mut bus, ids, edge_logs) = build_random_bus(&seeds);
            let mut external = BusState::IDLE;
            for (step, lines) in stimuli.into_iter().enumerate() {
                external = BusState::new((lines | !(0xff << 40)) ^ (external.raw() & CLOCK));
                bus.propagate(external, HalfCycles::new(step as u64));

                let expected = ids
                    .iter()
                    .filter_map(|&id| bus.component_output(id))
                    .fold(external, |acc, output| acc & output);
                prop_assert_eq!(bus.composite(external), expected);
            }
            for log in edge_logs {
                prop_assert!(log.borrow().iter().all(|&now| now));
            }
        }

        #[test]
        fn impossible_never_fires(stimuli in prop::collection::vec(any::<u64>(), 1..64)) {
            let mut bus = FlatBus::new();
            let (calls, component) = recorder();
            bus.register(Condition::impossible(), !0, component).unwrap();
            for (step, lines) in stimuli.into_iter().enumerate() {
                bus.propagate(BusState::new(lines), HalfCycles::new(step as u64));
            }
            prop_assert!(calls.borrow().is_empty());
        }
    }
}
