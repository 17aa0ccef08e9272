//! A minimal Z80 machine for integration tests: 64K of RAM, a port map
//! and an interrupt vector responder, all wired to the processor through a
//! flat bus.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use emu_core::{ClockGenerator, Condition, DATA_MASK, FlatBus, MasterClock, from_fn};
use zilog_z80::pins::{IORQ, M1, MREQ, RD, WR};
use zilog_z80::{RegisterKey, Z80};

/// Port reads answer from `inputs`; every write is logged.
#[derive(Default)]
pub struct Ports {
    pub inputs: HashMap<u8, u8>,
    pub reads: Vec<u16>,
    pub writes: Vec<(u16, u8)>,
}

pub struct Machine {
    pub clock: ClockGenerator,
    pub cpu: Rc<RefCell<Z80>>,
    pub memory: Rc<RefCell<Vec<u8>>>,
    pub ports: Rc<RefCell<Ports>>,
    pub vector: Rc<RefCell<u8>>,
    /// Processor half-cycle count at each instruction start.
    pub starts: Rc<RefCell<Vec<u64>>>,
    /// Address of each instruction fetched.
    pub fetches: Rc<RefCell<Vec<u16>>>,
}

impl Machine {
    /// Power-on machine with `program` at address 0.
    pub fn new(program: &[u8]) -> Self {
        let memory = Rc::new(RefCell::new(vec![0u8; 0x10000]));
        let ports = Rc::new(RefCell::new(Ports::default()));
        let vector = Rc::new(RefCell::new(0xFF));
        let mut bus = FlatBus::new();

        let ram = Rc::clone(&memory);
        bus.register(
            Condition::reset(MREQ | RD, false),
            DATA_MASK,
            from_fn(move |internal, external, active, _| {
                if active {
                    internal.set_data(ram.borrow()[usize::from(external.address())]);
                } else {
                    internal.release_data();
                }
            }),
        )
        .unwrap();

        let ram = Rc::clone(&memory);
        bus.register(
            Condition::reset(MREQ | WR, true),
            0,
            from_fn(move |_, external, _, _| {
                ram.borrow_mut()[usize::from(external.address())] = external.data();
            }),
        )
        .unwrap();

        let io = Rc::clone(&ports);
        bus.register(
            Condition::reset(IORQ | RD, false),
            DATA_MASK,
            from_fn(move |internal, external, active, _| {
                if active {
                    let mut io = io.borrow_mut();
                    let address = external.address();
                    io.reads.push(address);
                    let value = io.inputs.get(&(address as u8)).copied().unwrap_or(0xFF);
                    internal.set_data(value);
                } else {
                    internal.release_data();
                }
            }),
        )
        .unwrap();

        let io = Rc::clone(&ports);
        bus.register(
            Condition::reset(IORQ | WR, true),
            0,
            from_fn(move |_, external, _, _| {
                io.borrow_mut()
                    .writes
                    .push((external.address(), external.data()));
            }),
        )
        .unwrap();

        let byte = Rc::clone(&vector);
        bus.register(
            Condition::reset(M1 | IORQ, false),
            DATA_MASK,
            from_fn(move |internal, _, active, _| {
                if active {
                    internal.set_data(*byte.borrow());
                } else {
                    internal.release_data();
                }
            }),
        )
        .unwrap();

        let cpu = Z80::new().attach(&mut bus).unwrap();
        let starts = Rc::new(RefCell::new(Vec::new()));
        let fetches = Rc::new(RefCell::new(Vec::new()));
        let (log, addresses) = (Rc::clone(&starts), Rc::clone(&fetches));
        cpu.borrow_mut().add_instruction_observer(move |cpu| {
            log.borrow_mut().push(cpu.half_cycles().get());
            addresses.borrow_mut().push(cpu.get(RegisterKey::Pc) as u16);
        });

        let machine = Self {
            clock: ClockGenerator::new(bus, MasterClock::new(3_500_000)),
            cpu,
            memory,
            ports,
            vector,
            starts,
            fetches,
        };
        machine.load(0, program);
        machine
    }

    pub fn load(&self, address: u16, bytes: &[u8]) {
        let start = usize::from(address);
        self.memory.borrow_mut()[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn peek(&self, address: u16) -> u8 {
        self.memory.borrow()[usize::from(address)]
    }

    pub fn peek16(&self, address: u16) -> u16 {
        u16::from_le_bytes([self.peek(address), self.peek(address.wrapping_add(1))])
    }

    pub fn get(&self, key: RegisterKey) -> u64 {
        self.cpu.borrow().get(key)
    }

    pub fn set(&self, key: RegisterKey, value: u64) {
        self.cpu.borrow_mut().set(key, value);
    }

    pub fn run(&mut self, half_cycles: u64) {
        self.clock.run_for_half_cycles(half_cycles);
    }

    /// Run until `count` more instructions have completed, i.e. until the
    /// fetch after them begins. Returns the half-cycles each one took,
    /// including any interrupt taken after it.
    pub fn run_instructions(&mut self, count: usize) -> Vec<u64> {
        let first = self.starts.borrow().len();
        let target = first + count + usize::from(first == 0);
        let mut budget = 100_000;
        while self.starts.borrow().len() < target {
            assert!(budget > 0, "no instruction boundary reached");
            budget -= 1;
            self.run(1);
        }
        let starts = self.starts.borrow();
        let from = target - count - 1;
        starts[from..target].windows(2).map(|pair| pair[1] - pair[0]).collect()
    }

    /// Address of the instruction about to run.
    pub fn next_instruction(&self) -> u16 {
        *self.fetches.borrow().last().unwrap()
    }

    /// Run until the processor halts. Returns the half-cycles it took.
    pub fn run_until_halt(&mut self) -> u64 {
        let start = self.clock.half_cycles_to_date().get();
        let mut budget = 1_000_000;
        while !self.cpu.borrow().is_halted() {
            assert!(budget > 0, "processor never halted");
            budget -= 1;
            self.run(1);
        }
        self.clock.half_cycles_to_date().get() - start
    }
}
