//! Z80 CPU core driven one clock edge at a time.
//!
//! The processor sits on a [`FlatBus`] in the clocked partition. Every
//! clock transition consumes one `Advance` marker from the micro-op queue
//! along with the work steps scheduled behind it. When the queue runs dry
//! the processor is at an instruction boundary: it samples RESET, BUSRQ
//! and any interrupt proposed during the instruction, then schedules the
//! next fetch.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.
#![allow(clippy::cast_possible_wrap)] // Intentional i8 casts for displacements.

mod bus_cycles;
mod execute;

use std::cell::RefCell;
use std::rc::Rc;

use emu_core::{BusError, BusState, CLOCK, Component, Condition, FlatBus, HalfCycles, Observable, Value};
use tracing::trace;

use crate::alu::{self, block_undocumented};
use crate::flags::{CF, Flags, HF, NF, PF, parity};
use crate::microcode::{BlockOp, MicroOp, MicroOpQueue, ModifyOp, Page};
use crate::pins::{BUSACK, BUSRQ, HALT, INT, IORQ, M1, MREQ, NMI, OUTPUT_LINES, RD, RESET, RFSH, WAIT};
use crate::registers::{Reg8, Reg16, RegisterFile, RegisterKey, Registers};

/// Handle returned by [`Z80::add_instruction_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type InstructionObserver = Box<dyn FnMut(&mut Z80)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptState {
    Running,
    Halted,
    Irq,
    Nmi,
}

/// NMI is edge-triggered: one acknowledge per falling edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NmiLatch {
    Idle,
    Pending,
    Acknowledged,
}

/// Z80 CPU.
pub struct Z80 {
    pub(crate) regs: RegisterFile,
    iff1: bool,
    iff2: bool,
    interrupt_mode: u8,

    state: InterruptState,
    /// Interrupt seen at the most recent clock-high marker.
    proposed: Option<InterruptState>,
    nmi: NmiLatch,
    waiting: bool,
    bus_granted: bool,

    micro_ops: MicroOpQueue,
    half_cycles: HalfCycles,
    /// Bus state delivered with the current clock edge.
    external: BusState,
    /// Lines this processor is driving.
    output: BusState,

    observers: Vec<(ObserverId, InstructionObserver)>,
    next_observer: u64,
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl Z80 {
    /// Create a Z80 in its power-on state. The first clock edge starts a
    /// fetch from address 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: RegisterFile::default(),
            iff1: false,
            iff2: false,
            interrupt_mode: 0,
            state: InterruptState::Running,
            proposed: None,
            nmi: NmiLatch::Idle,
            waiting: false,
            bus_granted: false,
            micro_ops: MicroOpQueue::new(),
            half_cycles: HalfCycles::ZERO,
            external: BusState::IDLE,
            output: BusState::IDLE,
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    /// The condition to register the processor with: every clock edge.
    #[must_use]
    pub const fn condition() -> Condition {
        Condition::reset(CLOCK, false)
    }

    /// Register on `bus` and hand back a shared handle for inspection.
    pub fn attach(self, bus: &mut FlatBus) -> Result<Rc<RefCell<Self>>, BusError> {
        let cpu = Rc::new(RefCell::new(self));
        bus.register(Self::condition(), OUTPUT_LINES, Rc::clone(&cpu))?;
        Ok(cpu)
    }

    /// The bus as the processor sees it: its own outputs wired-AND with
    /// the lines delivered on the last clock edge.
    #[must_use]
    pub fn bus_lines(&self) -> BusState {
        self.output & self.external
    }

    /// Half-cycle markers left in the current instruction.
    #[must_use]
    pub fn pending_markers(&self) -> usize {
        self.micro_ops.pending_markers()
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.state == InterruptState::Halted
    }

    /// Half-cycles this processor has been clocked for.
    #[must_use]
    pub const fn half_cycles(&self) -> HalfCycles {
        self.half_cycles
    }

    /// Call `observer` at the start of every instruction fetch, before any
    /// of its steps run. Observers must not remove themselves from inside
    /// the callback.
    pub fn add_instruction_observer(&mut self, observer: impl FnMut(&mut Self) + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn remove_instruction_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Read a register or piece of processor state.
    #[must_use]
    pub fn get(&self, key: RegisterKey) -> u64 {
        let regs = &self.regs;
        match key {
            RegisterKey::A => u64::from(regs.a),
            RegisterKey::F => u64::from(regs.flags.compose()),
            RegisterKey::B => u64::from(regs.get8(Reg8::B)),
            RegisterKey::C => u64::from(regs.get8(Reg8::C)),
            RegisterKey::D => u64::from(regs.get8(Reg8::D)),
            RegisterKey::E => u64::from(regs.get8(Reg8::E)),
            RegisterKey::H => u64::from(regs.get8(Reg8::H)),
            RegisterKey::L => u64::from(regs.get8(Reg8::L)),
            RegisterKey::Af => u64::from(regs.af()),
            RegisterKey::Bc => u64::from(regs.bc),
            RegisterKey::De => u64::from(regs.de),
            RegisterKey::Hl => u64::from(regs.hl),
            RegisterKey::AfAlt => u64::from(regs.af_alt),
            RegisterKey::BcAlt => u64::from(regs.bc_alt),
            RegisterKey::DeAlt => u64::from(regs.de_alt),
            RegisterKey::HlAlt => u64::from(regs.hl_alt),
            RegisterKey::R => u64::from(regs.r),
            RegisterKey::I => u64::from(regs.i),
            RegisterKey::Ix => u64::from(regs.ix),
            RegisterKey::Iy => u64::from(regs.iy),
            RegisterKey::Sp => u64::from(regs.sp),
            RegisterKey::Pc => u64::from(regs.pc),
            RegisterKey::Iff1 => u64::from(self.iff1),
            RegisterKey::Iff2 => u64::from(self.iff2),
            RegisterKey::InterruptMode => u64::from(self.interrupt_mode),
            RegisterKey::HalfCyclesToDate => self.half_cycles.get(),
        }
    }

    /// Overwrite a register or piece of processor state. Values are
    /// truncated to the register's width.
    pub fn set(&mut self, key: RegisterKey, value: u64) {
        let byte = value as u8;
        let word = value as u16;
        let regs = &mut self.regs;
        match key {
            RegisterKey::A => regs.a = byte,
            RegisterKey::F => regs.flags = Flags::decompose(byte),
            RegisterKey::B => regs.set8(Reg8::B, byte),
            RegisterKey::C => regs.set8(Reg8::C, byte),
            RegisterKey::D => regs.set8(Reg8::D, byte),
            RegisterKey::E => regs.set8(Reg8::E, byte),
            RegisterKey::H => regs.set8(Reg8::H, byte),
            RegisterKey::L => regs.set8(Reg8::L, byte),
            RegisterKey::Af => regs.set_af(word),
            RegisterKey::Bc => regs.bc = word,
            RegisterKey::De => regs.de = word,
            RegisterKey::Hl => regs.hl = word,
            RegisterKey::AfAlt => regs.af_alt = word,
            RegisterKey::BcAlt => regs.bc_alt = word,
            RegisterKey::DeAlt => regs.de_alt = word,
            RegisterKey::HlAlt => regs.hl_alt = word,
            RegisterKey::R => regs.r = byte,
            RegisterKey::I => regs.i = byte,
            RegisterKey::Ix => regs.ix = word,
            RegisterKey::Iy => regs.iy = word,
            RegisterKey::Sp => regs.sp = word,
            RegisterKey::Pc => regs.pc = word,
            RegisterKey::Iff1 => self.iff1 = value != 0,
            RegisterKey::Iff2 => self.iff2 = value != 0,
            RegisterKey::InterruptMode => self.interrupt_mode = byte.min(2),
            RegisterKey::HalfCyclesToDate => self.half_cycles = HalfCycles::new(value),
        }
    }

    /// Capture the programmer-visible state.
    #[must_use]
    pub fn snapshot(&self) -> Registers {
        let regs = &self.regs;
        let [a_alt, f_alt] = regs.af_alt.to_be_bytes();
        let [b_alt, c_alt] = regs.bc_alt.to_be_bytes();
        let [d_alt, e_alt] = regs.de_alt.to_be_bytes();
        let [h_alt, l_alt] = regs.hl_alt.to_be_bytes();
        Registers {
            a: regs.a,
            f: regs.flags.compose(),
            b: regs.get8(Reg8::B),
            c: regs.get8(Reg8::C),
            d: regs.get8(Reg8::D),
            e: regs.get8(Reg8::E),
            h: regs.get8(Reg8::H),
            l: regs.get8(Reg8::L),
            a_alt,
            f_alt,
            b_alt,
            c_alt,
            d_alt,
            e_alt,
            h_alt,
            l_alt,
            ix: regs.ix,
            iy: regs.iy,
            sp: regs.sp,
            pc: regs.pc,
            i: regs.i,
            r: regs.r,
            iff1: self.iff1,
            iff2: self.iff2,
            im: self.interrupt_mode,
            halted: self.is_halted(),
        }
    }

    /// Load a snapshot. Anything left of the current instruction is
    /// abandoned and the next clock edge starts a fresh instruction.
    pub fn restore(&mut self, snapshot: &Registers) {
        self.micro_ops.clear();
        self.proposed = None;
        self.waiting = false;

        let regs = &mut self.regs;
        regs.a = snapshot.a;
        regs.flags = Flags::decompose(snapshot.f);
        regs.bc = snapshot.bc();
        regs.de = snapshot.de();
        regs.hl = snapshot.hl();
        regs.af_alt = u16::from_be_bytes([snapshot.a_alt, snapshot.f_alt]);
        regs.bc_alt = u16::from_be_bytes([snapshot.b_alt, snapshot.c_alt]);
        regs.de_alt = u16::from_be_bytes([snapshot.d_alt, snapshot.e_alt]);
        regs.hl_alt = u16::from_be_bytes([snapshot.h_alt, snapshot.l_alt]);
        regs.ix = snapshot.ix;
        regs.iy = snapshot.iy;
        regs.sp = snapshot.sp;
        regs.pc = snapshot.pc;
        regs.i = snapshot.i;
        regs.r = snapshot.r;
        self.iff1 = snapshot.iff1;
        self.iff2 = snapshot.iff2;
        self.interrupt_mode = snapshot.im.min(2);
        self.state = if snapshot.halted {
            InterruptState::Halted
        } else {
            InterruptState::Running
        };
        self.output = BusState::IDLE;
        self.output.set_lines(HALT, snapshot.halted);
        self.output.set_lines(BUSACK, self.bus_granted);
    }

    /// Handle one clock transition.
    fn clock(&mut self, external: BusState) {
        self.external = external;
        match self.nmi {
            NmiLatch::Idle if external.is_active(NMI) => self.nmi = NmiLatch::Pending,
            NmiLatch::Acknowledged if !external.any_active(NMI) => self.nmi = NmiLatch::Idle,
            _ => {}
        }

        if self.waiting {
            // Wait states are whole cycles.
            let sample = self.half_cycles.get() & 1 == 1;
            self.advance(sample);
            return;
        }

        let mut consumed = false;
        loop {
            match self.micro_ops.peek() {
                None if consumed => break,
                None => self.instruction_boundary(),
                Some(MicroOp::Advance { .. }) if consumed => break,
                Some(op) => {
                    self.micro_ops.pop();
                    if let MicroOp::Advance { sample_wait } = op {
                        self.advance(sample_wait);
                        consumed = true;
                    } else {
                        self.perform(op);
                    }
                }
            }
        }
    }

    fn advance(&mut self, sample_wait: bool) {
        self.half_cycles += HalfCycles::new(1);

        if self.external.raw() & CLOCK != 0 {
            self.proposed = if self.nmi == NmiLatch::Pending {
                Some(InterruptState::Nmi)
            } else if self.iff1 && self.external.is_active(INT) {
                Some(InterruptState::Irq)
            } else {
                None
            };
        }

        if sample_wait {
            self.waiting = self.external.is_active(WAIT);
        }
    }

    fn instruction_boundary(&mut self) {
        if self.external.is_active(RESET) {
            self.reset();
            self.pause(3);
            return;
        }

        if self.external.is_active(BUSRQ) {
            if !self.bus_granted {
                trace!(pc = format_args!("{:#06x}", self.regs.pc), "bus request granted");
                self.bus_granted = true;
            }
            let halted = self.is_halted();
            self.output = BusState::IDLE;
            self.output.set_active(BUSACK);
            self.output.set_lines(HALT, halted);
            self.pause(1);
            return;
        }
        if self.bus_granted {
            trace!("bus released");
            self.bus_granted = false;
            self.output.set_inactive(BUSACK);
        }

        match self.proposed.take() {
            // DI at the end of the instruction overrides a request seen
            // during it.
            Some(InterruptState::Irq) if !self.iff1 => {}
            Some(interrupt) => {
                if self.is_halted() {
                    trace!("leaving halt");
                    self.output.set_inactive(HALT);
                }
                self.state = interrupt;
            }
            None => {}
        }

        match self.state {
            InterruptState::Running => {
                self.run_observers();
                self.fetch(true);
                self.schedule(MicroOp::Decode {
                    page: Page::Standard,
                    index: Reg16::Hl,
                    displaced: false,
                });
            }
            InterruptState::Halted => self.fetch(false),
            InterruptState::Irq => {
                trace!(mode = self.interrupt_mode, "acknowledging interrupt");
                self.iff1 = false;
                self.iff2 = false;
                self.state = InterruptState::Running;
                self.irq_acknowledge();
                match self.interrupt_mode {
                    0 => {
                        self.pause(1);
                        self.schedule(MicroOp::Decode {
                            page: Page::Standard,
                            index: Reg16::Hl,
                            displaced: false,
                        });
                    }
                    1 => {
                        self.pause(1);
                        self.schedule(MicroOp::Set8 {
                            target: Reg8::Temp,
                            value: 0xFF,
                        });
                        self.schedule(MicroOp::Decode {
                            page: Page::Standard,
                            index: Reg16::Hl,
                            displaced: false,
                        });
                    }
                    _ => {
                        self.schedule(MicroOp::VectorIm2);
                        self.pause(2);
                        self.push_word(Reg16::Pc);
                        self.read(Reg16::Temp, Reg8::Low(Reg16::Pc));
                        self.schedule(MicroOp::Inc16(Reg16::Temp));
                        self.read(Reg16::Temp, Reg8::High(Reg16::Pc));
                    }
                }
            }
            InterruptState::Nmi => {
                trace!("acknowledging NMI");
                self.nmi = NmiLatch::Acknowledged;
                self.iff1 = false;
                self.state = InterruptState::Running;
                self.fetch(false);
                self.pause(1);
                self.push_word(Reg16::Pc);
                self.schedule(MicroOp::Jump(0x0066));
            }
        }
    }

    fn run_observers(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let mut running = std::mem::take(&mut self.observers);
        for (_, observer) in &mut running {
            observer(self);
        }
        // Keep anything registered from inside a callback.
        running.append(&mut self.observers);
        self.observers = running;
    }

    fn reset(&mut self) {
        trace!("reset");
        self.regs.pc = 0;
        self.regs.i = 0;
        self.regs.r = 0;
        self.iff1 = false;
        self.iff2 = false;
        self.interrupt_mode = 0;
        self.state = InterruptState::Running;
        self.proposed = None;
        self.nmi = NmiLatch::Idle;
        self.waiting = false;
        self.bus_granted = false;
        self.output = BusState::IDLE;
    }

    pub(crate) fn enter_halt(&mut self) {
        trace!(pc = format_args!("{:#06x}", self.regs.pc), "halt");
        self.state = InterruptState::Halted;
        self.output.set_active(HALT);
    }

    pub(crate) fn set_interrupts(&mut self, enabled: bool) {
        self.iff1 = enabled;
        self.iff2 = enabled;
    }

    /// RETN and RETI restore IFF1 from IFF2.
    pub(crate) fn restore_iff1(&mut self) {
        self.iff1 = self.iff2;
    }

    pub(crate) fn set_interrupt_mode(&mut self, mode: u8) {
        self.interrupt_mode = mode;
    }

    /// LD A,I and LD A,R: P/V reports IFF2.
    pub(crate) fn load_a_special(&mut self, value: u8) {
        self.regs.a = value;
        let mut general = self.regs.flags.general & CF;
        if self.iff2 {
            general |= PF;
        }
        self.regs.flags = Flags::from_result(value, general);
    }

    pub(crate) fn schedule(&mut self, op: MicroOp) {
        self.micro_ops.push(op);
    }

    fn perform(&mut self, op: MicroOp) {
        match op {
            MicroOp::Advance { sample_wait } => self.advance(sample_wait),
            MicroOp::BeginFetch { increment_pc } => {
                self.output.set_address(self.regs.pc);
                self.output.release_data();
                self.output.set_active(M1);
                if increment_pc {
                    self.regs.pc = self.regs.pc.wrapping_add(1);
                }
            }
            MicroOp::Assert(lines) => self.output.set_active(lines),
            MicroOp::Release(lines) => self.output.set_inactive(lines),
            MicroOp::BeginRefresh => {
                self.regs.temp = self.external.data();
                self.output.set_inactive(M1 | RD | MREQ);
                self.output.set_active(RFSH);
                self.output
                    .set_address(u16::from(self.regs.i) << 8 | u16::from(self.regs.r));
                self.regs.inc_r();
            }
            MicroOp::LatchVector => {
                self.regs.temp = self.external.data();
                self.output.set_inactive(M1 | IORQ);
            }
            MicroOp::Decode {
                page,
                index,
                displaced,
            } => execute::decode(self, page, index, displaced),
            MicroOp::ReadAddress(reg) => {
                self.output.set_address(self.regs.get16(reg));
                self.output.release_data();
            }
            MicroOp::WriteAddress(reg) => self.output.set_address(self.regs.get16(reg)),
            MicroOp::DriveData(reg) => self.output.set_data(self.regs.get8(reg)),
            MicroOp::Latch { target, release } => {
                self.regs.set8(target, self.external.data());
                self.output.set_inactive(release);
            }
            MicroOp::Inc16(reg) => self.regs.set16(reg, self.regs.get16(reg).wrapping_add(1)),
            MicroOp::Dec16(reg) => self.regs.set16(reg, self.regs.get16(reg).wrapping_sub(1)),
            MicroOp::Copy16 { from, to } => self.regs.set16(to, self.regs.get16(from)),
            MicroOp::Copy8 { from, to } => self.regs.set8(to, self.regs.get8(from)),
            MicroOp::Set8 { target, value } => self.regs.set8(target, value),
            MicroOp::Jump(address) => self.regs.pc = address,
            MicroOp::IndexAddress(index) => {
                let displacement = i16::from(self.regs.offset as i8);
                self.regs.temp_addr = self.regs.get16(index).wrapping_add_signed(displacement);
            }
            MicroOp::Alu(op) => {
                let result = op.apply(self.regs.a, self.regs.temp, self.regs.flags);
                self.regs.a = result.value;
                self.regs.flags = result.flags;
            }
            MicroOp::Modify { op, target } => self.modify(op, target),
            MicroOp::Bit(mask) => {
                self.regs.flags = alu::bit(mask, self.regs.temp, self.regs.flags);
            }
            MicroOp::JumpRelative(cc) => {
                if self.regs.flags.test(cc) {
                    self.jump_relative();
                }
            }
            MicroOp::Djnz => {
                let b = self.regs.get8(Reg8::B).wrapping_sub(1);
                self.regs.set8(Reg8::B, b);
                if b != 0 {
                    self.jump_relative();
                }
            }
            MicroOp::InputFlags(reg) => {
                let value = self.regs.get8(reg);
                let general = (self.regs.flags.general & CF) | if parity(value) { PF } else { 0 };
                self.regs.flags = Flags::from_result(value, general);
            }
            MicroOp::Block {
                op,
                decrement,
                repeat,
            } => self.block(op, decrement, repeat),
            MicroOp::Rrd => {
                let (a, value) = (self.regs.a, self.regs.temp);
                self.regs.temp = (a << 4) | (value >> 4);
                self.set_digit_result((a & 0xF0) | (value & 0x0F));
            }
            MicroOp::Rld => {
                let (a, value) = (self.regs.a, self.regs.temp);
                self.regs.temp = (value << 4) | (a & 0x0F);
                self.set_digit_result((a & 0xF0) | (value >> 4));
            }
            MicroOp::VectorIm2 => {
                self.regs.temp_addr = u16::from(self.regs.i) << 8 | u16::from(self.regs.temp);
            }
        }
    }

    /// PC += offset, then five internal cycles.
    fn jump_relative(&mut self) {
        let displacement = i16::from(self.regs.offset as i8);
        self.regs.pc = self.regs.pc.wrapping_add_signed(displacement);
        self.pause(5);
    }

    pub(crate) fn modify(&mut self, op: ModifyOp, target: Reg8) {
        let value = self.regs.get8(target);
        let flags = self.regs.flags;
        let (result, flags) = match op {
            ModifyOp::Inc => {
                let result = alu::inc8(value, flags);
                (result.value, result.flags)
            }
            ModifyOp::Dec => {
                let result = alu::dec8(value, flags);
                (result.value, result.flags)
            }
            ModifyOp::Shift(shift) => {
                let result = shift.apply(value, flags);
                (result.value, result.flags)
            }
            ModifyOp::Res(mask) => (value & !mask, flags),
            ModifyOp::Set(mask) => (value | mask, flags),
        };
        self.regs.set8(target, result);
        self.regs.flags = flags;
    }

    /// RRD/RLD accumulator update.
    fn set_digit_result(&mut self, a: u8) {
        self.regs.a = a;
        let general = (self.regs.flags.general & CF) | if parity(a) { PF } else { 0 };
        self.regs.flags = Flags::from_result(a, general);
    }

    fn block(&mut self, op: BlockOp, decrement: bool, repeat: bool) {
        let step = |value: u16| {
            if decrement {
                value.wrapping_sub(1)
            } else {
                value.wrapping_add(1)
            }
        };
        let value = self.regs.temp;
        self.regs.hl = step(self.regs.hl);

        let again = match op {
            BlockOp::Load => {
                self.regs.de = step(self.regs.de);
                self.regs.bc = self.regs.bc.wrapping_sub(1);
                let n = self.regs.a.wrapping_add(value);
                let flags = &mut self.regs.flags;
                flags.general = (flags.general & CF) | if self.regs.bc != 0 { PF } else { 0 };
                flags.undocumented = block_undocumented(n);
                self.regs.bc != 0
            }
            BlockOp::Compare => {
                self.regs.bc = self.regs.bc.wrapping_sub(1);
                let result = alu::sub8(self.regs.a, value, false);
                let half = result.flags.general & HF;
                let n = result.value.wrapping_sub(u8::from(half != 0));
                let mut general = (self.regs.flags.general & CF) | NF | half;
                if self.regs.bc != 0 {
                    general |= PF;
                }
                self.regs.flags = Flags {
                    general,
                    sign: result.value,
                    zero: result.value,
                    undocumented: block_undocumented(n),
                };
                self.regs.bc != 0 && result.value != 0
            }
            BlockOp::In => {
                let b = self.regs.get8(Reg8::B).wrapping_sub(1);
                self.regs.set8(Reg8::B, b);
                let c = self.regs.get8(Reg8::C);
                let adjusted = if decrement {
                    c.wrapping_sub(1)
                } else {
                    c.wrapping_add(1)
                };
                self.io_block_flags(value, u16::from(value) + u16::from(adjusted));
                b != 0
            }
            BlockOp::Out => {
                // B was decremented before the port address went out.
                let l = self.regs.get8(Reg8::L);
                self.io_block_flags(value, u16::from(value) + u16::from(l));
                self.regs.get8(Reg8::B) != 0
            }
        };

        if repeat && again {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            self.pause(5);
        }
    }

    fn io_block_flags(&mut self, value: u8, k: u16) {
        let b = self.regs.get8(Reg8::B);
        let mut general = 0;
        if k > 0xFF {
            general |= HF | CF;
        }
        if parity((k as u8 & 7) ^ b) {
            general |= PF;
        }
        if value & 0x80 != 0 {
            general |= NF;
        }
        self.regs.flags = Flags::from_result(b, general);
    }
}

impl Component for Z80 {
    fn signal(
        &mut self,
        internal: &mut BusState,
        external: BusState,
        _condition_true: bool,
        _half_cycles: HalfCycles,
    ) {
        self.clock(external);
        *internal = self.output;
    }
}

const Z80_QUERY_PATHS: &[&str] = &[
    // Main registers
    "a", "f", "b", "c", "d", "e", "h", "l",
    // Register pairs
    "af", "bc", "de", "hl",
    // Alternate pairs
    "af'", "bc'", "de'", "hl'",
    // Index registers
    "ix", "iy",
    // Other registers
    "sp", "pc", "i", "r",
    // Flags (individual)
    "flags.s", "flags.z", "flags.y", "flags.h",
    "flags.x", "flags.p", "flags.n", "flags.c",
    // Interrupt state
    "iff1", "iff2", "im",
    // CPU state
    "halted", "waiting", "half_cycles", "pending_markers", "bus",
];

impl Observable for Z80 {
    fn query(&self, path: &str) -> Option<Value> {
        let regs = &self.regs;
        let f = regs.flags.compose();
        match path {
            "a" => Some(regs.a.into()),
            "f" => Some(f.into()),
            "b" => Some(regs.get8(Reg8::B).into()),
            "c" => Some(regs.get8(Reg8::C).into()),
            "d" => Some(regs.get8(Reg8::D).into()),
            "e" => Some(regs.get8(Reg8::E).into()),
            "h" => Some(regs.get8(Reg8::H).into()),
            "l" => Some(regs.get8(Reg8::L).into()),

            "af" => Some(regs.af().into()),
            "bc" => Some(regs.bc.into()),
            "de" => Some(regs.de.into()),
            "hl" => Some(regs.hl.into()),

            "af'" => Some(regs.af_alt.into()),
            "bc'" => Some(regs.bc_alt.into()),
            "de'" => Some(regs.de_alt.into()),
            "hl'" => Some(regs.hl_alt.into()),

            "ix" => Some(regs.ix.into()),
            "iy" => Some(regs.iy.into()),
            "sp" => Some(regs.sp.into()),
            "pc" => Some(regs.pc.into()),
            "i" => Some(regs.i.into()),
            "r" => Some(regs.r.into()),

            "flags.s" => Some((f & 0x80 != 0).into()),
            "flags.z" => Some((f & 0x40 != 0).into()),
            "flags.y" => Some((f & 0x20 != 0).into()),
            "flags.h" => Some((f & 0x10 != 0).into()),
            "flags.x" => Some((f & 0x08 != 0).into()),
            "flags.p" => Some((f & 0x04 != 0).into()),
            "flags.n" => Some((f & 0x02 != 0).into()),
            "flags.c" => Some((f & 0x01 != 0).into()),

            "iff1" => Some(self.iff1.into()),
            "iff2" => Some(self.iff2.into()),
            "im" => Some(self.interrupt_mode.into()),

            "halted" => Some(self.is_halted().into()),
            "waiting" => Some(self.waiting.into()),
            "half_cycles" => Some(self.half_cycles.get().into()),
            "pending_markers" => Some((self.pending_markers() as u64).into()),
            "bus" => Some(self.bus_lines().raw().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        Z80_QUERY_PATHS
    }
}
