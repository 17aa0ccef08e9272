//! Instruction observers, register keys, queries, snapshots and the
//! disassembler, used the way a debugger would.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::Machine;
use emu_core::{Observable, Value};
use zilog_z80::pins::{INT, M1, MREQ, RD};
use zilog_z80::{RegisterKey, Registers, UnknownRegister, disassemble};

#[test]
fn observers_see_every_instruction_until_removed() {
    let mut machine = Machine::new(&[]);
    let count = Rc::new(Cell::new(0));
    let seen = Rc::clone(&count);
    let id = machine
        .cpu
        .borrow_mut()
        .add_instruction_observer(move |_| seen.set(seen.get() + 1));

    machine.run_instructions(3);
    assert_eq!(count.get(), 4);

    assert!(machine.cpu.borrow_mut().remove_instruction_observer(id));
    machine.run_instructions(3);
    assert_eq!(count.get(), 4);
}

#[test]
fn observer_can_redirect_execution() {
    let mut machine = Machine::new(&[
        0x3E, 0x01, // LD A,1
        0x00, // NOP
        0x3E, 0x02, // LD A,2
        0x76,
    ]);
    machine.load(0x0010, &[0x3E, 0x03, 0x76]);
    machine.cpu.borrow_mut().add_instruction_observer(|cpu| {
        if cpu.get(RegisterKey::Pc) == 0x0003 {
            cpu.set(RegisterKey::Pc, 0x0010);
        }
    });
    machine.run_until_halt();
    assert_eq!(machine.get(RegisterKey::A), 3);
    assert_eq!(*machine.fetches.borrow(), vec![0, 2, 3, 0x10, 0x12]);
}

#[test]
fn observers_added_from_a_callback_run_from_the_next_instruction() {
    let mut machine = Machine::new(&[]);
    let late = Rc::new(Cell::new(0));
    let armed = Rc::new(Cell::new(true));
    let (counter, flag) = (Rc::clone(&late), Rc::clone(&armed));
    machine.cpu.borrow_mut().add_instruction_observer(move |cpu| {
        if flag.replace(false) {
            let counter = Rc::clone(&counter);
            cpu.add_instruction_observer(move |_| counter.set(counter.get() + 1));
        }
    });

    machine.run_instructions(4);
    assert_eq!(late.get(), 4);
}

#[test]
fn register_names_round_trip() {
    for key in RegisterKey::ALL {
        assert_eq!(key.to_string().parse::<RegisterKey>(), Ok(key));
    }
    assert_eq!("HL'".parse(), Ok(RegisterKey::HlAlt));
    assert_eq!("interrupt_mode".parse(), Ok(RegisterKey::InterruptMode));
    assert_eq!(
        "q".parse::<RegisterKey>(),
        Err(UnknownRegister("q".to_string()))
    );
}

#[test]
fn register_keys_drive_a_running_machine() {
    let mut machine = Machine::new(&[0x09, 0x76]); // ADD HL,BC; HALT
    machine.set("hl".parse().unwrap(), 0x1000);
    machine.set("bc".parse().unwrap(), 0x0234);
    machine.run_until_halt();
    assert_eq!(machine.get(RegisterKey::Hl), 0x1234);
    assert_eq!(machine.get(RegisterKey::H), 0x12);
    assert_eq!(machine.get(RegisterKey::L), 0x34);
}

#[test]
fn queries_follow_execution() {
    let mut machine = Machine::new(&[
        0x21, 0x34, 0x12, // LD HL,$1234
        0xAF, // XOR A
        0x76,
    ]);
    machine.run_until_halt();
    let cpu = machine.cpu.borrow();
    assert_eq!(cpu.query("hl"), Some(Value::U16(0x1234)));
    assert_eq!(cpu.query("a"), Some(Value::U8(0)));
    assert_eq!(cpu.query("flags.z"), Some(Value::Bool(true)));
    assert_eq!(cpu.query("flags.c"), Some(Value::Bool(false)));
    assert_eq!(cpu.query("halted"), Some(Value::Bool(true)));
    assert_eq!(cpu.query("bus"), Some(Value::U64(cpu.bus_lines().raw())));
    assert_eq!(
        machine.clock.query("half_cycles"),
        Some(Value::U64(machine.clock.half_cycles_to_date().get()))
    );
}

#[test]
fn snapshot_survives_json_and_resumes_execution() {
    let program = [
        0x3E, 0x05, // LD A,5
        0x06, 0x06, // LD B,6
        0x80, // ADD A,B
        0x76,
    ];
    let mut machine = Machine::new(&program);
    let saved: Rc<RefCell<Option<Registers>>> = Rc::default();
    let slot = Rc::clone(&saved);
    machine.cpu.borrow_mut().add_instruction_observer(move |cpu| {
        if cpu.get(RegisterKey::Pc) == 0x0002 {
            slot.borrow_mut().get_or_insert_with(|| cpu.snapshot());
        }
    });
    machine.run_until_halt();

    let snapshot = saved.borrow().unwrap();
    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"pc\":2"));
    let restored: Registers = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, snapshot);

    let mut resumed = Machine::new(&program);
    resumed.cpu.borrow_mut().restore(&restored);
    resumed.run_until_halt();
    assert_eq!(resumed.get(RegisterKey::A), 11);
    assert_eq!(resumed.get(RegisterKey::A), machine.get(RegisterKey::A));
    assert_eq!(*resumed.fetches.borrow(), vec![2, 4, 5]);
}

#[test]
fn restore_abandons_the_instruction_in_flight() {
    let mut machine = Machine::new(&[0xC3, 0x40, 0x00]); // JP $0040
    machine.load(0x0100, &[0x3E, 0x07, 0x76]); // LD A,7; HALT
    let mut snapshot = machine.cpu.borrow().snapshot();
    snapshot.pc = 0x0100;

    // Part way through reading the jump target.
    machine.run(10);
    machine.cpu.borrow_mut().restore(&snapshot);
    assert_eq!(machine.cpu.borrow().pending_markers(), 0);
    assert_eq!(machine.cpu.borrow().query("waiting"), Some(Value::Bool(false)));

    machine.run_until_halt();
    assert_eq!(*machine.fetches.borrow(), vec![0, 0x0100, 0x0102]);
    assert_eq!(machine.get(RegisterKey::A), 7);
    assert_eq!(machine.get(RegisterKey::Pc), 0x0103);
}

#[test]
fn bus_lines_show_inputs_alongside_outputs() {
    let mut machine = Machine::new(&[0x3E, 0x42]);
    machine.clock.set_lines_active(INT);
    machine.run(4);

    let lines = machine.cpu.borrow().bus_lines();
    assert!(lines.is_active(M1 | RD | MREQ));
    assert!(lines.is_active(INT));
    assert_eq!(lines.address(), 0x0000);
    assert_eq!(lines.data(), 0x3E);
    assert_eq!(
        machine.cpu.borrow().query("bus"),
        Some(Value::U64(lines.raw()))
    );
}

#[test]
fn disassembles_the_loaded_program() {
    let machine = Machine::new(&[
        0x3E, 0x42, // LD A,$42
        0xDD, 0x7E, 0x05, // LD A,(IX+5)
        0xED, 0xB0, // LDIR
        0x18, 0xF7, // JR $0000
    ]);
    let memory = machine.memory.borrow();
    let rows = disassemble(&memory, 0, 4);
    let listing: Vec<(u16, &str)> = rows
        .iter()
        .map(|row| (row.address, row.text.as_str()))
        .collect();
    assert_eq!(
        listing,
        vec![
            (0x0000, "LD A, $42"),
            (0x0002, "LD A, (IX+$05)"),
            (0x0005, "LDIR"),
            (0x0007, "JR $0000"),
        ]
    );
}
