#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vfd_rtu::{frame, ModbusRequest};

#[derive(Debug, Arbitrary)]
struct Input {
    slave: u8,
    write: bool,
    address: u16,
    count: u16,
    frame: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let request = if input.write {
        ModbusRequest::write_single_register(input.address, input.count)
    } else {
        match ModbusRequest::read_holding_registers(input.address, input.count) {
            Ok(request) => request,
            Err(_) => return,
        }
    };

    // Any byte sequence must decode to a value or an error, never a panic
    if let Ok(response) = frame::decode(&input.frame, input.slave, &request) {
        if let Some(registers) = response.registers() {
            assert_eq!(registers.len(), usize::from(input.count));
        }
    }
});
