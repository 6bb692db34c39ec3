#![no_std]
#![feature(never_type)]

//! Real-target wiring for `av-ecu-core` on the STM32G474 Nucleo board this
//! workspace's teacher firmware targets. Split the same way the teacher
//! splits board bring-up (`hardware.rs`) from the queued CAN transport
//! (`can_queue.rs`); `platform_adapter.rs` is new, gluing both to
//! `av_ecu_core::platform`'s capability traits.

use core::sync::atomic::{AtomicUsize, Ordering};
use defmt_brtt as _; // global logger

use panic_probe as _;

use stm32g4xx_hal as _; // memory layout

pub mod can_queue;
pub mod hardware;
pub mod platform_adapter;

// same panicking *behavior* as `panic-probe` but doesn't print a panic message
// this prevents the panic message being printed *twice* when `defmt::panic` is invoked
#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}

static COUNT: AtomicUsize = AtomicUsize::new(0);
defmt::timestamp!("{=usize}", {
    // NOTE(no-CAS) `timestamps` runs with interrupts disabled
    let n = COUNT.load(Ordering::Relaxed);
    COUNT.store(n + 1, Ordering::Relaxed);
    n
});

/// Terminates the application and makes `probe-rs` exit with exit-code = 0
pub fn exit() -> ! {
    loop {
        cortex_m::asm::bkpt();
    }
}
