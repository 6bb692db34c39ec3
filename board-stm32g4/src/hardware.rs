// "Board level" hardware abstractions, ie pin assignments, etc.
//
// Trimmed from the original dev-board pinout down to what a Safety
// Controller or zone-ECU node built on this silicon actually drives: one
// CAN transceiver and the Safety Controller's relay/LED/watchdog-kick GPIO
// group (spec §4.6, §4.9). A zone-ECU binary only ever touches `pcan_config`
// and `can_timing_500kbps`; the GPIO fields are simply unused on those
// builds, the same way the teacher's original `Board` carried fields only
// some binaries used.

use defmt::info;
use fdcan::ConfigMode;
use fdcan::FdCan;
use fugit::RateExtU32;
use hal::gpio::gpiob;
use hal::gpio::gpioc;
use hal::gpio::Floating;
use hal::gpio::Input;
use hal::gpio::Output;
use hal::gpio::PushPull;
use stm32g4xx_hal::gpio::gpioa;
use stm32g4xx_hal as hal;
use stm32g4xx_hal::can::CanExt;
use stm32g4xx_hal::gpio::GpioExt;
use stm32g4xx_hal::gpio::Speed;
use stm32g4xx_hal::pwr::PwrExt;
use stm32g4xx_hal::syscfg::SysCfgExt;
use stm32g4xx_hal::rcc;
use stm32g4xx_hal::rcc::{PllConfig, RccExt};
use stm32g4xx_hal::stm32;

// Type aliases for hardware peripherals
pub type PCAN = hal::can::Can<hal::stm32::FDCAN1>;

// Type aliases for I/O pins, named after the `sc_gpio` indices in
// `av_ecu_core::config` rather than the dev board's generic IN/OUT numbering.
pub type RelayCmdOutput = gpiob::PB6<Output<PushPull>>;
pub type RelayReadbackInput = gpioc::PC11<Input<Floating>>;
pub type LedCvcOutput = gpiob::PB10<Output<PushPull>>;
pub type LedFzcOutput = gpiob::PB5<Output<PushPull>>;
pub type LedRzcOutput = gpioa::PA10<Output<PushPull>>;
pub type LedSysOutput = gpioc::PC4<Output<PushPull>>;
pub type WdiOutput = gpioa::PA1<Output<PushPull>>;

// Struct to encompass all the board resources, as their functions
pub struct Board {
    pub pcan_config: FdCan<PCAN, ConfigMode>,
    pub can_timing_500kbps: can_bit_timings::CanBitTiming,
    pub relay_cmd: RelayCmdOutput,
    pub relay_readback: RelayReadbackInput,
    pub led_cvc: LedCvcOutput,
    pub led_fzc: LedFzcOutput,
    pub led_rzc: LedRzcOutput,
    pub led_sys: LedSysOutput,
    pub wdi: WdiOutput,
}

// Systick Based Timer
pub const MONOTONIC_FREQUENCY: u32 = 1_000;
rtic_monotonics::systick_monotonic!(Mono, MONOTONIC_FREQUENCY);

// Hardware init function
pub fn init(core: cortex_m::Peripherals, mut dp: stm32::Peripherals) -> Board {
    info!("hardware init");

    let syscfg = dp.SYSCFG.constrain();
    let _ = syscfg; // only CAN1 uses an alternate function here, no EXTI sources to wire
    let rcc = dp.RCC.constrain();

    // Sysclock is based on PLL_R
    let pll_config = PllConfig {
        mux: rcc::PllSrc::HSE(24_u32.MHz()), // Nucleo board X3 OSC
        n: rcc::PllNMul::MUL_32,
        m: rcc::PllMDiv::DIV_3,       // f(vco) = 24MHz*32/3 = 256MHz
        r: Some(rcc::PllRDiv::DIV_2), // f(sysclock) = 256MHz/2 = 128MHz
        q: None,
        p: None,
    };

    let clock_config = rcc::Config::default()
        .pll_cfg(pll_config)
        .clock_src(rcc::SysClockSrc::PLL)
        .ahb_psc(rcc::Prescaler::NotDivided)
        .apb1_psc(rcc::Prescaler::Div2)
        .apb2_psc(rcc::Prescaler::Div2);

    let pwr = dp.PWR.constrain().freeze();
    let mut rcc = rcc.freeze(clock_config, pwr);

    // After clock configuration, the following should be true:
    // Sysclock is 128MHz
    // AHB clock is 128MHz
    // APB1 clock is 64MHz
    // APB2 clock is 64MHz

    Mono::start(core.SYST, rcc.clocks.sys_clk.to_Hz());

    unsafe {
        let flash = &(*stm32::FLASH::ptr());
        flash.acr.modify(|_, w| {
            w.latency().bits(0b1000) // 8 wait states
        });
    }

    let gpioa = dp.GPIOA.split(&mut rcc);
    let gpiob = dp.GPIOB.split(&mut rcc);
    let gpioc = dp.GPIOC.split(&mut rcc);

    assert!(rcc.clocks.apb1_clk.to_MHz() == 64); // Macro requires literal
    let can_timing_500kbps = can_bit_timings::can_timings!(64.mhz(), 500.khz());

    // CAN1 — the single shared bus every node (Safety Controller and zone
    // ECUs alike) transmits and receives on.
    let can1_config = {
        let rx = gpioa.pa11.into_alternate().set_speed(Speed::VeryHigh);
        let tx = gpioa.pa12.into_alternate().set_speed(Speed::VeryHigh);
        dp.FDCAN1.fdcan(tx, rx, &rcc)
    };

    // RELAY — kill relay coil enable (spec §4.6). Active high.
    let relay_cmd = gpiob.pb6.into_push_pull_output();

    // RELAY readback — wired to the relay's own contact feedback, so the
    // Safety Controller can detect a coil/contact mismatch (spec §4.6
    // `TriggerInputs::readback_mismatch`).
    let relay_readback = gpioc.pc11.into_floating_input();

    // LED_CVC / LED_FZC / LED_RZC — per-peer heartbeat fault indicators
    // (spec §4.9), all active high.
    let led_cvc = gpiob.pb10.into_push_pull_output();
    let led_fzc = gpiob.pb5.into_push_pull_output();
    let led_rzc = gpioa.pa10.into_push_pull_output();

    // LED_SYS — blinks while any fault is latched.
    let led_sys = gpioc.pc4.into_push_pull_output();

    // WDI — kicked once per tick the watchdog-feed gate allows (spec §4.8),
    // feeding an external hardware watchdog IC rather than the MCU's own.
    let wdi = gpioa.pa1.into_push_pull_output();

    Board {
        pcan_config: can1_config,
        can_timing_500kbps,
        relay_cmd,
        relay_readback,
        led_cvc,
        led_fzc,
        led_rzc,
        led_sys,
        wdi,
    }
}
