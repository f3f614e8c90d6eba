//! Kernel start-up.
//!
//! Bring-up order on hardware:
//!
//! 1. serial log, physical memory window
//! 2. GDT/TSS, legacy PIC masked, exception gates, IDT loaded
//! 3. PCI scan, xHC selected (Intel preferred), EHCI ports handed over
//! 4. controller reset and started
//! 5. vector 0x40 installed, MSI routed to this CPU's local APIC
//! 6. interrupts enabled, connected root ports reset
//! 7. main loop
//!
//! Steps 1-5 run with interrupts disabled.

use spin::Mutex;

use crate::config::{
    BOOT_LOG_LEVEL, DEVICE_TABLE_CAPACITY, EHCI_CLASS, INTEL_VENDOR_ID, XHC_CLASS,
};
use crate::devices::drivers::xhci::{DmaMemory, XhciController};
use crate::devices::{HostController, RootPort};
use crate::error::{Code, Error, Result};
use crate::interrupts::apic::LOCAL_APIC_PHYS_BASE;
use crate::interrupts::{self, InterruptVector, LocalApic, X86Interrupts};
use crate::kernel::event_loop::EventLoop;
use crate::kernel::{halt, xhci_interrupt_handler, LOCAL_APIC, MAIN_QUEUE};
use crate::log;
use crate::logger::{self, LogLevel};
use crate::memory;
use crate::pci::{
    configure_msi_fixed_destination, find_preferred, scan_all_bus, ConfigSpace, Device,
    DeviceTable, MsiConfig, PortConfigSpace,
};

/// Intel xHC registers that move ports between the EHCI and xHCI functions.
mod intel {
    pub const USB3_PSSEN: u8 = 0xd8;
    pub const USB3PRM: u8 = 0xdc;
    pub const XUSB2PR: u8 = 0xd0;
    pub const XUSB2PRM: u8 = 0xd4;
}

static XHC_DMA: Mutex<DmaMemory> = Mutex::new(DmaMemory::new());

fn init_phase<T>(name: &'static str, init_fn: impl FnOnce() -> Result<T>) -> Result<T> {
    log!(LogLevel::Info, "Initializing {}...", name);
    match init_fn() {
        Ok(value) => {
            log!(LogLevel::Info, "{} initialized", name);
            Ok(value)
        }
        Err(e) => {
            log!(LogLevel::Error, "{} failed: {}", name, e);
            Err(e)
        }
    }
}

/// Full bus scan. Running out of table slots is reported but not fatal:
/// whatever was recorded before that point is still searched.
pub fn scan_devices<C: ConfigSpace + ?Sized, const N: usize>(
    config: &C,
    devices: &mut DeviceTable<N>,
) -> Result<()> {
    match scan_all_bus(config, devices) {
        Ok(()) => {}
        Err(e) if e == Code::Full => {
            log!(LogLevel::Warn, "device table full, scan stopped after {} devices", devices.len());
        }
        Err(e) => return Err(e),
    }

    log!(LogLevel::Info, "scan_all_bus: {} devices", devices.len());
    for dev in devices.iter() {
        log!(
            LogLevel::Debug,
            "{}, vend {:04x}",
            dev,
            config.device_vendor_id(dev)
        );
    }
    Ok(())
}

pub fn find_xhc<C: ConfigSpace + ?Sized>(config: &C, devices: &[Device]) -> Result<Device> {
    find_preferred(config, devices, XHC_CLASS, INTEL_VENDOR_ID)
        .ok_or_else(|| Error::new(Code::NotFound))
}

/// On Intel chipsets with an EHCI function too, USB 2 ports start out
/// routed to EHCI. Hands every port the xHC can take over to it.
pub fn switch_ehci_to_xhci<C: ConfigSpace + ?Sized>(config: &C, devices: &[Device], xhc: &Device) {
    let intel_ehc_exists = devices.iter().any(|dev| {
        dev.class_code
            .match_interface(EHCI_CLASS.base, EHCI_CLASS.sub, EHCI_CLASS.interface)
            && config.device_vendor_id(dev) == INTEL_VENDOR_ID
    });
    if !intel_ehc_exists {
        return;
    }

    let superspeed_ports = config.read_conf_reg(xhc, intel::USB3PRM);
    config.write_conf_reg(xhc, intel::USB3_PSSEN, superspeed_ports);
    let ehci_to_xhci_ports = config.read_conf_reg(xhc, intel::XUSB2PRM);
    config.write_conf_reg(xhc, intel::XUSB2PR, ehci_to_xhci_ports);
    log!(
        LogLevel::Debug,
        "SwitchEhci2Xhci: SS = {:02x}, xHCI = {:02x}",
        superspeed_ports,
        ehci_to_xhci_ports
    );
}

/// Memory-mapped register window of `dev`, from BAR0.
pub fn read_mmio_base<C: ConfigSpace + ?Sized>(config: &C, dev: &Device) -> Result<u64> {
    let bar = config.read_bar(dev, 0)?;
    Ok(bar & !0xf)
}

pub fn start_controller<H: HostController>(controller: &mut H) -> Result<()> {
    controller.initialize()?;
    controller.run()
}

/// Resets every connected root port. A port that fails is logged and
/// skipped. Returns how many ports were configured.
pub fn configure_ports<H: HostController>(controller: &mut H) -> usize {
    let mut configured = 0;
    for number in 1..=controller.max_ports() {
        let port = controller.port_at(number);
        if !port.is_connected() {
            continue;
        }

        match controller.configure_port(&port) {
            Ok(()) => configured += 1,
            Err(e) => log!(LogLevel::Error, "failed to configure port {}: {}", port.number(), e),
        }
    }
    configured
}

pub fn route_interrupt<C: ConfigSpace + ?Sized>(
    config: &C,
    dev: &Device,
    apic_id: u8,
) -> Result<()> {
    let msi = MsiConfig::fixed(apic_id, InterruptVector::Xhci.as_u8());
    configure_msi_fixed_destination(config, dev, &msi)
}

/// Hardware bring-up. Never returns; halts if no usable controller exists.
pub fn start(physical_memory_offset: u64) -> ! {
    logger::init();
    logger::set_log_level(BOOT_LOG_LEVEL);
    memory::init(physical_memory_offset);

    log!(LogLevel::Info, "Initializing interrupt system...");
    interrupts::init();
    log!(LogLevel::Info, "interrupt system initialized");
    let apic = LOCAL_APIC.call_once(|| unsafe {
        LocalApic::new(memory::phys_to_virt(LOCAL_APIC_PHYS_BASE) as usize)
    });

    let config = PortConfigSpace::new();
    let mut devices = DeviceTable::<DEVICE_TABLE_CAPACITY>::new();
    if init_phase("PCI bus", || scan_devices(&config, &mut devices)).is_err() {
        halt();
    }

    let Ok(xhc) = find_xhc(&config, devices.as_slice()) else {
        log!(LogLevel::Error, "no xHC has been found");
        halt();
    };
    log!(LogLevel::Info, "xHC has been found: {}", xhc);
    if config.device_vendor_id(&xhc) == INTEL_VENDOR_ID {
        switch_ehci_to_xhci(&config, devices.as_slice(), &xhc);
    }

    let Ok(mmio_base) = read_mmio_base(&config, &xhc) else {
        log!(LogLevel::Error, "xHC BAR0 unreadable");
        halt();
    };
    log!(LogLevel::Debug, "xHC mmio_base = {:08x}", mmio_base);

    // Held for the life of the kernel.
    let mut dma = XHC_DMA.lock();
    let mut controller = unsafe {
        XhciController::new(
            memory::phys_to_virt(mmio_base) as usize,
            &mut dma,
            memory::virt_to_phys,
        )
    };
    if init_phase("xHC", || start_controller(&mut controller)).is_err() {
        halt();
    }

    interrupts::install_device_handler(
        InterruptVector::Xhci,
        xhci_interrupt_handler as usize as u64,
    );
    if init_phase("MSI", || route_interrupt(&config, &xhc, apic.id())).is_err() {
        halt();
    }

    x86_64::instructions::interrupts::enable();

    let configured = configure_ports(&mut controller);
    log!(LogLevel::Info, "{} root ports configured", configured);

    EventLoop::new(&MAIN_QUEUE, controller, X86Interrupts).run()
}
