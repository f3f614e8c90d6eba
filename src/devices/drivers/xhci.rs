//! # xHCI Host Controller
//!
//! Register-level driver for a USB 3 host controller: reset, run, root port
//! status and reset, and the primary event ring on interrupter 0.
//!
//! ## Register Windows
//!
//! ```text
//! BAR0 ─▶ capability regs ─┬─ CAPLENGTH ─▶ operational regs ─▶ +0x400 port regs
//!                          └─ RTSOFF    ─▶ runtime regs     ─▶ +0x20  interrupter 0
//! ```
//!
//! ## Event Ring
//!
//! One segment of [`EVENT_RING_SIZE`] TRBs. The controller writes events
//! with its producer cycle bit; an entry whose cycle bit equals our
//! consumer cycle state is new. The consumer state flips each time the
//! dequeue index wraps. After consuming an entry ERDP is advanced with the
//! Event Handler Busy bit written back as one to clear it.
//!
//! All DMA structures live in a caller-provided [`DmaMemory`] block so they
//! can sit in a static and never touch the allocator.

use core::ptr::{read_volatile, write_volatile};

use bitflags::bitflags;

use crate::devices::controller::{HostController, RootPort};
use crate::error::{Code, Error, Result};
use crate::log;
use crate::logger::LogLevel;

pub const EVENT_RING_SIZE: usize = 32;

/// Polls of a status bit before a reset/halt/run is declared failed.
const SPIN_LIMIT: usize = 1_000_000;

mod cap {
    pub const CAPLENGTH: usize = 0x00;
    pub const HCSPARAMS1: usize = 0x04;
    pub const RTSOFF: usize = 0x18;
}

mod op {
    pub const USBCMD: usize = 0x00;
    pub const USBSTS: usize = 0x04;
    pub const DCBAAP: usize = 0x30;
    pub const CONFIG: usize = 0x38;
    pub const PORT_BASE: usize = 0x400;
    pub const PORT_STRIDE: usize = 0x10;
}

mod ir {
    pub const IR0: usize = 0x20;
    pub const IMAN: usize = 0x00;
    pub const IMOD: usize = 0x04;
    pub const ERSTSZ: usize = 0x08;
    pub const ERSTBA: usize = 0x10;
    pub const ERDP: usize = 0x18;

    pub const IMAN_IP: u32 = 1 << 0;
    pub const IMAN_IE: u32 = 1 << 1;
    pub const ERDP_EHB: u64 = 1 << 3;
    /// 250ns units: 1ms between interrupts at most.
    pub const IMOD_INTERVAL: u32 = 4000;
}

mod trb_type {
    pub const TRANSFER: u32 = 32;
    pub const COMMAND_COMPLETION: u32 = 33;
    pub const PORT_STATUS_CHANGE: u32 = 34;
    pub const HOST_CONTROLLER: u32 = 37;
}

const COMPLETION_SUCCESS: u32 = 1;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UsbCmd: u32 {
        const RUN = 1 << 0;
        const HCRST = 1 << 1;
        const INTE = 1 << 2;
        const HSEE = 1 << 3;
        const _ = !0;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UsbSts: u32 {
        const HCH = 1 << 0;
        const HSE = 1 << 2;
        const EINT = 1 << 3;
        const PCD = 1 << 4;
        const CNR = 1 << 11;
        const HCE = 1 << 12;
        const _ = !0;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PortSc: u32 {
        const CCS = 1 << 0;
        const PED = 1 << 1;
        const PR = 1 << 4;
        const PP = 1 << 9;
        const CSC = 1 << 17;
        const PEC = 1 << 18;
        const WRC = 1 << 19;
        const OCC = 1 << 20;
        const PRC = 1 << 21;
        const PLC = 1 << 22;
        const CEC = 1 << 23;
        const WCE = 1 << 25;
        const WDE = 1 << 26;
        const WOE = 1 << 27;
        const _ = !0;
    }
}

impl PortSc {
    /// Write-1-to-clear change bits.
    const CHANGE: Self = Self::CSC
        .union(Self::PEC)
        .union(Self::WRC)
        .union(Self::OCC)
        .union(Self::PRC)
        .union(Self::PLC)
        .union(Self::CEC);
    /// Plain read/write bits that must be written back unchanged.
    const PRESERVE: Self = Self::PP.union(Self::WCE).union(Self::WDE).union(Self::WOE);
}

/// Transfer Request Block, the 16-byte unit of every xHCI ring.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Trb {
    pub param: u64,
    pub status: u32,
    pub control: u32,
}

impl Trb {
    pub const fn new() -> Self {
        Self {
            param: 0,
            status: 0,
            control: 0,
        }
    }

    pub fn cycle(&self) -> bool {
        self.control & 1 != 0
    }

    pub fn trb_type(&self) -> u32 {
        (self.control >> 10) & 0x3f
    }

    pub fn completion_code(&self) -> u32 {
        self.status >> 24
    }
}

#[repr(C, align(64))]
#[derive(Debug, Clone, Copy, Default)]
struct ErstEntry {
    ring_base: u64,
    ring_size: u32,
    _reserved: u32,
}

/// Memory the controller reads and writes by DMA.
#[repr(C, align(4096))]
pub struct DmaMemory {
    dcbaa: [u64; 256],
    erst: [ErstEntry; 1],
    trbs: [Trb; EVENT_RING_SIZE],
}

impl DmaMemory {
    pub const fn new() -> Self {
        Self {
            dcbaa: [0; 256],
            erst: [ErstEntry {
                ring_base: 0,
                ring_size: 0,
                _reserved: 0,
            }; 1],
            trbs: [Trb::new(); EVENT_RING_SIZE],
        }
    }
}

pub struct XhciPort {
    number: u8,
    portsc: usize,
}

impl RootPort for XhciPort {
    fn number(&self) -> u8 {
        self.number
    }

    fn is_connected(&self) -> bool {
        let value = unsafe { read_volatile(self.portsc as *const u32) };
        PortSc::from_bits_retain(value).contains(PortSc::CCS)
    }
}

pub struct XhciController<'a> {
    mmio_base: usize,
    op_base: usize,
    ir0_base: usize,
    memory: &'a mut DmaMemory,
    /// Virtual to physical, for addresses handed to the controller.
    translate: fn(u64) -> Option<u64>,
    ring_phys: u64,
    dequeue: usize,
    cycle: bool,
    running: bool,
}

impl<'a> XhciController<'a> {
    /// # Safety
    ///
    /// `mmio_base` must be the mapped virtual address of the controller's
    /// BAR0 window, valid for the life of the controller.
    pub unsafe fn new(
        mmio_base: usize,
        memory: &'a mut DmaMemory,
        translate: fn(u64) -> Option<u64>,
    ) -> Self {
        let cap_length = read_volatile((mmio_base + cap::CAPLENGTH) as *const u32) & 0xff;
        let rts_offset = read_volatile((mmio_base + cap::RTSOFF) as *const u32) & !0x1f;
        Self {
            mmio_base,
            op_base: mmio_base + cap_length as usize,
            ir0_base: mmio_base + rts_offset as usize + ir::IR0,
            memory,
            translate,
            ring_phys: 0,
            dequeue: 0,
            cycle: true,
            running: false,
        }
    }

    fn read32(&self, addr: usize) -> u32 {
        unsafe { read_volatile(addr as *const u32) }
    }

    fn write32(&self, addr: usize, value: u32) {
        unsafe { write_volatile(addr as *mut u32, value) }
    }

    fn write64(&self, addr: usize, value: u64) {
        self.write32(addr, value as u32);
        self.write32(addr + 4, (value >> 32) as u32);
    }

    fn usbcmd(&self) -> UsbCmd {
        UsbCmd::from_bits_retain(self.read32(self.op_base + op::USBCMD))
    }

    fn usbsts(&self) -> UsbSts {
        UsbSts::from_bits_retain(self.read32(self.op_base + op::USBSTS))
    }

    fn portsc_addr(&self, number: u8) -> usize {
        self.op_base + op::PORT_BASE + op::PORT_STRIDE * (number as usize - 1)
    }

    fn phys(&self, virt: u64) -> Result<u64> {
        (self.translate)(virt).ok_or_else(|| Error::new(Code::HardwareInitFailure))
    }

    fn wait_until(&self, mut done: impl FnMut(&Self) -> bool) -> Result<()> {
        for _ in 0..SPIN_LIMIT {
            if done(self) {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        Err(Error::new(Code::HardwareInitFailure))
    }

    fn reset(&mut self) -> Result<()> {
        if !self.usbsts().contains(UsbSts::HCH) {
            let cmd = self.usbcmd().difference(UsbCmd::RUN);
            self.write32(self.op_base + op::USBCMD, cmd.bits());
            self.wait_until(|hc| hc.usbsts().contains(UsbSts::HCH))?;
        }

        let cmd = self.usbcmd().union(UsbCmd::HCRST);
        self.write32(self.op_base + op::USBCMD, cmd.bits());
        self.wait_until(|hc| !hc.usbcmd().contains(UsbCmd::HCRST))?;
        self.wait_until(|hc| !hc.usbsts().contains(UsbSts::CNR))
    }

    fn setup_device_contexts(&mut self) -> Result<()> {
        let max_slots = self.read32(self.mmio_base + cap::HCSPARAMS1) & 0xff;
        self.write32(self.op_base + op::CONFIG, max_slots);

        self.memory.dcbaa.fill(0);
        let dcbaa = self.phys(self.memory.dcbaa.as_ptr() as u64)?;
        self.write64(self.op_base + op::DCBAAP, dcbaa);
        Ok(())
    }

    fn setup_event_ring(&mut self) -> Result<()> {
        self.memory.trbs.fill(Trb::new());
        self.dequeue = 0;
        self.cycle = true;

        self.ring_phys = self.phys(self.memory.trbs.as_ptr() as u64)?;
        self.memory.erst[0] = ErstEntry {
            ring_base: self.ring_phys,
            ring_size: EVENT_RING_SIZE as u32,
            _reserved: 0,
        };
        let erst = self.phys(self.memory.erst.as_ptr() as u64)?;

        self.write32(self.ir0_base + ir::ERSTSZ, 1);
        self.write64(self.ir0_base + ir::ERDP, self.ring_phys);
        // ERSTBA last: writing it makes the controller fetch the table.
        self.write64(self.ir0_base + ir::ERSTBA, erst);

        self.write32(self.ir0_base + ir::IMOD, ir::IMOD_INTERVAL);
        self.write32(self.ir0_base + ir::IMAN, ir::IMAN_IP | ir::IMAN_IE);
        Ok(())
    }

    fn acknowledge_interrupt(&self) {
        self.write32(self.op_base + op::USBSTS, UsbSts::EINT.bits());
        self.write32(self.ir0_base + ir::IMAN, ir::IMAN_IP | ir::IMAN_IE);
    }

    fn on_port_status_change(&self, trb: &Trb) {
        let number = ((trb.param >> 24) & 0xff) as u8;
        if number == 0 || number > self.max_ports() {
            log!(LogLevel::Warn, "xHC: status change on bogus port {}", number);
            return;
        }

        let addr = self.portsc_addr(number);
        let portsc = PortSc::from_bits_retain(self.read32(addr));
        let clear = portsc.intersection(PortSc::PRESERVE) | portsc.intersection(PortSc::CHANGE);
        self.write32(addr, clear.bits());
        log!(
            LogLevel::Info,
            "xHC: port {} status change, connected={} enabled={}",
            number,
            portsc.contains(PortSc::CCS),
            portsc.contains(PortSc::PED)
        );
    }
}

impl HostController for XhciController<'_> {
    type Port = XhciPort;

    fn initialize(&mut self) -> Result<()> {
        self.running = false;
        self.reset()?;
        self.setup_device_contexts()?;
        self.setup_event_ring()
    }

    fn run(&mut self) -> Result<()> {
        let cmd = self.usbcmd().union(UsbCmd::RUN | UsbCmd::INTE);
        self.write32(self.op_base + op::USBCMD, cmd.bits());
        self.wait_until(|hc| !hc.usbsts().contains(UsbSts::HCH))?;
        self.running = true;
        Ok(())
    }

    fn max_ports(&self) -> u8 {
        (self.read32(self.mmio_base + cap::HCSPARAMS1) >> 24) as u8
    }

    fn port_at(&self, number: u8) -> XhciPort {
        XhciPort {
            number,
            portsc: self.portsc_addr(number),
        }
    }

    fn configure_port(&mut self, port: &XhciPort) -> Result<()> {
        if !self.running {
            return Err(Error::new(Code::InvalidPhase));
        }
        if !port.is_connected() {
            return Err(Error::new(Code::NotFound));
        }

        // Reset completion is reported as a port status change event.
        let portsc = PortSc::from_bits_retain(self.read32(port.portsc));
        let reset = portsc.intersection(PortSc::PRESERVE) | PortSc::PR;
        self.write32(port.portsc, reset.bits());
        Ok(())
    }

    fn has_pending_completion(&self) -> bool {
        let trb = unsafe { read_volatile(&self.memory.trbs[self.dequeue]) };
        trb.cycle() == self.cycle
    }

    fn process_one_completion(&mut self) -> Result<()> {
        if !self.has_pending_completion() {
            return Ok(());
        }

        let trb = unsafe { read_volatile(&self.memory.trbs[self.dequeue]) };
        self.dequeue += 1;
        if self.dequeue == EVENT_RING_SIZE {
            self.dequeue = 0;
            self.cycle = !self.cycle;
        }
        let erdp = self.ring_phys + (self.dequeue * core::mem::size_of::<Trb>()) as u64;
        self.write64(self.ir0_base + ir::ERDP, erdp | ir::ERDP_EHB);
        self.acknowledge_interrupt();

        match trb.trb_type() {
            trb_type::PORT_STATUS_CHANGE => {
                self.on_port_status_change(&trb);
                Ok(())
            }
            trb_type::HOST_CONTROLLER => {
                log!(LogLevel::Error, "xHC: host controller event, code {}", trb.completion_code());
                Err(Error::new(Code::HardwareInitFailure))
            }
            trb_type::TRANSFER | trb_type::COMMAND_COMPLETION
                if trb.completion_code() != COMPLETION_SUCCESS =>
            {
                log!(
                    LogLevel::Warn,
                    "xHC: event type {} completed with code {}",
                    trb.trb_type(),
                    trb.completion_code()
                );
                Err(Error::new(Code::HardwareInitFailure))
            }
            other => {
                log!(LogLevel::Debug, "xHC: event type {}", other);
                Ok(())
            }
        }
    }
}
