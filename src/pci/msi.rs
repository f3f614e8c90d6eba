//! # Message-Signaled Interrupts
//!
//! Steers a device's MSI to one vector on one CPU.
//!
//! ## Capability Layout
//!
//! ```text
//! +0x0  │ message control │ next │ id=05 │
//! +0x4  │ message address (low)          │
//! +0x8  │ message address (high)         │  only if 64-bit capable
//! +0x8/0xc │ message data                │
//! +...  │ mask bits                      │  only if per-vector masking
//! +...  │ pending bits                   │
//! ```
//!
//! ## x86 Message Format
//!
//! | Field   | Value                                                   |
//! |---------|---------------------------------------------------------|
//! | address | `0xfee0_0000 \| apic_id << 12`                          |
//! | data    | `vector \| delivery_mode << 8 \| (level ? 0xc000 : 0)`  |

use bitflags::bitflags;

use crate::error::{Code, Error, Result};
use crate::log;
use crate::logger::LogLevel;
use crate::pci::capability::{find_capability, CAPABILITY_MSI, CAPABILITY_MSIX};
use crate::pci::config::ConfigSpace;
use crate::pci::device::Device;

bitflags! {
    /// Message control, the upper half of the capability header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MsiControl: u16 {
        const ENABLE = 1 << 0;
        const MULTI_MSG_CAPABLE = 0b111 << 1;
        const MULTI_MSG_ENABLE = 0b111 << 4;
        const ADDR_64_CAPABLE = 1 << 7;
        const PER_VECTOR_MASK_CAPABLE = 1 << 8;
        const _ = !0;
    }
}

impl MsiControl {
    /// log2 of the number of vectors the device can raise.
    pub fn multi_msg_capable(self) -> u8 {
        ((self.bits() >> 1) & 0b111) as u8
    }

    pub fn multi_msg_enable(self) -> u8 {
        ((self.bits() >> 4) & 0b111) as u8
    }

    pub fn set_multi_msg_enable(&mut self, exponent: u8) {
        let field = ((exponent & 0b111) as u16) << 4;
        let bits = (self.bits() & !Self::MULTI_MSG_ENABLE.bits()) | field;
        *self = Self::from_bits_retain(bits);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    Edge = 0,
    Level = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Fixed = 0b000,
    LowestPriority = 0b001,
    Smi = 0b010,
    Nmi = 0b100,
    Init = 0b101,
    ExtInt = 0b111,
}

/// Where and how one device interrupt is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsiConfig {
    pub enable: bool,
    pub vector: u8,
    pub apic_id: u8,
    pub trigger_mode: TriggerMode,
    pub delivery_mode: DeliveryMode,
    /// log2 of the vectors requested; clamped to what the device offers.
    pub num_vector_exponent: u8,
    /// Refuse devices that cannot take a 64-bit message address.
    pub require_64bit_address: bool,
}

impl MsiConfig {
    /// Edge-triggered, fixed delivery of `vector` to `apic_id`.
    pub const fn fixed(apic_id: u8, vector: u8) -> Self {
        Self {
            enable: true,
            vector,
            apic_id,
            trigger_mode: TriggerMode::Edge,
            delivery_mode: DeliveryMode::Fixed,
            num_vector_exponent: 0,
            require_64bit_address: false,
        }
    }

    pub const fn message_address(&self) -> u32 {
        0xfee0_0000 | ((self.apic_id as u32) << 12)
    }

    pub const fn message_data(&self) -> u32 {
        let mut data = ((self.delivery_mode as u32) << 8) | self.vector as u32;
        if let TriggerMode::Level = self.trigger_mode {
            data |= 0xc000;
        }
        data
    }
}

/// Snapshot of an MSI capability's registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsiCapability {
    pub cap_id: u8,
    pub next_ptr: u8,
    pub control: MsiControl,
    pub msg_addr: u32,
    pub msg_upper_addr: u32,
    pub msg_data: u32,
    pub mask_bits: u32,
    pub pending_bits: u32,
}

impl MsiCapability {
    fn header(&self) -> u32 {
        self.cap_id as u32 | (self.next_ptr as u32) << 8 | (self.control.bits() as u32) << 16
    }

    fn data_offset(&self) -> u8 {
        if self.control.contains(MsiControl::ADDR_64_CAPABLE) {
            12
        } else {
            8
        }
    }

    fn size(&self) -> u8 {
        let size = self.data_offset() + 4;
        if self.control.contains(MsiControl::PER_VECTOR_MASK_CAPABLE) {
            size + 8
        } else {
            size
        }
    }
}

fn check_bounds(cap_addr: u8, size: u8) -> Result<()> {
    if cap_addr as usize + size as usize > 0x100 {
        return Err(Error::new(Code::IndexOutOfRange));
    }
    Ok(())
}

pub fn read_msi_capability<C: ConfigSpace + ?Sized>(
    config: &C,
    dev: &Device,
    cap_addr: u8,
) -> Result<MsiCapability> {
    check_bounds(cap_addr, 12)?;

    let header = config.read_conf_reg(dev, cap_addr);
    let mut cap = MsiCapability {
        cap_id: header as u8,
        next_ptr: (header >> 8) as u8,
        control: MsiControl::from_bits_retain((header >> 16) as u16),
        msg_addr: 0,
        msg_upper_addr: 0,
        msg_data: 0,
        mask_bits: 0,
        pending_bits: 0,
    };
    check_bounds(cap_addr, cap.size())?;

    cap.msg_addr = config.read_conf_reg(dev, cap_addr + 4);
    if cap.control.contains(MsiControl::ADDR_64_CAPABLE) {
        cap.msg_upper_addr = config.read_conf_reg(dev, cap_addr + 8);
    }
    let data_addr = cap_addr + cap.data_offset();
    cap.msg_data = config.read_conf_reg(dev, data_addr);
    if cap.control.contains(MsiControl::PER_VECTOR_MASK_CAPABLE) {
        cap.mask_bits = config.read_conf_reg(dev, data_addr + 4);
        cap.pending_bits = config.read_conf_reg(dev, data_addr + 8);
    }
    Ok(cap)
}

/// Writes the message registers first and the header (with the enable bit)
/// last, so the device never fires with a half-written address.
pub fn write_msi_capability<C: ConfigSpace + ?Sized>(
    config: &C,
    dev: &Device,
    cap_addr: u8,
    cap: &MsiCapability,
) -> Result<()> {
    check_bounds(cap_addr, cap.size())?;

    config.write_conf_reg(dev, cap_addr + 4, cap.msg_addr);
    if cap.control.contains(MsiControl::ADDR_64_CAPABLE) {
        config.write_conf_reg(dev, cap_addr + 8, cap.msg_upper_addr);
    }
    let data_addr = cap_addr + cap.data_offset();
    config.write_conf_reg(dev, data_addr, cap.msg_data);
    if cap.control.contains(MsiControl::PER_VECTOR_MASK_CAPABLE) {
        config.write_conf_reg(dev, data_addr + 4, cap.mask_bits);
    }
    config.write_conf_reg(dev, cap_addr, cap.header());
    Ok(())
}

fn configure_msi_register<C: ConfigSpace + ?Sized>(
    config: &C,
    dev: &Device,
    cap_addr: u8,
    msi: &MsiConfig,
) -> Result<()> {
    let mut cap = read_msi_capability(config, dev, cap_addr)?;

    if msi.require_64bit_address && !cap.control.contains(MsiControl::ADDR_64_CAPABLE) {
        return Err(Error::new(Code::NotFound));
    }

    let exponent = cap.control.multi_msg_capable().min(msi.num_vector_exponent);
    cap.control.set_multi_msg_enable(exponent);
    cap.control.set(MsiControl::ENABLE, msi.enable);
    cap.msg_addr = msi.message_address();
    cap.msg_upper_addr = 0;
    cap.msg_data = msi.message_data();

    write_msi_capability(config, dev, cap_addr, &cap)
}

/// Routes `dev`'s MSI as described by `msi`, replacing any earlier routing.
pub fn configure_msi_fixed_destination<C: ConfigSpace + ?Sized>(
    config: &C,
    dev: &Device,
    msi: &MsiConfig,
) -> Result<()> {
    if let Some(cap_addr) = find_capability(config, dev, CAPABILITY_MSI) {
        return configure_msi_register(config, dev, cap_addr, msi);
    }

    if find_capability(config, dev, CAPABILITY_MSIX).is_some() {
        log!(LogLevel::Warn, "{}: only MSI-X is offered, which is not supported", dev);
        return Err(Error::new(Code::NotImplemented));
    }
    Err(Error::new(Code::NotFound))
}
