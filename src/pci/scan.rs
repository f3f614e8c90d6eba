//! # Bus Enumeration
//!
//! Depth-first walk of bus / device / function starting from the host
//! bridge at 0.0.0. A PCI-to-PCI bridge is recorded first, then its
//! secondary bus is enumerated completely before the walk continues with the
//! bridge's siblings:
//!
//! ```text
//! bus 0 ─┬─ 0.0.0 host bridge
//!        ├─ 0.1.0 bridge ──▶ bus 1 ─┬─ 1.0.0
//!        │                          └─ 1.3.0
//!        └─ 0.2.0                       (recorded after 1.3.0)
//! ```
//!
//! A full table stops the walk immediately with `Full`; whatever was already
//! recorded stays in the table.

use crate::error::Result;
use crate::pci::config::{is_single_function_device, ConfigSpace, INVALID_VENDOR_ID};
use crate::pci::device::{ClassCode, Device, DeviceTable};

/// Enumerates every reachable function into `devices`, which is emptied first.
pub fn scan_all_bus<C: ConfigSpace + ?Sized, const N: usize>(
    config: &C,
    devices: &mut DeviceTable<N>,
) -> Result<()> {
    devices.clear();
    let mut scanner = BusScanner { config, devices };

    // A multi-function host bridge means one host bridge (and one root bus)
    // per function.
    let header_type = config.header_type(0, 0, 0);
    if is_single_function_device(header_type) {
        return scanner.scan_bus(0);
    }

    for function in 0..8u8 {
        if config.vendor_id(0, 0, function) == INVALID_VENDOR_ID {
            continue;
        }
        scanner.scan_bus(function)?;
    }
    Ok(())
}

/// First device of `class` made by `vendor`, else the first device of `class`.
pub fn find_preferred<C: ConfigSpace + ?Sized>(
    config: &C,
    devices: &[Device],
    class: ClassCode,
    vendor: u16,
) -> Option<Device> {
    let mut candidate = None;
    for dev in devices
        .iter()
        .filter(|d| d.class_code.match_interface(class.base, class.sub, class.interface))
    {
        if config.device_vendor_id(dev) == vendor {
            return Some(*dev);
        }
        candidate.get_or_insert(*dev);
    }
    candidate
}

struct BusScanner<'a, C: ?Sized, const N: usize> {
    config: &'a C,
    devices: &'a mut DeviceTable<N>,
}

impl<C: ConfigSpace + ?Sized, const N: usize> BusScanner<'_, C, N> {
    fn scan_bus(&mut self, bus: u8) -> Result<()> {
        for device in 0..32u8 {
            if self.config.vendor_id(bus, device, 0) == INVALID_VENDOR_ID {
                continue;
            }
            self.scan_device(bus, device)?;
        }
        Ok(())
    }

    fn scan_device(&mut self, bus: u8, device: u8) -> Result<()> {
        self.scan_function(bus, device, 0)?;
        if is_single_function_device(self.config.header_type(bus, device, 0)) {
            return Ok(());
        }

        for function in 1..8u8 {
            if self.config.vendor_id(bus, device, function) == INVALID_VENDOR_ID {
                continue;
            }
            self.scan_function(bus, device, function)?;
        }
        Ok(())
    }

    fn scan_function(&mut self, bus: u8, device: u8, function: u8) -> Result<()> {
        let class_code = self.config.class_code(bus, device, function);
        let header_type = self.config.header_type(bus, device, function);
        self.devices
            .push(Device::new(bus, device, function, header_type, class_code))?;

        if class_code.is_pci_bridge() {
            let bus_numbers = self.config.bus_numbers(bus, device, function);
            let secondary_bus = ((bus_numbers >> 8) & 0xff) as u8;
            return self.scan_bus(secondary_bus);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;
    use crate::pci::testing::SimConfigSpace;

    fn bdf(devices: &DeviceTable<32>) -> Vec<(u8, u8, u8)> {
        devices.iter().map(|d| (d.bus, d.device, d.function)).collect()
    }

    /// bus 0: host bridge, bridge to bus 1, multi-function device
    /// bus 1: bridge to bus 2, one device
    /// bus 2: one device
    fn bridged_space() -> SimConfigSpace {
        let space = SimConfigSpace::new();
        space.add_function((0, 0, 0), 0x8086, (0x06, 0x00, 0x00), 0x00);
        space.add_bridge((0, 1, 0), 1);
        space.add_function((0, 2, 0), 0x8086, (0x01, 0x06, 0x01), 0x80);
        space.add_function((0, 2, 2), 0x8086, (0x0c, 0x05, 0x00), 0x00);
        space.add_bridge((1, 0, 0), 2);
        space.add_function((1, 3, 0), 0x1b36, (0x0c, 0x03, 0x30), 0x00);
        space.add_function((2, 5, 0), 0x1af4, (0x02, 0x00, 0x00), 0x00);
        space
    }

    #[test]
    fn depth_first_pre_order() {
        let space = bridged_space();
        let mut devices = DeviceTable::<32>::new();

        scan_all_bus(&space, &mut devices).unwrap();

        assert_eq!(
            bdf(&devices),
            vec![
                (0, 0, 0),
                (0, 1, 0),
                (1, 0, 0),
                (2, 5, 0),
                (1, 3, 0),
                (0, 2, 0),
                (0, 2, 2),
            ]
        );
        assert_eq!(devices.as_slice()[6].class_code, ClassCode::new(0x0c, 0x05, 0x00));
        assert_eq!(devices.as_slice()[1].header_type, 0x01);
    }

    #[test]
    fn rescan_is_deterministic() {
        let space = bridged_space();
        let mut devices = DeviceTable::<32>::new();

        scan_all_bus(&space, &mut devices).unwrap();
        let first = bdf(&devices);
        scan_all_bus(&space, &mut devices).unwrap();

        assert_eq!(bdf(&devices), first);
    }

    #[test]
    fn single_function_device_skips_other_functions() {
        let space = SimConfigSpace::new();
        space.add_function((0, 0, 0), 0x8086, (0x06, 0x00, 0x00), 0x00);
        space.add_function((0, 4, 0), 0x8086, (0x02, 0x00, 0x00), 0x00);
        // Would only be found if function 0 were multi-function.
        space.add_function((0, 4, 1), 0x8086, (0x02, 0x00, 0x00), 0x00);
        let mut devices = DeviceTable::<32>::new();

        scan_all_bus(&space, &mut devices).unwrap();

        assert_eq!(bdf(&devices), vec![(0, 0, 0), (0, 4, 0)]);
    }

    #[test]
    fn multi_function_host_bridge_scans_one_bus_per_function() {
        let space = SimConfigSpace::new();
        space.add_function((0, 0, 0), 0x8086, (0x06, 0x00, 0x00), 0x80);
        space.add_function((0, 0, 1), 0x8086, (0x06, 0x00, 0x00), 0x80);
        space.add_function((0, 3, 0), 0x8086, (0x02, 0x00, 0x00), 0x00);
        space.add_function((1, 7, 0), 0x8086, (0x0c, 0x03, 0x30), 0x00);
        let mut devices = DeviceTable::<32>::new();

        scan_all_bus(&space, &mut devices).unwrap();

        assert_eq!(
            bdf(&devices),
            vec![(0, 0, 0), (0, 0, 1), (0, 3, 0), (1, 7, 0)]
        );
    }

    #[test]
    fn overflow_keeps_exact_prefix() {
        let space = bridged_space();
        let mut devices = DeviceTable::<4>::new();

        let err = scan_all_bus(&space, &mut devices).unwrap_err();

        assert_eq!(err, Code::Full);
        let found: Vec<_> = devices.iter().map(|d| (d.bus, d.device, d.function)).collect();
        assert_eq!(found, vec![(0, 0, 0), (0, 1, 0), (1, 0, 0), (2, 5, 0)]);
    }

    #[test]
    fn empty_bus_yields_empty_table() {
        let space = SimConfigSpace::new();
        let mut devices = DeviceTable::<32>::new();

        // 0.0.0 reads all ones: header type 0xff looks multi-function, every
        // vendor probe then misses.
        scan_all_bus(&space, &mut devices).unwrap();

        assert!(devices.is_empty());
    }

    #[test]
    fn preferred_vendor_wins_over_order() {
        let space = SimConfigSpace::new();
        space.add_function((0, 0, 0), 0x8086, (0x06, 0x00, 0x00), 0x00);
        space.add_function((0, 2, 0), 0x1b36, (0x0c, 0x03, 0x30), 0x00);
        space.add_function((0, 5, 0), 0x8086, (0x0c, 0x03, 0x30), 0x00);
        let mut devices = DeviceTable::<32>::new();
        scan_all_bus(&space, &mut devices).unwrap();
        let xhc = ClassCode::new(0x0c, 0x03, 0x30);

        let dev = find_preferred(&space, devices.as_slice(), xhc, 0x8086).unwrap();
        assert_eq!((dev.bus, dev.device), (0, 5));

        let dev = find_preferred(&space, devices.as_slice(), xhc, 0x10de).unwrap();
        assert_eq!((dev.bus, dev.device), (0, 2));

        let display = ClassCode::new(0x03, 0, 0);
        assert!(find_preferred(&space, devices.as_slice(), display, 0x8086).is_none());
    }
}
