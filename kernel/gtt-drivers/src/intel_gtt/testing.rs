//! Fake collaborators for host tests.
//!
//! [`FakeConfigSpace`] is a byte-addressed configuration header with
//! optional bits that refuse to change and offsets that fail. [`FakeServices`]
//! backs MMIO mappings with heap memory at fixed physical addresses and
//! records every map, unmap, allocation and free. [`Rig`] wires both into a
//! bridge plus graphics function pair for each generation.

use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::string::{String, ToString};
use std::sync::{Mutex, Once};
use std::vec::Vec;

use gtt_core::log::{LogLevel, set_log_fn};
use gtt_core::{PAGE_SIZE, PhysAddr, VirtAddr};
use gtt_driver_api::{
    CacheMode, GttError, KernelServices, MmioRegion, PciAddress, PciBar, PciConfigSpace,
    PciDeviceInfo, PciFunction,
};

use super::GmchDevices;
use super::regs::{
    I810_GFX_MEM_WIN_SIZE, I810_GMADDR, I810_MMADDR, I810_SMRAM_MISCC, I830_GMCH_CTRL,
    I915_GMADDR, I915_MMADDR, I915_PTEADDR, SNB_GMCH_CTRL,
};

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

static LOG: Mutex<Vec<(LogLevel, String)>> = Mutex::new(Vec::new());

fn record(level: LogLevel, args: core::fmt::Arguments<'_>) {
    LOG.lock().unwrap().push((level, args.to_string()));
}

/// Routes driver logging into a buffer shared by every test in the binary.
pub fn capture_log() {
    static INSTALL: Once = Once::new();
    // SAFETY: `record` only takes a mutex.
    INSTALL.call_once(|| unsafe { set_log_fn(record) });
}

/// Number of captured messages at `level` containing `needle`.
pub fn logged(level: LogLevel, needle: &str) -> usize {
    LOG.lock()
        .unwrap()
        .iter()
        .filter(|(at, msg)| *at == level && msg.contains(needle))
        .count()
}

// ---------------------------------------------------------------------------
// Configuration space
// ---------------------------------------------------------------------------

/// In-memory PCI configuration header.
pub struct FakeConfigSpace {
    bytes: Mutex<[u8; 256]>,
    stuck: Mutex<Vec<(u16, u32)>>,
    failing: Mutex<Vec<u16>>,
}

impl FakeConfigSpace {
    /// Creates an all-zero header.
    pub fn new() -> Self {
        Self {
            bytes: Mutex::new([0; 256]),
            stuck: Mutex::new(Vec::new()),
            failing: Mutex::new(Vec::new()),
        }
    }

    /// Bits in `mask` at `offset` keep their value across writes.
    pub fn stick_bits(&self, offset: u16, mask: u32) {
        self.stuck.lock().unwrap().push((offset, mask));
    }

    /// Every access touching `offset` fails.
    pub fn fail_at(&self, offset: u16) {
        self.failing.lock().unwrap().push(offset);
    }

    /// Presets a word, bypassing stuck bits.
    pub fn set_u16(&self, offset: u16, value: u16) {
        self.store(offset, &value.to_le_bytes());
    }

    /// Presets a dword, bypassing stuck bits.
    pub fn set_u32(&self, offset: u16, value: u32) {
        self.store(offset, &value.to_le_bytes());
    }

    /// Current word value.
    pub fn get_u16(&self, offset: u16) -> u16 {
        let mut buf = [0; 2];
        self.load(offset, &mut buf);
        u16::from_le_bytes(buf)
    }

    /// Current dword value.
    pub fn get_u32(&self, offset: u16) -> u32 {
        let mut buf = [0; 4];
        self.load(offset, &mut buf);
        u32::from_le_bytes(buf)
    }

    fn store(&self, offset: u16, data: &[u8]) {
        let start = usize::from(offset);
        self.bytes.lock().unwrap()[start..start + data.len()].copy_from_slice(data);
    }

    fn load(&self, offset: u16, out: &mut [u8]) {
        let start = usize::from(offset);
        out.copy_from_slice(&self.bytes.lock().unwrap()[start..start + out.len()]);
    }

    fn check(&self, offset: u16, width: u16) -> Result<(), GttError> {
        let failing = self.failing.lock().unwrap();
        let hits_failing = failing.iter().any(|&f| f >= offset && f < offset + width);
        if hits_failing || usize::from(offset) + usize::from(width) > 256 {
            return Err(GttError::RegisterAccess { offset });
        }
        Ok(())
    }

    fn stuck_mask(&self, offset: u16) -> u32 {
        self.stuck
            .lock()
            .unwrap()
            .iter()
            .filter(|&&(at, _)| at == offset)
            .fold(0, |acc, &(_, mask)| acc | mask)
    }
}

impl PciConfigSpace for FakeConfigSpace {
    fn read_u16(&self, offset: u16) -> Result<u16, GttError> {
        self.check(offset, 2)?;
        Ok(self.get_u16(offset))
    }

    fn read_u32(&self, offset: u16) -> Result<u32, GttError> {
        self.check(offset, 4)?;
        Ok(self.get_u32(offset))
    }

    fn write_u16(&self, offset: u16, value: u16) -> Result<(), GttError> {
        self.check(offset, 2)?;
        let mask = self.stuck_mask(offset) as u16;
        let old = self.get_u16(offset);
        self.set_u16(offset, (value & !mask) | (old & mask));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Kernel services
// ---------------------------------------------------------------------------

/// Zeroed heap memory standing in for a physical range.
struct Backing {
    base: u64,
    len: usize,
    ptr: *mut u8,
}

// SAFETY: the allocation is owned by the backing and only reached through
// volatile accesses from single-threaded tests.
unsafe impl Send for Backing {}
// SAFETY: see above.
unsafe impl Sync for Backing {}

impl Backing {
    fn layout(len: usize) -> Layout {
        Layout::from_size_align(len, PAGE_SIZE as usize).unwrap()
    }

    fn new(base: u64, len: usize) -> Self {
        // SAFETY: the layout has non-zero size.
        let ptr = unsafe { alloc_zeroed(Self::layout(len)) };
        assert!(!ptr.is_null(), "fake memory allocation failed");
        Self { base, len, ptr }
    }

    fn covers(&self, phys: u64, size: u64) -> bool {
        phys >= self.base && phys + size <= self.base + self.len as u64
    }
}

impl Drop for Backing {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with the same layout.
        unsafe { dealloc(self.ptr, Self::layout(self.len)) };
    }
}

/// First frame handed out by [`FakeServices::alloc_frames`].
const FRAME_BASE: u64 = 0x0100_0000;

/// Heap-backed [`KernelServices`] with ledgers and failure injection.
pub struct FakeServices {
    memory: Vec<Backing>,
    fail_map_at: Mutex<Option<u64>>,
    alloc_budget: Mutex<Option<usize>>,
    next_frame: Mutex<u64>,
    maps: Mutex<Vec<(u64, u64, CacheMode)>>,
    unmaps: Mutex<Vec<(u64, u64)>>,
    allocations: Mutex<Vec<(u64, usize)>>,
    frees: Mutex<Vec<(u64, usize)>>,
}

impl FakeServices {
    /// Creates services with no mappable memory.
    pub fn new() -> Self {
        Self {
            memory: Vec::new(),
            fail_map_at: Mutex::new(None),
            alloc_budget: Mutex::new(None),
            next_frame: Mutex::new(FRAME_BASE),
            maps: Mutex::new(Vec::new()),
            unmaps: Mutex::new(Vec::new()),
            allocations: Mutex::new(Vec::new()),
            frees: Mutex::new(Vec::new()),
        }
    }

    /// Adds `len` bytes of zeroed mappable memory at physical `base`.
    #[must_use]
    pub fn with_memory(mut self, base: u64, len: usize) -> Self {
        self.memory.push(Backing::new(base, len));
        self
    }

    /// Mapping a region starting at `phys` fails from now on.
    pub fn fail_map_at(&self, phys: u64) {
        *self.fail_map_at.lock().unwrap() = Some(phys);
    }

    /// Subsequent frame allocations start at `phys`.
    pub fn place_frames_at(&self, phys: u64) {
        *self.next_frame.lock().unwrap() = phys;
    }

    /// Frame allocation fails after `count` more successful calls.
    pub fn fail_alloc_after(&self, count: usize) {
        *self.alloc_budget.lock().unwrap() = Some(count);
    }

    fn locate(&self, phys: u64, size: u64) -> Option<*mut u8> {
        self.memory
            .iter()
            .find(|b| b.covers(phys, size))
            // SAFETY: `covers` keeps the offset inside the allocation.
            .map(|b| unsafe { b.ptr.add((phys - b.base) as usize) })
    }

    /// Writes a dword of fake physical memory.
    pub fn poke_u32(&self, phys: u64, value: u32) {
        let ptr = self.locate(phys, 4).expect("poke outside fake memory");
        // SAFETY: `locate` bounds-checked the dword.
        unsafe { core::ptr::write_volatile(ptr.cast::<u32>(), value) };
    }

    /// Writes a byte of fake physical memory.
    pub fn poke_u8(&self, phys: u64, value: u8) {
        let ptr = self.locate(phys, 1).expect("poke outside fake memory");
        // SAFETY: `locate` bounds-checked the byte.
        unsafe { core::ptr::write_volatile(ptr, value) };
    }

    /// Reads a dword of fake physical memory.
    pub fn peek_u32(&self, phys: u64) -> u32 {
        let ptr = self.locate(phys, 4).expect("peek outside fake memory");
        // SAFETY: `locate` bounds-checked the dword.
        unsafe { core::ptr::read_volatile(ptr.cast::<u32>()) }
    }

    /// Every `map_mmio` call that succeeded.
    pub fn maps(&self) -> Vec<(u64, u64, CacheMode)> {
        self.maps.lock().unwrap().clone()
    }

    /// Every `unmap_mmio` call.
    pub fn unmaps(&self) -> Vec<(u64, u64)> {
        self.unmaps.lock().unwrap().clone()
    }

    /// Every successful `alloc_frames` call.
    pub fn allocations(&self) -> Vec<(u64, usize)> {
        self.allocations.lock().unwrap().clone()
    }

    /// Every `free_frames` call.
    pub fn frees(&self) -> Vec<(u64, usize)> {
        self.frees.lock().unwrap().clone()
    }

    /// Asserts that every mapping was released exactly once and every
    /// allocation freed exactly once.
    pub fn assert_balanced(&self) {
        let mut mapped: Vec<_> = self.maps().into_iter().map(|(p, s, _)| (p, s)).collect();
        let mut unmapped = self.unmaps();
        mapped.sort_unstable();
        unmapped.sort_unstable();
        assert_eq!(mapped, unmapped, "map/unmap mismatch");

        let mut allocated = self.allocations();
        let mut freed = self.frees();
        allocated.sort_unstable();
        freed.sort_unstable();
        assert_eq!(allocated, freed, "alloc/free mismatch");
    }
}

impl KernelServices for FakeServices {
    fn map_mmio(
        &self,
        phys: PhysAddr,
        size: u64,
        mode: CacheMode,
    ) -> Result<MmioRegion, GttError> {
        let fail = GttError::Mapping {
            phys: phys.as_u64(),
            size,
        };
        if *self.fail_map_at.lock().unwrap() == Some(phys.as_u64()) {
            return Err(fail);
        }
        let ptr = self.locate(phys.as_u64(), size).ok_or(fail)?;
        self.maps.lock().unwrap().push((phys.as_u64(), size, mode));
        // SAFETY: `ptr` addresses `size` bytes of live fake memory that
        // outlives every region handed out.
        Ok(unsafe { MmioRegion::new(phys, VirtAddr::from_ptr(ptr), size) })
    }

    fn unmap_mmio(&self, region: MmioRegion) {
        self.unmaps
            .lock()
            .unwrap()
            .push((region.phys_base().as_u64(), region.size()));
    }

    fn alloc_frames(&self, count: usize) -> Result<PhysAddr, GttError> {
        if let Some(budget) = self.alloc_budget.lock().unwrap().as_mut() {
            if *budget == 0 {
                return Err(GttError::ResourceExhausted);
            }
            *budget -= 1;
        }
        let mut next = self.next_frame.lock().unwrap();
        let phys = *next;
        *next += count as u64 * PAGE_SIZE;
        self.allocations.lock().unwrap().push((phys, count));
        Ok(PhysAddr::new(phys))
    }

    unsafe fn free_frames(&self, phys: PhysAddr, count: usize) {
        self.frees.lock().unwrap().push((phys.as_u64(), count));
    }
}

// ---------------------------------------------------------------------------
// Rig
// ---------------------------------------------------------------------------

/// A host bridge and graphics function with backing memory for one
/// chipset generation.
pub struct Rig {
    /// Host bridge configuration space.
    pub bridge: FakeConfigSpace,
    /// Graphics function configuration space.
    pub graphics: FakeConfigSpace,
    /// Kernel services with the register and table memory.
    pub services: FakeServices,
    /// Enumerated host bridge.
    pub bridge_info: PciDeviceInfo,
    /// Enumerated graphics function.
    pub graphics_info: PciDeviceInfo,
}

impl Rig {
    /// Physical base of the register BAR in every preset.
    pub const MMIO_BASE: u64 = 0xf000_0000;
    /// Physical base of the aperture in every preset.
    pub const APERTURE_BASE: u64 = 0xd000_0000;
    /// Bytes of fake memory at `MMIO_BASE`; covers registers and tables.
    const MEMORY_LEN: usize = 4 << 20;

    /// Creates a rig with zeroed configuration space and a 256M aperture BAR.
    pub fn new(bridge_id: u16, graphics_id: u16) -> Self {
        let mut graphics_bars = [PciBar::Unused; 6];
        graphics_bars[2] = PciBar::Memory {
            base: Self::APERTURE_BASE,
            size: 256 << 20,
            prefetchable: true,
        };
        Self {
            bridge: FakeConfigSpace::new(),
            graphics: FakeConfigSpace::new(),
            services: FakeServices::new().with_memory(Self::MMIO_BASE, Self::MEMORY_LEN),
            bridge_info: device_info(0, bridge_id, 0x06, [PciBar::Unused; 6]),
            graphics_info: device_info(2, graphics_id, 0x03, graphics_bars),
        }
    }

    /// The pair as handed to `IntelGtt::probe`.
    pub fn devices(&self) -> GmchDevices<'_> {
        GmchDevices {
            bridge: PciFunction {
                info: self.bridge_info,
                config: &self.bridge,
            },
            graphics: PciFunction {
                info: self.graphics_info,
                config: &self.graphics,
            },
        }
    }

    fn gen3_plus(bridge_id: u16, graphics_id: u16) -> Self {
        let rig = Self::new(bridge_id, graphics_id);
        rig.graphics.set_u32(I915_MMADDR, Self::MMIO_BASE as u32 | 0x4);
        rig.graphics.set_u32(I915_GMADDR, Self::APERTURE_BASE as u32 | 0x8);
        rig
    }

    /// i810: 32M window, table at +64K.
    pub fn i810() -> Self {
        let rig = Self::new(0x7120, 0x7121);
        rig.graphics.set_u32(I810_MMADDR, Self::MMIO_BASE as u32);
        rig.graphics.set_u32(I810_GMADDR, Self::APERTURE_BASE as u32 | 0x8);
        rig.bridge.set_u32(I810_SMRAM_MISCC, I810_GFX_MEM_WIN_SIZE);
        rig
    }

    /// 830M: 64M window, 64M stolen in two channels of local RDRAM.
    pub fn i830() -> Self {
        let rig = Self::new(0x3575, 0x3577);
        rig.graphics.set_u32(I810_MMADDR, Self::MMIO_BASE as u32);
        rig.graphics.set_u32(I810_GMADDR, Self::APERTURE_BASE as u32 | 0x8);
        rig.bridge.set_u16(I830_GMCH_CTRL, 0x0011);
        rig.services.poke_u8(Self::MMIO_BASE + 0x3010, 0x20 | (2 << 3));
        rig
    }

    /// 915G: table BAR at +512K, 16M stolen.
    pub fn i915() -> Self {
        let rig = Self::gen3_plus(0x2580, 0x2582);
        rig.graphics
            .set_u32(I915_PTEADDR, (Self::MMIO_BASE + 0x8_0000) as u32);
        rig.bridge.set_u16(I830_GMCH_CTRL, 0x0040);
        rig
    }

    /// 965GM: 512K table, 8M stolen.
    pub fn i965() -> Self {
        let rig = Self::gen3_plus(0x2a00, 0x2a02);
        rig.bridge.set_u16(I830_GMCH_CTRL, 0x0030);
        rig
    }

    /// Q45: bridge forces a 1.5M table, 32M stolen.
    pub fn g4x() -> Self {
        let rig = Self::gen3_plus(0x2e10, 0x2e12);
        rig.bridge.set_u16(I830_GMCH_CTRL, 0x0a50);
        rig
    }

    /// Sandybridge desktop: 2M table, 256M stolen.
    pub fn sandybridge() -> Self {
        let rig = Self::gen3_plus(0x0100, 0x0102);
        rig.graphics.set_u16(SNB_GMCH_CTRL, (2 << 8) | (8 << 3));
        rig
    }
}

fn device_info(device: u8, device_id: u16, class: u8, bars: [PciBar; 6]) -> PciDeviceInfo {
    PciDeviceInfo {
        address: PciAddress {
            bus: 0,
            device,
            function: 0,
        },
        vendor_id: 0x8086,
        device_id,
        revision: 0,
        class,
        subclass: 0,
        bars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stuck_bits_survive_writes() {
        let cfg = FakeConfigSpace::new();
        cfg.set_u16(0x52, 0x0011);
        cfg.stick_bits(0x52, 0x4);
        cfg.write_u16(0x52, 0x0015).unwrap();
        assert_eq!(cfg.read_u16(0x52), Ok(0x0011));
    }

    #[test]
    fn failing_offsets_fail_overlapping_accesses() {
        let cfg = FakeConfigSpace::new();
        cfg.fail_at(0x52);
        assert_eq!(cfg.read_u32(0x50), Err(GttError::RegisterAccess { offset: 0x50 }));
        assert!(cfg.read_u16(0x54).is_ok());
        assert!(cfg.read_u32(0xfe).is_err());
    }

    #[test]
    fn mappings_alias_fake_memory() {
        let services = FakeServices::new().with_memory(0x1000_0000, 0x2000);
        let region = services
            .map_mmio(PhysAddr::new(0x1000_1000), 0x1000, CacheMode::Uncached)
            .unwrap();
        region.write_u32(0x10, 0xcafe).unwrap();
        assert_eq!(services.peek_u32(0x1000_1010), 0xcafe);
        services.unmap_mmio(region);
        services.assert_balanced();
        assert!(
            services
                .map_mmio(PhysAddr::new(0x1000_1000), 0x2000, CacheMode::Uncached)
                .is_err()
        );
    }
}
