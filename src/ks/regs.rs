// Licensed under the Apache-2.0 license

//! Key Store register layout and hardware access.
//!
//! The field layout of the M55M1 KS registers is declared once with
//! `register_bitfields!`; the raw masks the sequencer works with are derived
//! from it. The sequencer only talks to the hardware through [`KsRegisters`],
//! which lets the same command logic drive the real peripheral ([`MmioKs`])
//! or a host-side model.

use core::ptr::NonNull;

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

/// Number of words in the `KEY` data window.
pub const KS_KEY_WINDOW_WORDS: usize = 8;

register_bitfields![
    u32,

    /// Control register
    pub CTL [
        START OFFSET(0) NUMBITS(1) [],
        OPMODE OFFSET(1) NUMBITS(3) [],
        CONT OFFSET(7) NUMBITS(1) [],
        INIT OFFSET(8) NUMBITS(1) [],
        SILENT OFFSET(10) NUMBITS(1) [],
        SCMB OFFSET(11) NUMBITS(1) [],
    ],

    /// Key metadata register
    pub METADATA [
        SEC OFFSET(0) NUMBITS(1) [],
        PRIV OFFSET(1) NUMBITS(1) [],
        READABLE OFFSET(2) NUMBITS(1) [],
        RVK OFFSET(3) NUMBITS(1) [],
        BS OFFSET(4) NUMBITS(1) [],
        SIZE OFFSET(8) NUMBITS(5) [],
        OWNER OFFSET(16) NUMBITS(3) [],
        NUMBER OFFSET(20) NUMBITS(6) [],
        DST OFFSET(30) NUMBITS(2) [],
    ],

    /// Status register; `IF` and `EIF` are write-1-to-clear
    pub STS [
        IF OFFSET(0) NUMBITS(1) [],
        EIF OFFSET(1) NUMBITS(1) [],
        BUSY OFFSET(2) NUMBITS(1) [],
        SRAMFULL OFFSET(3) NUMBITS(1) [],
        FLASHFULL OFFSET(4) NUMBITS(1) [],
        INITDONE OFFSET(7) NUMBITS(1) [],
        RAMINV OFFSET(8) NUMBITS(1) [],
        KRVKF OFFSET(9) NUMBITS(1) [],
    ],

    /// Remaining key memory, in bytes
    pub REMAIN [
        RRMNG OFFSET(0) NUMBITS(13) [],
        FRMNG OFFSET(16) NUMBITS(12) [],
    ],

    /// Remaining key slots
    pub REMKCNT [
        RRMKCNT OFFSET(0) NUMBITS(6) [],
        FRMKCNT OFFSET(16) NUMBITS(6) [],
    ],
];

register_structs! {
    /// Memory-mapped layout of the KS peripheral.
    pub RegisterBlock {
        (0x00 => ctl: ReadWrite<u32, CTL::Register>),
        (0x04 => metadata: ReadWrite<u32, METADATA::Register>),
        (0x08 => sts: ReadWrite<u32, STS::Register>),
        (0x0c => remain: ReadOnly<u32, REMAIN::Register>),
        (0x10 => _reserved0),
        (0x20 => key: [ReadWrite<u32>; KS_KEY_WINDOW_WORDS]),
        (0x40 => otpsts: ReadOnly<u32>),
        (0x44 => remkcnt: ReadOnly<u32, REMKCNT::Register>),
        (0x48 => @END),
    }
}

pub const KS_CTL_START_MSK: u32 = CTL::START.mask << CTL::START.shift;
pub const KS_CTL_OPMODE_POS: u32 = CTL::OPMODE.shift as u32;
pub const KS_CTL_OPMODE_MSK: u32 = CTL::OPMODE.mask << CTL::OPMODE.shift;
pub const KS_CTL_CONT_MSK: u32 = CTL::CONT.mask << CTL::CONT.shift;
pub const KS_CTL_INIT_MSK: u32 = CTL::INIT.mask << CTL::INIT.shift;
pub const KS_CTL_SILENT_MSK: u32 = CTL::SILENT.mask << CTL::SILENT.shift;
pub const KS_CTL_SCMB_MSK: u32 = CTL::SCMB.mask << CTL::SCMB.shift;

pub const KS_METADATA_SEC_MSK: u32 = METADATA::SEC.mask << METADATA::SEC.shift;
pub const KS_METADATA_PRIV_MSK: u32 = METADATA::PRIV.mask << METADATA::PRIV.shift;
pub const KS_METADATA_READABLE_MSK: u32 = METADATA::READABLE.mask << METADATA::READABLE.shift;
pub const KS_METADATA_BS_MSK: u32 = METADATA::BS.mask << METADATA::BS.shift;
pub const KS_METADATA_SIZE_POS: u32 = METADATA::SIZE.shift as u32;
pub const KS_METADATA_SIZE_MSK: u32 = METADATA::SIZE.mask << METADATA::SIZE.shift;
pub const KS_METADATA_OWNER_POS: u32 = METADATA::OWNER.shift as u32;
pub const KS_METADATA_OWNER_MSK: u32 = METADATA::OWNER.mask << METADATA::OWNER.shift;
pub const KS_METADATA_NUMBER_POS: u32 = METADATA::NUMBER.shift as u32;
pub const KS_METADATA_NUMBER_MSK: u32 = METADATA::NUMBER.mask << METADATA::NUMBER.shift;
pub const KS_METADATA_DST_POS: u32 = METADATA::DST.shift as u32;
pub const KS_METADATA_DST_MSK: u32 = METADATA::DST.mask << METADATA::DST.shift;

pub const KS_STS_IF_MSK: u32 = STS::IF.mask << STS::IF.shift;
pub const KS_STS_EIF_MSK: u32 = STS::EIF.mask << STS::EIF.shift;
pub const KS_STS_BUSY_MSK: u32 = STS::BUSY.mask << STS::BUSY.shift;
pub const KS_STS_SRAMFULL_MSK: u32 = STS::SRAMFULL.mask << STS::SRAMFULL.shift;
pub const KS_STS_FLASHFULL_MSK: u32 = STS::FLASHFULL.mask << STS::FLASHFULL.shift;
pub const KS_STS_INITDONE_MSK: u32 = STS::INITDONE.mask << STS::INITDONE.shift;
pub const KS_STS_RAMINV_MSK: u32 = STS::RAMINV.mask << STS::RAMINV.shift;
pub const KS_STS_KRVKF_MSK: u32 = STS::KRVKF.mask << STS::KRVKF.shift;

pub const KS_REMAIN_RRMNG_POS: u32 = REMAIN::RRMNG.shift as u32;
pub const KS_REMAIN_RRMNG_MSK: u32 = REMAIN::RRMNG.mask << REMAIN::RRMNG.shift;
pub const KS_REMAIN_FRMNG_POS: u32 = REMAIN::FRMNG.shift as u32;
pub const KS_REMAIN_FRMNG_MSK: u32 = REMAIN::FRMNG.mask << REMAIN::FRMNG.shift;

pub const KS_REMKCNT_RRMKCNT_POS: u32 = REMKCNT::RRMKCNT.shift as u32;
pub const KS_REMKCNT_RRMKCNT_MSK: u32 = REMKCNT::RRMKCNT.mask << REMKCNT::RRMKCNT.shift;
pub const KS_REMKCNT_FRMKCNT_POS: u32 = REMKCNT::FRMKCNT.shift as u32;
pub const KS_REMKCNT_FRMKCNT_MSK: u32 = REMKCNT::FRMKCNT.mask << REMKCNT::FRMKCNT.shift;

/// Places a slot index into the `METADATA.NUMBER` field.
#[must_use]
pub const fn to_meta_key(index: u32) -> u32 {
    (index << KS_METADATA_NUMBER_POS) & KS_METADATA_NUMBER_MSK
}

/// Extracts the slot index echoed in `METADATA.NUMBER`.
#[must_use]
pub const fn to_key_index(metadata: u32) -> u32 {
    (metadata & KS_METADATA_NUMBER_MSK) >> KS_METADATA_NUMBER_POS
}

/// Command opcodes for `CTL.OPMODE`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Command {
    Read = 0,
    Write = 1,
    Erase = 2,
    EraseAll = 3,
    Revoke = 4,
    Remanence = 5,
    Lock = 7,
}

impl Command {
    #[must_use]
    pub const fn ctl_bits(self) -> u32 {
        ((self as u32) << KS_CTL_OPMODE_POS) & KS_CTL_OPMODE_MSK
    }
}

/// Register-level access to a Key Store controller.
///
/// Reads take `&self` and writes take `&mut self`; an implementation backed
/// by MMIO must perform every access as a single volatile 32-bit transfer.
pub trait KsRegisters {
    fn ctl(&self) -> u32;
    fn write_ctl(&mut self, value: u32);

    fn metadata(&self) -> u32;
    fn write_metadata(&mut self, value: u32);

    fn status(&self) -> u32;
    /// Write-1-to-clear of the latched `STS` flags in `mask`.
    fn clear_status(&mut self, mask: u32);

    /// Reads word `index` of the key window. `index` is below
    /// [`KS_KEY_WINDOW_WORDS`].
    fn key_word(&self, index: usize) -> u32;
    fn write_key_word(&mut self, index: usize, value: u32);

    fn remain(&self) -> u32;
    fn remaining_key_count(&self) -> u32;
    fn otp_status(&self) -> u32;
}

/// Volatile MMIO backend for the KS register block.
pub struct MmioKs {
    regs: NonNull<RegisterBlock>,
}

impl MmioKs {
    /// Creates the backend for the register block at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the address of the KS register block with its clock
    /// enabled, and only one `MmioKs` may exist for it at a time.
    #[must_use]
    pub unsafe fn new(base: *mut RegisterBlock) -> Option<Self> {
        NonNull::new(base).map(|regs| Self { regs })
    }

    fn block(&self) -> &RegisterBlock {
        // SAFETY: `new` requires regs to point at the live register block
        unsafe { self.regs.as_ref() }
    }
}

// SAFETY: the backend is the single owner of the register block
unsafe impl Send for MmioKs {}

impl KsRegisters for MmioKs {
    fn ctl(&self) -> u32 {
        self.block().ctl.get()
    }

    fn write_ctl(&mut self, value: u32) {
        self.block().ctl.set(value);
    }

    fn metadata(&self) -> u32 {
        self.block().metadata.get()
    }

    fn write_metadata(&mut self, value: u32) {
        self.block().metadata.set(value);
    }

    fn status(&self) -> u32 {
        self.block().sts.get()
    }

    fn clear_status(&mut self, mask: u32) {
        self.block().sts.set(mask);
    }

    fn key_word(&self, index: usize) -> u32 {
        self.block().key.get(index).map_or(0, |reg| reg.get())
    }

    fn write_key_word(&mut self, index: usize, value: u32) {
        if let Some(reg) = self.block().key.get(index) {
            reg.set(value);
        }
    }

    fn remain(&self) -> u32 {
        self.block().remain.get()
    }

    fn remaining_key_count(&self) -> u32 {
        self.block().remkcnt.get()
    }

    fn otp_status(&self) -> u32 {
        self.block().otpsts.get()
    }
}
