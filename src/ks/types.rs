// Licensed under the Apache-2.0 license

//! Key Store data model: memory types, key sizes, metadata and errors.

use core::fmt;

use super::poll::Timeout;

use super::regs::{
    KS_METADATA_BS_MSK, KS_METADATA_DST_MSK, KS_METADATA_NUMBER_MSK, KS_METADATA_OWNER_MSK,
    KS_METADATA_OWNER_POS, KS_METADATA_PRIV_MSK, KS_METADATA_READABLE_MSK, KS_METADATA_SEC_MSK,
    KS_METADATA_SIZE_MSK, KS_METADATA_SIZE_POS, KS_STS_BUSY_MSK, KS_STS_EIF_MSK,
    KS_STS_FLASHFULL_MSK, KS_STS_INITDONE_MSK, KS_STS_KRVKF_MSK, KS_STS_RAMINV_MSK,
    KS_STS_SRAMFULL_MSK,
};

/// Largest key the store can hold, in 32-bit words (4096 bits).
pub const KS_MAX_KEY_WORDS: usize = 128;

/// Largest key accepted by OTP memory, in 32-bit words (256 bits).
pub const KS_OTP_MAX_KEY_WORDS: usize = 8;

/// Number of OTP key slots.
pub const KS_OTP_KEY_COUNT: u32 = 8;

/// Highest slot index representable in `METADATA.NUMBER`.
pub const KS_MAX_KEY_INDEX: u32 = 63;

const KEY_WORD_COUNT: [u8; 21] = [
    4, 6, 6, 7, 8, 8, 8, 9, 12, 13, 16, 17, 18, 0, 0, 0, 32, 48, 64, 96, 128,
];

const OTP_KEY_WORD_COUNT: [u8; 7] = [4, 6, 6, 7, 8, 8, 8];

/// Word count of the key size encoded in the `SIZE` field of `metadata`.
///
/// Reserved size codes yield 0.
#[must_use]
pub fn get_key_word_count(metadata: u32) -> u32 {
    let code = (metadata & KS_METADATA_SIZE_MSK) >> KS_METADATA_SIZE_POS;
    word_count_for_code(code)
}

/// Word count of size-class `code`; reserved and out-of-range codes yield 0.
#[must_use]
pub fn word_count_for_code(code: u32) -> u32 {
    usize::try_from(code)
        .ok()
        .and_then(|code| KEY_WORD_COUNT.get(code))
        .map_or(0, |&words| u32::from(words))
}

pub(crate) fn otp_word_count_for_code(code: u32) -> Option<u32> {
    usize::try_from(code)
        .ok()
        .and_then(|code| OTP_KEY_WORD_COUNT.get(code))
        .map(|&words| u32::from(words))
}

/// Backing memory of a key slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum MemType {
    /// Volatile key SRAM.
    Sram = 0,
    /// Re-writable key flash.
    Flash = 1,
    /// One-time-programmable key memory.
    Otp = 2,
}

impl MemType {
    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for MemType {
    type Error = KsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Sram),
            1 => Ok(Self::Flash),
            2 => Ok(Self::Otp),
            _ => Err(KsError::InvalidParameter),
        }
    }
}

/// Key length classes of the `SIZE` field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum KeySize {
    Bits128 = 0,
    Bits163 = 1,
    Bits192 = 2,
    Bits224 = 3,
    Bits233 = 4,
    Bits255 = 5,
    Bits256 = 6,
    Bits283 = 7,
    Bits384 = 8,
    Bits409 = 9,
    Bits512 = 10,
    Bits521 = 11,
    Bits571 = 12,
    Bits1024 = 16,
    Bits1536 = 17,
    Bits2048 = 18,
    Bits3072 = 19,
    Bits4096 = 20,
}

impl KeySize {
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Number of 32-bit words a key of this class occupies.
    #[must_use]
    pub fn word_count(self) -> u32 {
        word_count_for_code(self.code())
    }
}

/// Engine allowed to consume the key (`OWNER` field).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum KeyOwner {
    Aes = 0,
    Hmac = 1,
    RsaExp = 2,
    RsaMid = 3,
    Ecc = 4,
    Cpu = 5,
}

/// Key metadata word as programmed into `METADATA`.
///
/// The destination and slot number fields are supplied by the sequencer and
/// are never carried by a `Metadata` value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Metadata(u32);

impl Metadata {
    #[must_use]
    pub const fn new(owner: KeyOwner, size: KeySize) -> Self {
        Self(
            (((owner as u32) << KS_METADATA_OWNER_POS) & KS_METADATA_OWNER_MSK)
                | ((size.code() << KS_METADATA_SIZE_POS) & KS_METADATA_SIZE_MSK),
        )
    }

    /// Wraps a raw metadata word, dropping the `DST` and `NUMBER` fields.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & !(KS_METADATA_DST_MSK | KS_METADATA_NUMBER_MSK))
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn size_code(self) -> u32 {
        (self.0 & KS_METADATA_SIZE_MSK) >> KS_METADATA_SIZE_POS
    }

    /// Key may be read back by the CPU.
    #[must_use]
    pub const fn readable(self) -> Self {
        Self(self.0 | KS_METADATA_READABLE_MSK)
    }

    /// Key is usable by privileged code only.
    #[must_use]
    pub const fn privileged(self) -> Self {
        Self(self.0 | KS_METADATA_PRIV_MSK)
    }

    /// Key is usable by the secure world only.
    #[must_use]
    pub const fn secure(self) -> Self {
        Self(self.0 | KS_METADATA_SEC_MSK)
    }

    /// Key is reserved for secure boot.
    #[must_use]
    pub const fn boot(self) -> Self {
        Self(self.0 | KS_METADATA_BS_MSK)
    }
}

/// Snapshot of the `STS` register.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct KsStatus {
    pub busy: bool,
    pub error: bool,
    pub init_done: bool,
    pub sram_full: bool,
    pub flash_full: bool,
    pub sram_inverted: bool,
    pub key_revoked: bool,
}

impl KsStatus {
    #[must_use]
    pub const fn from_bits(sts: u32) -> Self {
        Self {
            busy: sts & KS_STS_BUSY_MSK != 0,
            error: sts & KS_STS_EIF_MSK != 0,
            init_done: sts & KS_STS_INITDONE_MSK != 0,
            sram_full: sts & KS_STS_SRAMFULL_MSK != 0,
            flash_full: sts & KS_STS_FLASHFULL_MSK != 0,
            sram_inverted: sts & KS_STS_RAMINV_MSK != 0,
            key_revoked: sts & KS_STS_KRVKF_MSK != 0,
        }
    }
}

/// Errors reported by Key Store operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KsError {
    /// The controller was busy when the operation was requested.
    Busy,
    /// The controller did not finish within the polling budget.
    Timeout,
    /// The controller completed and latched its error flag.
    Fail,
    /// Memory type, slot index, size class or buffer length rejected.
    InvalidParameter,
}

impl fmt::Display for KsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Busy => "key store busy",
            Self::Timeout => "key store timed out",
            Self::Fail => "key store reported an error",
            Self::InvalidParameter => "invalid key store parameter",
        };
        f.write_str(text)
    }
}

impl From<Timeout> for KsError {
    fn from(_: Timeout) -> Self {
        KsError::Timeout
    }
}
