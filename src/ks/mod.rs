// Licensed under the Apache-2.0 license

//! Key Store (KS) driver for the M55M1.
//!
//! The Key Store keeps key material in hardware-custodied SRAM, Flash or OTP
//! memory. This module only moves, erases, locks and revokes key blobs; it
//! performs no cryptography.
//!
//! ```rust,no_run
//! use m55m1_ddk::ks::{KeyOwner, KeySize, KeyStore, KsConfigBuilder, MemType, Metadata, MmioKs};
//!
//! # fn example(base: *mut m55m1_ddk::ks::RegisterBlock) -> Result<(), m55m1_ddk::ks::KsError> {
//! let regs = unsafe { MmioKs::new(base) }.ok_or(m55m1_ddk::ks::KsError::InvalidParameter)?;
//! let mut ks = KeyStore::new(regs, KsConfigBuilder::new().build());
//! ks.initialize()?;
//!
//! let meta = Metadata::new(KeyOwner::Aes, KeySize::Bits256).readable();
//! let index = ks.write(MemType::Sram, meta, &[0u32; 8])?;
//!
//! let mut key = [0u32; 8];
//! ks.read(MemType::Sram, index, &mut key)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod frame;
pub mod poll;
pub mod regs;
pub mod types;

pub use config::{KsConfig, KsConfigBuilder};
pub use controller::KeyStore;
pub use frame::{frames, Frame};
pub use poll::{NoDelay, PollBudget, Timeout};
pub use regs::{KsRegisters, MmioKs, RegisterBlock};
pub use types::{
    get_key_word_count, word_count_for_code, KeyOwner, KeySize, KsError, KsStatus, MemType, Metadata,
    KS_MAX_KEY_WORDS,
};

#[cfg(target_arch = "arm")]
pub use poll::SpinDelay;
