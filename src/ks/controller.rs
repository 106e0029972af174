// Licensed under the Apache-2.0 license

//! Key Store command sequencer.
//!
//! Every operation follows the protocol the KS controller requires:
//!
//! 1. fail with [`KsError::Busy`] if a command is still in flight,
//! 2. program `METADATA` with the destination and slot,
//! 3. clear the latched `IF`/`EIF` flags,
//! 4. write the opcode with `START` (keeping the `SILENT`/`SCMB` mode bits),
//! 5. poll `BUSY` within the configured budget ([`KsError::Timeout`]),
//! 6. report a latched `EIF` as [`KsError::Fail`].
//!
//! Key data moves through the 8-word `KEY` window; longer keys are split into
//! [`frames`] with `CONT` set on every frame after the first.

use embedded_hal::delay::DelayNs;

use crate::common::{Logger, NoOpLogger};

use super::config::KsConfig;
use super::frame::frames;
use super::poll::{poll, NoDelay};
use super::regs::{
    to_key_index, to_meta_key, Command, KsRegisters, KS_CTL_INIT_MSK, KS_CTL_SCMB_MSK,
    KS_CTL_SILENT_MSK, KS_CTL_START_MSK, KS_METADATA_DST_POS, KS_REMAIN_FRMNG_MSK,
    KS_REMAIN_FRMNG_POS, KS_REMAIN_RRMNG_MSK, KS_REMAIN_RRMNG_POS, KS_REMKCNT_FRMKCNT_MSK,
    KS_REMKCNT_FRMKCNT_POS, KS_REMKCNT_RRMKCNT_MSK, KS_REMKCNT_RRMKCNT_POS, KS_STS_BUSY_MSK,
    KS_STS_EIF_MSK, KS_STS_IF_MSK, KS_STS_INITDONE_MSK, KS_STS_RAMINV_MSK,
};
use super::types::{
    otp_word_count_for_code, word_count_for_code, KeySize, KsError, KsStatus, MemType, Metadata,
    KS_MAX_KEY_INDEX, KS_MAX_KEY_WORDS, KS_OTP_KEY_COUNT, KS_OTP_MAX_KEY_WORDS,
};

const MODE_MSK: u32 = KS_CTL_SILENT_MSK | KS_CTL_SCMB_MSK;

/// Owner of the Key Store controller.
///
/// There is one KS per chip; construct a single `KeyStore` at startup and
/// pass it by reference. Operations take `&mut self`, so callers sharing it
/// across execution contexts must serialize access themselves.
pub struct KeyStore<R: KsRegisters, D: DelayNs = NoDelay, L: Logger = NoOpLogger> {
    regs: R,
    delay: D,
    logger: L,
    config: KsConfig,
}

impl<R: KsRegisters> KeyStore<R> {
    pub fn new(regs: R, config: KsConfig) -> Self {
        Self::with_parts(regs, NoDelay, NoOpLogger, config)
    }
}

impl<R: KsRegisters, D: DelayNs, L: Logger> KeyStore<R, D, L> {
    pub fn with_parts(regs: R, delay: D, logger: L, config: KsConfig) -> Self {
        Self {
            regs,
            delay,
            logger,
            config,
        }
    }

    /// Releases the register backend.
    pub fn free(self) -> R {
        self.regs
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    pub fn config(&self) -> &KsConfig {
        &self.config
    }

    pub fn logger_mut(&mut self) -> &mut L {
        &mut self.logger
    }

    pub fn status(&self) -> KsStatus {
        KsStatus::from_bits(self.regs.status())
    }

    pub fn is_busy(&self) -> bool {
        self.regs.status() & KS_STS_BUSY_MSK != 0
    }

    pub fn is_initialized(&self) -> bool {
        self.regs.status() & KS_STS_INITDONE_MSK != 0
    }

    /// Raw `OTPSTS` register.
    pub fn otp_status(&self) -> u32 {
        self.regs.otp_status()
    }

    /// Switches silent access mode for subsequent commands.
    ///
    /// # Errors
    ///
    /// [`KsError::Busy`] while a command is in flight; the mode is unchanged.
    pub fn set_silent(&mut self, enabled: bool) -> Result<(), KsError> {
        self.update_mode(KS_CTL_SILENT_MSK, enabled)?;
        self.config.silent = enabled;
        Ok(())
    }

    /// Switches key scrambling for subsequent commands.
    ///
    /// # Errors
    ///
    /// [`KsError::Busy`] while a command is in flight; the mode is unchanged.
    pub fn set_scramble(&mut self, enabled: bool) -> Result<(), KsError> {
        self.update_mode(KS_CTL_SCMB_MSK, enabled)?;
        self.config.scramble = enabled;
        Ok(())
    }

    fn update_mode(&mut self, mask: u32, enabled: bool) -> Result<(), KsError> {
        self.ensure_idle()?;
        // CTL is rewritten without START; the controller ignores it until strobed.
        let ctl = self.regs.ctl() & MODE_MSK;
        let ctl = if enabled { ctl | mask } else { ctl & !mask };
        self.regs.write_ctl(ctl);
        Ok(())
    }

    /// Brings the controller up. Safe to call when it is already initialized.
    ///
    /// # Errors
    ///
    /// [`KsError::Timeout`] if the controller stays busy or never reports
    /// initialization done.
    pub fn initialize(&mut self) -> Result<(), KsError> {
        if !self.is_initialized() {
            self.wait_idle()?;
            self.regs
                .write_ctl(KS_CTL_INIT_MSK | KS_CTL_START_MSK | self.config.mode_bits());
            let budget = self.config.poll_budget();
            let regs = &self.regs;
            poll::<_, KsError, _, _>(&mut self.delay, budget, || {
                if regs.status() & KS_STS_INITDONE_MSK != 0 {
                    Ok(())
                } else {
                    Err(nb::Error::WouldBlock)
                }
            })
            .inspect_err(|err| self.logger.error(format_args!("ks: init failed: {err}")))?;
        }
        self.wait_idle()?;
        let mode = self.config.mode_bits();
        if self.regs.ctl() & MODE_MSK != mode {
            self.regs.write_ctl(mode);
        }
        self.logger.debug(format_args!("ks: ready"));
        Ok(())
    }

    /// Reads the key in slot `index` of `mem` into `key`.
    ///
    /// `key.len()` is the number of words transferred and must not exceed the
    /// stored key.
    ///
    /// # Errors
    ///
    /// [`KsError::InvalidParameter`] for an out-of-range index or an empty or
    /// oversized buffer, otherwise the protocol errors. On failure `key` may be
    /// partially written.
    pub fn read(&mut self, mem: MemType, index: u32, key: &mut [u32]) -> Result<(), KsError> {
        check_index(mem, index)?;
        if key.is_empty() || key.len() > KS_MAX_KEY_WORDS {
            return Err(KsError::InvalidParameter);
        }
        self.ensure_idle()?;
        self.regs.write_metadata(dst_bits(mem) | to_meta_key(index));

        for frame in frames(key.len()) {
            self.strobe(Command::Read, frame.ctl_bits());
            self.complete()
                .inspect_err(|err| self.log_failure("read", *err))?;
            let chunk = key
                .get_mut(frame.offset..frame.offset + frame.len)
                .ok_or(KsError::InvalidParameter)?;
            for (i, word) in chunk.iter_mut().enumerate() {
                *word = self.regs.key_word(i);
            }
        }

        self.logger.debug(format_args!(
            "ks: read {:?}[{}] {} words",
            mem,
            index,
            key.len()
        ));
        Ok(())
    }

    /// Reads a key whose length is given by its size class.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read`].
    pub fn read_key(
        &mut self,
        mem: MemType,
        index: u32,
        size: KeySize,
    ) -> Result<heapless::Vec<u32, KS_MAX_KEY_WORDS>, KsError> {
        let words = usize::try_from(size.word_count()).map_err(|_| KsError::InvalidParameter)?;
        let mut key = heapless::Vec::new();
        key.resize(words, 0).map_err(|()| KsError::InvalidParameter)?;
        self.read(mem, index, &mut key)?;
        Ok(key)
    }

    /// Stores `key` in `mem` and returns the slot index assigned by the
    /// controller.
    ///
    /// The key length comes from the size class of `meta`; surplus words in
    /// `key` are ignored.
    ///
    /// # Errors
    ///
    /// [`KsError::InvalidParameter`] for a reserved size class, a key longer
    /// than 256 bits destined for OTP, or a `key` shorter than the size
    /// class; otherwise the protocol errors.
    pub fn write(&mut self, mem: MemType, meta: Metadata, key: &[u32]) -> Result<u32, KsError> {
        let words = key_words(word_count_for_code(meta.size_code()))?;
        if mem == MemType::Otp && words > KS_OTP_MAX_KEY_WORDS {
            return Err(KsError::InvalidParameter);
        }
        let key = key.get(..words).ok_or(KsError::InvalidParameter)?;
        self.ensure_idle()?;
        self.regs.write_metadata(dst_bits(mem) | meta.bits());

        for frame in frames(words) {
            let chunk = key
                .get(frame.offset..frame.offset + frame.len)
                .ok_or(KsError::InvalidParameter)?;
            for (i, &word) in chunk.iter().enumerate() {
                self.regs.write_key_word(i, word);
            }
            self.strobe(Command::Write, frame.ctl_bits());
            self.complete()
                .inspect_err(|err| self.log_failure("write", *err))?;
        }

        let index = to_key_index(self.regs.metadata());
        self.logger
            .debug(format_args!("ks: wrote {mem:?}[{index}] {words} words"));
        Ok(index)
    }

    /// Programs `key` into OTP slot `index`.
    ///
    /// Only size classes up to 256 bits are accepted.
    ///
    /// # Errors
    ///
    /// [`KsError::InvalidParameter`] for an index beyond the OTP slots, a size
    /// class above 256 bits or a short `key`; otherwise the protocol errors.
    pub fn write_otp(&mut self, index: u32, meta: Metadata, key: &[u32]) -> Result<u32, KsError> {
        check_index(MemType::Otp, index)?;
        let words = otp_word_count_for_code(meta.size_code())
            .ok_or(KsError::InvalidParameter)
            .and_then(key_words)?;
        let key = key.get(..words).ok_or(KsError::InvalidParameter)?;
        self.ensure_idle()?;
        self.regs
            .write_metadata(dst_bits(MemType::Otp) | meta.bits() | to_meta_key(index));

        for (i, &word) in key.iter().enumerate() {
            self.regs.write_key_word(i, word);
        }
        self.strobe(Command::Write, 0);
        self.complete()
            .inspect_err(|err| self.log_failure("otp write", *err))?;

        self.logger
            .debug(format_args!("ks: wrote Otp[{index}] {words} words"));
        Ok(index)
    }

    /// Erases SRAM slot `index`.
    ///
    /// # Errors
    ///
    /// [`KsError::InvalidParameter`] for an out-of-range index, otherwise the
    /// protocol errors.
    pub fn erase_key(&mut self, index: u32) -> Result<(), KsError> {
        check_index(MemType::Sram, index)?;
        self.command(
            "erase",
            dst_bits(MemType::Sram) | to_meta_key(index),
            Command::Erase,
        )
    }

    /// Erases OTP slot `index`.
    ///
    /// # Errors
    ///
    /// [`KsError::InvalidParameter`] for an index beyond the OTP slots,
    /// otherwise the protocol errors.
    pub fn erase_otp_key(&mut self, index: u32) -> Result<(), KsError> {
        check_index(MemType::Otp, index)?;
        self.command(
            "otp erase",
            dst_bits(MemType::Otp) | to_meta_key(index),
            Command::Erase,
        )
    }

    /// Erases every key in SRAM or Flash.
    ///
    /// # Errors
    ///
    /// [`KsError::InvalidParameter`] for OTP, otherwise the protocol errors.
    pub fn erase_all(&mut self, mem: MemType) -> Result<(), KsError> {
        if mem == MemType::Otp {
            return Err(KsError::InvalidParameter);
        }
        self.command("erase all", dst_bits(mem), Command::EraseAll)
    }

    /// Locks OTP slot `index` permanently.
    ///
    /// # Errors
    ///
    /// [`KsError::InvalidParameter`] for an index beyond the OTP slots,
    /// otherwise the protocol errors.
    pub fn lock_otp_key(&mut self, index: u32) -> Result<(), KsError> {
        check_index(MemType::Otp, index)?;
        self.command(
            "otp lock",
            dst_bits(MemType::Otp) | to_meta_key(index),
            Command::Lock,
        )
    }

    /// Revokes slot `index` of `mem`.
    ///
    /// # Errors
    ///
    /// [`KsError::InvalidParameter`] for an out-of-range index, otherwise the
    /// protocol errors.
    pub fn revoke_key(&mut self, mem: MemType, index: u32) -> Result<(), KsError> {
        check_index(mem, index)?;
        self.command("revoke", dst_bits(mem) | to_meta_key(index), Command::Revoke)
    }

    /// Runs the anti-remanence procedure on key SRAM.
    ///
    /// Returns whether SRAM content is stored inverted afterwards. Keys read
    /// back unchanged either way.
    ///
    /// # Errors
    ///
    /// The protocol errors.
    pub fn toggle_sram(&mut self) -> Result<bool, KsError> {
        self.command("toggle sram", dst_bits(MemType::Sram), Command::Remanence)?;
        Ok(self.regs.status() & KS_STS_RAMINV_MSK != 0)
    }

    /// Remaining capacity of SRAM or Flash key memory, in bytes.
    ///
    /// # Errors
    ///
    /// [`KsError::InvalidParameter`] for OTP.
    pub fn remaining_size(&self, mem: MemType) -> Result<u32, KsError> {
        match mem {
            MemType::Sram => Ok((self.regs.remain() & KS_REMAIN_RRMNG_MSK) >> KS_REMAIN_RRMNG_POS),
            MemType::Flash => Ok((self.regs.remain() & KS_REMAIN_FRMNG_MSK) >> KS_REMAIN_FRMNG_POS),
            MemType::Otp => Err(KsError::InvalidParameter),
        }
    }

    /// Number of further keys SRAM or Flash key memory can hold.
    ///
    /// # Errors
    ///
    /// [`KsError::InvalidParameter`] for OTP.
    pub fn remaining_key_count(&self, mem: MemType) -> Result<u32, KsError> {
        match mem {
            MemType::Sram => Ok((self.regs.remaining_key_count() & KS_REMKCNT_RRMKCNT_MSK)
                >> KS_REMKCNT_RRMKCNT_POS),
            MemType::Flash => Ok((self.regs.remaining_key_count() & KS_REMKCNT_FRMKCNT_MSK)
                >> KS_REMKCNT_FRMKCNT_POS),
            MemType::Otp => Err(KsError::InvalidParameter),
        }
    }

    fn command(&mut self, name: &str, metadata: u32, command: Command) -> Result<(), KsError> {
        self.ensure_idle()?;
        self.regs.write_metadata(metadata);
        self.strobe(command, 0);
        self.complete()
            .inspect_err(|err| self.log_failure(name, *err))?;
        self.logger.debug(format_args!("ks: {name} done"));
        Ok(())
    }

    fn ensure_idle(&mut self) -> Result<(), KsError> {
        if self.is_busy() {
            self.logger.error(format_args!("ks: controller busy"));
            return Err(KsError::Busy);
        }
        Ok(())
    }

    fn strobe(&mut self, command: Command, cont: u32) {
        self.regs.clear_status(KS_STS_EIF_MSK | KS_STS_IF_MSK);
        let mode = self.regs.ctl() & MODE_MSK;
        self.regs
            .write_ctl(cont | command.ctl_bits() | KS_CTL_START_MSK | mode);
    }

    fn wait_idle(&mut self) -> Result<(), KsError> {
        let budget = self.config.poll_budget();
        let regs = &self.regs;
        poll(&mut self.delay, budget, || {
            if regs.status() & KS_STS_BUSY_MSK != 0 {
                Err(nb::Error::WouldBlock)
            } else {
                Ok(())
            }
        })
    }

    fn complete(&mut self) -> Result<(), KsError> {
        self.wait_idle()?;
        if self.regs.status() & KS_STS_EIF_MSK != 0 {
            return Err(KsError::Fail);
        }
        Ok(())
    }

    fn log_failure(&mut self, name: &str, err: KsError) {
        self.logger.error(format_args!("ks: {name} failed: {err}"));
    }
}

fn dst_bits(mem: MemType) -> u32 {
    mem.bits() << KS_METADATA_DST_POS
}

fn check_index(mem: MemType, index: u32) -> Result<(), KsError> {
    let limit = match mem {
        MemType::Otp => KS_OTP_KEY_COUNT - 1,
        MemType::Sram | MemType::Flash => KS_MAX_KEY_INDEX,
    };
    if index > limit {
        return Err(KsError::InvalidParameter);
    }
    Ok(())
}

fn key_words(count: u32) -> Result<usize, KsError> {
    match usize::try_from(count) {
        Ok(0) | Err(_) => Err(KsError::InvalidParameter),
        Ok(words) => Ok(words),
    }
}
