// Licensed under the Apache-2.0 license

use crate::common::Logger;
use crate::ks::{KeyOwner, KeySize, KeyStore, KsError, KsRegisters, MemType, Metadata};
use embedded_hal::delay::DelayNs;
use embedded_io::Write;

const AES256_KEY: [u32; 8] = [
    0x603d_eb10, 0x15ca_71be, 0x2b73_aef0, 0x857d_7781, 0x1f35_2c07, 0x3b61_08d7, 0x2d98_10a3,
    0x0914_dff4,
];

#[derive(Debug)]
enum Failure {
    Ks(KsError),
    Mismatch,
}

impl From<KsError> for Failure {
    fn from(err: KsError) -> Self {
        Failure::Ks(err)
    }
}

type TestResult = Result<(), Failure>;

/// Runs the Key Store functional tests and returns the number of failures.
///
/// Only SRAM is exercised unless the `test-ks-flash` feature is enabled. OTP
/// is never touched since its effects cannot be undone.
pub fn run_ks_tests<R, D, L, W>(ks: &mut KeyStore<R, D, L>, uart: &mut W) -> usize
where
    R: KsRegisters,
    D: DelayNs,
    L: Logger,
    W: Write,
{
    let _ = writeln!(uart, "\r\n=== Key Store Tests ===\r");

    let mut failures = 0;
    failures += report(uart, "initialize", test_initialize(ks));
    failures += report(uart, "SRAM write/read", test_sram_round_trip(ks));
    failures += report(uart, "SRAM multi-frame key", test_sram_multi_frame(ks));
    failures += report(uart, "SRAM anti-remanence", test_toggle_sram(ks));
    failures += report(uart, "SRAM erase", test_sram_erase(ks));
    failures += report(uart, "OTP size limit", test_otp_size_limit(ks));
    #[cfg(feature = "test-ks-flash")]
    {
        failures += report(uart, "Flash write/read", test_flash_round_trip(ks));
    }

    if failures == 0 {
        let _ = writeln!(uart, "\r\n=== All Key Store Tests Passed ===\r");
    } else {
        let _ = writeln!(uart, "\r\n=== {failures} Key Store Test(s) Failed ===\r");
    }
    failures
}

fn report<W: Write>(uart: &mut W, name: &str, result: TestResult) -> usize {
    match result {
        Ok(()) => {
            let _ = writeln!(uart, "{name}... PASSED\r");
            0
        }
        Err(Failure::Ks(err)) => {
            let _ = writeln!(uart, "{name}... FAILED ({err})\r");
            1
        }
        Err(Failure::Mismatch) => {
            let _ = writeln!(uart, "{name}... FAILED (data mismatch)\r");
            1
        }
    }
}

fn expect(condition: bool) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(Failure::Mismatch)
    }
}

fn test_initialize<R: KsRegisters, D: DelayNs, L: Logger>(
    ks: &mut KeyStore<R, D, L>,
) -> TestResult {
    ks.initialize()?;
    ks.initialize()?;
    expect(ks.is_initialized() && !ks.is_busy())
}

fn test_sram_round_trip<R: KsRegisters, D: DelayNs, L: Logger>(
    ks: &mut KeyStore<R, D, L>,
) -> TestResult {
    let meta = Metadata::new(KeyOwner::Aes, KeySize::Bits256).readable();
    let index = ks.write(MemType::Sram, meta, &AES256_KEY)?;

    let mut key = [0u32; 8];
    ks.read(MemType::Sram, index, &mut key)?;
    ks.erase_key(index)?;
    expect(key == AES256_KEY)
}

fn test_sram_multi_frame<R: KsRegisters, D: DelayNs, L: Logger>(
    ks: &mut KeyStore<R, D, L>,
) -> TestResult {
    let mut modulus = [0u32; 64];
    for (i, word) in modulus.iter_mut().enumerate() {
        *word = 0x5a5a_0000 | u32::try_from(i).unwrap_or(0);
    }
    let meta = Metadata::new(KeyOwner::RsaMid, KeySize::Bits2048).readable();
    let index = ks.write(MemType::Sram, meta, &modulus)?;

    let key = ks.read_key(MemType::Sram, index, KeySize::Bits2048)?;
    ks.erase_key(index)?;
    expect(key.as_slice() == modulus.as_slice())
}

fn test_toggle_sram<R: KsRegisters, D: DelayNs, L: Logger>(
    ks: &mut KeyStore<R, D, L>,
) -> TestResult {
    let meta = Metadata::new(KeyOwner::Hmac, KeySize::Bits256).readable();
    let index = ks.write(MemType::Sram, meta, &AES256_KEY)?;

    let before = ks.status().sram_inverted;
    let first = ks.toggle_sram()?;
    let mut key = [0u32; 8];
    ks.read(MemType::Sram, index, &mut key)?;
    let second = ks.toggle_sram()?;
    ks.erase_key(index)?;

    expect(first != before && second == before && key == AES256_KEY)
}

fn test_sram_erase<R: KsRegisters, D: DelayNs, L: Logger>(
    ks: &mut KeyStore<R, D, L>,
) -> TestResult {
    let meta = Metadata::new(KeyOwner::Cpu, KeySize::Bits128).readable();
    let index = ks.write(MemType::Sram, meta, &AES256_KEY)?;
    ks.erase_key(index)?;

    let mut key = [0u32; 4];
    expect(ks.read(MemType::Sram, index, &mut key) == Err(KsError::Fail))
}

fn test_otp_size_limit<R: KsRegisters, D: DelayNs, L: Logger>(
    ks: &mut KeyStore<R, D, L>,
) -> TestResult {
    let meta = Metadata::new(KeyOwner::Ecc, KeySize::Bits384);
    let key = [0u32; 12];
    expect(
        ks.write(MemType::Otp, meta, &key) == Err(KsError::InvalidParameter)
            && ks.write_otp(1, meta, &key) == Err(KsError::InvalidParameter),
    )
}

#[cfg(feature = "test-ks-flash")]
fn test_flash_round_trip<R: KsRegisters, D: DelayNs, L: Logger>(
    ks: &mut KeyStore<R, D, L>,
) -> TestResult {
    let remaining = ks.remaining_key_count(MemType::Flash)?;
    let meta = Metadata::new(KeyOwner::Aes, KeySize::Bits256).readable();
    let index = ks.write(MemType::Flash, meta, &AES256_KEY)?;

    let mut key = [0u32; 8];
    ks.read(MemType::Flash, index, &mut key)?;
    ks.revoke_key(MemType::Flash, index)?;
    expect(key == AES256_KEY && remaining > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ks::KsConfigBuilder;
    use crate::tests::sim::SimKs;
    use core::convert::Infallible;

    struct Console(Vec<u8>);

    impl embedded_io::ErrorType for Console {
        type Error = Infallible;
    }

    impl Write for Console {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn test_suite_passes_on_simulator() {
        let config = KsConfigBuilder::new().poll_attempts(32).build();
        let mut ks = KeyStore::new(SimKs::new(), config);
        let mut console = Console(Vec::new());

        let failures = run_ks_tests(&mut ks, &mut console);

        let text = String::from_utf8(console.0).unwrap();
        assert_eq!(failures, 0, "{text}");
        assert!(text.contains("SRAM multi-frame key... PASSED"));
        assert!(text.contains("All Key Store Tests Passed"));
    }

    #[test]
    fn test_suite_reports_stuck_controller() {
        let config = KsConfigBuilder::new().poll_attempts(4).build();
        let mut sim = SimKs::initialized();
        sim.hold_busy();
        let mut ks = KeyStore::new(sim, config);
        let mut console = Console(Vec::new());

        let failures = run_ks_tests(&mut ks, &mut console);

        let text = String::from_utf8(console.0).unwrap();
        assert!(failures > 0);
        assert!(text.contains("initialize... FAILED (key store timed out)"));
    }
}
