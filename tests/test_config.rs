// tests/test_config.rs — Integration tests for the bin prompt.

use histeq_gpu::config::{prompt_bins, ConfigError};
use histeq_gpu::histeq::BinCount;

fn answer(lines: &str) -> (Result<BinCount, ConfigError>, String) {
    let mut out = Vec::new();
    let result = prompt_bins(lines.as_bytes(), &mut out);
    (result, String::from_utf8(out).unwrap())
}

// ===== Boundaries =====

#[test]
fn accepts_one_and_256() {
    assert_eq!(answer("1\n").0.unwrap().get(), 1);
    assert_eq!(answer("256\n").0.unwrap().get(), 256);
}

#[test]
fn rejects_zero_negative_and_too_many() {
    for bad in ["0", "-1", "257", "100000"] {
        let (result, out) = answer(&format!("{bad}\n"));
        assert!(matches!(result, Err(ConfigError::PromptClosed)), "{bad} was accepted");
        assert!(out.contains("Must have between 1 and 256 bins"), "{bad}: {out}");
    }
}

#[test]
fn rejects_non_integers_and_asks_again() {
    let (result, out) = answer("lots\n12.5\n\n  99  \n");
    assert_eq!(result.unwrap().get(), 99);
    assert_eq!(out.matches("Enter number of bins:").count(), 4);
    assert_eq!(out.matches("Must have between 1 and 256 bins").count(), 3);
}

#[test]
fn answer_without_trailing_newline() {
    assert_eq!(answer("64").0.unwrap().get(), 64);
}

#[test]
fn empty_input_is_an_error() {
    let (result, out) = answer("");
    assert!(matches!(result, Err(ConfigError::PromptClosed)));
    assert_eq!(out.matches("Enter number of bins:").count(), 1);
}
