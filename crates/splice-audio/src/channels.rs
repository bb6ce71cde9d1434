//! Channel count conversion for interleaved f32 audio.

use splice_core::{Result, SpliceError};

/// Convert interleaved `input` from `from` to `to` channels, appending to `out`.
///
/// Mono to stereo duplicates, stereo to mono averages; matching counts copy.
/// Other layouts are not supported.
pub fn convert_channels(input: &[f32], from: u16, to: u16, out: &mut Vec<f32>) -> Result<()> {
    assert!(from > 0 && to > 0, "channel conversion with zero channels");
    match (from, to) {
        (a, b) if a == b => out.extend_from_slice(input),
        (1, 2) => {
            out.reserve(input.len() * 2);
            for &s in input {
                out.push(s);
                out.push(s);
            }
        }
        (2, 1) => {
            out.reserve(input.len() / 2);
            out.extend(input.chunks_exact(2).map(|lr| (lr[0] + lr[1]) * 0.5));
        }
        _ => {
            return Err(SpliceError::UnsupportedFormat(format!(
                "channel conversion {from} -> {to}"
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_to_stereo_duplicates() {
        let mut out = Vec::new();
        convert_channels(&[0.1, -0.2], 1, 2, &mut out).unwrap();
        assert_eq!(out, vec![0.1, 0.1, -0.2, -0.2]);
    }

    #[test]
    fn test_stereo_to_mono_averages() {
        let mut out = Vec::new();
        convert_channels(&[1.0, 0.0, 0.5, 0.5], 2, 1, &mut out).unwrap();
        assert_eq!(out, vec![0.5, 0.5]);
    }

    #[test]
    fn test_same_count_copies() {
        let mut out = vec![9.0];
        convert_channels(&[0.25, 0.75], 2, 2, &mut out).unwrap();
        assert_eq!(out, vec![9.0, 0.25, 0.75]);
    }

    #[test]
    fn test_surround_is_unsupported() {
        let mut out = Vec::new();
        let err = convert_channels(&[0.0; 6], 6, 2, &mut out).unwrap_err();
        assert!(matches!(err, SpliceError::UnsupportedFormat(_)));
    }

    #[test]
    #[should_panic(expected = "zero channels")]
    fn test_zero_channels_is_a_bug() {
        let mut out = Vec::new();
        let _ = convert_channels(&[], 0, 2, &mut out);
    }
}
