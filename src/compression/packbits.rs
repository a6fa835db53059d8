//! PackBits compression handler (compression code 32773)
//!
//! A byte-oriented RLE scheme: a control byte `n` in `0..=127` means "copy
//! the next `n+1` literal bytes"; `-127..=-1` (as `i8`) means "repeat the
//! following byte `1-n` times"; `-128` is a no-op.

use super::handler::CompressionHandler;
use crate::tiff::errors::{TiffError, TiffResult};

pub struct PackBitsHandler;

impl CompressionHandler for PackBitsHandler {
    fn decompress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < data.len() {
            let control = data[i] as i8;
            i += 1;
            if control >= 0 {
                let len = control as usize + 1;
                let end = i + len;
                if end > data.len() {
                    return Err(TiffError::TruncatedData("PackBits literal run overruns buffer".to_string()));
                }
                out.extend_from_slice(&data[i..end]);
                i = end;
            } else if control != -128 {
                let run = 1 - control as i32;
                if i >= data.len() {
                    return Err(TiffError::TruncatedData("PackBits repeat run missing byte".to_string()));
                }
                let byte = data[i];
                i += 1;
                out.extend(std::iter::repeat(byte).take(run as usize));
            }
        }
        Ok(out)
    }

    fn compress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < data.len() {
            let run_len = data[i..].iter().take_while(|&&b| b == data[i]).count();
            if run_len >= 2 {
                let run_len = run_len.min(128);
                out.push((1 - run_len as i32) as u8);
                out.push(data[i]);
                i += run_len;
            } else {
                let start = i;
                let mut len = 1;
                i += 1;
                while i < data.len() && len < 128 {
                    let next_run = data[i..].iter().take_while(|&&b| b == data[i]).count();
                    if next_run >= 2 {
                        break;
                    }
                    len += 1;
                    i += 1;
                }
                out.push((len - 1) as u8);
                out.extend_from_slice(&data[start..start + len]);
            }
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "PackBits"
    }

    fn code(&self) -> u64 {
        32773
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_runs_and_literals() {
        let handler = PackBitsHandler;
        let data = vec![1, 1, 1, 1, 2, 3, 4, 5, 5, 5];
        let compressed = handler.compress(&data).unwrap();
        let decompressed = handler.decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }
}
