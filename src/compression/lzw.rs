//! LZW compression handler (compression code 5)
//!
//! TIFF's LZW variant differs from the classic GIF one only in its early
//! change rule (codes grow one bit early) and MSB-first bit packing; `weezl`
//! exposes both behind `with_tiff_size_switch`.

use weezl::{decode::Decoder, encode::Encoder, BitOrder};

use super::handler::CompressionHandler;
use crate::tiff::errors::{TiffError, TiffResult};

pub struct LzwHandler;

impl CompressionHandler for LzwHandler {
    fn decompress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let mut decoder = Decoder::with_tiff_size_switch(BitOrder::Msb, 8);
        decoder
            .decode(data)
            .map_err(|e| TiffError::CodecCorrupt(format!("LZW decode failed: {}", e)))
    }

    fn compress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let mut encoder = Encoder::with_tiff_size_switch(BitOrder::Msb, 8);
        encoder
            .encode(data)
            .map_err(|e| TiffError::GenericError(format!("LZW encode failed: {}", e)))
    }

    fn name(&self) -> &'static str {
        "LZW"
    }

    fn code(&self) -> u64 {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_repetitive_data() {
        let handler = LzwHandler;
        let data: Vec<u8> = (0..200).map(|i| (i % 7) as u8).collect();
        let compressed = handler.compress(&data).unwrap();
        let decompressed = handler.decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }
}
