// SPDX-License-Identifier: MPL-2.0

//! Frame decoding
//!
//! A [`FrameDecoder`] turns a luminance frame into decoded text. Decoders are
//! built per session by a [`DecoderFactory`] from the requested symbol
//! formats, so hosts can plug in their own symbology readers.

pub mod tasks;
pub mod types;

pub use tasks::QrDetector;
pub use types::{LumaFrame, OwnedLumaFrame, SymbolFormat, resolve_formats};

use tracing::warn;

/// Decoder capability consumed by the capture loop
///
/// "No match" is `None`, never an error. Implementations must not keep the
/// frame buffer past the call.
pub trait FrameDecoder: Send {
    /// Decode one frame
    fn decode(&mut self, frame: &LumaFrame<'_>) -> Option<String>;

    /// Formats this decoder looks for
    fn formats(&self) -> &[SymbolFormat];
}

/// Builds the decoder for a session
pub trait DecoderFactory: Send + Sync {
    fn create(&self, formats: &[SymbolFormat], max_dimension: u32) -> Box<dyn FrameDecoder>;
}

/// Tries a list of decoders in order, first match wins
pub struct MultiFormatDecoder {
    formats: Vec<SymbolFormat>,
    readers: Vec<Box<dyn FrameDecoder>>,
}

impl MultiFormatDecoder {
    pub fn new(formats: Vec<SymbolFormat>, readers: Vec<Box<dyn FrameDecoder>>) -> Self {
        Self { formats, readers }
    }
}

impl FrameDecoder for MultiFormatDecoder {
    fn decode(&mut self, frame: &LumaFrame<'_>) -> Option<String> {
        self.readers.iter_mut().find_map(|reader| reader.decode(frame))
    }

    fn formats(&self) -> &[SymbolFormat] {
        &self.formats
    }
}

/// Factory for the decoders shipped with the crate
///
/// Only QR has a built-in reader; other requested formats are accepted but
/// never match unless a custom factory supplies a reader for them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDecoderFactory;

impl DecoderFactory for DefaultDecoderFactory {
    fn create(&self, formats: &[SymbolFormat], max_dimension: u32) -> Box<dyn FrameDecoder> {
        let mut readers: Vec<Box<dyn FrameDecoder>> = Vec::new();
        for format in formats {
            match format {
                SymbolFormat::Qr => readers.push(Box::new(QrDetector::with_max_dimension(max_dimension))),
                other => warn!(format = %other, "No built-in decoder for symbol format"),
            }
        }
        Box::new(MultiFormatDecoder::new(formats.to_vec(), readers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    impl FrameDecoder for Fixed {
        fn decode(&mut self, _frame: &LumaFrame<'_>) -> Option<String> {
            self.0.map(str::to_string)
        }

        fn formats(&self) -> &[SymbolFormat] {
            &[]
        }
    }

    #[test]
    fn first_matching_reader_wins() {
        let mut decoder = MultiFormatDecoder::new(
            vec![SymbolFormat::Qr],
            vec![
                Box::new(Fixed(None)),
                Box::new(Fixed(Some("first"))),
                Box::new(Fixed(Some("second"))),
            ],
        );
        let data = [0u8; 4];
        let frame = LumaFrame::new(&data, 2, 2, 2).unwrap();
        assert_eq!(decoder.decode(&frame).as_deref(), Some("first"));
    }

    #[test]
    fn default_factory_keeps_requested_formats() {
        let decoder = DefaultDecoderFactory.create(&[SymbolFormat::Ean13, SymbolFormat::Qr], 640);
        assert_eq!(decoder.formats(), &[SymbolFormat::Ean13, SymbolFormat::Qr]);
    }

    #[test]
    fn formats_without_reader_never_match() {
        let mut decoder = DefaultDecoderFactory.create(&[SymbolFormat::Code128], 640);
        let data = [0u8; 16];
        let frame = LumaFrame::new(&data, 4, 4, 4).unwrap();
        assert_eq!(decoder.decode(&frame), None);
    }
}
