//! Flat byte encoding of counter data images.
//!
//! Layout (native endianness):
//!
//! | Section | Size |
//! |---------|------|
//! | header  | 24 bytes |
//! | names   | per name: `u32` length + UTF-8 bytes, padded to 8 |
//! | ranges  | `num_ranges` x [`RangeRecord`] |
//! | values  | `num_ranges * num_counters` x `f64` |

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};

use crate::error::{CounterDataError, CounterDataResult};

use super::image::{CounterDataImage, RangeRecord};
use super::schema::{CounterDataPrefix, CounterDataSchema, LayoutVersion};

/// "CSCD" read as a little-endian u32.
pub const IMAGE_MAGIC: u32 = u32::from_le_bytes(*b"CSCD");

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ImageHeader {
    magic: u32,
    version: u32,
    num_counters: u32,
    num_ranges: u32,
    names_len: u32,
    reserved: u32,
}

fn align8(len: usize) -> usize {
    (len + 7) & !7
}

/// Byte cursor that reports truncation instead of panicking.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> CounterDataResult<&'a [u8]> {
        let needed = self
            .offset
            .checked_add(len)
            .ok_or(CounterDataError::Truncated {
                needed: usize::MAX,
                available: self.bytes.len(),
            })?;
        if needed > self.bytes.len() {
            return Err(CounterDataError::Truncated {
                needed,
                available: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.offset..needed];
        self.offset = needed;
        Ok(slice)
    }

    fn read<T: Pod>(&mut self) -> CounterDataResult<T> {
        Ok(bytemuck::pod_read_unaligned(self.take(size_of::<T>())?))
    }
}

impl CounterDataImage {
    /// Encode the image into a self-describing byte buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut names = Vec::new();
        for name in self.schema().prefix().counters() {
            names.extend_from_slice(&(name.len() as u32).to_ne_bytes());
            names.extend_from_slice(name.as_bytes());
        }
        let names_len = names.len();
        names.resize(align8(names_len), 0);

        let header = ImageHeader {
            magic: IMAGE_MAGIC,
            version: self.schema().version().0,
            num_counters: self.num_counters() as u32,
            num_ranges: self.num_ranges() as u32,
            names_len: names_len as u32,
            reserved: 0,
        };

        let mut bytes = Vec::with_capacity(
            size_of::<ImageHeader>() + names.len() + self.info().size_in_bytes,
        );
        bytes.extend_from_slice(bytemuck::bytes_of(&header));
        bytes.extend_from_slice(&names);
        bytes.extend_from_slice(bytemuck::cast_slice(self.records()));
        bytes.extend_from_slice(bytemuck::cast_slice(self.values()));
        bytes
    }

    /// Decode an image produced by [`to_bytes`](Self::to_bytes).
    ///
    /// The magic number is checked first, then the layout version, then
    /// every section length.
    pub fn from_bytes(bytes: &[u8]) -> CounterDataResult<Self> {
        let mut reader = Reader { bytes, offset: 0 };
        let header: ImageHeader = reader.read()?;
        if header.magic != IMAGE_MAGIC {
            return Err(CounterDataError::BadMagic(header.magic));
        }
        let version = LayoutVersion(header.version);
        if version != LayoutVersion::CURRENT {
            return Err(CounterDataError::UnsupportedLayout {
                found: version,
                expected: LayoutVersion::CURRENT,
            });
        }

        let names_len = header.names_len as usize;
        let names = reader.take(align8(names_len))?;
        let mut names = Reader {
            bytes: &names[..names_len],
            offset: 0,
        };
        let mut prefix = CounterDataPrefix::new();
        for _ in 0..header.num_counters {
            let len: u32 = names.read()?;
            let raw = names.take(len as usize)?;
            let name = std::str::from_utf8(raw)
                .map_err(|_| CounterDataError::InvalidName(String::from_utf8_lossy(raw).into()))?;
            prefix = prefix.with_counter(name);
        }
        let schema = CounterDataSchema::with_version(prefix, version)?;

        let num_ranges = header.num_ranges as usize;
        let ranges = reader
            .take(num_ranges * size_of::<RangeRecord>())?
            .chunks_exact(size_of::<RangeRecord>())
            .map(bytemuck::pod_read_unaligned)
            .collect::<Vec<RangeRecord>>();
        for record in &ranges {
            record.time_range().validate()?;
        }
        let values = reader
            .take(num_ranges * schema.num_counters() * size_of::<f64>())?
            .chunks_exact(size_of::<f64>())
            .map(bytemuck::pod_read_unaligned)
            .collect::<Vec<f64>>();

        log::trace!(
            "Decoded counter data image: {} ranges, {} counters",
            num_ranges,
            schema.num_counters()
        );
        Ok(CounterDataImage::from_parts(schema, ranges, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TimeRange;

    fn image() -> CounterDataImage {
        let prefix = CounterDataPrefix::new()
            .with_counter("gr__cycles_elapsed")
            .with_counter("dram__bytes");
        let schema = CounterDataSchema::new(prefix).unwrap();
        let mut image = CounterDataImage::new(schema, 3);
        image
            .set_range(1, TimeRange::new(100, 200).unwrap(), &[7.0, 8.5])
            .unwrap();
        image
    }

    #[test]
    fn test_decode_preserves_contents() {
        let image = image();
        let decoded = CounterDataImage::from_bytes(&image.to_bytes()).unwrap();
        assert!(decoded.schema().is_compatible(image.schema()));
        assert_eq!(decoded.num_ranges(), 3);
        assert_eq!(decoded.range(1).unwrap(), image.range(1).unwrap());
        assert_eq!(decoded.counter_value_by_name(1, "dram__bytes"), Some(8.5));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = image().to_bytes();
        bytes[0] ^= 0xff;
        assert!(matches!(
            CounterDataImage::from_bytes(&bytes),
            Err(CounterDataError::BadMagic(_))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = image().to_bytes();
        bytes[4..8].copy_from_slice(&9u32.to_ne_bytes());
        assert_eq!(
            CounterDataImage::from_bytes(&bytes).unwrap_err(),
            CounterDataError::UnsupportedLayout {
                found: LayoutVersion(9),
                expected: LayoutVersion::CURRENT,
            }
        );
    }

    #[test]
    fn test_reversed_record_rejected() {
        let mut bytes = image().to_bytes();
        let names_len = u32::from_ne_bytes(bytes[16..20].try_into().unwrap()) as usize;
        // Range 1 record: start then end, both u64.
        let record = size_of::<ImageHeader>() + align8(names_len) + size_of::<RangeRecord>();
        bytes[record..record + 8].copy_from_slice(&300u64.to_ne_bytes());

        assert_eq!(
            CounterDataImage::from_bytes(&bytes).unwrap_err(),
            CounterDataError::InvalidTimeRange {
                start: 300,
                end: 200
            }
        );
    }

    #[test]
    fn test_truncated() {
        let bytes = image().to_bytes();
        let cut = &bytes[..bytes.len() - 4];
        assert!(matches!(
            CounterDataImage::from_bytes(cut),
            Err(CounterDataError::Truncated { .. })
        ));
        assert!(matches!(
            CounterDataImage::from_bytes(&bytes[..10]),
            Err(CounterDataError::Truncated {
                needed: 24,
                available: 10
            })
        ));
    }
}
