//! NPY array serialization.
//!
//! Arrays are stored in the NumPy `.npy` format: a magic string, a version,
//! a length-prefixed ASCII header describing dtype and shape, then the
//! row-major little-endian payload. This is a fixed binary layout, readable
//! from any language without object deserialization.
//!
//! Only little-endian floating point arrays in C order are produced and
//! accepted.

use crate::error::{CoreError, CoreResult};

use half::f16;
use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};
use std::fmt;

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Header plus padding is aligned to this many bytes.
const HEADER_ALIGN: usize = 64;

/// Element types that can be stored in an NPY payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    F16,
    F32,
    F64,
}

impl Dtype {
    /// NumPy type descriptor, e.g. `<f2`.
    pub fn descr(self) -> &'static str {
        match self {
            Dtype::F16 => "<f2",
            Dtype::F32 => "<f4",
            Dtype::F64 => "<f8",
        }
    }

    pub fn item_size(self) -> usize {
        match self {
            Dtype::F16 => 2,
            Dtype::F32 => 4,
            Dtype::F64 => 8,
        }
    }

    fn from_descr(descr: &str) -> CoreResult<Self> {
        match descr {
            "<f2" => Ok(Dtype::F16),
            "<f4" => Ok(Dtype::F32),
            "<f8" => Ok(Dtype::F64),
            other => Err(CoreError::Npy(format!("unsupported dtype '{other}'"))),
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dtype::F16 => "float16",
            Dtype::F32 => "float32",
            Dtype::F64 => "float64",
        })
    }
}

/// A Rust element type with a fixed NPY representation.
pub trait NpyElement: Copy {
    const DTYPE: Dtype;

    fn write_le(self, out: &mut Vec<u8>);

    /// Reads one element from exactly `DTYPE.item_size()` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

impl NpyElement for f16 {
    const DTYPE: Dtype = Dtype::F16;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        f16::from_le_bytes([bytes[0], bytes[1]])
    }
}

impl NpyElement for f32 {
    const DTYPE: Dtype = Dtype::F32;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl NpyElement for f64 {
    const DTYPE: Dtype = Dtype::F64;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..8]);
        f64::from_le_bytes(buf)
    }
}

/// An array in NPY form: dtype, shape and the raw row-major payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyArray {
    dtype: Dtype,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl NpyArray {
    /// Copies an ndarray into NPY form, in logical (row-major) order.
    pub fn from_array<T, S, D>(array: &ArrayBase<S, D>) -> Self
    where
        T: NpyElement,
        S: Data<Elem = T>,
        D: Dimension,
    {
        let mut data = Vec::with_capacity(array.len() * T::DTYPE.item_size());
        for &value in array.iter() {
            value.write_le(&mut data);
        }
        Self {
            dtype: T::DTYPE,
            shape: array.shape().to_vec(),
            data,
        }
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Payload size in bytes, without the header.
    pub fn payload_len(&self) -> usize {
        self.data.len()
    }

    /// Converts back to an ndarray. `T` must match the stored dtype.
    pub fn to_array<T: NpyElement>(&self) -> CoreResult<ArrayD<T>> {
        if self.dtype != T::DTYPE {
            return Err(CoreError::Npy(format!(
                "array holds {} but {} was requested",
                self.dtype,
                T::DTYPE
            )));
        }
        let values: Vec<T> = self
            .data
            .chunks_exact(self.dtype.item_size())
            .map(T::read_le)
            .collect();
        ArrayD::from_shape_vec(IxDyn(&self.shape), values)
            .map_err(|e| CoreError::Npy(e.to_string()))
    }

    /// Serializes to `.npy` bytes.
    pub fn encode(&self) -> Vec<u8> {
        let dict = format!(
            "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
            self.dtype.descr(),
            shape_tuple(&self.shape)
        );

        // Version 1.0 stores the header length in two bytes; larger headers need 2.0.
        let (version, len_bytes) = if dict.len() + HEADER_ALIGN < u16::MAX as usize {
            (1u8, 2usize)
        } else {
            (2u8, 4usize)
        };
        let prefix = MAGIC.len() + 2 + len_bytes;
        let unpadded = prefix + dict.len() + 1;
        let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
        let header_len = dict.len() + padding + 1;

        let mut out = Vec::with_capacity(prefix + header_len + self.data.len());
        out.extend_from_slice(MAGIC);
        out.push(version);
        out.push(0);
        if version == 1 {
            out.extend_from_slice(&(header_len as u16).to_le_bytes());
        } else {
            out.extend_from_slice(&(header_len as u32).to_le_bytes());
        }
        out.extend_from_slice(dict.as_bytes());
        out.resize(out.len() + padding, b' ');
        out.push(b'\n');
        out.extend_from_slice(&self.data);
        out
    }

    /// Parses `.npy` bytes.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < MAGIC.len() + 4 || &bytes[..MAGIC.len()] != MAGIC {
            return Err(CoreError::Npy("missing NPY magic string".to_string()));
        }

        let major = bytes[MAGIC.len()];
        let (header_len, header_start) = match major {
            1 => {
                let len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
                (len, 10)
            }
            2 | 3 => {
                if bytes.len() < 12 {
                    return Err(CoreError::Npy("truncated NPY header".to_string()));
                }
                let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
                (len, 12)
            }
            other => return Err(CoreError::Npy(format!("unsupported NPY version {other}"))),
        };

        let data_start = header_start + header_len;
        if bytes.len() < data_start {
            return Err(CoreError::Npy("truncated NPY header".to_string()));
        }
        let header = std::str::from_utf8(&bytes[header_start..data_start])
            .map_err(|e| CoreError::Npy(format!("header is not text: {e}")))?;

        let dtype = Dtype::from_descr(&parse_descr(header)?)?;
        if parse_fortran_order(header)? {
            return Err(CoreError::Npy("Fortran-ordered arrays are not supported".to_string()));
        }
        let shape = parse_shape(header)?;

        let expected = shape
            .iter()
            .try_fold(dtype.item_size(), |acc, dim| acc.checked_mul(*dim))
            .ok_or_else(|| CoreError::Npy(format!("shape {shape:?} overflows the address space")))?;
        let data = &bytes[data_start..];
        if data.len() != expected {
            return Err(CoreError::Npy(format!(
                "payload has {} bytes, shape {:?} needs {expected}",
                data.len(),
                shape
            )));
        }

        Ok(Self {
            dtype,
            shape,
            data: data.to_vec(),
        })
    }
}

fn shape_tuple(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => {
            let parts: Vec<String> = dims.iter().map(ToString::to_string).collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// Returns the header text following `'key':`.
fn header_value<'a>(header: &'a str, key: &str) -> CoreResult<&'a str> {
    for quote in ['\'', '"'] {
        let needle = format!("{quote}{key}{quote}");
        if let Some(pos) = header.find(&needle) {
            let rest = header[pos + needle.len()..].trim_start();
            if let Some(value) = rest.strip_prefix(':') {
                return Ok(value.trim_start());
            }
        }
    }
    Err(CoreError::Npy(format!("header has no '{key}' entry")))
}

fn parse_descr(header: &str) -> CoreResult<String> {
    let value = header_value(header, "descr")?;
    let mut chars = value.chars();
    let quote = chars
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| CoreError::Npy("descr is not a string".to_string()))?;
    let descr: String = chars.take_while(|c| *c != quote).collect();
    Ok(descr)
}

fn parse_fortran_order(header: &str) -> CoreResult<bool> {
    let value = header_value(header, "fortran_order")?;
    if value.starts_with("True") {
        Ok(true)
    } else if value.starts_with("False") {
        Ok(false)
    } else {
        Err(CoreError::Npy("fortran_order is not a boolean".to_string()))
    }
}

fn parse_shape(header: &str) -> CoreResult<Vec<usize>> {
    let value = header_value(header, "shape")?;
    let inner = value
        .strip_prefix('(')
        .and_then(|rest| rest.split_once(')'))
        .map(|(inner, _)| inner)
        .ok_or_else(|| CoreError::Npy("shape is not a tuple".to_string()))?;

    inner
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.parse::<usize>()
                .map_err(|_| CoreError::Npy(format!("invalid shape dimension '{dim}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, Array3};

    #[test]
    fn test_header_layout() {
        let array = Array3::from_elem((4, 25, 3), f16::ZERO);
        let bytes = NpyArray::from_array(&array).encode();

        assert_eq!(&bytes[..6], MAGIC);
        assert_eq!(bytes[6], 1);
        assert_eq!(bytes[7], 0);
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % HEADER_ALIGN, 0);
        assert_eq!(bytes[10 + header_len - 1], b'\n');

        let header = std::str::from_utf8(&bytes[10..10 + header_len]).unwrap();
        assert!(header.starts_with("{'descr': '<f2', 'fortran_order': False, 'shape': (4, 25, 3), }"));
        assert_eq!(bytes.len(), 10 + header_len + 4 * 25 * 3 * 2);
    }

    #[test]
    fn test_round_trip_preserves_bits_and_nan() {
        let values: Vec<f16> = (0..2 * 21 * 2)
            .map(|i| if i % 7 == 0 { f16::NAN } else { f16::from_f32(i as f32 * 0.5 - 3.25) })
            .collect();
        let array = Array3::from_shape_vec((2, 21, 2), values).unwrap();

        let decoded = NpyArray::decode(&NpyArray::from_array(&array).encode()).unwrap();
        assert_eq!(decoded.dtype(), Dtype::F16);
        assert_eq!(decoded.shape(), &[2, 21, 2]);

        let restored = decoded.to_array::<f16>().unwrap();
        assert_eq!(restored.shape(), array.shape());
        for (a, b) in array.iter().zip(restored.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_non_contiguous_input_is_written_row_major() {
        let array = Array::from_shape_vec((2, 3), vec![1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let transposed = array.t();
        let restored = NpyArray::decode(&NpyArray::from_array(&transposed).encode())
            .unwrap()
            .to_array::<f32>()
            .unwrap();
        assert_eq!(restored.shape(), &[3, 2]);
        assert_eq!(restored.iter().copied().collect::<Vec<_>>(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_shape_tuples() {
        assert_eq!(shape_tuple(&[]), "()");
        assert_eq!(shape_tuple(&[5]), "(5,)");
        assert_eq!(shape_tuple(&[0, 25, 3]), "(0, 25, 3)");
        assert_eq!(parse_shape("{'shape': (5,), }").unwrap(), vec![5]);
        assert_eq!(parse_shape("{'shape': (), }").unwrap(), Vec::<usize>::new());
    }

    /// Builds a version 1.0 file the way numpy.save pads its header.
    fn numpy_file(dict: &str, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&[1, 0]);
        let header_len = 118usize;
        bytes.extend_from_slice(&(header_len as u16).to_le_bytes());
        bytes.extend_from_slice(dict.as_bytes());
        bytes.resize(10 + header_len - 1, b' ');
        bytes.push(b'\n');
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_decode_accepts_numpy_written_header() {
        let mut payload = 1.5_f64.to_le_bytes().to_vec();
        payload.extend_from_slice(&(-2.0_f64).to_le_bytes());
        let bytes = numpy_file("{'descr': '<f8', 'fortran_order': False, 'shape': (2,), }", &payload);

        let array = NpyArray::decode(&bytes).unwrap().to_array::<f64>().unwrap();
        assert_eq!(array.iter().copied().collect::<Vec<_>>(), vec![1.5, -2.0]);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(NpyArray::decode(b"not an npy file").is_err());

        let array = Array3::<f32>::zeros((1, 2, 2));
        let mut bytes = NpyArray::from_array(&array).encode();
        bytes.pop();
        assert!(matches!(NpyArray::decode(&bytes), Err(CoreError::Npy(_))));

        let decoded = NpyArray::decode(&NpyArray::from_array(&array).encode()).unwrap();
        assert!(decoded.to_array::<f16>().is_err());
    }

    #[test]
    fn test_decode_rejects_overflowing_shape() {
        let dict = "{'descr': '<f8', 'fortran_order': False, 'shape': (4294967296, 4294967296), }";
        match NpyArray::decode(&numpy_file(dict, &[0; 8])) {
            Err(CoreError::Npy(message)) => assert!(message.contains("overflows")),
            other => panic!("expected NPY error, got {other:?}"),
        }
    }
}
