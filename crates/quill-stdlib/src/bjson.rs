//! Binary JSON codec (the `bjson` module).
//!
//! A compact tag-prefixed encoding for engine values:
//!
//! | tag  | payload                                           |
//! |------|---------------------------------------------------|
//! | 0x00 | undefined                                         |
//! | 0x01 | null                                              |
//! | 0x02 | false                                             |
//! | 0x03 | true                                              |
//! | 0x04 | i64, little-endian                                |
//! | 0x05 | f64, little-endian                                |
//! | 0x06 | string: u32 LE byte length + UTF-8                |
//! | 0x07 | bytes: u32 LE length + raw                        |
//! | 0x08 | object: u32 LE entry count + (key, value) entries |
//!
//! Object keys are written as u32 LE length + UTF-8 (no tag) and sorted,
//! so equal objects always encode to equal bytes. Functions do not
//! serialize, encoding one is an error rather than a silent placeholder.

use quill_sdk::{
    AbiResult, HostContext, NativeCallResult, NativeError, NativeModule, NativeValue, ValueKind,
};

const TAG_UNDEFINED: u8 = 0x00;
const TAG_NULL: u8 = 0x01;
const TAG_FALSE: u8 = 0x02;
const TAG_TRUE: u8 = 0x03;
const TAG_INT: u8 = 0x04;
const TAG_FLOAT: u8 = 0x05;
const TAG_STRING: u8 = 0x06;
const TAG_BYTES: u8 = 0x07;
const TAG_OBJECT: u8 = 0x08;

/// Maximum object nesting accepted by the decoder.
const MAX_DEPTH: usize = 64;

// ============================================================================
// Encoding
// ============================================================================

/// Encode `value` into the binary format.
///
/// Fails on function values and on object graphs that reference themselves.
pub fn encode(host: &dyn HostContext, value: NativeValue) -> AbiResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut active = Vec::new();
    encode_value(host, value, &mut out, &mut active)?;
    Ok(out)
}

fn encode_value(
    host: &dyn HostContext,
    value: NativeValue,
    out: &mut Vec<u8>,
    active: &mut Vec<u32>,
) -> AbiResult<()> {
    match host.kind_of(value)? {
        ValueKind::Undefined => out.push(TAG_UNDEFINED),
        ValueKind::Null => out.push(TAG_NULL),
        ValueKind::Bool => {
            let b = value.as_bool().unwrap_or(false);
            out.push(if b { TAG_TRUE } else { TAG_FALSE });
        }
        ValueKind::Int => {
            out.push(TAG_INT);
            out.extend_from_slice(&value.as_i64().unwrap_or(0).to_le_bytes());
        }
        ValueKind::Float => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&value.as_f64().unwrap_or(0.0).to_le_bytes());
        }
        ValueKind::String => {
            let s = host.read_string(value)?;
            out.push(TAG_STRING);
            write_len_prefixed(out, s.as_bytes())?;
        }
        ValueKind::Bytes => {
            let b = host.read_bytes(value)?;
            out.push(TAG_BYTES);
            write_len_prefixed(out, &b)?;
        }
        ValueKind::Object => {
            let slot = value.heap_slot().ok_or_else(|| {
                NativeError::ModuleError("object value without a heap slot".to_string())
            })?;
            if active.contains(&slot) {
                return Err(NativeError::ModuleError(
                    "circular reference cannot be encoded".to_string(),
                ));
            }
            active.push(slot);

            let mut keys = host.object_keys(value)?;
            keys.sort();

            out.push(TAG_OBJECT);
            out.extend_from_slice(&checked_len(keys.len())?.to_le_bytes());
            for key in &keys {
                write_len_prefixed(out, key.as_bytes())?;
                let item = host.object_get(value, key)?;
                encode_value(host, item, out, active)?;
            }

            active.pop();
        }
        ValueKind::Function => {
            return Err(NativeError::ModuleError(
                "function values cannot be encoded".to_string(),
            ));
        }
    }
    Ok(())
}

fn write_len_prefixed(out: &mut Vec<u8>, data: &[u8]) -> AbiResult<()> {
    out.extend_from_slice(&checked_len(data.len())?.to_le_bytes());
    out.extend_from_slice(data);
    Ok(())
}

fn checked_len(len: usize) -> AbiResult<u32> {
    u32::try_from(len)
        .map_err(|_| NativeError::ModuleError(format!("length {} exceeds format limit", len)))
}

// ============================================================================
// Decoding
// ============================================================================

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> AbiResult<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| truncated("tag", self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn u32(&mut self, what: &str) -> AbiResult<u32> {
        let bytes = self.take(4, what)?;
        let mut arr = [0u8; 4];
        arr.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(arr))
    }

    fn take(&mut self, n: usize, what: &str) -> AbiResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| truncated(what, self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

fn truncated(what: &str, pos: usize) -> NativeError {
    NativeError::ModuleError(format!("truncated input reading {} at offset {}", what, pos))
}

/// Decode one value from `data`. The entire input must be consumed.
pub fn decode(host: &dyn HostContext, data: &[u8]) -> AbiResult<NativeValue> {
    let mut reader = Reader { data, pos: 0 };
    let value = decode_value(host, &mut reader, 0)?;
    if reader.pos != data.len() {
        return Err(NativeError::ModuleError(format!(
            "trailing data after value ({} bytes left)",
            data.len() - reader.pos
        )));
    }
    Ok(value)
}

fn decode_value(host: &dyn HostContext, reader: &mut Reader<'_>, depth: usize) -> AbiResult<NativeValue> {
    if depth > MAX_DEPTH {
        return Err(NativeError::ModuleError(format!(
            "nesting exceeds {} levels",
            MAX_DEPTH
        )));
    }

    let start = reader.pos;
    let tag = reader.u8()?;
    match tag {
        TAG_UNDEFINED => Ok(NativeValue::undefined()),
        TAG_NULL => Ok(NativeValue::null()),
        TAG_FALSE => Ok(NativeValue::bool(false)),
        TAG_TRUE => Ok(NativeValue::bool(true)),
        TAG_INT => {
            let bytes = reader.take(8, "i64")?;
            let mut arr = [0u8; 8];
            arr.copy_from_slice(bytes);
            Ok(NativeValue::i64(i64::from_le_bytes(arr)))
        }
        TAG_FLOAT => {
            let bytes = reader.take(8, "f64")?;
            let mut arr = [0u8; 8];
            arr.copy_from_slice(bytes);
            Ok(NativeValue::f64(f64::from_le_bytes(arr)))
        }
        TAG_STRING => {
            let s = read_string_payload(reader, "string")?;
            host.create_string(&s)
        }
        TAG_BYTES => {
            let len = reader.u32("bytes length")? as usize;
            let bytes = reader.take(len, "bytes payload")?;
            host.create_bytes(bytes)
        }
        TAG_OBJECT => {
            let count = reader.u32("entry count")? as usize;
            let object = host.create_object()?;
            for _ in 0..count {
                let key = read_string_payload(reader, "key")?;
                let item = decode_value(host, reader, depth + 1)?;
                host.object_set(object, &key, item)?;
            }
            Ok(object)
        }
        other => Err(NativeError::ModuleError(format!(
            "unknown tag 0x{:02x} at offset {}",
            other, start
        ))),
    }
}

fn read_string_payload(reader: &mut Reader<'_>, what: &str) -> AbiResult<String> {
    let len = reader.u32(what)? as usize;
    let bytes = reader.take(len, what)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| NativeError::ModuleError(format!("invalid UTF-8 in {}: {}", what, e)))
}

// ============================================================================
// Module surface
// ============================================================================

/// Build the `bjson` module with `encode` and `decode`.
pub fn bjson_module() -> NativeModule {
    let mut module = NativeModule::new("bjson", env!("CARGO_PKG_VERSION"));

    module.register_function("encode", |host, args| {
        let value = match args.first() {
            Some(v) => *v,
            None => return NativeCallResult::error("expected a value to encode"),
        };
        match encode(host, value).and_then(|bytes| host.create_bytes(&bytes)) {
            Ok(v) => NativeCallResult::Value(v),
            Err(e) => NativeCallResult::error(e.to_string()),
        }
    });

    module.register_function("decode", |host, args| {
        let input = match args.first() {
            Some(v) => *v,
            None => return NativeCallResult::error("expected bytes to decode"),
        };
        match host.read_bytes(input).and_then(|data| decode(host, &data)) {
            Ok(v) => NativeCallResult::Value(v),
            Err(e) => NativeCallResult::error(e.to_string()),
        }
    });

    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockHost;

    #[test]
    fn test_encode_primitives() {
        let host = MockHost::new();
        assert_eq!(encode(&host, NativeValue::undefined()).unwrap(), vec![TAG_UNDEFINED]);
        assert_eq!(encode(&host, NativeValue::null()).unwrap(), vec![TAG_NULL]);
        assert_eq!(encode(&host, NativeValue::bool(false)).unwrap(), vec![TAG_FALSE]);
        assert_eq!(encode(&host, NativeValue::bool(true)).unwrap(), vec![TAG_TRUE]);

        let mut expected = vec![TAG_INT];
        expected.extend_from_slice(&42i64.to_le_bytes());
        assert_eq!(encode(&host, NativeValue::i64(42)).unwrap(), expected);

        let mut expected = vec![TAG_FLOAT];
        expected.extend_from_slice(&1.5f64.to_le_bytes());
        assert_eq!(encode(&host, NativeValue::f64(1.5)).unwrap(), expected);
    }

    #[test]
    fn test_primitive_round_trips() {
        let host = MockHost::new();
        for value in [
            NativeValue::undefined(),
            NativeValue::null(),
            NativeValue::bool(true),
            NativeValue::i64(-7),
            NativeValue::i64(i64::MAX),
            NativeValue::f64(-0.25),
        ] {
            let bytes = encode(&host, value).unwrap();
            let back = decode(&host, &bytes).unwrap();
            assert_eq!(back.tag_name(), value.tag_name());
            assert_eq!(host.display(back).unwrap(), host.display(value).unwrap());
        }
    }

    #[test]
    fn test_string_round_trip() {
        let host = MockHost::new();
        let original = host.create_string("héllo wörld").unwrap();
        let bytes = encode(&host, original).unwrap();
        let back = decode(&host, &bytes).unwrap();
        assert_eq!(host.read_string(back).unwrap(), "héllo wörld");
    }

    #[test]
    fn test_bytes_round_trip() {
        let host = MockHost::new();
        let original = host.create_bytes(&[0, 1, 2, 255]).unwrap();
        let bytes = encode(&host, original).unwrap();
        let back = decode(&host, &bytes).unwrap();
        assert_eq!(host.read_bytes(back).unwrap(), vec![0, 1, 2, 255]);
    }

    #[test]
    fn test_object_round_trip() {
        let host = MockHost::new();
        let inner = host.create_object().unwrap();
        host.object_set(inner, "n", NativeValue::i64(1)).unwrap();

        let outer = host.create_object().unwrap();
        host.object_set(outer, "child", inner).unwrap();
        host.object_set(outer, "flag", NativeValue::bool(true)).unwrap();

        let bytes = encode(&host, outer).unwrap();
        let back = decode(&host, &bytes).unwrap();

        assert_eq!(host.object_keys(back).unwrap(), vec!["child", "flag"]);
        let child = host.object_get(back, "child").unwrap();
        let n = host.object_get(child, "n").unwrap();
        assert_eq!(n.as_i64(), Some(1));
        assert_eq!(host.object_get(back, "flag").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn test_object_keys_encode_sorted() {
        let host = MockHost::new();
        let object = host.create_object().unwrap();
        host.object_set(object, "zebra", NativeValue::i64(1)).unwrap();
        host.object_set(object, "apple", NativeValue::i64(2)).unwrap();

        let bytes = encode(&host, object).unwrap();
        // tag + count, then the first key must be "apple".
        let key_len = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
        assert_eq!(&bytes[9..9 + key_len], b"apple");
    }

    #[test]
    fn test_encode_rejects_functions() {
        let host = MockHost::new();
        let f = host.create_function("callback");
        let err = encode(&host, f).unwrap_err();
        assert!(err.to_string().contains("function values cannot be encoded"));

        let object = host.create_object().unwrap();
        host.object_set(object, "cb", f).unwrap();
        assert!(encode(&host, object).is_err());
    }

    #[test]
    fn test_encode_detects_cycles() {
        let host = MockHost::new();
        let object = host.create_object().unwrap();
        host.object_set(object, "self", object).unwrap();
        let err = encode(&host, object).unwrap_err();
        assert!(err.to_string().contains("circular reference"));
    }

    #[test]
    fn test_shared_subobject_is_not_a_cycle() {
        let host = MockHost::new();
        let shared = host.create_object().unwrap();
        let outer = host.create_object().unwrap();
        host.object_set(outer, "a", shared).unwrap();
        host.object_set(outer, "b", shared).unwrap();
        assert!(encode(&host, outer).is_ok());
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let host = MockHost::new();
        let err = decode(&host, &[0xFF]).unwrap_err();
        assert!(err.to_string().contains("unknown tag 0xff"));
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        let host = MockHost::new();
        assert!(decode(&host, &[]).is_err());

        let mut bytes = vec![TAG_INT];
        bytes.extend_from_slice(&42i64.to_le_bytes());
        bytes.pop();
        let err = decode(&host, &bytes).unwrap_err();
        assert!(err.to_string().contains("truncated"));

        // String whose declared length runs past the input.
        let mut bytes = vec![TAG_STRING];
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(b"short");
        assert!(decode(&host, &bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_data() {
        let host = MockHost::new();
        let mut bytes = encode(&host, NativeValue::null()).unwrap();
        bytes.push(0x00);
        let err = decode(&host, &bytes).unwrap_err();
        assert!(err.to_string().contains("trailing data"));
    }

    #[test]
    fn test_decode_depth_limit() {
        let host = MockHost::new();
        let mut buf = vec![TAG_NULL];
        for _ in 0..(MAX_DEPTH + 1) {
            let mut outer = vec![TAG_OBJECT];
            outer.extend_from_slice(&1u32.to_le_bytes());
            outer.extend_from_slice(&1u32.to_le_bytes());
            outer.push(b'k');
            outer.extend_from_slice(&buf);
            buf = outer;
        }
        let err = decode(&host, &buf).unwrap_err();
        assert!(err.to_string().contains("nesting exceeds"));
    }

    #[test]
    fn test_module_surface() {
        let module = bjson_module();
        assert_eq!(module.name(), "bjson");
        assert!(module.contains("encode"));
        assert!(module.contains("decode"));

        let host = MockHost::new();
        let encode_fn = module.get("encode").unwrap();
        let decode_fn = module.get("decode").unwrap();

        let encoded = match encode_fn(&host, &[NativeValue::i64(9)]) {
            NativeCallResult::Value(v) => v,
            NativeCallResult::Error(e) => panic!("encode failed: {}", e),
        };
        match decode_fn(&host, &[encoded]) {
            NativeCallResult::Value(v) => assert_eq!(v.as_i64(), Some(9)),
            NativeCallResult::Error(e) => panic!("decode failed: {}", e),
        }

        assert!(matches!(encode_fn(&host, &[]), NativeCallResult::Error(_)));
        assert!(matches!(
            decode_fn(&host, &[NativeValue::i64(1)]),
            NativeCallResult::Error(_)
        ));
    }
}
