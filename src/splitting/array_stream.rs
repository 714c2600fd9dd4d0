//! Forward-only streaming reader over a top-level JSON array.
//!
//! Drives `serde_json`'s deserializer through a sequence visitor so the
//! array's elements are handed to a callback one at a time. Memory use is
//! bounded by the largest single element, never the whole document.

use std::fmt;
use std::io::BufRead;

use serde::de::{DeserializeSeed, Deserializer, Error as DeError, SeqAccess, Visitor};
use crate::error::AppError;
use crate::splitting::record::JsonNode;

/// UTF-8 BOM bytes.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Streams the elements of a top-level JSON array to `on_element`.
///
/// Fails with [`AppError::RootNotArray`] if the first structural token does
/// not open an array; nothing has been consumed past that token at the point
/// of failure. A callback error aborts the stream and is surfaced unchanged;
/// tokenizer errors (including trailing content after the closing bracket)
/// surface as [`AppError::JsonReadError`].
///
/// Returns the number of elements visited.
pub(crate) fn for_each_element<R, F>(mut reader: R, on_element: F) -> Result<u64, AppError>
where
    R: BufRead,
    F: FnMut(JsonNode) -> Result<(), AppError>,
{
    skip_bom(&mut reader)?;
    match peek_structural_byte(&mut reader)? {
        Some(b'[') => {}
        _ => return Err(AppError::RootNotArray),
    }

    let mut sink = ElementSink {
        on_element,
        failure: None,
        count: 0,
    };
    let mut de = serde_json::Deserializer::from_reader(reader);

    match (&mut sink).deserialize(&mut de).and_then(|_| de.end()) {
        Ok(()) => Ok(sink.count),
        Err(err) => match sink.failure.take() {
            Some(app_err) => Err(app_err),
            None => Err(AppError::JsonReadError(err.to_string())),
        },
    }
}

/// Consumes a leading UTF-8 BOM if present.
fn skip_bom<R: BufRead>(reader: &mut R) -> Result<(), AppError> {
    let buf = reader
        .fill_buf()
        .map_err(|e| AppError::JsonReadError(format!("failed to read input: {}", e)))?;
    if buf.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
    }
    Ok(())
}

/// Skips insignificant whitespace and returns the first structural byte
/// without consuming it, or `None` at end of input.
fn peek_structural_byte<R: BufRead>(reader: &mut R) -> Result<Option<u8>, AppError> {
    loop {
        let buf = reader
            .fill_buf()
            .map_err(|e| AppError::JsonReadError(format!("failed to read input: {}", e)))?;
        if buf.is_empty() {
            return Ok(None);
        }

        match buf
            .iter()
            .position(|&b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
        {
            Some(pos) => {
                let byte = buf[pos];
                reader.consume(pos);
                return Ok(Some(byte));
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

/// Sequence sink that forwards each array element to a callback.
///
/// A callback failure is stashed in `failure` and deserialization is aborted
/// with a synthetic serde error; the caller recovers the stashed error to
/// distinguish it from a genuine tokenizer failure.
struct ElementSink<F> {
    on_element: F,
    failure: Option<AppError>,
    count: u64,
}

impl<'de, F> DeserializeSeed<'de> for &mut ElementSink<F>
where
    F: FnMut(JsonNode) -> Result<(), AppError>,
{
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, F> Visitor<'de> for &mut ElementSink<F>
where
    F: FnMut(JsonNode) -> Result<(), AppError>,
{
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a top-level JSON array")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(element) = seq.next_element::<JsonNode>()? {
            if let Err(err) = (self.on_element)(element) {
                self.failure = Some(err);
                return Err(DeError::custom("element processing aborted"));
            }
            self.count += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collects every element into a Vec for assertion.
    fn collect_elements(input: &[u8]) -> Result<Vec<JsonNode>, AppError> {
        let mut elements = Vec::new();
        for_each_element(input, |v| {
            elements.push(v);
            Ok(())
        })?;
        Ok(elements)
    }

    #[test]
    fn test_streams_all_elements_in_order() {
        let elements = collect_elements(br#"[{"a":1},{"a":2},{"a":3}]"#).unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(
            serde_json::to_string(&elements[0]).unwrap(),
            r#"{"a":1}"#
        );
        assert_eq!(
            serde_json::to_string(&elements[2]).unwrap(),
            r#"{"a":3}"#
        );
    }

    #[test]
    fn test_empty_array_yields_nothing() {
        let elements = collect_elements(b"  [ ]  ").unwrap();
        assert!(elements.is_empty());
    }

    #[test]
    fn test_returns_element_count() {
        let count = for_each_element(br#"[{"a":1},{"a":2}]"#.as_slice(), |_| Ok(())).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_root_object_is_rejected() {
        let err = collect_elements(br#"{"a":1}"#).unwrap_err();
        assert!(matches!(err, AppError::RootNotArray));
    }

    #[test]
    fn test_root_scalar_is_rejected() {
        let err = collect_elements(b"42").unwrap_err();
        assert!(matches!(err, AppError::RootNotArray));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let err = collect_elements(b"").unwrap_err();
        assert!(matches!(err, AppError::RootNotArray));

        let err = collect_elements(b"   \n\t ").unwrap_err();
        assert!(matches!(err, AppError::RootNotArray));
    }

    #[test]
    fn test_bom_is_tolerated() {
        let mut input = vec![0xEF, 0xBB, 0xBF];
        input.extend_from_slice(br#"[{"a":1}]"#);
        let elements = collect_elements(&input).unwrap();
        assert_eq!(elements.len(), 1);
    }

    #[test]
    fn test_malformed_element_is_read_error() {
        let err = collect_elements(br#"[{"a":1}, {bad]"#).unwrap_err();
        assert!(matches!(err, AppError::JsonReadError(_)));
    }

    #[test]
    fn test_truncated_array_is_read_error() {
        let err = collect_elements(br#"[{"a":1},"#).unwrap_err();
        assert!(matches!(err, AppError::JsonReadError(_)));
    }

    #[test]
    fn test_trailing_garbage_is_read_error() {
        let err = collect_elements(br#"[{"a":1}] extra"#).unwrap_err();
        assert!(matches!(err, AppError::JsonReadError(_)));
    }

    #[test]
    fn test_callback_error_is_surfaced_unchanged() {
        let err = for_each_element(br#"[{"a":1},{"a":2}]"#.as_slice(), |_| {
            Err(AppError::PartitionWriteError("simulated".into()))
        })
        .unwrap_err();
        assert!(matches!(err, AppError::PartitionWriteError(msg) if msg == "simulated"));
    }

    #[test]
    fn test_callback_error_stops_the_stream() {
        let mut seen = 0u32;
        let _ = for_each_element(br#"[{"a":1},{"a":2},{"a":3}]"#.as_slice(), |_| {
            seen += 1;
            if seen == 2 {
                Err(AppError::PartitionWriteError("stop".into()))
            } else {
                Ok(())
            }
        });
        assert_eq!(seen, 2, "No element should be visited after the failure");
    }
}
