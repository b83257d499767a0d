//! Space/newline-delimited header tokenizer.
//!
//! Message and changeset headers are lines of decimal integer and token
//! fields separated by single spaces, with the final field terminated by a
//! caller-chosen delimiter byte. [`HeaderLine`] walks such a line from the
//! front of a byte slice; after the final field, [`HeaderLine::finish`]
//! hands back the bytes following the delimiter.

use crate::error::HeaderError;

/// Cursor over one header line.
///
/// Integer fields parse wide into `i64` and narrow to the requested width
/// via `TryFrom`, so a value that fits 64 bits but not the field's
/// declared width is a typed failure rather than a truncation. Exactly one
/// separator byte is consumed after every field: a space when more fields
/// follow, the end delimiter when the line is complete.
pub(crate) struct HeaderLine<'a> {
    rest: &'a [u8],
    end_delim: u8,
    done: bool,
}

impl<'a> HeaderLine<'a> {
    pub fn new(input: &'a [u8], end_delim: u8) -> Self {
        Self {
            rest: input,
            end_delim,
            done: false,
        }
    }

    /// Parse one decimal integer field, narrowing to `T`.
    pub fn int_field<T: TryFrom<i64>>(&mut self) -> Result<T, HeaderError> {
        let wide = self.wide_int()?;
        let value = T::try_from(wide).map_err(|_| HeaderError::OutOfRange { value: wide })?;
        self.separator()?;
        Ok(value)
    }

    /// Parse one token field: contiguous non-separator bytes.
    pub fn token_field(&mut self) -> Result<&'a str, HeaderError> {
        if self.done {
            return Err(HeaderError::UnexpectedEnd);
        }
        let len = self
            .rest
            .iter()
            .position(|&b| b == b' ' || b == self.end_delim)
            .ok_or(HeaderError::UnexpectedEnd)?;
        if len == 0 {
            return Err(HeaderError::EmptyToken);
        }
        let (token, rest) = self.rest.split_at(len);
        let token = std::str::from_utf8(token).map_err(|_| HeaderError::BadToken)?;
        self.rest = rest;
        self.separator()?;
        Ok(token)
    }

    /// Assert that the end delimiter was reached and return the bytes
    /// following it.
    pub fn finish(self) -> Result<&'a [u8], HeaderError> {
        if !self.done {
            return Err(HeaderError::MissingDelimiter);
        }
        Ok(self.rest)
    }

    /// Wide decimal parse: optional leading `-`, one or more ASCII digits,
    /// checked accumulation. Stops at the first non-digit byte.
    fn wide_int(&mut self) -> Result<i64, HeaderError> {
        if self.done {
            return Err(HeaderError::UnexpectedEnd);
        }
        let mut idx = 0;
        let negative = self.rest.first() == Some(&b'-');
        if negative {
            idx = 1;
        }
        let mut value: i64 = 0;
        let mut digits = 0;
        while let Some(&b) = self.rest.get(idx) {
            if !b.is_ascii_digit() {
                break;
            }
            let digit = i64::from(b - b'0');
            value = value
                .checked_mul(10)
                .and_then(|v| {
                    if negative {
                        v.checked_sub(digit)
                    } else {
                        v.checked_add(digit)
                    }
                })
                .ok_or(HeaderError::Overflow)?;
            digits += 1;
            idx += 1;
        }
        if digits == 0 {
            return match self.rest.get(idx) {
                Some(&found) => Err(HeaderError::NotAnInteger { found }),
                None => Err(HeaderError::UnexpectedEnd),
            };
        }
        self.rest = &self.rest[idx..];
        Ok(value)
    }

    /// Consume the single byte following a field: a space continues the
    /// line, the end delimiter completes it.
    fn separator(&mut self) -> Result<(), HeaderError> {
        let Some(&next) = self.rest.first() else {
            return Err(HeaderError::UnexpectedEnd);
        };
        self.rest = &self.rest[1..];
        if next == self.end_delim {
            self.done = true;
            Ok(())
        } else if next == b' ' {
            Ok(())
        } else {
            Err(HeaderError::BadSeparator { found: next })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_field_line() {
        let mut line = HeaderLine::new(b"42\nrest", b'\n');
        assert_eq!(line.int_field::<u64>().unwrap(), 42);
        assert_eq!(line.finish().unwrap(), b"rest");
    }

    #[test]
    fn multiple_fields() {
        let mut line = HeaderLine::new(b"1 2 3\n", b'\n');
        assert_eq!(line.int_field::<u64>().unwrap(), 1);
        assert_eq!(line.int_field::<u64>().unwrap(), 2);
        assert_eq!(line.int_field::<u64>().unwrap(), 3);
        assert_eq!(line.finish().unwrap(), b"");
    }

    #[test]
    fn negative_field_narrows_to_i64() {
        let mut line = HeaderLine::new(b"-1234567890\n", b'\n');
        assert_eq!(line.int_field::<i64>().unwrap(), -1234567890);
    }

    #[test]
    fn negative_value_rejected_for_unsigned_field() {
        let mut line = HeaderLine::new(b"-1\n", b'\n');
        assert_eq!(
            line.int_field::<u64>(),
            Err(HeaderError::OutOfRange { value: -1 })
        );
    }

    #[test]
    fn i64_extremes_parse() {
        let mut line = HeaderLine::new(b"9223372036854775807 -9223372036854775808\n", b'\n');
        assert_eq!(line.int_field::<i64>().unwrap(), i64::MAX);
        assert_eq!(line.int_field::<i64>().unwrap(), i64::MIN);
    }

    #[test]
    fn wide_overflow_is_an_error() {
        let mut line = HeaderLine::new(b"9223372036854775808\n", b'\n');
        assert_eq!(line.int_field::<u64>(), Err(HeaderError::Overflow));
    }

    #[test]
    fn narrowing_overflow_is_an_error() {
        let mut line = HeaderLine::new(b"70000\n", b'\n');
        assert_eq!(
            line.int_field::<u16>(),
            Err(HeaderError::OutOfRange { value: 70000 })
        );
    }

    #[test]
    fn leading_plus_is_rejected() {
        let mut line = HeaderLine::new(b"+5\n", b'\n');
        assert_eq!(
            line.int_field::<u64>(),
            Err(HeaderError::NotAnInteger { found: b'+' })
        );
    }

    #[test]
    fn bare_minus_is_rejected() {
        let mut line = HeaderLine::new(b"- \n", b'\n');
        assert_eq!(
            line.int_field::<i64>(),
            Err(HeaderError::NotAnInteger { found: b' ' })
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        let mut line = HeaderLine::new(b"", b'\n');
        assert_eq!(line.int_field::<u64>(), Err(HeaderError::UnexpectedEnd));
    }

    #[test]
    fn missing_delimiter_is_rejected() {
        let mut line = HeaderLine::new(b"42", b'\n');
        assert_eq!(line.int_field::<u64>(), Err(HeaderError::UnexpectedEnd));
    }

    #[test]
    fn trailing_space_before_delimiter_is_rejected() {
        // "42 \n" reads as a field plus a continuation space, so the line
        // never sees its delimiter.
        let mut line = HeaderLine::new(b"42 \n", b'\n');
        assert_eq!(line.int_field::<u64>().unwrap(), 42);
        assert_eq!(line.finish(), Err(HeaderError::MissingDelimiter));
    }

    #[test]
    fn bad_separator_is_rejected() {
        let mut line = HeaderLine::new(b"42x\n", b'\n');
        assert_eq!(
            line.int_field::<u64>(),
            Err(HeaderError::BadSeparator { found: b'x' })
        );
    }

    #[test]
    fn field_after_line_end_is_rejected() {
        let mut line = HeaderLine::new(b"1\n2\n", b'\n');
        assert_eq!(line.int_field::<u64>().unwrap(), 1);
        assert_eq!(line.int_field::<u64>(), Err(HeaderError::UnexpectedEnd));
    }

    #[test]
    fn token_field_reads_until_space() {
        let mut line = HeaderLine::new(b"download 1\n", b' ');
        assert_eq!(line.token_field().unwrap(), "download");
        assert_eq!(line.finish().unwrap(), b"1\n");
    }

    #[test]
    fn empty_token_is_rejected() {
        let mut line = HeaderLine::new(b" x\n", b' ');
        assert_eq!(line.token_field(), Err(HeaderError::EmptyToken));
    }

    #[test]
    fn token_without_separator_is_rejected() {
        let mut line = HeaderLine::new(b"ident", b' ');
        assert_eq!(line.token_field(), Err(HeaderError::UnexpectedEnd));
    }

    #[test]
    fn leading_zeros_are_accepted() {
        let mut line = HeaderLine::new(b"007\n", b'\n');
        assert_eq!(line.int_field::<u64>().unwrap(), 7);
    }
}
