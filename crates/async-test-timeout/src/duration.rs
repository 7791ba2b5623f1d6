//! ISO-8601 duration strings.
//!
//! Accepts the `PnDTnHnMn.nS` form: an optional leading sign, `P`, an
//! optional day component, then an optional `T` followed by hour, minute and
//! second components in that order. Every component may carry its own sign
//! and seconds may carry up to nine fractional digits after `.` or `,`.
//! Letters are case-insensitive.

use std::time::Duration;
use thiserror::Error;

const NANOS_PER_SECOND: i128 = 1_000_000_000;
const NANOS_PER_MINUTE: i128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i128 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: i128 = 24 * NANOS_PER_HOUR;
const MAX_FRACTION_DIGITS: usize = 9;

/// Errors produced by [`parse_duration`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    /// The input does not follow the duration grammar.
    #[error("expected {expected} at position {position}")]
    Syntax {
        /// Byte offset of the offending character.
        position: usize,
        /// What the parser was looking for.
        expected: &'static str,
    },
    /// The duration is well-formed but negative.
    #[error("duration is negative")]
    Negative,
    /// The duration does not fit in a `Duration`.
    #[error("duration is too large")]
    Overflow,
}

/// Parses an ISO-8601 duration such as `PT0.5S`, `PT2M` or `P1DT12H`.
///
/// # Examples
///
/// ```rust
/// use async_test_timeout::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("PT0.5S").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_duration("pt1m30s").unwrap(), Duration::from_secs(90));
/// assert!(parse_duration("junk").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let mut cursor = Cursor::new(input);

    let negate = cursor.sign();
    if !cursor.eat(b'P') {
        return Err(cursor.expected("'P'"));
    }

    let mut total: i128 = 0;
    let mut components = 0;

    if !cursor.at_end() && !cursor.at(b'T') {
        let component = cursor.component()?;
        if component.unit != b'D' {
            return Err(component.error("'D' or 'T'"));
        }
        if component.fraction.is_some() {
            return Err(component.error("'S'"));
        }
        total = add(total, component.value, NANOS_PER_DAY)?;
        components += 1;
    }

    if cursor.eat(b'T') {
        let mut last_rank = 0;
        let mut time_components = 0;

        while !cursor.at_end() {
            let component = cursor.component()?;
            let (rank, scale) = match component.unit {
                b'H' => (1, NANOS_PER_HOUR),
                b'M' => (2, NANOS_PER_MINUTE),
                b'S' => (3, NANOS_PER_SECOND),
                _ => return Err(component.error("'H', 'M' or 'S'")),
            };
            if rank <= last_rank {
                return Err(component.error("hours, minutes and seconds in order"));
            }
            if component.fraction.is_some() && component.unit != b'S' {
                return Err(component.error("'S'"));
            }
            last_rank = rank;

            total = add(total, component.value, scale)?;
            if let Some(nanos) = component.fraction {
                total = total.checked_add(nanos).ok_or(DurationParseError::Overflow)?;
            }
            time_components += 1;
        }

        if time_components == 0 {
            return Err(cursor.expected("a time component after 'T'"));
        }
        components += time_components;
    }

    if !cursor.at_end() {
        return Err(cursor.expected("end of input"));
    }
    if components == 0 {
        return Err(cursor.expected("at least one component"));
    }

    if negate {
        total = total.checked_neg().ok_or(DurationParseError::Overflow)?;
    }
    if total < 0 {
        return Err(DurationParseError::Negative);
    }

    let secs = u64::try_from(total / NANOS_PER_SECOND).map_err(|_| DurationParseError::Overflow)?;
    // The remainder of a non-negative value is below one second.
    let nanos = (total % NANOS_PER_SECOND) as u32;
    Ok(Duration::new(secs, nanos))
}

fn add(total: i128, value: i128, scale: i128) -> Result<i128, DurationParseError> {
    value
        .checked_mul(scale)
        .and_then(|nanos| total.checked_add(nanos))
        .ok_or(DurationParseError::Overflow)
}

struct Component {
    start: usize,
    value: i128,
    /// Signed fractional part in nanoseconds.
    fraction: Option<i128>,
    unit: u8,
}

impl Component {
    fn error(&self, expected: &'static str) -> DurationParseError {
        DurationParseError::Syntax {
            position: self.start,
            expected,
        }
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn at(&self, letter: u8) -> bool {
        self.peek().map(|b| b.to_ascii_uppercase()) == Some(letter)
    }

    fn eat(&mut self, letter: u8) -> bool {
        if self.at(letter) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consumes an optional sign; returns true for `-`.
    fn sign(&mut self) -> bool {
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                true
            }
            Some(b'+') => {
                self.pos += 1;
                false
            }
            _ => false,
        }
    }

    fn expected(&self, expected: &'static str) -> DurationParseError {
        DurationParseError::Syntax {
            position: self.pos,
            expected,
        }
    }

    fn digits(&mut self) -> &'a [u8] {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }

    fn component(&mut self) -> Result<Component, DurationParseError> {
        let start = self.pos;
        let negative = self.sign();

        let whole = self.digits();
        if whole.is_empty() {
            return Err(self.expected("a digit"));
        }
        let mut value: i128 = 0;
        for digit in whole {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(i128::from(digit - b'0')))
                .ok_or(DurationParseError::Overflow)?;
        }

        let fraction = if matches!(self.peek(), Some(b'.' | b',')) {
            self.pos += 1;
            let digits = self.digits();
            if digits.len() > MAX_FRACTION_DIGITS {
                return Err(DurationParseError::Syntax {
                    position: self.pos - (digits.len() - MAX_FRACTION_DIGITS),
                    expected: "at most nine fractional digits",
                });
            }
            let mut nanos: i128 = 0;
            for position in 0..MAX_FRACTION_DIGITS {
                let digit = digits.get(position).map_or(0, |d| i128::from(d - b'0'));
                nanos = nanos * 10 + digit;
            }
            Some(if negative { -nanos } else { nanos })
        } else {
            None
        };

        let unit = match self.peek() {
            Some(b) if b.is_ascii_alphabetic() => b.to_ascii_uppercase(),
            _ => return Err(self.expected("a unit letter")),
        };
        self.pos += 1;

        Ok(Component {
            start,
            value: if negative { -value } else { value },
            fraction,
            unit,
        })
    }
}
