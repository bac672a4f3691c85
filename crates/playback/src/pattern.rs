use std::fmt;
use thiserror::Error;

const MAX_FIELD_WIDTH: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Pattern {0:?} has no integer placeholder")]
    NoPlaceholder(String),

    #[error("Pattern {0:?} has more than one placeholder")]
    MultiplePlaceholders(String),

    #[error("Pattern {pattern:?} uses unsupported conversion '%{conversion}'")]
    UnsupportedConversion { pattern: String, conversion: char },

    #[error("Pattern {0:?} ends with a dangling '%'")]
    Dangling(String),

    #[error("Pattern {pattern:?} field width {width} exceeds {MAX_FIELD_WIDTH}")]
    WidthTooLarge { pattern: String, width: usize },
}

/// File name template with exactly one integer placeholder.
///
/// Accepts the printf forms `%d`, `%i`, `%u`, with an optional width and `0`
/// flag (`%04d`). `%%` is a literal percent sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    source: String,
    prefix: String,
    suffix: String,
    width: usize,
    zero_pad: bool,
}

impl NamePattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut field: Option<(usize, bool)> = None;
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            let target = if field.is_some() { &mut suffix } else { &mut prefix };
            if c != '%' {
                target.push(c);
                continue;
            }

            match chars.peek() {
                Some('%') => {
                    chars.next();
                    target.push('%');
                    continue;
                }
                None => return Err(PatternError::Dangling(pattern.to_string())),
                Some(_) => {}
            }

            let zero_pad = chars.next_if_eq(&'0').is_some();
            let mut width = 0usize;
            while let Some(digit) = chars.next_if(char::is_ascii_digit) {
                width = width * 10 + digit.to_digit(10).unwrap_or(0) as usize;
                if width > MAX_FIELD_WIDTH {
                    return Err(PatternError::WidthTooLarge {
                        pattern: pattern.to_string(),
                        width,
                    });
                }
            }

            match chars.next() {
                Some('d' | 'i' | 'u') => {}
                Some(conversion) => {
                    return Err(PatternError::UnsupportedConversion {
                        pattern: pattern.to_string(),
                        conversion,
                    });
                }
                None => return Err(PatternError::Dangling(pattern.to_string())),
            }

            if field.is_some() {
                return Err(PatternError::MultiplePlaceholders(pattern.to_string()));
            }
            field = Some((width, zero_pad));
        }

        let (width, zero_pad) = field.ok_or_else(|| PatternError::NoPlaceholder(pattern.to_string()))?;

        Ok(Self {
            source: pattern.to_string(),
            prefix,
            suffix,
            width,
            zero_pad,
        })
    }

    /// Substitute `index` into the placeholder.
    pub fn resolve(&self, index: u32) -> String {
        let width = self.width;
        if self.zero_pad {
            format!("{}{:0width$}{}", self.prefix, index, self.suffix)
        } else {
            format!("{}{:>width$}{}", self.prefix, index, self.suffix)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
