//! printf-style formatting of values for the text export.
//!
//! The variable configuration gives each variable a name format and a value format
//! such as `%-15s` or `%10.3f`. Only a single conversion is allowed per format
//! string, with optional literal text around it. Supported flags are `-`, `0`, `+`
//! and space; supported conversions are `s`, `d`, `i`, `f`, `e`, `E`, `g` and `G`.
use std::{fmt::Display, str::FromStr, sync::OnceLock};

use crate::{error::ConfigurationError, values::Value};

static FORMAT_REGEX: OnceLock<regex::Regex> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueFormat {
    prefix: String,
    suffix: String,
    left_align: bool,
    zero_pad: bool,
    plus_sign: bool,
    space_sign: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conversion: char,
    source: String,
}

impl ValueFormat {
    /// The format used for names in the header rows when none is configured.
    pub fn default_name_format() -> Self {
        Self::from_str("%-15s").unwrap_or_else(|_| Self::plain())
    }

    /// The format used for values when none is configured.
    pub fn default_value_format() -> Self {
        Self::from_str("%15s").unwrap_or_else(|_| Self::plain())
    }

    fn plain() -> Self {
        Self {
            prefix: String::new(), suffix: String::new(), left_align: false, zero_pad: false,
            plus_sign: false, space_sign: false, width: None, precision: None, conversion: 's',
            source: "%s".to_string(),
        }
    }

    /// Format a value. Missing values are written as "nan", padded to the width.
    pub fn format(&self, value: &Value) -> String {
        let body = match self.conversion {
            's' => {
                let s = value.to_string();
                match self.precision {
                    Some(p) => s.chars().take(p).collect(),
                    None => s,
                }
            },
            _ => {
                match value.as_f64() {
                    Some(x) => return self.wrap(self.pad_number(x)),
                    None => value.to_string(),
                }
            }
        };
        self.wrap(self.pad(body))
    }

    /// Format a header label (name or unit) with this format.
    ///
    /// Labels are always text, so numeric conversions fall back to string padding.
    pub fn format_label(&self, label: &str) -> String {
        self.wrap(self.pad(label.to_string()))
    }

    fn wrap(&self, s: String) -> String {
        format!("{}{s}{}", self.prefix, self.suffix)
    }

    fn pad(&self, s: String) -> String {
        let width = self.width.unwrap_or(0);
        if self.left_align {
            format!("{s:<width$}")
        } else {
            format!("{s:>width$}")
        }
    }

    fn pad_number(&self, x: f64) -> String {
        let digits = match self.conversion {
            'd' | 'i' => format!("{}", x.abs().round() as i64),
            'f' => format!("{:.*}", self.precision.unwrap_or(6), x.abs()),
            'e' => c_exponent(x.abs(), self.precision.unwrap_or(6), false),
            'E' => c_exponent(x.abs(), self.precision.unwrap_or(6), true),
            'g' => c_general(x.abs(), self.precision.unwrap_or(6), false),
            'G' => c_general(x.abs(), self.precision.unwrap_or(6), true),
            _ => format!("{}", x.abs()),
        };

        let negative = x.is_sign_negative() && digits.chars().any(|c| c.is_ascii_digit() && c != '0');
        let sign = if negative {
            "-"
        } else if self.plus_sign {
            "+"
        } else if self.space_sign {
            " "
        } else {
            ""
        };

        let width = self.width.unwrap_or(0);
        if self.zero_pad && !self.left_align {
            let nzeros = width.saturating_sub(sign.len() + digits.len());
            format!("{sign}{}{digits}", "0".repeat(nzeros))
        } else {
            self.pad(format!("{sign}{digits}"))
        }
    }
}

impl Display for ValueFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl FromStr for ValueFormat {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let re = FORMAT_REGEX.get_or_init(||
            regex::Regex::new(r"^(?<prefix>[^%]*)%(?<flags>[-0+ ]*)(?<width>\d+)?(?:\.(?<prec>\d+))?(?<conv>[sdifeEgG])(?<suffix>[^%]*)$")
                .expect("Could not compile the format regex")
        );

        let caps = re.captures(s)
            .ok_or_else(|| ConfigurationError::invalid_format(s, "expected a single printf-style conversion such as %10.3f"))?;

        let flags = caps.name("flags").map(|m| m.as_str()).unwrap_or("");
        let width = caps.name("width")
            .map(|m| m.as_str().parse::<usize>())
            .transpose()
            .map_err(|e| ConfigurationError::invalid_format(s.to_string(), format!("bad width: {e}")))?;
        let precision = caps.name("prec")
            .map(|m| m.as_str().parse::<usize>())
            .transpose()
            .map_err(|e| ConfigurationError::invalid_format(s.to_string(), format!("bad precision: {e}")))?;
        let conversion = caps["conv"].chars().next()
            .ok_or_else(|| ConfigurationError::invalid_format(s, "missing conversion"))?;

        Ok(Self {
            prefix: caps["prefix"].to_string(),
            suffix: caps["suffix"].to_string(),
            left_align: flags.contains('-'),
            zero_pad: flags.contains('0'),
            plus_sign: flags.contains('+'),
            space_sign: flags.contains(' '),
            width,
            precision,
            conversion,
            source: s.to_string(),
        })
    }
}

impl Default for ValueFormat {
    fn default() -> Self {
        Self::default_value_format()
    }
}

/// C-style exponent notation: at least two exponent digits and an explicit sign.
fn c_exponent(x: f64, precision: usize, upper: bool) -> String {
    let s = format!("{:.*e}", precision, x);
    let (mantissa, exponent) = s.split_once('e').unwrap_or((s.as_str(), "0"));
    let exp: i32 = exponent.parse().unwrap_or(0);
    let e = if upper { 'E' } else { 'e' };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}{e}{sign}{:02}", exp.abs())
}

fn c_general(x: f64, precision: usize, upper: bool) -> String {
    let p = precision.max(1);
    if x == 0.0 {
        return "0".to_string();
    }
    if !x.is_finite() {
        return format!("{x}");
    }

    // The exponent must be taken after rounding to p significant digits
    let rounded = format!("{:.*e}", p - 1, x);
    let exp: i32 = rounded.split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    if exp < -4 || exp >= p as i32 {
        let s = c_exponent(x, p - 1, upper);
        let (mantissa, rest) = s.split_at(s.find(['e', 'E']).unwrap_or(s.len()));
        format!("{}{rest}", strip_trailing_zeros(mantissa))
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, x)).to_string()
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("%10.3f", Value::Float(3.14159), "     3.142")]
    #[case("%-8.2f", Value::Float(-1.0), "-1.00   ")]
    #[case("%08.2f", Value::Float(-1.5), "-0001.50")]
    #[case("%+.1f", Value::Int(2), "+2.0")]
    #[case("%5d", Value::Float(12.0), "   12")]
    #[case("%.3e", Value::Float(12345.678), "1.235e+04")]
    #[case("%10.2E", Value::Float(0.000123), "  1.23E-04")]
    #[case("%g", Value::Float(0.0001), "0.0001")]
    #[case("%g", Value::Float(1234567.0), "1.23457e+06")]
    #[case("%g", Value::Float(100.0), "100")]
    #[case("%15s", Value::Text("GLODAPv2".into()), "       GLODAPv2")]
    #[case("%-6s", Value::Int(5), "5     ")]
    #[case("%8.3f", Value::Missing, "     nan")]
    #[case("%.2f,", Value::Float(1.0), "1.00,")]
    fn test_value_formatting(#[case] fmt: &str, #[case] value: Value, #[case] expected: &str) {
        let fmt = ValueFormat::from_str(fmt).unwrap();
        assert_eq!(fmt.format(&value), expected);
    }

    #[rstest]
    #[case("%")]
    #[case("%10.3q")]
    #[case("%d %d")]
    #[case("value")]
    fn test_invalid_formats(#[case] fmt: &str) {
        assert!(ValueFormat::from_str(fmt).is_err());
    }

    #[test]
    fn test_label_with_numeric_format() {
        let fmt = ValueFormat::from_str("%10.3f").unwrap();
        assert_eq!(fmt.format_label("TEMP"), "      TEMP");
    }
}
