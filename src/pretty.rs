//! Human-readable renderings: bit dumps and indented schema listings.
//!
//! Nothing here is part of the data contract; the output is for people
//! and may change between releases. Machine-facing text lives in the
//! `Display` implementations, which round-trip through the grammars.

use std::fmt::Write as _;

use crate::bits::Bits;
use crate::mutable::MutableBits;
use crate::options;
use crate::schema::FieldType;

/// Bits per dump line.
const LINE_BITS: usize = 32;

pub(crate) struct Indenter {
    size: usize,
    level: usize,
}

impl Indenter {
    pub(crate) fn new() -> Indenter {
        Indenter {
            size: options::options().indent_size,
            level: 0,
        }
    }

    pub(crate) fn push(&mut self) {
        self.level += 1;
    }

    pub(crate) fn pop(&mut self) {
        self.level -= 1;
    }

    pub(crate) fn pad(&self) -> String {
        " ".repeat(self.size * self.level)
    }
}

fn dump_window(bits: &Bits) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<{} bits>", bits.len());
    let with_hex = bits.len() % 4 == 0;
    let mut offset = 0;
    while offset < bits.len() {
        let end = (offset + LINE_BITS).min(bits.len());
        let line = bits.slice_unchecked(offset, end);
        let _ = write!(out, "{offset:>6}: ");
        let mut column = 0;
        for chunk in line.chunks(8) {
            let text = chunk.to_bin();
            let _ = write!(out, "{text} ");
            column += text.len() + 1;
        }
        if with_hex {
            // Line segments are nibble-aligned whenever the whole
            // sequence is, so the hex column never needs padding.
            let width = LINE_BITS + LINE_BITS / 8;
            let _ = write!(out, "{}  {}", " ".repeat(width - column), line.to_hex().unwrap_or_default());
        }
        let _ = writeln!(out);
        offset = end;
    }
    out
}

impl Bits {
    /// A multi-line dump with bit offsets, binary groups and (for
    /// nibble-aligned lengths) a hex column.
    ///
    /// ```
    /// let b = bitloom::Bits::from_hex("c0ffee00c0ffee").unwrap();
    /// let dump = b.dump();
    /// assert!(dump.starts_with("<56 bits>"));
    /// assert!(dump.contains("c0ffee00"));
    /// ```
    pub fn dump(&self) -> String {
        dump_window(self)
    }
}

impl MutableBits {
    /// See [`Bits::dump`].
    pub fn dump(&self) -> String {
        dump_window(&self.to_bits())
    }
}

fn describe_into(node: &FieldType, out: &mut String, indent: &mut Indenter) {
    match node {
        FieldType::Format(format) => {
            if !format.name().is_empty() {
                let _ = write!(out, "{}{}: (\n", indent.pad(), format.name());
            } else {
                let _ = write!(out, "{}(\n", indent.pad());
            }
            indent.push();
            for (i, child) in format.children().iter().enumerate() {
                describe_into(child, out, indent);
                if i + 1 < format.children().len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent.pop();
            let _ = write!(out, "{})", indent.pad());
        }
        FieldType::If(cond) => {
            let _ = write!(out, "{}if {}:\n", indent.pad(), cond.condition());
            indent.push();
            describe_into(cond.then_branch(), out, indent);
            indent.pop();
            if let Some(other) = cond.else_branch() {
                let _ = write!(out, "\n{}else:\n", indent.pad());
                indent.push();
                describe_into(other, out, indent);
                indent.pop();
            }
        }
        FieldType::Repeat(repeat) => {
            let _ = write!(out, "{}repeat {}:\n", indent.pad(), repeat.count());
            indent.push();
            describe_into(repeat.body(), out, indent);
            indent.pop();
        }
        other => {
            let _ = write!(out, "{}{}", indent.pad(), other);
        }
    }
}

impl FieldType {
    /// An indented multi-line rendering of the schema. The result still
    /// parses with [`FieldType::from_string`], since the grammar ignores
    /// layout.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        describe_into(self, &mut out, &mut Indenter::new());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_includes_offsets_and_hex() {
        let b = Bits::from_hex("0123456789ab").unwrap();
        let dump = b.dump();
        assert!(dump.starts_with("<48 bits>"));
        assert!(dump.contains("     0: 00000001 "));
        assert!(dump.contains("    32: "));
        assert!(dump.contains("01234567"));
        assert!(dump.contains("89ab"));
    }

    #[test]
    fn dump_of_unaligned_lengths_skips_the_hex_column() {
        let b = Bits::from_bin("1100110").unwrap();
        let dump = b.dump();
        assert!(dump.trim_end().ends_with("1100110"));
    }

    #[test]
    fn describe_round_trips_through_the_grammar() {
        let schema = FieldType::from_string(
            "(w: u12, h: u12, if {w}: (x: u8) else: pass, repeat {h}: (v: u8))",
        )
        .unwrap();
        let listing = schema.describe();
        assert!(listing.contains("\n"));
        assert!(listing.contains("w: u12"));
        let reparsed = FieldType::from_string(&listing).unwrap();
        assert_eq!(reparsed.to_string(), schema.to_string());
    }

    #[test]
    fn describe_indents_nested_formats() {
        let schema = FieldType::from_string("(hdr: (a: u8))").unwrap();
        let listing = schema.describe();
        let indent = " ".repeat(crate::options().indent_size);
        assert!(listing.contains(&format!("{indent}hdr: (")));
    }
}
