//! Textual p-code listings.
//!
//! A listing is a sequence of instruction blocks. Each block starts with a
//! header line giving the instruction address (optionally followed by its
//! disassembly) and continues with one p-code op per line:
//!
//! ```text
//! # comment
//! 0x401000: add eax, 5
//!     (register, 0x0, 4) INT_ADD (register, 0x0, 4) , (const, 0x5, 4)
//!     --- STORE (const, 0x1b1, 8) , (register, 0x10, 4) , (register, 0x0, 4)
//! ```

use crate::{AddressSpace, Error, Instruction, Opcode, PcodeOp, Result, SpaceId, Varnode};

/// Parses a whole listing.
pub fn parse_listing(text: &str) -> Result<Vec<Instruction>> {
    let mut blocks: Vec<Instruction> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('(') || line.starts_with("---") {
            let op = parse_op(line, line_no)?;
            match blocks.last_mut() {
                Some(block) => block.ops.push(op),
                None => {
                    return Err(Error::parse(
                        line_no,
                        "p-code op before the first instruction header",
                    ))
                }
            }
        } else {
            blocks.push(parse_header(line, line_no)?);
        }
    }

    Ok(blocks)
}

/// Parses a single op line such as `(unique, 0x10, 1) INT_EQUAL (register, 0x0, 1) , (const, 0x0, 1)`.
pub fn parse_op(line: &str, line_no: usize) -> Result<PcodeOp> {
    let mut rest = line.trim();

    let output = if let Some(after) = rest.strip_prefix("---") {
        rest = after.trim_start();
        None
    } else {
        let (vn, after) = take_varnode(rest, line_no)?;
        rest = after.trim_start();
        Some(vn)
    };

    let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let (name, after) = rest.split_at(name_end);
    if name.is_empty() {
        return Err(Error::parse(line_no, "missing opcode"));
    }
    let opcode = Opcode::from_name(name)
        .ok_or_else(|| Error::parse(line_no, format!("unknown opcode `{name}`")))?;
    rest = after.trim_start();

    let mut op = PcodeOp::new(opcode);
    op.output = output;

    while !rest.is_empty() {
        if !op.inputs.is_empty() {
            rest = rest
                .strip_prefix(',')
                .ok_or_else(|| Error::parse(line_no, "expected `,` between inputs"))?
                .trim_start();
        }
        let (vn, after) = take_varnode(rest, line_no)?;
        op.inputs.push(vn);
        rest = after.trim_start();
    }

    Ok(op)
}

/// Parses a varnode written as `(space, offset, size)`.
pub fn parse_varnode(text: &str, line_no: usize) -> Result<Varnode> {
    let (vn, rest) = take_varnode(text.trim(), line_no)?;
    if !rest.trim().is_empty() {
        return Err(Error::parse(
            line_no,
            format!("trailing text after varnode: `{}`", rest.trim()),
        ));
    }
    Ok(vn)
}

/// Parses a space name: `const`, `register`, `unique` or `space:<id>`.
pub fn parse_space(text: &str, line_no: usize) -> Result<AddressSpace> {
    match text.trim() {
        "const" => Ok(AddressSpace::Constant),
        "register" => Ok(AddressSpace::Register),
        "unique" => Ok(AddressSpace::Unique),
        other => match other.strip_prefix("space:") {
            Some(id) => Ok(AddressSpace::Other(SpaceId(parse_number(id, line_no)?))),
            None => Err(Error::parse(line_no, format!("unknown space `{other}`"))),
        },
    }
}

/// Parses a decimal or `0x`-prefixed hexadecimal number.
pub fn parse_number(text: &str, line_no: usize) -> Result<u64> {
    let text = text.trim();
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    };
    parsed.map_err(|_| Error::parse(line_no, format!("invalid number `{text}`")))
}

fn parse_header(line: &str, line_no: usize) -> Result<Instruction> {
    let (addr, text) = line
        .split_once(':')
        .ok_or_else(|| Error::parse(line_no, "expected `<address>:` instruction header"))?;
    let address = parse_number(addr, line_no)?;
    Ok(Instruction::new(address, text.trim()))
}

/// Splits one parenthesised varnode off the front of `text`.
fn take_varnode(text: &str, line_no: usize) -> Result<(Varnode, &str)> {
    let inner = text
        .strip_prefix('(')
        .ok_or_else(|| Error::parse(line_no, format!("expected varnode at `{text}`")))?;
    let close = inner
        .find(')')
        .ok_or_else(|| Error::parse(line_no, "unterminated varnode"))?;
    let (body, rest) = (&inner[..close], &inner[close + 1..]);

    let fields: Vec<&str> = body.split(',').map(str::trim).collect();
    let [space, offset, size] = fields.as_slice() else {
        return Err(Error::parse(
            line_no,
            format!("varnode needs 3 fields, found {}", fields.len()),
        ));
    };

    let space = parse_space(space, line_no)?;
    let offset = parse_number(offset, line_no)?;
    let size = parse_number(size, line_no)?;
    if size == 0 {
        return Err(Error::parse(line_no, "varnode size must be non-zero"));
    }
    let size = usize::try_from(size)
        .ok()
        .filter(|&n| n <= Varnode::MAX_SIZE)
        .ok_or_else(|| {
            Error::parse(
                line_no,
                format!(
                    "varnode size {size} exceeds {} bytes",
                    Varnode::MAX_SIZE
                ),
            )
        })?;

    Ok((Varnode::new(space, offset, size), rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
# push ebp
0x401000: push ebp
    (unique, 0x100, 4) COPY (register, 0x14, 4)
    (register, 0x10, 4) INT_SUB (register, 0x10, 4) , (const, 0x4, 4)
    --- STORE (const, 0x1b1, 8) , (register, 0x10, 4) , (unique, 0x100, 4)

0x401001:
    (register, 0x200, 1) BOOL_NEGATE (register, 0x206, 1)
";

    #[test]
    fn test_parse_blocks() {
        let blocks = parse_listing(LISTING).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].address, 0x401000);
        assert_eq!(blocks[0].mnemonic, "push ebp");
        assert_eq!(blocks[0].ops.len(), 3);
        assert_eq!(blocks[1].mnemonic, "");
        assert_eq!(blocks[1].ops[0].opcode, Opcode::BoolNegate);

        let store = &blocks[0].ops[2];
        assert_eq!(store.opcode, Opcode::Store);
        assert!(store.output.is_none());
        assert_eq!(store.inputs[0], Varnode::constant(0x1b1, 8));
        assert_eq!(store.inputs[2], Varnode::unique(0x100, 4));
    }

    #[test]
    fn test_display_round_trip() {
        let blocks = parse_listing(LISTING).unwrap();
        for op in blocks.iter().flat_map(|b| &b.ops) {
            assert_eq!(parse_op(&op.to_string(), 1).unwrap(), *op);
        }
    }

    #[test]
    fn test_other_space() {
        let vn = parse_varnode("(space:0x1b1, 4096, 8)", 1).unwrap();
        assert_eq!(vn.space, AddressSpace::Other(SpaceId(0x1b1)));
        assert_eq!(vn.offset, 0x1000);
        assert_eq!(vn.size, 8);
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse_listing("0x10:\n    (register, 0x0, 4) INT_FROB (const, 0x1, 4)\n")
            .unwrap_err();
        assert_eq!(err.to_string(), "line 2: unknown opcode `INT_FROB`");

        let err = parse_listing("\n(register, 0x0, 4) COPY (const, 0x1, 4)\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));

        let err = parse_listing("0x10:\n(register, 0x0) COPY (const, 0x1, 4)\n").unwrap_err();
        assert!(err.to_string().contains("3 fields"));

        let err = parse_listing("0x10:\n(register, 0x0, 4) COPY (const, 0x1, 4) (const, 0x2, 4)\n")
            .unwrap_err();
        assert!(err.to_string().contains("expected `,`"));

        assert!(parse_listing("zzz: nop\n").is_err());
        assert!(parse_varnode("(heap, 0x0, 4)", 1).is_err());
        assert!(parse_varnode("(register, 0x0, 0)", 1).is_err());

        let err = parse_listing(
            "0x10:\n\n    (register, 0x0, 0x2000000000000000) COPY (register, 0x0, 0x2000000000000000)\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Parse { line: 3, .. }));
        assert!(err.to_string().contains("exceeds 64 bytes"));
        assert!(parse_varnode("(register, 0x0, 0x10000000)", 1).is_err());
        assert!(parse_varnode("(register, 0x0, 65)", 1).is_err());
        assert_eq!(parse_varnode("(register, 0x0, 64)", 1).unwrap().size, 64);
    }
}
