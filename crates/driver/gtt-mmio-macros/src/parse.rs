//! Parsing logic for the `register_block!` DSL.

use syn::parse::{Parse, ParseStream};
use syn::{Attribute, Ident, LitInt, Token, Visibility, braced, bracketed};

/// A complete register block definition.
pub struct RegisterBlock {
    /// Doc attributes on the struct.
    pub attrs: Vec<Attribute>,
    /// Visibility of the generated struct.
    pub vis: Visibility,
    /// Name of the generated struct.
    pub name: Ident,
    /// Register definitions.
    pub registers: Vec<RegisterDef>,
}

/// Access mode for a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only.
    ReadOnly,
    /// Write-only.
    WriteOnly,
    /// Read-write.
    ReadWrite,
}

/// Width of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegWidth {
    /// 8-bit register.
    U8,
    /// 16-bit register.
    U16,
    /// 32-bit register.
    U32,
    /// 64-bit register.
    U64,
}

impl RegWidth {
    /// Returns the Rust type name for this width.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
        }
    }

    /// Returns the register width in bytes.
    pub fn bytes(self) -> u64 {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }
}

/// A single register definition.
pub struct RegisterDef {
    /// Doc attributes on this register.
    pub attrs: Vec<Attribute>,
    /// Byte offset from the region base.
    pub offset: u64,
    /// Register width.
    pub width: RegWidth,
    /// Access mode.
    pub access: AccessMode,
    /// Register name (used for method names).
    pub name: Ident,
    /// Optional associated bitflags type.
    pub bitflags_type: Option<Ident>,
}

impl RegisterDef {
    /// First byte past the end of this register.
    pub fn end(&self) -> u64 {
        self.offset + self.width.bytes()
    }
}

impl Parse for RegisterBlock {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let vis: Visibility = input.parse()?;
        let name: Ident = input.parse()?;

        let content;
        braced!(content in input);

        let mut registers = Vec::new();
        while !content.is_empty() {
            registers.push(content.call(parse_register)?);
        }

        if registers.is_empty() {
            return Err(syn::Error::new(
                name.span(),
                "register block must declare at least one register",
            ));
        }

        Ok(Self {
            attrs,
            vis,
            name,
            registers,
        })
    }
}

/// Parses a single `[offset; width; access] name => Type,` line.
fn parse_register(input: ParseStream) -> syn::Result<RegisterDef> {
    let attrs = input.call(Attribute::parse_outer)?;

    let bracket_content;
    bracketed!(bracket_content in input);

    let offset_lit: LitInt = bracket_content.parse()?;
    let offset: u64 = offset_lit.base10_parse()?;
    bracket_content.parse::<Token![;]>()?;

    let width_ident: Ident = bracket_content.parse()?;
    let width = match width_ident.to_string().as_str() {
        "u8" => RegWidth::U8,
        "u16" => RegWidth::U16,
        "u32" => RegWidth::U32,
        "u64" => RegWidth::U64,
        _ => {
            return Err(syn::Error::new(
                width_ident.span(),
                "expected register width: u8, u16, u32, or u64",
            ));
        }
    };

    if offset % width.bytes() != 0 {
        return Err(syn::Error::new(
            offset_lit.span(),
            "register offset must be aligned to its width",
        ));
    }

    bracket_content.parse::<Token![;]>()?;

    let access_ident: Ident = bracket_content.parse()?;
    let access = match access_ident.to_string().as_str() {
        "ro" => AccessMode::ReadOnly,
        "wo" => AccessMode::WriteOnly,
        "rw" => AccessMode::ReadWrite,
        _ => {
            return Err(syn::Error::new(
                access_ident.span(),
                "expected access mode: ro, wo, or rw",
            ));
        }
    };

    let name: Ident = input.parse()?;

    let bitflags_type = if input.peek(Token![=>]) {
        input.parse::<Token![=>]>()?;
        Some(input.parse::<Ident>()?)
    } else {
        None
    };

    let _ = input.parse::<Option<Token![,]>>();

    Ok(RegisterDef {
        attrs,
        offset,
        width,
        access,
        name,
        bitflags_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registers_and_span() {
        let block: RegisterBlock = syn::parse_str(
            "pub Regs { [0x70; u32; rw] hic, [0x3010; u8; ro] rdram, [0x2020; u32; rw] ctl => Ctl, }",
        )
        .unwrap();
        assert_eq!(block.registers.len(), 3);
        assert_eq!(block.registers[1].end(), 0x3011);
        assert_eq!(block.registers[2].bitflags_type.as_ref().unwrap(), "Ctl");
        assert_eq!(block.registers[0].access, AccessMode::ReadWrite);
    }

    #[test]
    fn rejects_misaligned_offset() {
        let err = syn::parse_str::<RegisterBlock>("pub Regs { [0x71; u32; rw] hic }");
        assert!(err.is_err());
    }

    #[test]
    fn rejects_unknown_width() {
        let err = syn::parse_str::<RegisterBlock>("pub Regs { [0x70; u24; rw] hic }");
        assert!(err.is_err());
    }

    #[test]
    fn rejects_empty_block() {
        assert!(syn::parse_str::<RegisterBlock>("pub Regs {}").is_err());
    }
}
