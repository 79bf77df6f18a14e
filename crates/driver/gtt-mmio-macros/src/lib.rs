//! Proc-macro crate for the `register_block!` MMIO register DSL.
//!
//! A generated block borrows a mapped `MmioRegion` and is only constructible
//! when the region covers every declared register, so all generated
//! accessors are safe and cannot reach past the end of the mapping.

mod codegen;
mod parse;

use proc_macro::TokenStream;
use syn::parse_macro_input;

use crate::parse::RegisterBlock;

/// Generates a typed register block borrowing a mapped MMIO region.
///
/// # Syntax
///
/// ```ignore
/// register_block! {
///     /// Doc comment for the struct.
///     pub StructName {
///         /// Doc comment for the register.
///         [offset; width; access_mode] name => OptionalBitflagsType,
///     }
/// }
/// ```
///
/// - `offset`: byte offset from the region base (integer literal)
/// - `width`: `u8`, `u16`, `u32`, or `u64`
/// - `access_mode`: `ro`, `wo`, or `rw`
/// - `=> Type`: optional bitflags type (`from_bits_retain` / `.bits()`)
///
/// # Generated Code
///
/// - `const SPAN: u64`: bytes the block needs, `max(offset + width)`
/// - `fn new(region: &MmioRegion) -> Option<Self>`: `None` if the region
///   is shorter than `SPAN`
/// - `ro`/`rw`: `fn name(&self) -> Type`
/// - `wo`/`rw`: `fn set_name(&self, value: Type)`
/// - `rw`: `fn modify_name(&self, f: impl FnOnce(Type) -> Type)`
#[proc_macro]
pub fn register_block(input: TokenStream) -> TokenStream {
    let block = parse_macro_input!(input as RegisterBlock);
    match codegen::generate(&block) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
