//! Code generation for the `register_block!` macro.
//!
//! Emits a struct borrowing a `gtt_mmio::MmioRegion` plus typed accessors.
//! The region length is checked once in `new()` against the block's span;
//! every accessor relies on that check for the volatile access.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::parse::{AccessMode, RegisterBlock, RegisterDef};

/// Generates the complete output for a register block definition.
pub fn generate(block: &RegisterBlock) -> syn::Result<TokenStream> {
    let vis = &block.vis;
    let name = &block.name;
    let attrs = &block.attrs;

    let span_bytes = block
        .registers
        .iter()
        .map(RegisterDef::end)
        .max()
        .unwrap_or(0);

    let methods: Vec<TokenStream> = block.registers.iter().map(generate_methods).collect();

    Ok(quote! {
        #(#attrs)*
        #vis struct #name<'r> {
            region: &'r ::gtt_mmio::MmioRegion,
        }

        impl<'r> #name<'r> {
            /// Number of bytes the register block spans from the region base.
            #vis const SPAN: u64 = #span_bytes;

            /// Creates a register block over `region`.
            ///
            /// Returns `None` if the region is shorter than [`Self::SPAN`].
            #[must_use]
            #vis fn new(region: &'r ::gtt_mmio::MmioRegion) -> Option<Self> {
                if region.size() < Self::SPAN {
                    return None;
                }
                Some(Self { region })
            }

            /// Returns the underlying region.
            #[must_use]
            #vis fn region(&self) -> &'r ::gtt_mmio::MmioRegion {
                self.region
            }

            #(#methods)*
        }
    })
}

/// Generates accessor methods for a single register.
fn generate_methods(reg: &RegisterDef) -> TokenStream {
    let mut methods = TokenStream::new();
    if reg.access != AccessMode::WriteOnly {
        methods.extend(generate_read(reg));
    }
    if reg.access != AccessMode::ReadOnly {
        methods.extend(generate_write(reg));
    }
    if reg.access == AccessMode::ReadWrite {
        methods.extend(generate_modify(reg));
    }
    methods
}

/// Volatile load of the register's raw value.
fn raw_load(reg: &RegisterDef) -> TokenStream {
    let offset = reg.offset;
    let width_ty = width_type(reg);
    quote! {
        // SAFETY: `new` checked that the mapped region covers `SPAN` bytes,
        // which includes this register, and the offset is width-aligned.
        unsafe {
            core::ptr::read_volatile(
                (self.region.virt_base().as_u64() + #offset) as *const #width_ty
            )
        }
    }
}

/// Volatile store of a raw value expression into the register.
fn raw_store(reg: &RegisterDef, value: &TokenStream) -> TokenStream {
    let offset = reg.offset;
    let width_ty = width_type(reg);
    quote! {
        // SAFETY: `new` checked that the mapped region covers `SPAN` bytes,
        // which includes this register, and the offset is width-aligned.
        unsafe {
            core::ptr::write_volatile(
                (self.region.virt_base().as_u64() + #offset) as *mut #width_ty,
                #value,
            );
        }
    }
}

/// Generates the read accessor for a register.
fn generate_read(reg: &RegisterDef) -> TokenStream {
    let name = &reg.name;
    let width_ty = width_type(reg);
    let attrs = &reg.attrs;
    let load = raw_load(reg);

    if let Some(ref bf_type) = reg.bitflags_type {
        quote! {
            #(#attrs)*
            #[inline]
            pub fn #name(&self) -> #bf_type {
                let raw: #width_ty = #load;
                #bf_type::from_bits_retain(raw)
            }
        }
    } else {
        quote! {
            #(#attrs)*
            #[inline]
            pub fn #name(&self) -> #width_ty {
                #load
            }
        }
    }
}

/// Generates the write accessor for a register.
fn generate_write(reg: &RegisterDef) -> TokenStream {
    let name = &reg.name;
    let setter_name = format_ident!("set_{}", name);
    let width_ty = width_type(reg);
    let set_doc = format!("Writes the `{name}` register.");

    if let Some(ref bf_type) = reg.bitflags_type {
        let store = raw_store(reg, &quote! { value.bits() });
        quote! {
            #[doc = #set_doc]
            #[inline]
            pub fn #setter_name(&self, value: #bf_type) {
                #store
            }
        }
    } else {
        let store = raw_store(reg, &quote! { value });
        quote! {
            #[doc = #set_doc]
            #[inline]
            pub fn #setter_name(&self, value: #width_ty) {
                #store
            }
        }
    }
}

/// Generates the read-modify-write helper for a read-write register.
fn generate_modify(reg: &RegisterDef) -> TokenStream {
    let name = &reg.name;
    let setter_name = format_ident!("set_{}", name);
    let modify_name = format_ident!("modify_{}", name);
    let value_ty = match reg.bitflags_type {
        Some(ref bf_type) => quote! { #bf_type },
        None => width_type(reg),
    };
    let doc = format!("Reads `{name}`, applies `f`, and writes the result back.");

    quote! {
        #[doc = #doc]
        #[inline]
        pub fn #modify_name(&self, f: impl FnOnce(#value_ty) -> #value_ty) {
            let value = f(self.#name());
            self.#setter_name(value);
        }
    }
}

/// Returns the token stream for the register's width type.
fn width_type(reg: &RegisterDef) -> TokenStream {
    let ident = format_ident!("{}", reg.width.type_name());
    quote! { #ident }
}
