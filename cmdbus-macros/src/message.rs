//! `#[derive(Message)]`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, Type, parse_macro_input};

/// Implementation of the `#[derive(Message)]` macro.
pub fn derive_message_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let result = match result_type(&input) {
        Ok(result) => result,
        Err(err) => return err.to_compile_error().into(),
    };
    let result = result.map_or_else(|| quote! { () }, |ty| quote! { #ty });

    let expanded = quote! {
        impl #impl_generics ::cmdbus::Message for #name #ty_generics #where_clause {
            type Result = #result;
        }
    };

    TokenStream::from(expanded)
}

/// Reads `#[message(result = T)]`.
fn result_type(input: &DeriveInput) -> syn::Result<Option<Type>> {
    let mut result = None;

    for attr in input.attrs.iter().filter(|a| a.path().is_ident("message")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("result") {
                if result.is_some() {
                    return Err(meta.error("duplicate `result` argument"));
                }
                result = Some(meta.value()?.parse::<Type>()?);
                Ok(())
            } else {
                Err(meta.error("unknown message attribute, expected `result = Type`"))
            }
        })?;
    }

    Ok(result)
}
