//! `#[derive(Injectable)]`.
//!
//! Field attributes:
//! - `#[inject]` receives the current value of the field's context type
//! - `#[inject(container)]` receives the dispatch's context container
//!
//! Struct attribute:
//! - `#[inject(setup = method(A, B))]` calls `self.method(a, b)` once both
//!   `A` and `B` are bound

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::{
    Data, DeriveInput, Fields, Ident, Member, Token, Type, parenthesized,
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
};

enum FieldPoint {
    Container(Member),
    Context(Member),
}

struct SetupDecl {
    method: Ident,
    args: Vec<Type>,
}

impl Parse for SetupDecl {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let method: Ident = input.parse()?;
        let content;
        parenthesized!(content in input);
        let args = Punctuated::<Type, Token![,]>::parse_terminated(&content)?;
        if args.is_empty() {
            return Err(syn::Error::new(
                method.span(),
                "setup needs at least one context type",
            ));
        }
        Ok(SetupDecl {
            method,
            args: args.into_iter().collect(),
        })
    }
}

/// Implementation of the `#[derive(Injectable)]` macro.
pub fn derive_injectable_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Injectable can only be derived for structs",
            ));
        }
    };

    let field_points = field_points(fields)?;
    let setups = setup_decls(input)?;

    let field_calls = field_points.iter().map(|point| match point {
        FieldPoint::Container(member) => quote! { points.container(&self.#member); },
        FieldPoint::Context(member) => quote! { points.context(&self.#member); },
    });

    let setup_calls = setups.iter().map(|setup| {
        let method = &setup.method;
        let types = &setup.args;
        let vars: Vec<Ident> = (0..types.len())
            .map(|i| format_ident!("__arg{}", i, span = Span::call_site()))
            .collect();
        quote! {
            points.setup::<(#(#types,)*), _>(move |(#(#vars,)*)| {
                self.#method(#(#vars),*);
            });
        }
    });

    Ok(quote! {
        impl #impl_generics ::cmdbus::Injectable for #name #ty_generics #where_clause {
            fn injection_points<'__points>(
                &'__points self,
                points: &mut ::cmdbus::InjectionPoints<'__points>,
            ) -> ::core::result::Result<(), ::cmdbus::InjectionError> {
                #(#field_calls)*
                #(#setup_calls)*
                ::core::result::Result::Ok(())
            }
        }
    })
}

fn field_points(fields: &Fields) -> syn::Result<Vec<FieldPoint>> {
    let mut points = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(index.into()),
        };

        for attr in field.attrs.iter().filter(|a| a.path().is_ident("inject")) {
            if matches!(attr.meta, syn::Meta::Path(_)) {
                points.push(FieldPoint::Context(member.clone()));
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("container") {
                    points.push(FieldPoint::Container(member.clone()));
                    Ok(())
                } else {
                    Err(meta.error("unknown inject attribute, expected `container`"))
                }
            })?;
        }
    }

    Ok(points)
}

fn setup_decls(input: &DeriveInput) -> syn::Result<Vec<SetupDecl>> {
    let mut setups = Vec::new();

    for attr in input.attrs.iter().filter(|a| a.path().is_ident("inject")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("setup") {
                setups.push(meta.value()?.parse::<SetupDecl>()?);
                Ok(())
            } else {
                Err(meta.error("unknown inject attribute, expected `setup = method(Types...)`"))
            }
        })?;
    }

    Ok(setups)
}
