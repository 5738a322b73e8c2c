//! Derive macros for cmdbus.
//!
//! - `#[derive(Message)]` - implements `Message`, with the result type given
//!   by `#[message(result = T)]` (defaults to `()`)
//! - `#[derive(Injectable)]` - implements `Injectable` from `#[inject]`
//!   field and struct attributes

use proc_macro::TokenStream;

mod injectable;
mod message;

/// Derive macro for implementing the `Message` trait.
///
/// ```rust,ignore
/// #[derive(Message)]
/// #[message(result = UserId)]
/// struct CreateUser {
///     name: String,
/// }
/// ```
#[proc_macro_derive(Message, attributes(message))]
pub fn derive_message(input: TokenStream) -> TokenStream {
    message::derive_message_impl(input)
}

/// Derive macro for implementing the `Injectable` trait.
///
/// ```rust,ignore
/// #[derive(Default, Injectable)]
/// #[inject(setup = configure(Tenant, Clock))]
/// struct Audit {
///     #[inject(container)]
///     container: Injected<ContextContainer>,
///     #[inject]
///     tenant: Injected<Tenant>,
/// }
///
/// impl Audit {
///     fn configure(&self, tenant: Arc<Tenant>, clock: Arc<Clock>) { /* ... */ }
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable_impl(input)
}
