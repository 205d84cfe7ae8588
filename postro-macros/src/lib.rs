use proc_macro::TokenStream;
use syn::DeriveInput;

mod from_row;

/// Bail out of a derive macro with a compile error at the call site.
macro_rules! error {
    ($msg:literal) => {
        return Err(syn::Error::new(proc_macro2::Span::call_site(), $msg))
    };
}
pub(crate) use error;

/// Derive `postro::FromRow` for a struct, decoding each field from the
/// matching row column (by name for named fields, by position for tuple
/// structs).
#[proc_macro_derive(FromRow)]
pub fn from_row(input: TokenStream) -> TokenStream {
    match from_row::from_row(syn::parse_macro_input!(input as DeriveInput)) {
        Ok(ok) => ok,
        Err(err) => err.into_compile_error().into(),
    }
}
