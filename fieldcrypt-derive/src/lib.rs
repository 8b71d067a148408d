//! Derive macro for `fieldcrypt` record schemas.
//!
//! `#[derive(Encryptable)]` implements `fieldcrypt::typed::Encryptable` and
//! `fieldcrypt::typed::EncryptedField` for a struct with named fields.
//! Fields marked `#[enc]` take part in encryption. Their type must itself
//! implement `EncryptedField` (`String`, another derived record, or an
//! `Option`/`Vec` of those). Every type parameter of the struct is bound by
//! `EncryptedField`.

#![warn(clippy::pedantic, clippy::nursery)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, parse_quote, Data, DeriveInput, Field, Fields, Generics, Meta};

/// Derive macro for the per-field encryption schema.
///
/// # Example
///
/// ```rust,ignore
/// use fieldcrypt::Encryptable;
///
/// #[derive(Encryptable)]
/// struct User {
///     email: String,
///     #[enc]
///     real_name: String,
///     #[enc]
///     emergency_contact: Vec<Contact>,
/// }
/// ```
#[proc_macro_derive(Encryptable, attributes(enc))]
pub fn derive_encryptable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input).unwrap_or_else(syn::Error::into_compile_error).into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Encryptable can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Encryptable can only be derived for structs",
            ))
        }
    };

    let mut descriptors = Vec::with_capacity(fields.len());
    let mut visits = Vec::new();
    for field in fields {
        let Some(ident) = &field.ident else { continue };
        let name = ident.to_string().trim_start_matches("r#").to_string();
        let encrypted = is_marked(field)?;

        descriptors.push(quote! {
            ::fieldcrypt::typed::FieldDescriptor { name: #name, encrypted: #encrypted }
        });
        if encrypted {
            visits.push(quote! {
                ::fieldcrypt::typed::EncryptedField::accept(&mut self.#ident, #name, visitor)?;
            });
        }
    }

    let ident = &input.ident;
    let generics = bounded_generics(&input.generics);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let unused = visits.is_empty().then(|| quote! { let _ = visitor; });

    Ok(quote! {
        impl #impl_generics ::fieldcrypt::typed::Encryptable for #ident #ty_generics #where_clause {
            const FIELDS: &'static [::fieldcrypt::typed::FieldDescriptor] = &[#(#descriptors),*];

            fn accept_fields(
                &mut self,
                visitor: &mut dyn ::fieldcrypt::typed::FieldVisitor,
            ) -> ::core::result::Result<(), ::fieldcrypt::Error> {
                #unused
                #(#visits)*
                ::core::result::Result::Ok(())
            }
        }

        impl #impl_generics ::fieldcrypt::typed::EncryptedField for #ident #ty_generics #where_clause {
            fn accept(
                &mut self,
                _field: &'static str,
                visitor: &mut dyn ::fieldcrypt::typed::FieldVisitor,
            ) -> ::core::result::Result<(), ::fieldcrypt::Error> {
                ::fieldcrypt::typed::Encryptable::accept_fields(self, visitor)
            }
        }
    })
}

/// Requires every type parameter to implement `EncryptedField`.
fn bounded_generics(generics: &Generics) -> Generics {
    let mut bounded = generics.clone();
    let params: Vec<_> = generics.type_params().map(|param| param.ident.clone()).collect();
    let where_clause = bounded.make_where_clause();
    for param in params {
        where_clause
            .predicates
            .push(parse_quote!(#param: ::fieldcrypt::typed::EncryptedField));
    }
    bounded
}

/// Returns `true` if `field` carries a bare `#[enc]` marker.
fn is_marked(field: &Field) -> syn::Result<bool> {
    let mut marked = false;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("enc")) {
        if !matches!(attr.meta, Meta::Path(_)) {
            return Err(syn::Error::new_spanned(attr, "`#[enc]` takes no arguments"));
        }
        if marked {
            return Err(syn::Error::new_spanned(attr, "duplicate `#[enc]` marker"));
        }
        marked = true;
    }
    Ok(marked)
}
