use proc_macro::TokenStream;
use quote::quote;

use syn::{
    Attribute, Data, DeriveInput, Error, Expr, Fields, GenericArgument, Index, LitStr,
    PathArguments, Token, Type, parenthesized, token,
};

const COMPONO_ATTR: &str = "compono";
const INJECT_OPTION: &str = "inject";

fn extract_option_type(ty: &Type) -> Option<&Type> {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
        && segment.ident == "Option"
        && let PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(GenericArgument::Type(inner)) = args.args.first()
    {
        return Some(inner);
    }
    None
}

fn has_inject_option(attrs: &[Attribute]) -> Result<bool, Error> {
    let mut inject = false;
    for attr in attrs {
        if !attr.path().is_ident(COMPONO_ATTR) {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident(INJECT_OPTION) {
                inject = true;
            } else if meta.input.peek(Token![=]) {
                meta.value()?.parse::<Expr>()?;
            } else if meta.input.peek(token::Paren) {
                let nested;
                parenthesized!(nested in meta.input);
                nested.parse::<proc_macro2::TokenStream>()?;
            }
            Ok(())
        })?;
    }
    Ok(inject)
}

/// Derive macro for the `Inject` trait.
///
/// Fields marked with `#[compono(inject)]` are filled from the dependency
/// container. Fields of type `Option<T>` receive `Some(T)`. Other options in
/// the attribute are ignored.
#[proc_macro_derive(Inject, attributes(compono))]
pub fn derive_inject(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match handle_derive_inject(input) {
        Ok(v) => v.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn handle_derive_inject(input: DeriveInput) -> Result<proc_macro2::TokenStream, Error> {
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(s) => &s.fields,
        _ => return Err(Error::new(name.span(), "Only structs are supported")),
    };

    let mut field_stmts = Vec::new();
    let members: Vec<_> = match fields {
        Fields::Named(fields) => fields
            .named
            .iter()
            .map(|field| {
                let ident = field.ident.clone();
                (field, quote! { #ident }, ident.map(|v| v.to_string()))
            })
            .collect(),
        Fields::Unnamed(fields) => fields
            .unnamed
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let index = Index::from(i);
                (field, quote! { #index }, Some(i.to_string()))
            })
            .collect(),
        Fields::Unit => Vec::new(),
    };

    for (field, member, field_name) in members {
        if !has_inject_option(&field.attrs)? {
            continue;
        }
        let field_name = field_name.unwrap_or_default();
        match extract_option_type(&field.ty) {
            Some(inner_ty) => field_stmts.push(quote! {
                self.#member = ::std::option::Option::Some(
                    invoker.inject_field::<#inner_ty>(::std::any::type_name::<Self>(), #field_name)?,
                );
            }),
            None => {
                let field_ty = &field.ty;
                field_stmts.push(quote! {
                    self.#member =
                        invoker.inject_field::<#field_ty>(::std::any::type_name::<Self>(), #field_name)?;
                });
            }
        }
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::compono::Inject for #name #ty_generics #where_clause {
            fn inject(
                &mut self,
                invoker: &::compono::DependencyInvoker,
            ) -> ::std::result::Result<(), ::compono::Error> {
                #(#field_stmts)*
                ::std::result::Result::Ok(())
            }
        }
    })
}

/// Attribute macro binding a configuration type to a config key.
///
/// The key may address a nested value with a dotted path.
///
/// ```rust,ignore
/// #[config_section("server.http")]
/// #[derive(serde::Deserialize)]
/// struct HttpConfig {
///     port: u16,
/// }
/// ```
#[proc_macro_attribute]
pub fn config_section(args: TokenStream, input: TokenStream) -> TokenStream {
    let key = syn::parse_macro_input!(args as LitStr);
    let input = syn::parse_macro_input!(input as DeriveInput);
    match handle_config_section(key, input) {
        Ok(v) => v.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn handle_config_section(
    key: LitStr,
    input: DeriveInput,
) -> Result<proc_macro2::TokenStream, Error> {
    let value = key.value();
    if value.is_empty() || value.split('.').any(str::is_empty) {
        return Err(Error::new(
            key.span(),
            "config key must be a non-empty dotted path",
        ));
    }
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        #input

        impl #impl_generics ::compono::ConfigSection for #name #ty_generics #where_clause {
            fn key() -> &'static str {
                #key
            }
        }
    })
}
